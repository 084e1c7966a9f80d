//! Centering and clipping of a decoded image against the surface

use crate::config::Surface;

/// Extra offset requested by the caller, added after centering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Origin {
    pub x: i32,
    pub y: i32,
}

impl Origin {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Visible part of one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    offset: i64,
    dest: u16,
    len: u16,
    src: u32,
}

impl Span {
    fn compute(image: u32, surface: u16, origin: i32) -> Self {
        let image = image as i64;
        let surface_len = surface as i64;
        let centered = if image < surface_len {
            (surface_len - image) / 2
        } else {
            0
        };
        let offset = centered + origin as i64;
        let start = offset.max(0);
        let end = (offset + image).min(surface_len);
        if end <= start {
            return Span {
                offset,
                dest: 0,
                len: 0,
                src: 0,
            };
        }
        // start and end lie within 0..=surface, so both fit the narrower types
        Span {
            offset,
            dest: start as u16,
            len: (end - start) as u16,
            src: (start - offset) as u32,
        }
    }
}

/// Where an image lands on the surface and which part of it stays visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRect {
    /// Surface position of the image's top left pixel, may be negative or off surface
    pub offset_x: i64,
    pub offset_y: i64,
    /// First visible surface column and row
    pub dest_x: u16,
    pub dest_y: u16,
    /// Visible size, zero when the image is entirely off surface
    pub width: u16,
    pub height: u16,
    /// First visible image column and row
    pub src_x: u32,
    pub src_y: u32,
}

impl PlacementRect {
    pub fn compute(image_width: u32, image_height: u32, origin: Origin, surface: Surface) -> Self {
        let x = Span::compute(image_width, surface.width, origin.x);
        let y = Span::compute(image_height, surface.height, origin.y);
        let visible = x.len > 0 && y.len > 0;
        Self {
            offset_x: x.offset,
            offset_y: y.offset,
            dest_x: x.dest,
            dest_y: y.dest,
            width: if visible { x.len } else { 0 },
            height: if visible { y.len } else { 0 },
            src_x: x.src,
            src_y: y.src,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Surface row of image row `src_row`, `None` when that row is clipped
    pub fn dest_row(&self, src_row: u32) -> Option<u16> {
        let i = src_row.checked_sub(self.src_y)?;
        if i < self.height as u32 {
            Some(self.dest_y + i as u16)
        } else {
            None
        }
    }

    /// Byte range of the visible columns within a decoded row
    pub fn visible_bytes(&self, bytes_per_pixel: usize) -> std::ops::Range<usize> {
        let start = self.src_x as usize * bytes_per_pixel;
        start..start + self.width as usize * bytes_per_pixel
    }
}
