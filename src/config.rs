//! Deployment configuration for the frame.
//!
//! Values that differ per installation (WiFi credentials, render server address) are
//! baked in at compile time from environment variables, everything else has a sane
//! default for the 800x480 tri-color panel.

use std::fmt::Write as _;

/// Display width, pixels horizontally
pub const WIDTH: u16 = 800;

/// Display height, pixels vertically
pub const HEIGHT: u16 = 480;

/// Working asset, overwritten by every successful fetch
pub const ASSET_PATH: &str = "/render.img";

/// Last known-good copy of the working asset
pub const CACHE_PATH: &str = "/render.cache";

const DEFAULT_RENDER_URL: &str = "http://192.168.1.10:3123/render";

/// Body reads per stall window
const STALL_READ_SLICES: u32 = 5;

/// Fixed resolution of the destination surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub width: u16,
    pub height: u16,
}

impl Surface {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Bytes in one packed 1-bit row
    pub const fn stride(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Bytes in one full 1-bit plane
    pub const fn plane_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// Exact size of a raw black plane + red plane dump for this surface
    pub const fn raw_asset_len(&self) -> u64 {
        (self.plane_len() * 2) as u64
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(WIDTH, HEIGHT)
    }
}

/// How decoded colors are mapped onto the two planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// White background, black foreground and red accent
    #[default]
    TriColor,
    /// Luminance threshold only, the red plane is never touched
    Mono,
}

/// Bounded retry behaviour of a single acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause between two attempts, not applied after the last one
    pub retry_delay_ms: u32,
    /// Abort an attempt when no body bytes arrive for this long
    pub stall_timeout_ms: u32,
    /// Sleep between polls while the body has no data available
    pub poll_interval_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
            stall_timeout_ms: 5000,
            poll_interval_ms: 1,
        }
    }
}

/// Output format requested from the render server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Bmp,
    Png,
    /// Raw black plane followed by red plane
    Bwr,
}

impl RenderFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderFormat::Bmp => "bmp",
            RenderFormat::Png => "png",
            RenderFormat::Bwr => "bwr",
        }
    }
}

/// Query parameters understood by the `/render` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderQuery {
    pub format: RenderFormat,
    pub width: u16,
    pub height: u16,
    /// Floyd-Steinberg dithering on the server, only used for [`RenderFormat::Bwr`]
    pub dither: bool,
}

impl RenderQuery {
    pub fn for_surface(format: RenderFormat, surface: Surface) -> Self {
        Self {
            format,
            width: surface.width,
            height: surface.height,
            dither: false,
        }
    }

    /// Append this query to `base`, keeping any query string already present
    pub fn url(&self, base: &str) -> String {
        let mut url = String::from(base);
        url.push(if base.contains('?') { '&' } else { '?' });
        // Writing into a String cannot fail
        let _ = write!(
            url,
            "format={}&width={}&height={}",
            self.format.as_str(),
            self.width,
            self.height
        );
        if self.format == RenderFormat::Bwr && self.dither {
            url.push_str("&bwrDither=true");
        }
        url
    }
}

/// Everything one wake cycle needs to know
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub surface: Surface,
    pub color_mode: ColorMode,
    pub retry: RetryPolicy,
    pub asset_path: String,
    pub cache_path: String,
    pub caching: bool,
    pub render_url: String,
    pub query: RenderQuery,
    /// HTML sent as POST body; `None` lets the server use its own configuration
    pub payload: Option<String>,
    /// Upper bound for a single blocking network operation
    pub http_timeout_ms: u32,
    pub sleep_minutes: u32,
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let surface = Surface::default();
        Self {
            surface,
            color_mode: ColorMode::TriColor,
            retry: RetryPolicy::default(),
            asset_path: ASSET_PATH.to_string(),
            cache_path: CACHE_PATH.to_string(),
            caching: true,
            render_url: option_env!("INKFRAME_RENDER_URL")
                .unwrap_or(DEFAULT_RENDER_URL)
                .to_string(),
            query: RenderQuery::for_surface(RenderFormat::Bmp, surface),
            payload: None,
            http_timeout_ms: 10_000,
            sleep_minutes: 60,
            wifi_ssid: option_env!("INKFRAME_WIFI_SSID").unwrap_or(""),
            wifi_password: option_env!("INKFRAME_WIFI_PASS").unwrap_or(""),
        }
    }
}

impl PipelineConfig {
    /// Full URL of the render endpoint including the query
    pub fn request_url(&self) -> String {
        self.query.url(&self.render_url)
    }

    /// Block time of one body read.
    ///
    /// A read that blocks for `http_timeout_ms` hides the stall check until it
    /// returns, so reads are kept to a slice of the stall window.
    pub fn read_timeout_ms(&self) -> u32 {
        let slice = self.retry.stall_timeout_ms / STALL_READ_SLICES;
        self.http_timeout_ms.min(slice).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_size_follows_surface() {
        assert_eq!(Surface::default().raw_asset_len(), 96_000);
        // Width not a multiple of 8 rounds each row up
        assert_eq!(Surface::new(250, 122).stride(), 32);
        assert_eq!(Surface::new(250, 122).raw_asset_len(), 32 * 122 * 2);
    }

    #[test]
    fn retry_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay_ms, 2000);
        assert_eq!(policy.stall_timeout_ms, 5000);
    }

    #[test]
    fn reads_block_for_a_slice_of_the_stall_window() {
        let config = PipelineConfig::default();
        assert_eq!(config.read_timeout_ms(), 1000);
        assert!(config.read_timeout_ms() < config.retry.stall_timeout_ms);

        let short = PipelineConfig {
            http_timeout_ms: 300,
            ..PipelineConfig::default()
        };
        assert_eq!(short.read_timeout_ms(), 300);

        let tiny = PipelineConfig {
            retry: RetryPolicy {
                stall_timeout_ms: 0,
                ..RetryPolicy::default()
            },
            ..PipelineConfig::default()
        };
        assert_eq!(tiny.read_timeout_ms(), 1);
    }

    #[test]
    fn render_query_builds_url() {
        let query = RenderQuery::for_surface(RenderFormat::Png, Surface::default());
        assert_eq!(
            query.url("http://host:3123/render"),
            "http://host:3123/render?format=png&width=800&height=480"
        );

        let bwr = RenderQuery {
            dither: true,
            ..RenderQuery::for_surface(RenderFormat::Bwr, Surface::default())
        };
        assert_eq!(
            bwr.url("http://host/render?mode=weather"),
            "http://host/render?mode=weather&format=bwr&width=800&height=480&bwrDither=true"
        );
    }

    #[test]
    fn dither_ignored_for_bmp() {
        let query = RenderQuery {
            dither: true,
            ..RenderQuery::for_surface(RenderFormat::Bmp, Surface::new(400, 300))
        };
        assert_eq!(query.url("/r"), "/r?format=bmp&width=400&height=300");
    }
}
