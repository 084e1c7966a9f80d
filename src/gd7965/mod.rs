//! GD7965 ePaper Display Driver
//!
//! Drives the 7.5" 800x480 black/white/red panel (GDEW075Z08 / UC8179 controller).
//!
//! ### Usage
//! The driver never holds a frame buffer. To display something you:
//!
//! 1. create the driver with [`driver::Gd7965::new`], which resets and configures the panel
//! 1. blank the controller RAM with
//!    [`TriColorDisplay::clear`](crate::display::TriColorDisplay::clear)
//! 1. write rows or windows of packed bit planes with
//!    [`TriColorDisplay::write_image`](crate::display::TriColorDisplay::write_image)
//! 1. kick off a display update using
//!    [`TriColorDisplay::refresh`](crate::display::TriColorDisplay::refresh)
//! 1. put the panel to sleep with [`driver::Gd7965::sleep`]

pub mod driver;
pub mod interface;

mod cmd;
mod flag;

pub use driver::Gd7965;

/// Panel width in pixels
pub const WIDTH: u16 = 800;

/// Panel height in pixels
pub const HEIGHT: u16 = 480;
