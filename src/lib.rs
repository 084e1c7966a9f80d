//! Image acquisition and rendering pipeline for a 7.5" black/white/red e-paper frame.
//!
//! Each wake cycle the frame asks a render server for a picture, stores it on flash,
//! and streams it to the panel one row at a time:
//!
//! 1. [`fetch::FetchController::acquire`] downloads the asset with a bounded number of
//!    attempts, refreshes the on-flash cache copy on success and falls back to it when
//!    every attempt fails.
//! 1. [`render::Renderer`] sniffs the stored bytes ([`render::sniff::classify`]) and hands
//!    them to the BMP, PNG or raw bit-plane decoder.
//! 1. Decoded rows go through [`render::bitplane`] which turns every pixel into one of
//!    background / black / red and packs two 1-bit planes.
//! 1. The planes are written to a [`display::TriColorDisplay`], for example the
//!    [`gd7965::Gd7965`] panel driver, without ever holding a full frame in memory.
//!
//! Network, flash, panel and PNG inflate are all reached through small traits so the
//! whole pipeline runs on the host in tests.

pub mod config;
pub mod display;
pub mod error;
pub mod fetch;
pub mod gd7965;
pub mod render;
pub mod storage;

#[cfg(target_os = "espidf")]
pub mod esp;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::config::{ColorMode, PipelineConfig, RetryPolicy, Surface};
pub use crate::error::{FormatError, NetworkError, PipelineError};
