use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::info;

use inkframe::display::TriColorFrame;
use inkframe::render::{Origin, Renderer};
use inkframe::storage::DirStorage;
use inkframe::{ColorMode, Surface};

/// Render a stored frame asset (BMP, PNG or raw planes) the way the panel shows it
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    asset: PathBuf,
    out_file: PathBuf,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    x: i32,
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    y: i32,
    /// Luminance threshold only, no red
    #[arg(long)]
    mono: bool,
    #[arg(long, default_value_t = inkframe::config::WIDTH)]
    width: u16,
    #[arg(long, default_value_t = inkframe::config::HEIGHT)]
    height: u16,
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let surface = Surface::new(args.width, args.height);
    let mode = if args.mono {
        ColorMode::Mono
    } else {
        ColorMode::TriColor
    };

    let name = args
        .asset
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Not a file: {}", args.asset.display()))?;
    let dir = match args.asset.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let storage = DirStorage::new(dir);

    let mut frame = TriColorFrame::new(surface);
    let rendered = Renderer::new(surface, mode)
        .render_asset(&storage, name, Origin::new(args.x, args.y), &mut frame)
        .with_context(|| format!("Rendering {}", args.asset.display()))?;
    info!("{:?} asset, {} rows drawn", rendered.format, rendered.rows);

    image::RgbImage::from_raw(surface.width as u32, surface.height as u32, frame.to_rgb())
        .context("Frame size mismatch")?
        .save(&args.out_file)
        .with_context(|| format!("Writing {}", args.out_file.display()))?;
    info!("Preview written to {}", args.out_file.display());
    Ok(())
}
