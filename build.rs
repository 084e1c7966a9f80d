use image::GenericImageView;
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Panel resolution, keep in sync with `config::WIDTH` / `config::HEIGHT`
const WIDTH: u32 = 800;
const HEIGHT: u32 = 480;

const PALETTE: [([u8; 3], (bool, bool)); 3] = [
    // (rgb, (mono bit, accent bit))
    ([0xFF, 0xFF, 0xFF], (true, true)),
    ([0x00, 0x00, 0x00], (false, true)),
    ([0xFF, 0x00, 0x00], (true, false)),
];

/// Bits of the palette entry closest to `rgb`
fn nearest(rgb: [u8; 3]) -> (bool, bool) {
    let distance = |entry: &[u8; 3]| -> u32 {
        rgb.iter()
            .zip(entry.iter())
            .map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs().pow(2))
            .sum()
    };
    PALETTE
        .iter()
        .min_by_key(|(entry, _)| distance(entry))
        .map(|(_, bits)| *bits)
        .unwrap_or((true, true))
}

/// Convert a PNG into the raw black plane + red plane format at build time
fn convert_image_to_planes(
    input_path: &str,
    output_path: &str,
    target_width: u32,
    target_height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed={}", input_path);

    if !Path::new(input_path).exists() {
        println!("cargo:warning=Image file '{}' not found, splash left empty", input_path);
        File::create(output_path)?;
        return Ok(());
    }

    let img = image::open(input_path)?;
    let (orig_width, orig_height) = img.dimensions();
    let orig_ratio = orig_width as f32 / orig_height as f32;
    let target_ratio = target_width as f32 / target_height as f32;

    let (new_width, new_height) = if orig_ratio > target_ratio {
        (target_width, (target_width as f32 / orig_ratio) as u32)
    } else {
        ((target_height as f32 * orig_ratio) as u32, target_height)
    };

    let rgb = img
        .resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
        .to_rgb8();
    // resize keeps the aspect ratio, so use what it actually produced
    let (new_width, new_height) = rgb.dimensions();
    let offset_x = (target_width - new_width) / 2;
    let offset_y = (target_height - new_height) / 2;

    let bytes_per_row = target_width.div_ceil(8);
    let plane_len = (bytes_per_row * target_height) as usize;
    // Both planes start all white / no red
    let mut mono = vec![0xFFu8; plane_len];
    let mut accent = vec![0xFFu8; plane_len];

    for (ix, iy, pixel) in rgb.enumerate_pixels() {
        let x = ix + offset_x;
        let y = iy + offset_y;
        let (mono_bit, accent_bit) = nearest(pixel.0);
        let byte_index = (y * bytes_per_row + x / 8) as usize;
        let mask = 0x80u8 >> (x % 8);
        if !mono_bit {
            mono[byte_index] &= !mask;
        }
        if !accent_bit {
            accent[byte_index] &= !mask;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(&mono)?;
    file.write_all(&accent)?;

    println!(
        "cargo:warning=Splash {}x{} -> {}x{} at ({}, {}), {} bytes",
        orig_width,
        orig_height,
        new_width,
        new_height,
        offset_x,
        offset_y,
        plane_len * 2
    );
    Ok(())
}

fn main() {
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }

    let Ok(out_dir) = env::var("OUT_DIR") else {
        println!("cargo:warning=OUT_DIR not set");
        return;
    };
    let splash_output = format!("{}/splash.bwr", out_dir);

    if let Err(e) = convert_image_to_planes("splash.png", &splash_output, WIDTH, HEIGHT) {
        println!("cargo:warning=Failed to convert splash.png: {}", e);
        // The firmware includes the file unconditionally
        if let Err(e) = File::create(&splash_output) {
            println!("cargo:warning=Could not write {}: {}", splash_output, e);
        }
    }
}
