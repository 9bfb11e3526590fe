//! Screenshot downscaling before the image goes to the oracle.

use crate::error::{BrowserError, Result};
use image::imageops::FilterType;
use image::ImageFormat;
use std::io::Cursor;

/// Largest screenshot sent to the oracle
pub const SCREENSHOT_MAX_SIZE: (u32, u32) = (1024, 1024);

/// Shrink a PNG to fit inside `max_width x max_height`, keeping the aspect
/// ratio. Images that already fit are returned unchanged.
pub fn fit_within(png: &[u8], max_width: u32, max_height: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)
        .map_err(|e| BrowserError::ScreenshotFailed(format!("Invalid PNG: {}", e)))?;

    if img.width() <= max_width && img.height() <= max_height {
        return Ok(png.to_vec());
    }

    let resized = img.resize(max_width, max_height, FilterType::Lanczos3);
    log::debug!(
        "Screenshot downscaled from {}x{} to {}x{}",
        img.width(),
        img.height(),
        resized.width(),
        resized.height()
    );

    let mut out = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| BrowserError::ScreenshotFailed(format!("Failed to encode PNG: {}", e)))?;
    Ok(out)
}
