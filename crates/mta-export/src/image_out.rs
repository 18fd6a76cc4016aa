use std::path::Path;

use image::{ImageFormat, RgbaImage};
use mta_core::error::{ConvertError, Result};
use mta_core::frame::{ConvertedFrame, PixelBuffer};

use crate::rasterizer::{RasterStyle, Rasterizer};

/// Rasterize `frame` and save it; the format follows the path extension.
///
/// # Errors
/// `Encode` for an unsupported extension or a failed encode, `Io` for a
/// failed write.
pub fn write_image(
    path: &Path,
    frame: &ConvertedFrame,
    rasterizer: &Rasterizer,
    style: RasterStyle,
) -> Result<()> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        ConvertError::encode(format!("unsupported image format for {}: {e}", path.display()))
    })?;
    let pixels = rasterizer.render(frame, style)?;
    save_pixels(path, pixels, format)?;
    log::info!(
        "Image écrite: {}x{} cellules → {}",
        frame.chars.width(),
        frame.chars.height(),
        path.display()
    );
    Ok(())
}

fn save_pixels(path: &Path, pixels: PixelBuffer, format: ImageFormat) -> Result<()> {
    let (w, h) = (pixels.width(), pixels.height());
    let img = RgbaImage::from_raw(w, h, pixels.into_raw())
        .ok_or_else(|| ConvertError::encode("raster buffer size mismatch"))?;
    // JPEG n'a pas de canal alpha.
    let result = if format == ImageFormat::Jpeg {
        image::DynamicImage::ImageRgba8(img).to_rgb8().save_with_format(path, format)
    } else {
        img.save_with_format(path, format)
    };
    result.map_err(|e| match e {
        image::ImageError::IoError(io) => ConvertError::io(path, io),
        other => ConvertError::encode(format!("{}: {other}", path.display())),
    })
}
