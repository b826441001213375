//! PNG encoding and decoding

use crate::Result;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};

/// Decodes PNG data into an RGBA image buffer
pub fn decode_png(data: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Png)?;
    Ok(img.to_rgba8())
}

/// Encodes an RGBA image buffer as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    PngEncoder::new(&mut data).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(data)
}
