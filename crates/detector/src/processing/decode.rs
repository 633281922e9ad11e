use crate::errors::Result;
use image::{ImageError, ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;

/// Codec named by a caller-supplied format label, if it is one we decode.
pub fn format_hint(name: &str) -> Option<ImageFormat> {
    match name.trim().to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        "bmp" => Some(ImageFormat::Bmp),
        "webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Decode encoded image bytes into packed 8-bit RGB.
///
/// The codec is sniffed from the bytes. `format` is only consulted when the
/// bytes carry no recognizable signature.
pub fn decode_image(data: &[u8], format: &str) -> Result<RgbImage> {
    let _s = common::span_debug!("decode_image");

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(ImageError::from)?;

    match (reader.format(), format_hint(format)) {
        (Some(detected), Some(hinted)) if detected != hinted => {
            tracing::debug!(?detected, ?hinted, "Image format label does not match content");
        }
        (None, Some(hinted)) => reader.set_format(hinted),
        _ => {}
    }

    let image = reader.decode()?;

    tracing::trace!(
        width = image.width(),
        height = image.height(),
        encoded_bytes = data.len(),
        "Decoded image"
    );

    Ok(image.to_rgb8())
}
