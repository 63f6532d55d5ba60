//! Image recompression for the optimization pass.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::config::OptimizeSettings;
use crate::error::{LabError, LabResult};
use crate::storage::value::{StoredValue, OPTIMIZED_DATA_URL_PREFIX, OPTIMIZED_MIME};

/// Extracts the encoded image bytes from a stored value.
pub fn image_bytes(value: &StoredValue) -> LabResult<Vec<u8>> {
    match value {
        StoredValue::Blob { bytes, .. } => Ok(bytes.clone()),
        StoredValue::Text(s) => {
            let payload = match s.split_once(";base64,") {
                Some((_, data)) => data,
                None => s.as_str(),
            };
            Ok(STANDARD.decode(payload.trim())?)
        }
        StoredValue::Json(_) => Err(LabError::parse("structured value is not an image")),
    }
}

/// Re-encodes an image value into the optimized encoding.
///
/// The result keeps the representation of the input: data URLs stay data
/// URLs and blobs stay blobs. Returns `None` when the re-encoded value would
/// not be smaller than the input.
pub fn recompress(value: &StoredValue, settings: &OptimizeSettings) -> LabResult<Option<StoredValue>> {
    let decoded = image::load_from_memory(&image_bytes(value)?)?;
    let encoded = encode_jpeg(&downscale(decoded, settings.max_dimension), settings.jpeg_quality)?;

    let candidate = match value {
        StoredValue::Text(_) => StoredValue::Text(format!(
            "{};base64,{}",
            OPTIMIZED_DATA_URL_PREFIX,
            STANDARD.encode(&encoded)
        )),
        _ => StoredValue::blob(encoded, OPTIMIZED_MIME),
    };

    if candidate.size() >= value.size() {
        return Ok(None);
    }
    Ok(Some(candidate))
}

fn downscale(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if max_dimension == 0 || (img.width() <= max_dimension && img.height() <= max_dimension) {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> LabResult<Vec<u8>> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(out)
}
