//! Image encoding between `image`, [`FigureImage`] and the provider's `ImageData`.
//!
//! Pages and standalone images are always re-encoded as PNG: lossless
//! compression keeps small print legible for the vision model.

use crate::model::FigureImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page or decoded image as base64 PNG.
pub fn encode_png(img: &DynamicImage) -> Result<FigureImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let data = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        data.len()
    );
    Ok(FigureImage {
        mime_type: "image/png".to_string(),
        data,
    })
}

/// Decode any supported raster file and re-encode it as PNG.
pub fn reencode_png(bytes: &[u8]) -> Result<FigureImage, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    encode_png(&img)
}

/// Attach a figure to a vision request at full detail.
pub fn to_image_data(figure: &FigureImage) -> ImageData {
    ImageData::new(figure.data.clone(), figure.mime_type.as_str()).with_detail("high")
}
