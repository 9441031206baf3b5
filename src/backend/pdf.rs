//! PDF rasterisation with pdfium.
//!
//! pdfium keeps thread-local state and is CPU bound, so every call runs on
//! the blocking pool via `spawn_blocking`. Pages are scaled by `dpi / 72`
//! and capped at `max_pixels` on the longest edge.

use crate::error::BoxError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("PDF cannot be opened: {0}")]
    Open(String),

    #[error("page {page} could not be rendered: {detail}")]
    Page { page: usize, detail: String },

    #[error("PDF has no pages")]
    Empty,

    #[error("render task panicked: {0}")]
    Join(String),
}

/// Rasterise up to `max_pages` pages of the PDF at `path`.
///
/// Returns `(page_number_1based, image)` pairs in page order.
pub async fn rasterise(
    path: &Path,
    dpi: u32,
    max_pixels: u32,
    max_pages: Option<usize>,
) -> Result<Vec<(usize, DynamicImage)>, BoxError> {
    let path: PathBuf = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || {
        rasterise_blocking(&path, dpi, max_pixels, max_pages)
    })
    .await
    .map_err(|e| RasterError::Join(e.to_string()))??;
    Ok(pages)
}

fn rasterise_blocking(
    path: &Path,
    dpi: u32,
    max_pixels: u32,
    max_pages: Option<usize>,
) -> Result<Vec<(usize, DynamicImage)>, RasterError> {
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| RasterError::Open(format!("{:?}", e)))?;

    let pages = document.pages();
    let total = pages.len() as usize;
    if total == 0 {
        return Err(RasterError::Empty);
    }
    let count = max_pages.map_or(total, |m| m.min(total));
    info!("PDF loaded: {} pages, rendering {}", total, count);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut out = Vec::with_capacity(count);
    for idx in 0..count {
        let page = pages.get(idx as u16).map_err(|e| RasterError::Page {
            page: idx + 1,
            detail: format!("{:?}", e),
        })?;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| RasterError::Page {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        out.push((idx + 1, image));
    }
    Ok(out)
}
