//! Conversion stage: hand a resolved file to the layout/OCR collaborator.

use crate::config::OcrLanguage;
use crate::error::{BoxError, EnrichError};
use crate::model::{DocumentFormat, ElementBody};
use crate::pipeline::source::ResolvedSource;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// What a converter gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct ConversionInput<'a> {
    pub path: &'a Path,
    pub format: DocumentFormat,
    /// Languages the OCR engine should expect, in priority order.
    pub ocr_languages: &'a [OcrLanguage],
}

/// Layout analysis and OCR behind one call.
///
/// Implementations return elements in reading order. Formula spans refer to
/// whatever source text the implementation parsed.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Model or engine identifier reported by model info.
    fn model_id(&self) -> &str;

    async fn convert(&self, input: ConversionInput<'_>) -> Result<ElementBody, BoxError>;
}

/// Run `converter` over `source`, wrapping failures as `ConversionFailed`.
pub async fn convert(
    converter: &dyn DocumentConverter,
    source: &ResolvedSource,
    ocr_languages: &[OcrLanguage],
) -> Result<ElementBody, EnrichError> {
    let name = source.spec().display_name();
    debug!(
        "Converting {} as {} with {}",
        name,
        source.format(),
        converter.model_id()
    );

    let input = ConversionInput {
        path: source.path(),
        format: source.format(),
        ocr_languages,
    };
    let body = converter
        .convert(input)
        .await
        .map_err(|cause| EnrichError::ConversionFailed {
            source_name: name.clone(),
            cause,
        })?;

    info!(
        "Converted {}: {} elements, {} figure images",
        name,
        body.len(),
        body.images.len()
    );
    Ok(body)
}
