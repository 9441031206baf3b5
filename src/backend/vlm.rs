//! Vision-model document converter.
//!
//! PDF pages are rasterised, sent to the VLM one image per call and the
//! returned Markdown is cleaned and parsed into elements. Standalone images
//! take the same path as a single page. Text and HTML need no model.

use super::encode::{encode_png, reencode_png, to_image_data};
use super::llm::{chat_with_retry, CallPolicy};
use super::{html, markdown, pdf, postprocess};
use crate::config::PipelineConfig;
use crate::error::BoxError;
use crate::model::{DocumentFormat, Element, ElementBody, FigureImage};
use crate::pipeline::conversion::{ConversionInput, DocumentConverter};
use crate::prompts::{ocr_language_hint, PAGE_CONVERSION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum VlmError {
    #[error("no conversion backend for {format} documents")]
    NoBackend { format: DocumentFormat },

    #[error("all {total} page(s) failed; first error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("decode task panicked: {0}")]
    Join(String),
}

/// Result of sending one page to the model.
#[derive(Debug)]
struct PageOutcome {
    page: usize,
    image: FigureImage,
    markdown: Result<String, String>,
}

/// Key under which page `n` is stored in [`ElementBody::images`].
pub fn page_image_key(page: usize) -> String {
    format!("page-{}", page)
}

/// [`DocumentConverter`] backed by a vision-capable LLM.
pub struct VlmConverter {
    provider: Arc<dyn LLMProvider>,
    model: String,
    policy: CallPolicy,
    dpi: u32,
    max_pixels: u32,
    page_concurrency: usize,
    max_pages: Option<usize>,
}

impl VlmConverter {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            model: config.conversion_model.clone(),
            policy: CallPolicy::from_config(config),
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            page_concurrency: config.page_concurrency.max(1),
            max_pages: config.max_pages,
        }
    }

    fn page_messages(&self, image: &FigureImage, hint: Option<&str>) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(PAGE_CONVERSION_PROMPT)];
        if let Some(hint) = hint {
            messages.push(ChatMessage::system(hint));
        }
        messages.push(ChatMessage::user_with_images(
            "",
            vec![to_image_data(image)],
        ));
        messages
    }

    async fn convert_pdf(
        &self,
        path: &Path,
        hint: Option<&str>,
    ) -> Result<ElementBody, BoxError> {
        let start = Instant::now();
        let rendered = pdf::rasterise(path, self.dpi, self.max_pixels, self.max_pages).await?;
        let total = rendered.len();

        let encoded: Vec<(usize, FigureImage)> = rendered
            .iter()
            .filter_map(|(page, img)| match encode_png(img) {
                Ok(fig) => Some((*page, fig)),
                Err(e) => {
                    warn!("Failed to encode page {}: {}", page, e);
                    None
                }
            })
            .collect();
        drop(rendered);

        let outcomes: Vec<PageOutcome> = stream::iter(encoded.into_iter().map(|(page, image)| {
            let messages = self.page_messages(&image, hint);
            let label = format!("page {}", page);
            async move {
                let markdown = chat_with_retry(&self.provider, &messages, &self.policy, &label)
                    .await
                    .map(|reply| reply.content)
                    .map_err(|e| e.to_string());
                PageOutcome {
                    page,
                    image,
                    markdown,
                }
            }
        }))
        .buffer_unordered(self.page_concurrency)
        .collect()
        .await;

        let body = assemble_pages(outcomes, total)?;
        info!(
            "VLM converted {} page(s) into {} elements in {:?}",
            total,
            body.len(),
            start.elapsed()
        );
        Ok(body)
    }

    async fn convert_image(
        &self,
        path: &Path,
        hint: Option<&str>,
    ) -> Result<ElementBody, BoxError> {
        let bytes = tokio::fs::read(path).await.map_err(VlmError::Io)?;
        let image = tokio::task::spawn_blocking(move || reencode_png(&bytes))
            .await
            .map_err(|e| VlmError::Join(e.to_string()))?
            .map_err(VlmError::Image)?;

        let messages = self.page_messages(&image, hint);
        let markdown = chat_with_retry(&self.provider, &messages, &self.policy, "image")
            .await
            .map(|reply| reply.content)
            .map_err(|e| e.to_string());
        let outcome = PageOutcome {
            page: 1,
            image,
            markdown,
        };
        Ok(assemble_pages(vec![outcome], 1)?)
    }
}

#[async_trait]
impl DocumentConverter for VlmConverter {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn convert(&self, input: ConversionInput<'_>) -> Result<ElementBody, BoxError> {
        let hint = ocr_language_hint(input.ocr_languages);
        debug!("VLM converter: {} ({})", input.path.display(), input.format);

        match input.format {
            DocumentFormat::Pdf => self.convert_pdf(input.path, hint.as_deref()).await,
            f if f.is_image() => self.convert_image(input.path, hint.as_deref()).await,
            DocumentFormat::Txt => {
                let bytes = tokio::fs::read(input.path).await.map_err(VlmError::Io)?;
                Ok(markdown::parse(&String::from_utf8_lossy(&bytes), None))
            }
            DocumentFormat::Html => {
                let bytes = tokio::fs::read(input.path).await.map_err(VlmError::Io)?;
                Ok(html::parse(&String::from_utf8_lossy(&bytes)))
            }
            format => Err(VlmError::NoBackend { format }.into()),
        }
    }
}

/// Merge per-page results in page order.
///
/// Formula spans are shifted so they index into the concatenation of the
/// cleaned page texts. Failed pages are skipped; all pages failing is an error.
fn assemble_pages(mut outcomes: Vec<PageOutcome>, total: usize) -> Result<ElementBody, VlmError> {
    outcomes.sort_by_key(|o| o.page);

    let mut body = ElementBody::default();
    let mut offset = 0;
    let mut first_error: Option<String> = None;

    for outcome in outcomes {
        let raw = match outcome.markdown {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping page {}: {}", outcome.page, e);
                first_error.get_or_insert(e);
                continue;
            }
        };
        let text = postprocess::clean_markdown(&raw);
        let key = page_image_key(outcome.page);
        let mut page_body = markdown::parse(&text, Some(&key));
        for element in &mut page_body.elements {
            if let Element::Formula { span, .. } = element {
                *span = span.offset(offset);
            }
        }
        offset += text.len();
        page_body.images.insert(key, outcome.image);
        body.extend(page_body);
    }

    if body.images.is_empty() {
        return Err(VlmError::AllPagesFailed {
            total,
            first_error: first_error.unwrap_or_else(|| "no page could be encoded".to_string()),
        });
    }
    Ok(body)
}
