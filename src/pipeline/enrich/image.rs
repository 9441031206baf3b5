//! Bilingual figure descriptions: caption in English, then translate to French.

use super::{
    call_with_timeout, AnalyzerOutput, AnalyzerReport, FigureInput, ImageCaptioner, Translator,
};
use crate::error::ElementError;
use crate::model::{DescriptionLanguage, Element, ElementBody};
use crate::output::ImageDescription;
use crate::pipeline::source::is_url;
use std::time::Duration;
use tracing::{debug, warn};

/// Describe every figure of `body`, in element order.
pub async fn describe_figures(
    body: &ElementBody,
    captioner: &dyn ImageCaptioner,
    translator: &dyn Translator,
    budget: Duration,
) -> AnalyzerReport {
    let mut descriptions = Vec::new();
    let mut gaps = Vec::new();

    for (index, element) in body.elements.iter().enumerate() {
        let Element::Figure { image_ref, caption } = element else {
            continue;
        };
        let figure = FigureInput {
            index,
            image_ref,
            caption: caption.as_deref(),
            image: body.images.get(image_ref),
        };

        match describe_one(figure, captioner, translator, budget).await {
            Ok(description) => descriptions.push(description),
            Err(gap) => {
                warn!("Image description skipped: {}", gap);
                gaps.push(gap);
            }
        }
    }

    debug!("Described {} figure(s)", descriptions.len());
    AnalyzerReport {
        output: AnalyzerOutput::ImageDescriptions(descriptions),
        gaps,
    }
}

async fn describe_one(
    figure: FigureInput<'_>,
    captioner: &dyn ImageCaptioner,
    translator: &dyn Translator,
    budget: Duration,
) -> Result<ImageDescription, ElementError> {
    if figure.image.is_none() && figure.caption.is_none() && !is_url(figure.image_ref) {
        return Err(ElementError::MissingImage {
            index: figure.index,
            image_ref: figure.image_ref.to_string(),
        });
    }

    let english = call_with_timeout(
        figure.index,
        captioner.model_id(),
        budget,
        captioner.caption(figure),
    )
    .await?;
    let english = english.trim().to_string();

    let french = call_with_timeout(
        figure.index,
        translator.model_id(),
        budget,
        translator.translate(&english, DescriptionLanguage::En, DescriptionLanguage::Fr),
    )
    .await?;

    Ok(ImageDescription {
        index: figure.index,
        description_fr: french.trim().to_string(),
        description_en: english,
    })
}
