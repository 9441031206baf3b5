//! Enrichment stage set: optional analyzers over a converted body.
//!
//! Each analyzer reads the same immutable [`ElementBody`] and returns an
//! [`AnalyzerReport`]: one [`AnalyzerOutput`] variant plus the elements it had
//! to skip. Per-element failures never abort the document; they become
//! [`crate::output::EnrichmentGap`]s on the result.
//!
//! Model-backed analyzers talk to their collaborators through the
//! [`ImageCaptioner`], [`Translator`] and [`FormulaDescriber`] traits so tests
//! (and deployments without a GPU) can inject their own.

pub mod content;
pub mod formula;
pub mod image;
pub mod table;

use crate::config::FeatureFlags;
use crate::error::{BoxError, ElementError};
use crate::model::{DescriptionLanguage, ElementBody, FigureImage};
use crate::output::{
    ContentEnhancement, FeatureTag, FormulaEnrichment, FormulaType, ImageDescription,
    TableAnalysis,
};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use formula::TemplateFormulaDescriber;

// ── Collaborator seams ───────────────────────────────────────────────────

/// What a captioner sees of one figure element.
#[derive(Debug, Clone, Copy)]
pub struct FigureInput<'a> {
    pub index: usize,
    pub image_ref: &'a str,
    pub caption: Option<&'a str>,
    pub image: Option<&'a FigureImage>,
}

/// Produces a one-sentence English caption for a figure.
#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    fn model_id(&self) -> &str;

    async fn caption(&self, figure: FigureInput<'_>) -> Result<String, BoxError>;
}

/// Translates short texts between description languages.
#[async_trait]
pub trait Translator: Send + Sync {
    fn model_id(&self) -> &str;

    async fn translate(
        &self,
        text: &str,
        from: DescriptionLanguage,
        to: DescriptionLanguage,
    ) -> Result<String, BoxError>;
}

/// Describes a classified formula in one language.
#[async_trait]
pub trait FormulaDescriber: Send + Sync {
    fn model_id(&self) -> &str;

    async fn describe(
        &self,
        latex: &str,
        formula_type: FormulaType,
        language: DescriptionLanguage,
    ) -> Result<String, BoxError>;
}

// ── Analyzer results ─────────────────────────────────────────────────────

/// The payload of one analyzer, one variant per feature.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerOutput {
    ImageDescriptions(Vec<ImageDescription>),
    FormulaEnrichments(Vec<FormulaEnrichment>),
    TableAnalysis(Vec<TableAnalysis>),
    ContentEnhancement(ContentEnhancement),
}

impl AnalyzerOutput {
    pub fn feature(&self) -> FeatureTag {
        match self {
            AnalyzerOutput::ImageDescriptions(_) => FeatureTag::ImageDescriptions,
            AnalyzerOutput::FormulaEnrichments(_) => FeatureTag::FormulaEnrichment,
            AnalyzerOutput::TableAnalysis(_) => FeatureTag::TableAnalysis,
            AnalyzerOutput::ContentEnhancement(_) => FeatureTag::ContentEnhancement,
        }
    }
}

/// An analyzer's output together with the elements it skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerReport {
    pub output: AnalyzerOutput,
    pub gaps: Vec<ElementError>,
}

/// Everything the enabled analyzers produced for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentOutcome {
    pub reports: Vec<AnalyzerReport>,
}

impl EnrichmentOutcome {
    pub fn features(&self) -> Vec<FeatureTag> {
        self.reports.iter().map(|r| r.output.feature()).collect()
    }
}

// ── Stage set ────────────────────────────────────────────────────────────

/// The configured analyzers and their collaborators.
#[derive(Clone)]
pub struct EnrichmentSet {
    captioner: Option<Arc<dyn ImageCaptioner>>,
    translator: Option<Arc<dyn Translator>>,
    formula_describer: Arc<dyn FormulaDescriber>,
    call_timeout: Duration,
}

impl EnrichmentSet {
    pub fn new(
        captioner: Option<Arc<dyn ImageCaptioner>>,
        translator: Option<Arc<dyn Translator>>,
        formula_describer: Arc<dyn FormulaDescriber>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            captioner,
            translator,
            formula_describer,
            call_timeout,
        }
    }

    /// True when both collaborators needed for image descriptions exist.
    pub fn can_describe_images(&self) -> bool {
        self.captioner.is_some() && self.translator.is_some()
    }

    /// Run every analyzer enabled by `flags`, sequentially.
    ///
    /// `plain_text` is the markup-free rendering of `body`, used by the
    /// content enhancer.
    pub async fn run(
        &self,
        body: &ElementBody,
        plain_text: &str,
        flags: &FeatureFlags,
    ) -> EnrichmentOutcome {
        let mut outcome = EnrichmentOutcome::default();

        if flags.include_image_descriptions {
            match (&self.captioner, &self.translator) {
                (Some(captioner), Some(translator)) => {
                    let report = image::describe_figures(
                        body,
                        captioner.as_ref(),
                        translator.as_ref(),
                        self.call_timeout,
                    )
                    .await;
                    outcome.reports.push(report);
                }
                _ => warn!("Image descriptions requested but no captioner/translator configured"),
            }
        }

        if flags.include_formula_enrichment {
            let report =
                formula::enrich_formulas(body, self.formula_describer.as_ref(), self.call_timeout)
                    .await;
            outcome.reports.push(report);
        }

        if flags.include_tables {
            outcome.reports.push(table::analyze_tables(body));
        }

        if flags.enhance_content {
            outcome.reports.push(content::enhance(body, plain_text));
        }

        for report in &outcome.reports {
            debug!(
                "{}: {} gap(s)",
                report.output.feature(),
                report.gaps.len()
            );
        }
        outcome
    }
}

/// Await one collaborator call under the per-call budget.
pub(crate) async fn call_with_timeout<T, F>(
    index: usize,
    collaborator: &str,
    budget: Duration,
    call: F,
) -> Result<T, ElementError>
where
    F: Future<Output = Result<T, BoxError>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ElementError::CollaboratorFailed {
            index,
            collaborator: collaborator.to_string(),
            detail: e.to_string(),
        }),
        Err(_) => Err(ElementError::Timeout {
            index,
            collaborator: collaborator.to_string(),
            secs: budget.as_secs(),
        }),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::model::{Element, Span, TableGrid};

    fn body() -> ElementBody {
        ElementBody::new(vec![
            Element::paragraph("Text before."),
            Element::figure("img-1", Some("A bar chart".into())),
            Element::formula("$1 + 1$", Span::new(0, 7)),
            Element::Table(TableGrid::new(vec![
                vec!["a".into(), "b".into()],
                vec!["1".into(), "2".into()],
            ])),
        ])
    }

    fn set(captioner: Option<Arc<dyn ImageCaptioner>>) -> EnrichmentSet {
        EnrichmentSet::new(
            captioner,
            Some(Arc::new(TaggingTranslator)),
            Arc::new(TemplateFormulaDescriber),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn no_flags_runs_nothing() {
        let outcome = set(None)
            .run(&body(), "Text before.", &FeatureFlags::default())
            .await;
        assert!(outcome.reports.is_empty());
    }

    #[tokio::test]
    async fn every_flag_yields_one_report_per_feature() {
        let outcome = set(Some(Arc::new(FixedCaptioner("A chart"))))
            .run(&body(), "Text before.", &FeatureFlags::all())
            .await;
        assert_eq!(
            outcome.features(),
            vec![
                FeatureTag::ImageDescriptions,
                FeatureTag::FormulaEnrichment,
                FeatureTag::TableAnalysis,
                FeatureTag::ContentEnhancement,
            ]
        );
    }

    #[tokio::test]
    async fn image_descriptions_skipped_without_captioner() {
        let flags = FeatureFlags {
            include_image_descriptions: true,
            ..Default::default()
        };
        let outcome = set(None).run(&body(), "", &flags).await;
        assert!(outcome.reports.is_empty());
    }

    #[tokio::test]
    async fn slow_call_becomes_timeout_gap() {
        let err = call_with_timeout::<(), _>(4, "slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ElementError::Timeout { index: 4, .. }));
    }
}
