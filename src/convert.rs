//! The document pipeline and batch orchestrator.
//!
//! [`Pipeline::process_document`] runs one source through
//! resolve → convert → render → enrich → aggregate under the per-document
//! deadline. [`Pipeline::process_batch`] does that for every entry of a batch,
//! one document at a time, turning item-fatal errors into [`ErrorRecord`]s at
//! the item's position.
//!
//! [`ErrorRecord`]: crate::output::ErrorRecord

use crate::backend::llm::CallPolicy;
use crate::backend::provider::resolve_provider;
use crate::backend::{LlmCaptioner, LlmFormulaDescriber, LlmTranslator, VlmConverter};
use crate::config::{OcrLanguage, OutputFormat, PipelineConfig, RequestOptions};
use crate::error::EnrichError;
use crate::model::{DescriptionLanguage, DocumentFormat, SourceSpec};
use crate::output::{
    BatchItem, BatchResult, ConversionResult, FeatureTag, ModelInfo, ModelInfoResponse,
    SupportedFormats, SupportedLanguages,
};
use crate::pipeline::aggregate::{aggregate, AggregateInput};
use crate::pipeline::conversion::{self, DocumentConverter};
use crate::pipeline::enrich::{
    EnrichmentSet, FormulaDescriber, ImageCaptioner, TemplateFormulaDescriber, Translator,
};
use crate::pipeline::render::{self, RenderOptions};
use crate::pipeline::source;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The model-backed capabilities a pipeline runs with.
#[derive(Clone)]
pub struct Collaborators {
    pub converter: Arc<dyn DocumentConverter>,
    pub captioner: Option<Arc<dyn ImageCaptioner>>,
    pub translator: Option<Arc<dyn Translator>>,
    pub formula_describer: Arc<dyn FormulaDescriber>,
}

impl Collaborators {
    /// A converter with no captioner or translator and template formula
    /// descriptions.
    pub fn new(converter: Arc<dyn DocumentConverter>) -> Self {
        Self {
            converter,
            captioner: None,
            translator: None,
            formula_describer: Arc::new(TemplateFormulaDescriber),
        }
    }

    pub fn with_captioner(mut self, captioner: Arc<dyn ImageCaptioner>) -> Self {
        self.captioner = Some(captioner);
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_formula_describer(mut self, describer: Arc<dyn FormulaDescriber>) -> Self {
        self.formula_describer = describer;
        self
    }

    /// LLM-backed collaborators for every model named in `config`.
    ///
    /// The converter's provider must resolve. A captioner or translator whose
    /// provider cannot be resolved is left out, which disables image
    /// descriptions.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, EnrichError> {
        let policy = CallPolicy::from_config(config);
        let provider = resolve_provider(config, &config.conversion_model)?;
        let mut collaborators = Self::new(Arc::new(VlmConverter::new(provider, config)));

        match resolve_provider(config, &config.caption_model) {
            Ok(p) => {
                collaborators = collaborators.with_captioner(Arc::new(LlmCaptioner::new(
                    p,
                    config.caption_model.clone(),
                    policy,
                )))
            }
            Err(e) => warn!("No captioner available: {}", e),
        }
        match resolve_provider(config, &config.translation_model) {
            Ok(p) => {
                collaborators = collaborators.with_translator(Arc::new(LlmTranslator::new(
                    p,
                    config.translation_model.clone(),
                    policy,
                )))
            }
            Err(e) => warn!("No translator available: {}", e),
        }
        if let Some(ref model) = config.formula_model {
            let p = resolve_provider(config, model)?;
            collaborators = collaborators.with_formula_describer(Arc::new(
                LlmFormulaDescriber::new(p, model.clone(), policy),
            ));
        }
        Ok(collaborators)
    }
}

/// A configured pipeline. Cheap to share behind an `Arc`.
pub struct Pipeline {
    config: PipelineConfig,
    collaborators: Collaborators,
    enrichment: EnrichmentSet,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let enrichment = EnrichmentSet::new(
            collaborators.captioner.clone(),
            collaborators.translator.clone(),
            Arc::clone(&collaborators.formula_describer),
            Duration::from_secs(config.api_timeout_secs),
        );
        Self {
            config,
            collaborators,
            enrichment,
        }
    }

    /// Build the LLM-backed collaborators from `config` and wrap them.
    pub fn from_config(config: PipelineConfig) -> Result<Self, EnrichError> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, collaborators))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Static identifiers and capabilities. Touches no source and no model.
    pub fn model_info(&self) -> ModelInfoResponse {
        let c = &self.collaborators;
        let features: Vec<(FeatureTag, bool)> = vec![
            (FeatureTag::ImageDescriptions, self.enrichment.can_describe_images()),
            (FeatureTag::FormulaEnrichment, true),
            (FeatureTag::TableAnalysis, true),
            (FeatureTag::ContentEnhancement, true),
            (FeatureTag::StructureAnalysis, true),
        ];

        ModelInfoResponse {
            success: true,
            model_info: ModelInfo {
                conversion_model: c.converter.model_id().to_string(),
                caption_model: c.captioner.as_ref().map(|m| m.model_id().to_string()),
                translation_model: c.translator.as_ref().map(|m| m.model_id().to_string()),
                formula_model: c.formula_describer.model_id().to_string(),
                supported_ocr_languages: OcrLanguage::ALL
                    .iter()
                    .map(|l| (l.code().to_string(), l.name().to_string()))
                    .collect(),
                features: features
                    .iter()
                    .map(|(f, on)| (f.as_str().to_string(), *on))
                    .collect(),
            },
            available_features: features
                .iter()
                .filter(|(_, on)| *on)
                .map(|(f, _)| f.as_str().to_string())
                .collect(),
            supported_formats: SupportedFormats {
                input: DocumentFormat::ALL.to_vec(),
                output: vec![OutputFormat::Markdown, OutputFormat::Html],
            },
            supported_languages: SupportedLanguages {
                ocr: OcrLanguage::ALL.to_vec(),
                descriptions: vec![DescriptionLanguage::Fr, DescriptionLanguage::En],
            },
        }
    }

    /// Process one document under the request deadline.
    pub async fn process_document(
        &self,
        spec: &SourceSpec,
        options: &RequestOptions,
    ) -> Result<ConversionResult, EnrichError> {
        let secs = self.config.request_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), self.run_document(spec, options))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("{} exceeded the {}s deadline", spec.display_name(), secs);
                Err(EnrichError::Timeout { secs })
            }
        }
    }

    async fn run_document(
        &self,
        spec: &SourceSpec,
        options: &RequestOptions,
    ) -> Result<ConversionResult, EnrichError> {
        let start = Instant::now();
        info!("Processing {}", spec.display_name());

        // The temporary copy lives until `resolved` drops at the end of this
        // function, on every path.
        let resolved = source::resolve(spec, self.config.download_timeout_secs).await?;
        let body = conversion::convert(
            self.collaborators.converter.as_ref(),
            &resolved,
            &options.ocr_languages,
        )
        .await?;

        let render_options = RenderOptions {
            include_images: options.flags.include_images,
        };
        let content = render::render(&body, options.output_format, render_options);
        let plain_text = render::render_plain(&body);

        let outcome = self.enrichment.run(&body, &plain_text, &options.flags).await;

        let result = aggregate(AggregateInput {
            spec,
            format: resolved.format(),
            options,
            body: &body,
            content,
            outcome,
            elapsed: start.elapsed(),
        });
        info!(
            "Processed {} in {:.2}s ({} elements, features: {:?})",
            spec.display_name(),
            result.metadata.processing_time,
            result.metadata.element_count,
            result.enhanced_features
        );
        Ok(result)
    }

    /// Process every entry in order, one at a time.
    ///
    /// Entries that already failed validation are reported at their position
    /// without being processed.
    pub async fn process_batch(
        &self,
        entries: Vec<Result<SourceSpec, EnrichError>>,
        options: &RequestOptions,
    ) -> BatchResult {
        let start = Instant::now();
        let total = entries.len();
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_batch_start(total);
        }

        let mut items = Vec::with_capacity(total);
        for (index, entry) in entries.into_iter().enumerate() {
            let item = self.process_entry(index, total, entry, options).await;
            items.push(item);
        }

        let result = BatchResult::from_items(items, start.elapsed().as_secs_f64());
        info!(
            "Batch complete: {}/{} succeeded in {:.2}s",
            result.successful_conversions, total, result.processing_time
        );
        if let Some(cb) = cb {
            cb.on_batch_complete(total, result.successful_conversions);
        }
        result
    }

    /// One batch position, with progress events.
    pub(crate) async fn process_entry(
        &self,
        index: usize,
        total: usize,
        entry: Result<SourceSpec, EnrichError>,
        options: &RequestOptions,
    ) -> BatchItem {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_document_start(index, total);
        }

        let outcome = match entry {
            Ok(spec) => self.process_document(&spec, options).await,
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(result) => {
                if let Some(cb) = cb {
                    cb.on_document_complete(index, total, result.content.len());
                }
            }
            Err(e) => {
                warn!("Document {} failed: {}", index, e);
                if let Some(cb) = cb {
                    cb.on_document_error(index, total, &e.to_string());
                }
            }
        }
        debug!("Document {}/{} finished", index + 1, total);
        BatchItem::from_outcome(index, outcome)
    }
}
