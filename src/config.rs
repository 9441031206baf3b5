//! Configuration types for document conversion and enrichment.
//!
//! Two layers of configuration:
//!
//! * [`PipelineConfig`]: service-level knobs fixed for the process lifetime
//!   (timeouts, retry policy, model identifiers, batch bound). Built via
//!   [`PipelineConfigBuilder`].
//! * [`RequestOptions`]: per-request choices (output dialect, feature flags,
//!   OCR languages) parsed from the request and passed explicitly into every
//!   stage. No stage reads ambient global state.

use crate::error::EnrichError;
use crate::progress::BatchProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Service-level configuration for the pipeline and its LLM-backed models.
///
/// # Example
/// ```rust
/// use docenrich::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_batch_size(5)
///     .request_timeout_secs(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_batch_size, 5);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Upper bound on documents per batch request. Default: 20.
    pub max_batch_size: usize,

    /// Wall-clock budget for one document, from resolution to aggregation.
    /// Default: 600.
    ///
    /// Enforced at the orchestration boundary: an in-flight model call is not
    /// interrupted mid-call, the document is marked `Timeout` once the
    /// deadline is observed.
    pub request_timeout_secs: u64,

    /// Download timeout for URL sources in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Budget for a single model call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Maximum retry attempts on a failed model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Sampling temperature for every model call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens generated per model call. Default: 4096.
    pub max_tokens: usize,

    /// Rasterisation DPI for PDF pages. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Longest rendered page edge in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Concurrent page calls inside the VLM converter. Default: 4.
    ///
    /// Documents in a batch are always processed one at a time; this only
    /// fans out the pages of the document currently being converted.
    pub page_concurrency: usize,

    /// Convert at most this many pages per PDF. Default: no cap.
    pub max_pages: Option<usize>,

    /// Model used by the VLM converter. Default: "gpt-4.1-nano".
    pub conversion_model: String,

    /// Model used for figure captions. Default: "gpt-4.1-nano".
    pub caption_model: String,

    /// Model used for caption translation. Default: "gpt-4.1-nano".
    pub translation_model: String,

    /// Model used for formula descriptions when an LLM describer is enabled.
    pub formula_model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Receives per-document batch events.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 20,
            request_timeout_secs: 600,
            download_timeout_secs: 120,
            api_timeout_secs: 120,
            max_retries: 3,
            retry_backoff_ms: 500,
            temperature: 0.1,
            max_tokens: 4096,
            dpi: 150,
            max_rendered_pixels: 2000,
            page_concurrency: 4,
            max_pages: None,
            conversion_model: "gpt-4.1-nano".to_string(),
            caption_model: "gpt-4.1-nano".to_string(),
            translation_model: "gpt-4.1-nano".to_string(),
            formula_model: None,
            provider_name: None,
            provider: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("max_batch_size", &self.max_batch_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("dpi", &self.dpi)
            .field("page_concurrency", &self.page_concurrency)
            .field("max_pages", &self.max_pages)
            .field("conversion_model", &self.conversion_model)
            .field("caption_model", &self.caption_model)
            .field("translation_model", &self.translation_model)
            .field("formula_model", &self.formula_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.config.max_batch_size = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn page_concurrency(mut self, n: usize) -> Self {
        self.config.page_concurrency = n.max(1);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = Some(n);
        self
    }

    pub fn conversion_model(mut self, model: impl Into<String>) -> Self {
        self.config.conversion_model = model.into();
        self
    }

    pub fn caption_model(mut self, model: impl Into<String>) -> Self {
        self.config.caption_model = model.into();
        self
    }

    pub fn translation_model(mut self, model: impl Into<String>) -> Self {
        self.config.translation_model = model.into();
        self
    }

    pub fn formula_model(mut self, model: impl Into<String>) -> Self {
        self.config.formula_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, EnrichError> {
        let c = &self.config;
        if c.max_batch_size == 0 {
            return Err(EnrichError::InvalidConfig(
                "max_batch_size must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(EnrichError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_pages == Some(0) {
            return Err(EnrichError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Per-request options ──────────────────────────────────────────────────

/// Serialisation dialect for the rendered content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            other => Err(EnrichError::invalid_input(format!(
                "unsupported output_format '{other}' (expected markdown or html)"
            ))),
        }
    }
}

/// Which enrichment stages run for a request.
///
/// Every flag defaults to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Render figures as image references rather than caption-only text.
    pub include_images: bool,
    /// Run the table analyzer.
    pub include_tables: bool,
    /// Run the bilingual image descriptor.
    pub include_image_descriptions: bool,
    /// Run the formula enricher.
    pub include_formula_enrichment: bool,
    /// Compute content statistics, language and readability.
    pub enhance_content: bool,
}

impl FeatureFlags {
    /// Every enrichment enabled.
    pub fn all() -> Self {
        Self {
            include_images: true,
            include_tables: true,
            include_image_descriptions: true,
            include_formula_enrichment: true,
            enhance_content: true,
        }
    }
}

/// OCR languages the conversion stage can be asked to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrLanguage {
    Fra,
    Eng,
    Deu,
    Spa,
    Ita,
    Por,
    Nld,
    Rus,
    Chi,
    Jpn,
    Kor,
}

impl OcrLanguage {
    pub const ALL: [OcrLanguage; 11] = [
        OcrLanguage::Fra,
        OcrLanguage::Eng,
        OcrLanguage::Deu,
        OcrLanguage::Spa,
        OcrLanguage::Ita,
        OcrLanguage::Por,
        OcrLanguage::Nld,
        OcrLanguage::Rus,
        OcrLanguage::Chi,
        OcrLanguage::Jpn,
        OcrLanguage::Kor,
    ];

    /// Three-letter code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            OcrLanguage::Fra => "fra",
            OcrLanguage::Eng => "eng",
            OcrLanguage::Deu => "deu",
            OcrLanguage::Spa => "spa",
            OcrLanguage::Ita => "ita",
            OcrLanguage::Por => "por",
            OcrLanguage::Nld => "nld",
            OcrLanguage::Rus => "rus",
            OcrLanguage::Chi => "chi",
            OcrLanguage::Jpn => "jpn",
            OcrLanguage::Kor => "kor",
        }
    }

    /// ISO 639-1 two-letter code.
    pub fn short_code(&self) -> &'static str {
        match self {
            OcrLanguage::Fra => "fr",
            OcrLanguage::Eng => "en",
            OcrLanguage::Deu => "de",
            OcrLanguage::Spa => "es",
            OcrLanguage::Ita => "it",
            OcrLanguage::Por => "pt",
            OcrLanguage::Nld => "nl",
            OcrLanguage::Rus => "ru",
            OcrLanguage::Chi => "zh",
            OcrLanguage::Jpn => "ja",
            OcrLanguage::Kor => "ko",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OcrLanguage::Fra => "French",
            OcrLanguage::Eng => "English",
            OcrLanguage::Deu => "German",
            OcrLanguage::Spa => "Spanish",
            OcrLanguage::Ita => "Italian",
            OcrLanguage::Por => "Portuguese",
            OcrLanguage::Nld => "Dutch",
            OcrLanguage::Rus => "Russian",
            OcrLanguage::Chi => "Chinese",
            OcrLanguage::Jpn => "Japanese",
            OcrLanguage::Kor => "Korean",
        }
    }

    /// Default OCR languages: French then English.
    pub fn defaults() -> Vec<OcrLanguage> {
        vec![OcrLanguage::Fra, OcrLanguage::Eng]
    }
}

impl FromStr for OcrLanguage {
    type Err = EnrichError;

    /// Accepts the three-letter code or its two-letter alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        OcrLanguage::ALL
            .into_iter()
            .find(|l| l.code() == needle || l.short_code() == needle)
            .ok_or_else(|| {
                EnrichError::invalid_input(format!("unsupported OCR language '{}'", s.trim()))
            })
    }
}

/// Options shared by every document of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub output_format: OutputFormat,
    pub flags: FeatureFlags,
    pub ocr_languages: Vec<OcrLanguage>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            flags: FeatureFlags::default(),
            ocr_languages: OcrLanguage::defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.max_batch_size, 20);
        assert_eq!(c.max_retries, 3);
        assert!(c.provider.is_none());
    }

    #[test]
    fn builder_rejects_zero_batch() {
        let err = PipelineConfig::builder().max_batch_size(0).build().unwrap_err();
        assert!(err.to_string().contains("max_batch_size"));
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = PipelineConfig::builder().dpi(1000).build().unwrap();
        assert_eq!(c.dpi, 400);
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!("HTML".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        let err = "pdf".parse::<OutputFormat>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn ocr_language_aliases() {
        assert_eq!("fr".parse::<OcrLanguage>().unwrap(), OcrLanguage::Fra);
        assert_eq!("KOR".parse::<OcrLanguage>().unwrap(), OcrLanguage::Kor);
        assert!("xx".parse::<OcrLanguage>().is_err());
        assert_eq!(OcrLanguage::ALL.len(), 11);
    }

    #[test]
    fn flags_default_off() {
        let f = FeatureFlags::default();
        assert!(!f.include_images && !f.include_tables && !f.enhance_content);
        assert!(FeatureFlags::all().include_formula_enrichment);
    }
}
