//! Result records returned by the pipeline.
//!
//! Optional sections are `Option`s that serialise as *absent* rather than
//! `null`: a feature that was not requested (or could not be produced) leaves
//! no key in the JSON at all.

use crate::config::{OcrLanguage, OutputFormat};
use crate::error::{EnrichError, ErrorKind};
use crate::model::{DescriptionLanguage, DocumentFormat, SourceKind, Span};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Optional pipeline features recorded in `enhanced_features`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTag {
    ImageDescriptions,
    FormulaEnrichment,
    TableAnalysis,
    ContentEnhancement,
    StructureAnalysis,
}

impl FeatureTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureTag::ImageDescriptions => "image_descriptions",
            FeatureTag::FormulaEnrichment => "formula_enrichment",
            FeatureTag::TableAnalysis => "table_analysis",
            FeatureTag::ContentEnhancement => "content_enhancement",
            FeatureTag::StructureAnalysis => "structure_analysis",
        }
    }
}

impl fmt::Display for FeatureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Enrichment payloads ──────────────────────────────────────────────────

/// Bilingual description of one figure element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescription {
    /// Index of the figure in the element body.
    pub index: usize,
    pub description_fr: String,
    pub description_en: String,
}

/// Closed classification of formula shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaType {
    Arithmetic,
    Equation,
    Exponential,
    Other,
}

impl FormulaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaType::Arithmetic => "arithmetic",
            FormulaType::Equation => "equation",
            FormulaType::Exponential => "exponential",
            FormulaType::Other => "other",
        }
    }
}

/// Classification, descriptions and canonical form of one formula element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaEnrichment {
    /// Index of the formula in the element body.
    pub index: usize,
    pub original: String,
    pub formula_type: FormulaType,
    pub description_fr: String,
    pub description_en: String,
    pub canonical_latex: String,
    /// Span of the formula in the converter's source text.
    pub position: Span,
}

/// Coarse table classification by numeric-cell density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    DataTable,
    LayoutTable,
}

/// Structural metadata for one table element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAnalysis {
    /// Index of the table in the element body.
    pub index: usize,
    #[serde(rename = "type")]
    pub table_type: TableType,
    pub description_fr: String,
    pub description_en: String,
    /// Grid rows, header row included.
    pub rows: usize,
    pub cols: usize,
    pub has_headers: bool,
    /// Share of non-header cells that parse as numbers, 0–1.
    pub numeric_ratio: f64,
    /// Dimensions in French.
    pub summary: String,
    pub summary_en: String,
}

/// Counts over the plain-text rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStatistics {
    pub word_count: usize,
    pub character_count: usize,
    pub line_count: usize,
    pub paragraph_count: usize,
}

/// Coarse document label derived from the element kinds present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Document,
    DocumentWithTables,
    DocumentWithImages,
    DocumentWithFormulas,
}

/// Document-level content analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEnhancement {
    pub statistics: ContentStatistics,
    pub content_type: ContentType,
    /// ISO 639-1 code, or `"unknown"`.
    pub language_detected: String,
    /// Flesch reading ease clamped to 0–100.
    pub readability_score: f64,
}

// ── Structure ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingEntry {
    pub index: usize,
    pub text: String,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub index: usize,
    pub text: String,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureEntry {
    pub index: usize,
    pub image_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub index: usize,
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaEntry {
    pub index: usize,
    pub text: String,
}

/// Positions of the structural elements, each list in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub headings: Vec<HeadingEntry>,
    pub lists: Vec<ListEntry>,
    pub figures: Vec<FigureEntry>,
    pub tables: Vec<TableEntry>,
    pub formulas: Vec<FormulaEntry>,
}

// ── Per-document result ──────────────────────────────────────────────────

/// An element skipped by one analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentGap {
    pub feature: FeatureTag,
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Source path or URL; inline sources report the declared filename.
    pub file_path: String,
    /// Wall-clock seconds for the whole document.
    pub processing_time: f64,
    pub features_used: Vec<FeatureTag>,
    pub format: DocumentFormat,
    pub element_count: usize,
    pub ocr_languages: Vec<OcrLanguage>,
}

/// Everything produced for one successfully processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub content: String,
    pub output_format: OutputFormat,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub enhanced_features: Vec<FeatureTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_descriptions: Option<Vec<ImageDescription>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_enrichments: Option<Vec<FormulaEnrichment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_analysis: Option<Vec<TableAnalysis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_enhancement: Option<ContentEnhancement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enrichment_gaps: Vec<EnrichmentGap>,
    pub document_structure: DocumentStructure,
    pub metadata: ProcessingMetadata,
}

// ── Batch ────────────────────────────────────────────────────────────────

/// An item-fatal failure at one batch position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    pub fn from_error(index: usize, err: &EnrichError) -> Self {
        Self {
            index,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// One position of a batch response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Ok {
        index: usize,
        success: bool,
        result: Box<ConversionResult>,
    },
    Err {
        index: usize,
        success: bool,
        error: ErrorRecord,
    },
}

impl BatchItem {
    pub fn from_outcome(index: usize, outcome: Result<ConversionResult, EnrichError>) -> Self {
        match outcome {
            Ok(result) => BatchItem::Ok {
                index,
                success: true,
                result: Box::new(result),
            },
            Err(e) => BatchItem::Err {
                index,
                success: false,
                error: ErrorRecord::from_error(index, &e),
            },
        }
    }

    pub fn index(&self) -> usize {
        match self {
            BatchItem::Ok { index, .. } | BatchItem::Err { index, .. } => *index,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, BatchItem::Ok { .. })
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        match self {
            BatchItem::Ok { result, .. } => Some(result),
            BatchItem::Err { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            BatchItem::Ok { .. } => None,
            BatchItem::Err { error, .. } => Some(error),
        }
    }
}

/// Ordered per-document outcomes plus aggregate counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    /// True only when every document succeeded.
    pub success: bool,
    pub results: Vec<BatchItem>,
    pub total_documents: usize,
    pub successful_conversions: usize,
    pub failed_conversions: usize,
    /// Wall-clock seconds for the whole batch.
    pub processing_time: f64,
}

impl BatchResult {
    pub fn from_items(results: Vec<BatchItem>, processing_time: f64) -> Self {
        let total_documents = results.len();
        let successful_conversions = results.iter().filter(|r| r.is_ok()).count();
        let failed_conversions = total_documents - successful_conversions;
        Self {
            success: failed_conversions == 0 && total_documents > 0,
            results,
            total_documents,
            successful_conversions,
            failed_conversions,
            processing_time,
        }
    }
}

// ── Model info ───────────────────────────────────────────────────────────

/// Static model identifiers and capability switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub conversion_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_model: Option<String>,
    pub formula_model: String,
    /// Three-letter code → English name.
    pub supported_ocr_languages: BTreeMap<String, String>,
    /// Feature name → whether this deployment can produce it.
    pub features: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedFormats {
    pub input: Vec<DocumentFormat>,
    pub output: Vec<OutputFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedLanguages {
    pub ocr: Vec<OcrLanguage>,
    pub descriptions: Vec<DescriptionLanguage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub success: bool,
    pub model_info: ModelInfo,
    pub available_features: Vec<String>,
    pub supported_formats: SupportedFormats,
    pub supported_languages: SupportedLanguages,
}

// ── Responses ────────────────────────────────────────────────────────────

/// A successful single-document response: `success` plus the result fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: ConversionResult,
}

/// A failed single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: ErrorKind,
}

impl From<&EnrichError> for ErrorResponse {
    fn from(e: &EnrichError) -> Self {
        Self {
            success: false,
            error: e.to_string(),
            kind: e.kind(),
        }
    }
}

/// Any response the request handler can produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Document(Box<DocumentResponse>),
    Batch(BatchResult),
    ModelInfo(Box<ModelInfoResponse>),
    Error(ErrorResponse),
}

impl Response {
    pub fn is_success(&self) -> bool {
        match self {
            Response::Document(d) => d.success,
            Response::Batch(b) => b.success,
            Response::ModelInfo(m) => m.success,
            Response::Error(_) => false,
        }
    }
}
