//! # docenrich
//!
//! Convert documents (PDF, images, HTML, plain text) into Markdown or HTML
//! and enrich them with bilingual figure descriptions, formula analysis,
//! table metadata and content statistics.
//!
//! ## Pipeline Overview
//!
//! ```text
//! request
//!  │
//!  ├─ 1. Resolve   fetch the URL or decode base64 into a scoped temp file
//!  ├─ 2. Convert   layout/OCR collaborator → ordered ElementBody
//!  ├─ 3. Render    markdown | html (deterministic)
//!  ├─ 4. Enrich    image descriptions, formulas, tables, content (per flag)
//!  └─ 5. Aggregate one ConversionResult with structure + metadata
//! ```
//!
//! Batches run the chain once per document, one document at a time; a
//! failing document becomes an error record at its position.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docenrich::{handle_value, Pipeline, PipelineConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let pipeline = Pipeline::from_config(PipelineConfig::default())?;
//!     let response = handle_value(&pipeline, json!({
//!         "input": {
//!             "document_url": "https://example.org/report.pdf",
//!             "include_tables": true,
//!             "enhance_content": true
//!         }
//!     }))
//!     .await;
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Custom collaborators
//!
//! Every model sits behind a trait ([`DocumentConverter`], [`ImageCaptioner`],
//! [`Translator`], [`FormulaDescriber`]). Build a [`Collaborators`] with your
//! own implementations and pass it to [`Pipeline::new`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docenrich` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod handler;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    FeatureFlags, OcrLanguage, OutputFormat, PipelineConfig, PipelineConfigBuilder,
    RequestOptions,
};
pub use convert::{Collaborators, Pipeline};
pub use error::{BoxError, ElementError, EnrichError, ErrorKind};
pub use handler::{handle, handle_value};
pub use model::{
    DescriptionLanguage, DocumentFormat, Element, ElementBody, FigureImage, SourceKind,
    SourceSpec, Span, TableGrid,
};
pub use output::{BatchItem, BatchResult, ConversionResult, ModelInfoResponse, Response};
pub use pipeline::conversion::{ConversionInput, DocumentConverter};
pub use pipeline::enrich::{
    FigureInput, FormulaDescriber, ImageCaptioner, TemplateFormulaDescriber, Translator,
};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{Job, Request};
pub use stream::{process_batch_stream, BatchStream};
