//! Shipped collaborator implementations.
//!
//! ```text
//! VlmConverter      pdf ─ pdf ─ encode ─ llm ─ postprocess ─ markdown
//!                   image ─ encode ─ llm ─ postprocess ─ markdown
//!                   txt ─ markdown, html ─ html
//! LlmCaptioner / LlmTranslator / LlmFormulaDescriber ─ llm
//! ```
//!
//! Everything model-backed goes through [`llm::chat_with_retry`] and obtains
//! its provider from [`provider::resolve_provider`].

pub mod encode;
pub mod html;
pub mod llm;
pub mod markdown;
pub mod models;
pub mod pdf;
pub mod postprocess;
pub mod provider;
pub mod vlm;

pub use models::{LlmCaptioner, LlmFormulaDescriber, LlmTranslator};
pub use vlm::VlmConverter;
