//! Per-document pipeline stages.
//!
//! ```text
//! SourceSpec ──► source ──► conversion ──► enrich ──► render ──► aggregate
//!               (resolve)  (ElementBody)  (analyzers) (content)  (ConversionResult)
//! ```
//!
//! Stages are independent: each takes the previous stage's output plus the
//! request options and returns a value. Only [`source`] touches the
//! filesystem and only [`conversion`] and [`enrich`] call collaborators.

pub mod aggregate;
pub mod conversion;
pub mod enrich;
pub mod render;
pub mod source;
