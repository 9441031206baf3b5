//! Error types for the docenrich library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`EnrichError`] is **item-fatal**: one document cannot be processed at
//!   all (malformed request item, unsupported format, the converter failed,
//!   the deadline passed). The batch orchestrator turns it into an
//!   [`crate::output::ErrorRecord`] at that item's position; sibling
//!   documents are unaffected.
//!
//! * [`ElementError`] is **non-fatal**: a single element's enrichment failed
//!   (captioner error, empty table grid). The element is skipped and the
//!   failure is recorded as a gap on the document's result.
//!
//! Both map onto the wire-level [`ErrorKind`] taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type returned by collaborator implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Wire-level error classification reported in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    UnsupportedFormat,
    ConversionFailed,
    EnrichmentPartialFailure,
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::ConversionFailed => "ConversionFailed",
            ErrorKind::EnrichmentPartialFailure => "EnrichmentPartialFailure",
            ErrorKind::Timeout => "Timeout",
        };
        f.write_str(s)
    }
}

/// All item-fatal errors returned by the docenrich library.
///
/// Element-level failures use [`ElementError`] and are recorded on the
/// document's result rather than propagated here.
#[derive(Debug, Error)]
pub enum EnrichError {
    // ── Request errors ────────────────────────────────────────────────────
    /// Malformed or contradictory request shape.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Inline payload was not valid base64.
    #[error("Invalid base64 payload: {reason}")]
    InvalidBase64 { reason: String },

    /// More documents than the configured batch maximum.
    #[error("Batch contains {count} documents; the maximum is {max}")]
    BatchTooLarge { count: usize, max: usize },

    // ── Source errors ─────────────────────────────────────────────────────
    /// The resolved format is outside the supported set.
    #[error("Unsupported document format '{format}'")]
    UnsupportedFormat { format: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The layout/OCR collaborator failed for this document.
    #[error("Conversion of '{source_name}' failed: {cause}")]
    ConversionFailed {
        source_name: String,
        #[source]
        cause: BoxError,
    },

    /// The per-document deadline passed before processing finished.
    #[error("Document processing timed out after {secs}s")]
    Timeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EnrichError {
    /// Shorthand for [`EnrichError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        EnrichError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Classify this error for the response payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnrichError::InvalidInput { .. }
            | EnrichError::InvalidBase64 { .. }
            | EnrichError::BatchTooLarge { .. }
            | EnrichError::InvalidConfig(_) => ErrorKind::InvalidInput,
            EnrichError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            EnrichError::DownloadFailed { .. }
            | EnrichError::ConversionFailed { .. }
            | EnrichError::ProviderNotConfigured { .. }
            | EnrichError::Internal(_) => ErrorKind::ConversionFailed,
            EnrichError::DownloadTimeout { .. } | EnrichError::Timeout { .. } => {
                ErrorKind::Timeout
            }
        }
    }
}

/// A non-fatal error for a single element during enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ElementError {
    /// A model collaborator returned an error.
    #[error("element {index}: {collaborator} failed: {detail}")]
    CollaboratorFailed {
        index: usize,
        collaborator: String,
        detail: String,
    },

    /// A figure has neither image data nor a caption to work from.
    #[error("element {index}: no image data or caption for figure '{image_ref}'")]
    MissingImage { index: usize, image_ref: String },

    /// A table has no rows or no columns.
    #[error("element {index}: table grid is empty")]
    EmptyTable { index: usize },

    /// A model call exceeded its budget.
    #[error("element {index}: {collaborator} timed out after {secs}s")]
    Timeout {
        index: usize,
        collaborator: String,
        secs: u64,
    },
}

impl ElementError {
    /// Index of the element this error refers to.
    pub fn index(&self) -> usize {
        match self {
            ElementError::CollaboratorFailed { index, .. }
            | ElementError::MissingImage { index, .. }
            | ElementError::EmptyTable { index }
            | ElementError::Timeout { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_failures_surface_as_conversion_failed() {
        let e = EnrichError::DownloadFailed {
            url: "http://host/doc.pdf".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ConversionFailed);
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn batch_too_large_is_invalid_input() {
        let e = EnrichError::BatchTooLarge { count: 30, max: 20 };
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
        assert!(e.to_string().contains("30"));
    }

    #[test]
    fn conversion_failed_keeps_cause() {
        let e = EnrichError::ConversionFailed {
            source_name: "scan.pdf".into(),
            cause: "corrupt xref".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ConversionFailed);
        let cause = std::error::Error::source(&e).map(|c| c.to_string());
        assert_eq!(cause.as_deref(), Some("corrupt xref"));
    }

    #[test]
    fn timeouts_classify_as_timeout() {
        assert_eq!(EnrichError::Timeout { secs: 5 }.kind(), ErrorKind::Timeout);
        let e = EnrichError::DownloadTimeout {
            url: "http://x".into(),
            secs: 3,
        };
        assert_eq!(e.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn element_error_index() {
        let e = ElementError::EmptyTable { index: 7 };
        assert_eq!(e.index(), 7);
        assert!(e.to_string().contains("element 7"));
    }

    #[test]
    fn element_errors_compare_by_value() {
        let a = ElementError::Timeout {
            index: 2,
            collaborator: "captioner".into(),
            secs: 30,
        };
        assert_eq!(a, a.clone());
        assert_ne!(a, ElementError::EmptyTable { index: 2 });
    }

    #[test]
    fn error_kind_serialises_as_variant_name() {
        let json = serde_json::to_string(&ErrorKind::InvalidInput).unwrap();
        assert_eq!(json, "\"InvalidInput\"");
    }
}
