//! Request parsing and validation.
//!
//! A request arrives either bare or wrapped in the serverless envelope
//! `{"input": {...}}`. Validation happens here, before any source is fetched
//! or any model is called: shape errors are reported synchronously.

use crate::config::{FeatureFlags, OcrLanguage, OutputFormat, RequestOptions};
use crate::error::EnrichError;
use crate::model::SourceSpec;
use serde::Deserialize;
use serde_json::Value;

/// One entry of a batch request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DocumentEntry {
    #[serde(alias = "document_url")]
    pub url: Option<String>,
    #[serde(alias = "document_base64")]
    pub base64: Option<String>,
    pub filename: Option<String>,
}

/// The wire request, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Request {
    pub document_url: Option<String>,
    pub document_base64: Option<String>,
    pub filename: Option<String>,
    pub documents: Option<Vec<DocumentEntry>>,
    pub output_format: Option<String>,
    #[serde(flatten)]
    pub flags: FeatureFlags,
    pub ocr_languages: Option<Vec<String>>,
    pub get_model_info: bool,
}

/// What a validated request asks the pipeline to do.
#[derive(Debug)]
pub enum Job {
    ModelInfo,
    Single(SourceSpec, RequestOptions),
    /// Entries that failed validation keep their position as an error.
    Batch(Vec<Result<SourceSpec, EnrichError>>, RequestOptions),
}

impl Request {
    /// Parse a bare request or an `{"input": ...}` envelope.
    pub fn from_value(value: Value) -> Result<Self, EnrichError> {
        let value = match value {
            Value::Object(mut map) if map.contains_key("input") => {
                map.remove("input").unwrap_or(Value::Null)
            }
            other => other,
        };
        let empty = match &value {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            return Err(EnrichError::invalid_input("No input data provided"));
        }
        serde_json::from_value(value)
            .map_err(|e| EnrichError::invalid_input(format!("malformed request: {}", e)))
    }

    /// Output dialect, flags and OCR languages shared by every document.
    pub fn options(&self) -> Result<RequestOptions, EnrichError> {
        let output_format = match self.output_format.as_deref() {
            Some(f) => f.parse::<OutputFormat>()?,
            None => OutputFormat::default(),
        };
        let ocr_languages = match &self.ocr_languages {
            Some(codes) if !codes.is_empty() => codes
                .iter()
                .map(|c| c.parse::<OcrLanguage>())
                .collect::<Result<Vec<_>, _>>()?,
            _ => OcrLanguage::defaults(),
        };
        Ok(RequestOptions {
            output_format,
            flags: self.flags,
            ocr_languages,
        })
    }

    /// Validate the request shape and decide what to run.
    pub fn into_job(self, max_batch_size: usize) -> Result<Job, EnrichError> {
        if self.get_model_info {
            return Ok(Job::ModelInfo);
        }
        let options = self.options()?;

        let Some(documents) = self.documents else {
            let spec = source_from_fields(self.document_url, self.document_base64, self.filename)
                .map_err(|_| {
                    EnrichError::invalid_input(
                        "Exactly one of 'document_url', 'document_base64', 'documents' or \
                         'get_model_info' must be provided",
                    )
                })?;
            return Ok(Job::Single(spec, options));
        };

        if self.document_url.is_some() || self.document_base64.is_some() {
            return Err(EnrichError::invalid_input(
                "'documents' cannot be combined with 'document_url' or 'document_base64'",
            ));
        }
        if documents.is_empty() {
            return Err(EnrichError::invalid_input("No documents provided in batch"));
        }
        if documents.len() > max_batch_size {
            return Err(EnrichError::BatchTooLarge {
                count: documents.len(),
                max: max_batch_size,
            });
        }

        let entries = documents
            .into_iter()
            .map(|d| source_from_fields(d.url, d.base64, d.filename))
            .collect();
        Ok(Job::Batch(entries, options))
    }
}

/// Exactly one of `url` / `base64` must be present and non-blank.
pub fn source_from_fields(
    url: Option<String>,
    base64: Option<String>,
    filename: Option<String>,
) -> Result<SourceSpec, EnrichError> {
    let url = url.filter(|u| !u.trim().is_empty());
    let base64 = base64.filter(|b| !b.trim().is_empty());
    match (url, base64) {
        (Some(url), None) => Ok(SourceSpec::url(url.trim())),
        (None, Some(payload)) => Ok(SourceSpec::inline(
            payload,
            filename.filter(|f| !f.trim().is_empty()),
        )),
        (Some(_), Some(_)) => Err(EnrichError::invalid_input(
            "Document must have either 'url' or 'base64', not both",
        )),
        (None, None) => Err(EnrichError::invalid_input(
            "Document must have either 'url' or 'base64' field",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::SourceKind;
    use serde_json::json;

    #[test]
    fn envelope_is_unwrapped() {
        let req = Request::from_value(json!({"input": {"document_url": "https://x/a.pdf"}})).unwrap();
        assert_eq!(req.document_url.as_deref(), Some("https://x/a.pdf"));
    }

    #[test]
    fn empty_input_is_rejected() {
        for value in [json!({}), json!({"input": {}}), json!(null)] {
            let err = Request::from_value(value).unwrap_err();
            assert_eq!(err.to_string(), "Invalid input: No input data provided");
        }
    }

    #[test]
    fn flags_and_defaults() {
        let req = Request::from_value(json!({
            "document_url": "https://x/a.pdf",
            "include_tables": true,
            "enhance_content": true
        }))
        .unwrap();
        let opts = req.options().unwrap();
        assert_eq!(opts.output_format, OutputFormat::Markdown);
        assert!(opts.flags.include_tables && opts.flags.enhance_content);
        assert!(!opts.flags.include_formula_enrichment);
        assert_eq!(opts.ocr_languages, vec![OcrLanguage::Fra, OcrLanguage::Eng]);
    }

    #[test]
    fn unknown_output_format_is_invalid_input() {
        let req = Request::from_value(json!({
            "document_url": "https://x/a.pdf",
            "output_format": "docx"
        }))
        .unwrap();
        let err = req.into_job(20).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn ocr_aliases_are_normalised() {
        let req = Request::from_value(json!({
            "document_url": "https://x/a.pdf",
            "ocr_languages": ["de", "ENG"]
        }))
        .unwrap();
        assert_eq!(
            req.options().unwrap().ocr_languages,
            vec![OcrLanguage::Deu, OcrLanguage::Eng]
        );
    }

    #[test]
    fn both_or_neither_source_is_invalid() {
        let both = Request::from_value(json!({
            "document_url": "https://x/a.pdf",
            "document_base64": "SGVsbG8="
        }))
        .unwrap();
        assert_eq!(both.into_job(20).unwrap_err().kind(), ErrorKind::InvalidInput);

        let neither = Request::from_value(json!({"include_tables": true})).unwrap();
        assert_eq!(neither.into_job(20).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn model_info_short_circuits_validation() {
        let req = Request::from_value(json!({"get_model_info": true, "output_format": "pdf"}))
            .unwrap();
        assert!(matches!(req.into_job(20).unwrap(), Job::ModelInfo));
    }

    #[test]
    fn batch_keeps_invalid_entries_in_place() {
        let req = Request::from_value(json!({
            "documents": [
                {"url": "https://x/a.pdf"},
                {"filename": "orphan.txt"},
                {"base64": "SGVsbG8=", "filename": "b.txt"}
            ]
        }))
        .unwrap();
        let Job::Batch(entries, _) = req.into_job(20).unwrap() else {
            panic!("expected a batch");
        };
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].as_ref().unwrap().kind, SourceKind::Url);
        assert_eq!(entries[1].as_ref().unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(
            entries[2].as_ref().unwrap().declared_filename.as_deref(),
            Some("b.txt")
        );
    }

    #[test]
    fn batch_limits() {
        let empty = Request::from_value(json!({"documents": []})).unwrap();
        assert_eq!(empty.into_job(20).unwrap_err().kind(), ErrorKind::InvalidInput);

        let docs: Vec<_> = (0..3).map(|i| json!({"url": format!("https://x/{i}.pdf")})).collect();
        let big = Request::from_value(json!({ "documents": docs })).unwrap();
        assert!(matches!(
            big.into_job(2).unwrap_err(),
            EnrichError::BatchTooLarge { count: 3, max: 2 }
        ));
    }
}
