//! Source resolution: turn a [`SourceSpec`] into a local file of known format.
//!
//! Converters need a filesystem path (pdfium cannot read from a byte
//! buffer), so both URL and inline sources are materialised into a private
//! `TempDir`. The directory lives inside [`ResolvedSource`] and is removed
//! when the value is dropped, on success, failure or panic alike.
//!
//! Format inference order:
//! 1. extension of the declared filename (inline) or URL path,
//! 2. the `Content-Type` response header (URL only),
//! 3. magic-byte sniffing of the payload.

use crate::error::EnrichError;
use crate::model::{DocumentFormat, SourceKind, SourceSpec};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// A document materialised on disk with its format resolved.
#[derive(Debug)]
pub struct ResolvedSource {
    spec: SourceSpec,
    format: DocumentFormat,
    path: PathBuf,
    byte_len: usize,
    _temp_dir: TempDir,
}

impl ResolvedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetch or decode `spec` and write it to a fresh temporary directory.
pub async fn resolve(
    spec: &SourceSpec,
    download_timeout_secs: u64,
) -> Result<ResolvedSource, EnrichError> {
    let (bytes, format) = match spec.kind {
        SourceKind::Url => fetch(&spec.locator_or_payload, download_timeout_secs).await?,
        SourceKind::Inline => {
            let bytes = decode_inline(&spec.locator_or_payload)?;
            let format = infer_format(spec.declared_filename.as_deref(), None, &bytes)?;
            (bytes, format)
        }
    };

    let temp_dir = TempDir::new().map_err(|e| EnrichError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(format!("source.{}", format.as_str()));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| EnrichError::Internal(format!("Failed to write temp file: {}", e)))?;

    debug!(
        "Resolved {} ({} bytes, {}) to {}",
        spec.display_name(),
        bytes.len(),
        format,
        path.display()
    );

    Ok(ResolvedSource {
        spec: spec.clone(),
        format,
        path,
        byte_len: bytes.len(),
        _temp_dir: temp_dir,
    })
}

/// Decode a base64 payload, tolerating a `data:` URI prefix and line breaks.
pub fn decode_inline(payload: &str) -> Result<Vec<u8>, EnrichError> {
    let body = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(EnrichError::invalid_input("document_base64 is empty"));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| EnrichError::InvalidBase64 {
            reason: e.to_string(),
        })
}

/// Resolve the format tag for a payload.
///
/// A declared extension outside the supported set is rejected outright; an
/// absent or unrecognised URL extension falls through to the header and
/// then to sniffing.
pub fn infer_format(
    declared_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<DocumentFormat, EnrichError> {
    if let Some(name) = declared_name {
        if let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) {
            return DocumentFormat::from_extension(ext).ok_or_else(|| {
                EnrichError::UnsupportedFormat {
                    format: ext.to_ascii_lowercase(),
                }
            });
        }
    }
    if let Some(format) = content_type.and_then(DocumentFormat::from_content_type) {
        return Ok(format);
    }
    DocumentFormat::sniff(bytes).ok_or_else(|| EnrichError::UnsupportedFormat {
        format: content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

async fn fetch(url: &str, timeout_secs: u64) -> Result<(Vec<u8>, DocumentFormat), EnrichError> {
    if !is_url(url) {
        return Err(EnrichError::invalid_input(format!(
            "document_url must be http(s): '{}'",
            url
        )));
    }
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EnrichError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?;

    if !response.status().is_success() {
        return Err(EnrichError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?
        .to_vec();

    let from_url = url_path(url).and_then(|p| DocumentFormat::from_path(&p));
    let format = match from_url {
        Some(f) => f,
        None => infer_format(None, content_type.as_deref(), &bytes)?,
    };
    Ok((bytes, format))
}

fn download_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> EnrichError {
    if e.is_timeout() {
        EnrichError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        EnrichError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Path component of a URL, so the host name is never read as an extension.
fn url_path(url: &str) -> Option<String> {
    reqwest::Url::parse(url).ok().map(|u| u.path().to_string())
}
