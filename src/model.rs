//! Source descriptors and the typed-element document body.
//!
//! [`ElementBody`] is the hand-off point between the conversion collaborator
//! and the rest of the pipeline. Element order is the document's reading
//! order: every later stage refers to elements by their index in
//! [`ElementBody::elements`] and none of them reorders the sequence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// ── Sources ──────────────────────────────────────────────────────────────

/// How a document was supplied in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Remote locator fetched over HTTP(S).
    Url,
    /// Base64 payload embedded in the request.
    #[serde(rename = "base64")]
    Inline,
}

impl SourceKind {
    /// Value echoed in the response `source` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Url => "url",
            SourceKind::Inline => "base64",
        }
    }
}

/// One document of a request, validated but not yet fetched or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    /// URL for [`SourceKind::Url`], base64 payload for [`SourceKind::Inline`].
    pub locator_or_payload: String,
    pub declared_filename: Option<String>,
}

impl SourceSpec {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Url,
            locator_or_payload: url.into(),
            declared_filename: None,
        }
    }

    pub fn inline(payload: impl Into<String>, filename: Option<String>) -> Self {
        Self {
            kind: SourceKind::Inline,
            locator_or_payload: payload.into(),
            declared_filename: filename,
        }
    }

    /// Human-readable name for logs and metadata. Never the raw payload.
    pub fn display_name(&self) -> String {
        match self.kind {
            SourceKind::Url => self.locator_or_payload.clone(),
            SourceKind::Inline => self
                .declared_filename
                .clone()
                .unwrap_or_else(|| "inline document".to_string()),
        }
    }
}

// ── Formats ──────────────────────────────────────────────────────────────

/// Input formats the resolver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
    Txt,
    Html,
    Png,
    Jpg,
    Jpeg,
    Tiff,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 9] = [
        DocumentFormat::Pdf,
        DocumentFormat::Docx,
        DocumentFormat::Doc,
        DocumentFormat::Txt,
        DocumentFormat::Html,
        DocumentFormat::Png,
        DocumentFormat::Jpg,
        DocumentFormat::Jpeg,
        DocumentFormat::Tiff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Html => "html",
            DocumentFormat::Png => "png",
            DocumentFormat::Jpg => "jpg",
            DocumentFormat::Jpeg => "jpeg",
            DocumentFormat::Tiff => "tiff",
        }
    }

    /// Map a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "doc" => Some(DocumentFormat::Doc),
            "docx" => Some(DocumentFormat::Docx),
            "txt" | "text" => Some(DocumentFormat::Txt),
            "html" | "htm" => Some(DocumentFormat::Html),
            "png" => Some(DocumentFormat::Png),
            "jpg" => Some(DocumentFormat::Jpg),
            "jpeg" => Some(DocumentFormat::Jpeg),
            "tif" | "tiff" => Some(DocumentFormat::Tiff),
            _ => None,
        }
    }

    /// Map an HTTP `Content-Type` header value, ignoring parameters.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/pdf" => Some(DocumentFormat::Pdf),
            "application/msword" => Some(DocumentFormat::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            "text/plain" => Some(DocumentFormat::Txt),
            "text/html" | "application/xhtml+xml" => Some(DocumentFormat::Html),
            "image/jpeg" => Some(DocumentFormat::Jpeg),
            "image/png" => Some(DocumentFormat::Png),
            "image/tiff" => Some(DocumentFormat::Tiff),
            _ => None,
        }
    }

    /// Guess the format from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            return Some(DocumentFormat::Pdf);
        }
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            return Some(DocumentFormat::Png);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(DocumentFormat::Jpeg);
        }
        if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            return Some(DocumentFormat::Tiff);
        }
        if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
            return Some(DocumentFormat::Doc);
        }
        if bytes.starts_with(b"PK\x03\x04") {
            let head = &bytes[..bytes.len().min(4096)];
            if head.windows(5).any(|w| w == b"word/") {
                return Some(DocumentFormat::Docx);
            }
            return None;
        }
        let head = &bytes[..bytes.len().min(1024)];
        let text = match std::str::from_utf8(head) {
            Ok(t) => t,
            // A multi-byte character may straddle the cut.
            Err(e) if head.len() < bytes.len() && e.error_len().is_none() => {
                std::str::from_utf8(&head[..e.valid_up_to()]).ok()?
            }
            Err(_) => return None,
        };
        let lower = text.trim_start().to_ascii_lowercase();
        if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
            return Some(DocumentFormat::Html);
        }
        Some(DocumentFormat::Txt)
    }

    /// Format from a path or URL path's extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let without_query = path.split(['?', '#']).next().unwrap_or(path);
        Path::new(without_query)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            DocumentFormat::Png | DocumentFormat::Jpg | DocumentFormat::Jpeg | DocumentFormat::Tiff
        )
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Elements ─────────────────────────────────────────────────────────────

/// Byte range of an element in the converter's source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Shift both ends by `offset`.
    pub fn offset(self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

/// A table cell grid. Row 0 is the header row when `has_headers` holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGrid {
    pub cells: Vec<Vec<String>>,
    /// Header presence as reported by the converter, when it knows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_headers: Option<bool>,
}

impl TableGrid {
    pub fn new(cells: Vec<Vec<String>>) -> Self {
        Self {
            cells,
            has_headers: None,
        }
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = Some(has_headers);
        self
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    /// Widest row; ragged rows are padded when rendered.
    pub fn cols(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// One typed unit of document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    ListItem { text: String, depth: usize },
    Table(TableGrid),
    Figure {
        image_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Formula { raw_text: String, span: Span },
}

/// Heading levels outside `1..=6` snap to the nearest bound.
pub fn heading_level(level: u8) -> u8 {
    level.clamp(1, 6)
}

impl Element {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Element::Heading {
            level: heading_level(level),
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Element::Paragraph { text: text.into() }
    }

    pub fn list_item(text: impl Into<String>, depth: usize) -> Self {
        Element::ListItem {
            text: text.into(),
            depth,
        }
    }

    pub fn figure(image_ref: impl Into<String>, caption: Option<String>) -> Self {
        Element::Figure {
            image_ref: image_ref.into(),
            caption,
        }
    }

    pub fn formula(raw_text: impl Into<String>, span: Span) -> Self {
        Element::Formula {
            raw_text: raw_text.into(),
            span,
        }
    }
}

/// Remove one pair of outer math delimiters (`$$`, `\[ \]`, `\( \)`, `$`).
pub fn strip_math_delimiters(raw: &str) -> &str {
    let mut s = raw.trim();
    for (open, close) in [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")] {
        if s.len() >= open.len() + close.len() && s.starts_with(open) && s.ends_with(close) {
            s = s[open.len()..s.len() - close.len()].trim();
            break;
        }
    }
    s
}

/// Base64 image bytes attached to figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureImage {
    pub mime_type: String,
    /// Standard base64, no data-URI prefix.
    pub data: String,
}

/// The converted document: elements in reading order plus figure images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementBody {
    pub elements: Vec<Element>,
    /// Image data keyed by a figure's `image_ref`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, FigureImage>,
}

impl ElementBody {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            images: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Append another body, keeping order and merging its images.
    pub fn extend(&mut self, other: ElementBody) {
        self.elements.extend(other.elements);
        self.images.extend(other.images);
    }

    pub fn figure_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Figure { .. }))
            .count()
    }

    pub fn has_formulas(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, Element::Formula { .. }))
    }

    pub fn has_tables(&self) -> bool {
        self.elements.iter().any(|e| matches!(e, Element::Table(_)))
    }
}

/// Language of a generated description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionLanguage {
    Fr,
    En,
}

impl DescriptionLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            DescriptionLanguage::Fr => "fr",
            DescriptionLanguage::En => "en",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DescriptionLanguage::Fr => "French",
            DescriptionLanguage::En => "English",
        }
    }
}
