//! Lightweight Markdown → [`ElementBody`] parser.
//!
//! Understands exactly what the page prompt asks the model for: ATX
//! headings, bullet and numbered lists with two-space nesting, GFM pipe
//! tables, standalone `![alt](target)` figure lines, display math (`$$…$$`,
//! `\[…\]`, or a line that is entirely `$…$`) and fenced code. Everything
//! else is paragraph text; consecutive lines join with a space.
//!
//! Formula spans are byte offsets into the parsed text.

use super::postprocess::{is_separator_row, is_table_row};
use crate::model::{Element, ElementBody, Span, TableGrid};
use crate::prompts::FIGURE_PLACEHOLDER;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*?)(?:\s+#+)?\s*$").unwrap());
static RE_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:-{3,}|\*{3,}|_{3,})$").unwrap());
static RE_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([ \t]*)(?:[-*+]|\d{1,3}[.)])\s+(.*)$").unwrap());
static RE_FIGURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^!\[([^\]]*)\]\(([^)\s]*)(?:\s+[^)]*)?\)$").unwrap());
static RE_INLINE_MATH_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$[^$]+\$$").unwrap());

/// One source line, newline excluded, with its byte offset.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    text: &'a str,
    start: usize,
}

fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for raw in text.split_inclusive('\n') {
        let content = raw.strip_suffix('\n').unwrap_or(raw);
        let content = content.strip_suffix('\r').unwrap_or(content);
        lines.push(Line {
            text: content,
            start,
        });
        start += raw.len();
    }
    lines
}

/// Parse `text`. Figures take `page_image` as their image reference when
/// their own target is the page placeholder.
pub fn parse(text: &str, page_image: Option<&str>) -> ElementBody {
    let lines = split_lines(text);
    let mut elements = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut i = 0;

    macro_rules! flush_paragraph {
        () => {
            if !paragraph.is_empty() {
                elements.push(Element::paragraph(paragraph.join(" ")));
                paragraph.clear();
            }
        };
    }

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.text.trim();

        if trimmed.is_empty() || RE_RULE.is_match(trimmed) {
            flush_paragraph!();
            i += 1;
            continue;
        }

        if trimmed.starts_with("```") {
            flush_paragraph!();
            let mut code = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].text.trim().starts_with("```") {
                code.push(lines[i].text);
                i += 1;
            }
            if !code.is_empty() {
                elements.push(Element::paragraph(code.join("\n")));
            }
            i += 1;
            continue;
        }

        if let Some((element, next)) = display_math(&lines, i) {
            flush_paragraph!();
            elements.push(element);
            i = next;
            continue;
        }

        if let Some(caps) = RE_HEADING.captures(trimmed) {
            flush_paragraph!();
            elements.push(Element::heading(caps[1].len() as u8, &caps[2]));
            i += 1;
            continue;
        }

        if is_table_row(trimmed) {
            flush_paragraph!();
            let (grid, next) = table(&lines, i);
            elements.push(Element::Table(grid));
            i = next;
            continue;
        }

        if let Some(caps) = RE_FIGURE.captures(trimmed) {
            flush_paragraph!();
            let caption = Some(caps[1].trim().to_string()).filter(|c| !c.is_empty());
            let target = &caps[2];
            let image_ref = match page_image {
                Some(page) if target == FIGURE_PLACEHOLDER || target.is_empty() => page,
                _ => target,
            };
            elements.push(Element::figure(image_ref, caption));
            i += 1;
            continue;
        }

        if let Some(caps) = RE_LIST.captures(line.text) {
            flush_paragraph!();
            let indent: usize = caps[1]
                .chars()
                .map(|c| if c == '\t' { 4 } else { 1 })
                .sum();
            elements.push(Element::list_item(caps[2].trim(), indent / 2));
            i += 1;
            continue;
        }

        paragraph.push(trimmed);
        i += 1;
    }
    flush_paragraph!();

    ElementBody::new(elements)
}

/// Display math starting at `lines[i]`; returns the element and the next line.
fn display_math(lines: &[Line<'_>], i: usize) -> Option<(Element, usize)> {
    let first = lines[i];
    let trimmed = first.text.trim();
    let offset = first.text.len() - first.text.trim_start().len();
    let start = first.start + offset;

    let (open, close) = if trimmed.starts_with("$$") {
        ("$$", "$$")
    } else if trimmed.starts_with("\\[") {
        ("\\[", "\\]")
    } else if RE_INLINE_MATH_LINE.is_match(trimmed) {
        let span = Span::new(start, start + trimmed.len());
        return Some((Element::formula(trimmed, span), i + 1));
    } else {
        return None;
    };

    if trimmed.len() > open.len() + close.len() - 1 && trimmed[open.len()..].ends_with(close) {
        let span = Span::new(start, start + trimmed.len());
        return Some((Element::formula(trimmed, span), i + 1));
    }

    for (j, line) in lines.iter().enumerate().skip(i + 1) {
        if line.text.trim_end().ends_with(close) {
            let end = line.start + line.text.trim_end().len();
            let raw = lines[i..=j]
                .iter()
                .map(|l| l.text.trim())
                .collect::<Vec<_>>()
                .join("\n");
            return Some((Element::formula(raw, Span::new(start, end)), j + 1));
        }
    }
    None
}

/// Collect consecutive pipe rows. A separator in second position marks the
/// first row as the header; otherwise header presence stays unknown.
fn table(lines: &[Line<'_>], start: usize) -> (TableGrid, usize) {
    let mut rows = Vec::new();
    let mut has_headers = false;
    let mut i = start;
    while i < lines.len() && is_table_row(lines[i].text.trim()) {
        let row = lines[i].text.trim();
        if is_separator_row(row) {
            if i == start + 1 {
                has_headers = true;
            }
        } else {
            rows.push(split_cells(row));
        }
        i += 1;
    }
    let grid = TableGrid::new(rows);
    let grid = if has_headers { grid.with_headers(true) } else { grid };
    (grid, i)
}

/// Split a pipe row into trimmed cells, honouring `\|` escapes.
fn split_cells(row: &str) -> Vec<String> {
    let inner = row.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = if inner.ends_with('|') && !inner.ends_with("\\|") {
        &inner[..inner.len() - 1]
    } else {
        inner
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}
