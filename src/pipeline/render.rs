//! Serialise an [`ElementBody`] into Markdown, HTML or plain text.
//!
//! Rendering is a pure function of the body and the options: the same input
//! always produces byte-identical output, and element order is preserved.
//! Enrichment results never leak into the content.

use crate::config::OutputFormat;
use crate::model::{heading_level, strip_math_delimiters, Element, ElementBody, TableGrid};

/// Rendering switches taken from the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit figures as image references instead of caption-only text.
    pub include_images: bool,
}

/// Render `body` in the requested dialect.
pub fn render(body: &ElementBody, format: OutputFormat, options: RenderOptions) -> String {
    match format {
        OutputFormat::Markdown => render_markdown(body, options),
        OutputFormat::Html => render_html(body, options),
    }
}

// ── Markdown ─────────────────────────────────────────────────────────────

pub fn render_markdown(body: &ElementBody, options: RenderOptions) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut list: Vec<String> = Vec::new();

    for element in &body.elements {
        if let Element::ListItem { text, depth } = element {
            list.push(format!("{}- {}", "  ".repeat(*depth), text));
            continue;
        }
        if !list.is_empty() {
            blocks.push(list.join("\n"));
            list.clear();
        }
        let block = match element {
            Element::Heading { level, text } => {
                format!("{} {}", "#".repeat(heading_level(*level) as usize), text)
            }
            Element::Paragraph { text } => text.clone(),
            Element::Table(grid) => markdown_table(grid),
            Element::Figure { image_ref, caption } => {
                let caption = caption.as_deref().unwrap_or("");
                if options.include_images {
                    format!("![{}]({})", caption, image_ref)
                } else if caption.is_empty() {
                    "*[Figure]*".to_string()
                } else {
                    format!("*{}*", caption)
                }
            }
            Element::Formula { raw_text, .. } => {
                format!("$$\n{}\n$$", strip_math_delimiters(raw_text))
            }
            Element::ListItem { .. } => continue,
        };
        blocks.push(block);
    }
    if !list.is_empty() {
        blocks.push(list.join("\n"));
    }

    finish(blocks, "\n\n")
}

fn markdown_table(grid: &TableGrid) -> String {
    let cols = grid.cols();
    if cols == 0 {
        return String::new();
    }
    let row_line = |row: Option<&Vec<String>>| -> String {
        let cells: Vec<String> = (0..cols)
            .map(|c| {
                row.and_then(|r| r.get(c))
                    .map(|s| s.replace('|', "\\|").replace('\n', " "))
                    .unwrap_or_default()
            })
            .collect();
        format!("| {} |", cells.join(" | "))
    };
    let separator = format!("|{}", " --- |".repeat(cols));

    let mut lines = Vec::with_capacity(grid.rows() + 2);
    let mut rows = grid.cells.iter();
    if grid.has_headers == Some(false) {
        lines.push(row_line(None));
    } else {
        lines.push(row_line(rows.next()));
    }
    lines.push(separator);
    lines.extend(rows.map(|r| row_line(Some(r))));
    lines.join("\n")
}

// ── HTML ─────────────────────────────────────────────────────────────────

pub fn render_html(body: &ElementBody, options: RenderOptions) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut open_lists = 0usize;

    for element in &body.elements {
        if let Element::ListItem { text, depth } = element {
            let target = (*depth + 1).min(open_lists + 1);
            if target > open_lists {
                while open_lists < target {
                    out.push("<ul>".to_string());
                    open_lists += 1;
                }
            } else {
                out.push("</li>".to_string());
                while open_lists > target {
                    out.push("</ul></li>".to_string());
                    open_lists -= 1;
                }
            }
            out.push(format!("<li>{}", escape_html(text)));
            continue;
        }
        close_lists(&mut out, &mut open_lists);

        let html = match element {
            Element::Heading { level, text } => {
                format!("<h{l}>{}</h{l}>", escape_html(text), l = heading_level(*level))
            }
            Element::Paragraph { text } => format!("<p>{}</p>", escape_html(text)),
            Element::Table(grid) => html_table(grid),
            Element::Figure { image_ref, caption } => {
                let caption_html = caption
                    .as_deref()
                    .map(|c| format!("<figcaption>{}</figcaption>", escape_html(c)));
                if options.include_images {
                    format!(
                        "<figure><img src=\"{}\" alt=\"{}\">{}</figure>",
                        escape_html(image_ref),
                        escape_html(caption.as_deref().unwrap_or("")),
                        caption_html.unwrap_or_default()
                    )
                } else {
                    format!(
                        "<figure>{}</figure>",
                        caption_html
                            .unwrap_or_else(|| "<figcaption>Figure</figcaption>".to_string())
                    )
                }
            }
            Element::Formula { raw_text, .. } => format!(
                "<div class=\"math display\">\\[{}\\]</div>",
                escape_html(strip_math_delimiters(raw_text))
            ),
            Element::ListItem { .. } => continue,
        };
        out.push(html);
    }
    close_lists(&mut out, &mut open_lists);

    let mut doc = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n</head>\n<body>\n",
    );
    for line in &out {
        doc.push_str(line);
        doc.push('\n');
    }
    doc.push_str("</body>\n</html>\n");
    doc
}

fn close_lists(out: &mut Vec<String>, open_lists: &mut usize) {
    if *open_lists == 0 {
        return;
    }
    out.push("</li>".to_string());
    while *open_lists > 1 {
        out.push("</ul></li>".to_string());
        *open_lists -= 1;
    }
    out.push("</ul>".to_string());
    *open_lists = 0;
}

fn html_table(grid: &TableGrid) -> String {
    let cols = grid.cols();
    let row_html = |row: &[String], tag: &str| -> String {
        let cells: String = (0..cols)
            .map(|c| {
                format!(
                    "<{t}>{}</{t}>",
                    escape_html(row.get(c).map(String::as_str).unwrap_or("")),
                    t = tag
                )
            })
            .collect();
        format!("<tr>{}</tr>", cells)
    };

    let mut html = String::from("<table>");
    let mut rows = grid.cells.iter();
    if grid.has_headers != Some(false) {
        if let Some(header) = rows.next() {
            html.push_str("<thead>");
            html.push_str(&row_html(header, "th"));
            html.push_str("</thead>");
        }
    }
    html.push_str("<tbody>");
    for row in rows {
        html.push_str(&row_html(row, "td"));
    }
    html.push_str("</tbody></table>");
    html
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── Plain text ───────────────────────────────────────────────────────────

/// Markup-free rendering used for statistics, language and readability.
///
/// Blocks are separated by one blank line; list items and table rows sit on
/// consecutive lines.
pub fn render_plain(body: &ElementBody) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut list: Vec<&str> = Vec::new();

    for element in &body.elements {
        if let Element::ListItem { text, .. } = element {
            list.push(text);
            continue;
        }
        if !list.is_empty() {
            blocks.push(list.join("\n"));
            list.clear();
        }
        let block = match element {
            Element::Heading { text, .. } | Element::Paragraph { text } => text.clone(),
            Element::Table(grid) => grid
                .cells
                .iter()
                .map(|row| row.join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
            Element::Figure { caption, .. } => caption.clone().unwrap_or_default(),
            Element::Formula { raw_text, .. } => strip_math_delimiters(raw_text).to_string(),
            Element::ListItem { .. } => continue,
        };
        if !block.trim().is_empty() {
            blocks.push(block);
        }
    }
    if !list.is_empty() {
        blocks.push(list.join("\n"));
    }

    blocks.join("\n\n")
}

fn finish(blocks: Vec<String>, separator: &str) -> String {
    let joined = blocks
        .into_iter()
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join(separator);
    if joined.is_empty() {
        joined
    } else {
        format!("{}\n", joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;

    fn sample() -> ElementBody {
        ElementBody::new(vec![
            Element::heading(1, "Report"),
            Element::paragraph("Intro text."),
            Element::list_item("first", 0),
            Element::list_item("nested", 1),
            Element::list_item("second", 0),
            Element::Table(
                TableGrid::new(vec![
                    vec!["Year".into(), "Sales".into()],
                    vec!["2023".into(), "1200".into()],
                ])
                .with_headers(true),
            ),
            Element::figure("page-1", Some("A chart".into())),
            Element::formula("$E = mc^2$", Span::new(0, 10)),
        ])
    }

    #[test]
    fn markdown_layout() {
        let md = render_markdown(&sample(), RenderOptions::default());
        let expected = "# Report\n\n\
                        Intro text.\n\n\
                        - first\n  - nested\n- second\n\n\
                        | Year | Sales |\n| --- | --- |\n| 2023 | 1200 |\n\n\
                        *A chart*\n\n\
                        $$\nE = mc^2\n$$\n";
        assert_eq!(md, expected);
    }

    #[test]
    fn include_images_emits_references() {
        let md = render_markdown(
            &sample(),
            RenderOptions {
                include_images: true,
            },
        );
        assert!(md.contains("![A chart](page-1)"));
        let html = render_html(
            &sample(),
            RenderOptions {
                include_images: true,
            },
        );
        assert!(html.contains("<img src=\"page-1\" alt=\"A chart\">"));
    }

    #[test]
    fn headerless_table_gets_blank_header_row() {
        let grid = TableGrid::new(vec![vec!["a".into(), "b".into()]]).with_headers(false);
        assert_eq!(markdown_table(&grid), "|  |  |\n| --- | --- |\n| a | b |");
    }

    #[test]
    fn ragged_rows_are_padded_and_pipes_escaped() {
        let grid = TableGrid::new(vec![
            vec!["h1".into(), "h2".into()],
            vec!["a|b".into()],
        ]);
        assert_eq!(
            markdown_table(&grid),
            "| h1 | h2 |\n| --- | --- |\n| a\\|b |  |"
        );
    }

    #[test]
    fn html_lists_nest() {
        let html = render_html(&sample(), RenderOptions::default());
        assert!(html.contains(
            "<ul>\n<li>first\n<ul>\n<li>nested\n</li>\n</ul></li>\n<li>second\n</li>\n</ul>"
        ));
        assert!(html.contains("<thead><tr><th>Year</th><th>Sales</th></tr></thead>"));
        assert!(html.contains("<figcaption>A chart</figcaption>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn html_escapes_text() {
        let body = ElementBody::new(vec![Element::paragraph("a < b & \"c\"")]);
        let html = render_html(&body, RenderOptions::default());
        assert!(html.contains("<p>a &lt; b &amp; &quot;c&quot;</p>"));
    }

    #[test]
    fn plain_text_has_no_markup() {
        let text = render_plain(&sample());
        assert_eq!(
            text,
            "Report\n\nIntro text.\n\nfirst\nnested\nsecond\n\nYear Sales\n2023 1200\n\nA chart\n\nE = mc^2"
        );
    }

    #[test]
    fn out_of_range_heading_levels_are_clamped() {
        let body = ElementBody::new(vec![
            Element::Heading {
                level: 0,
                text: "Top".into(),
            },
            Element::Heading {
                level: 9,
                text: "Deep".into(),
            },
        ]);
        let md = render(&body, OutputFormat::Markdown, RenderOptions::default());
        assert!(md.starts_with("# Top\n"));
        assert!(md.contains("###### Deep"));
        assert!(!md.contains("#######"));

        let html = render(&body, OutputFormat::Html, RenderOptions::default());
        assert!(html.contains("<h1>Top</h1>"));
        assert!(html.contains("<h6>Deep</h6>"));
        assert!(!html.contains("<h0>"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let body = sample();
        for format in [OutputFormat::Markdown, OutputFormat::Html] {
            let a = render(&body, format, RenderOptions::default());
            let b = render(&body, format, RenderOptions::default());
            assert_eq!(a, b);
        }
    }

    #[test]
    fn empty_body_renders_empty_markdown() {
        assert_eq!(render_markdown(&ElementBody::default(), RenderOptions::default()), "");
    }
}
