//! Deterministic cleanup of model-generated page Markdown.
//!
//! Rules run in a fixed order; each is a pure `&str -> String` pass.
//!
//! 1. strip outer ```` ```markdown ```` fences
//! 2. CRLF / CR → LF
//! 3. drop invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 4. trim trailing whitespace per line
//! 5. blank line before every heading
//! 6. drop separator rows in table bodies
//! 7. point local or placeholder image targets at the page figure slot
//! 8. collapse runs of blank lines
//! 9. exactly one trailing newline

use crate::prompts::FIGURE_PLACEHOLDER;
use once_cell::sync::Lazy;
use regex::Regex;

pub fn clean_markdown(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = space_headings(&s);
    let s = drop_body_separators(&s);
    let s = normalise_figure_targets(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());

fn space_headings(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in input.lines() {
        if RE_HEADING.is_match(line) && out.last().is_some_and(|prev| !prev.is_empty()) {
            out.push("");
        }
        out.push(line);
    }
    out.join("\n")
}

pub(crate) fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 1 && t.starts_with('|')
}

pub(crate) fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|')
        && t.contains('-')
        && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// A separator is only meaningful as the second row of a table.
fn drop_body_separators(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut row = 0usize;
    for line in input.lines() {
        if is_table_row(line) {
            row += 1;
            if is_separator_row(line) && row != 2 {
                continue;
            }
        } else {
            row = 0;
        }
        out.push(line);
    }
    out.join("\n")
}

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

const PLACEHOLDER_HOSTS: [&str; 5] = [
    "example.com",
    "placeholder.com",
    "dummyimage.com",
    "picsum.photos",
    "placehold.it",
];

/// Figures on a page can only be backed by the page image itself, so any
/// target that is not a real remote URL is rewritten to the placeholder.
fn normalise_figure_targets(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            let target = caps[2].trim();
            let remote = (target.starts_with("http://") || target.starts_with("https://"))
                && !PLACEHOLDER_HOSTS.iter().any(|h| target.contains(h));
            if remote {
                caps[0].to_string()
            } else {
                format!("![{}]({})", alt, FIGURE_PLACEHOLDER)
            }
        })
        .to_string()
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").to_string()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_with_or_without_tag() {
        assert_eq!(strip_outer_fences("```markdown\n# A\nB\n```"), "# A\nB");
        assert_eq!(strip_outer_fences("```\n# A\n```"), "# A");
        assert_eq!(strip_outer_fences("# A"), "# A");
    }

    #[test]
    fn line_endings_and_trailing_space() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(trim_trailing_whitespace("  a   \nb  "), "  a\nb");
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn headings_get_blank_line() {
        assert_eq!(space_headings("text\n## Head\nmore"), "text\n\n## Head\nmore");
        assert_eq!(space_headings("# Top"), "# Top");
    }

    #[test]
    fn body_separators_dropped_header_separator_kept() {
        let input = "| A | B |\n| --- | --- |\n| 1 | 2 |\n| --- | --- |\n| 3 | 4 |";
        assert_eq!(
            drop_body_separators(input),
            "| A | B |\n| --- | --- |\n| 1 | 2 |\n| 3 | 4 |"
        );
    }

    #[test]
    fn fake_image_targets_become_placeholder() {
        assert_eq!(normalise_figure_targets("![Chart](chart.png)"), "![Chart](figure)");
        assert_eq!(
            normalise_figure_targets("![x](https://example.com/a.png)"),
            "![x](figure)"
        );
        let real = "![Fig](https://arxiv.org/fig1.png)";
        assert_eq!(normalise_figure_targets(real), real);
    }

    #[test]
    fn full_pipeline() {
        let input = "```markdown\n# Title\r\n\r\nSome text   \n\n\n\n\n## Section\n```";
        assert_eq!(clean_markdown(input), "# Title\n\nSome text\n\n## Section\n");
        assert_eq!(clean_markdown("  \n\n"), "");
    }
}
