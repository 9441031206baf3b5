//! Prompts for every model-backed collaborator.
//!
//! Keeping them here means prompt wording can change without touching the
//! retry or parsing code, and tests can inspect them without a model.

use crate::config::OcrLanguage;
use crate::model::DescriptionLanguage;
use crate::output::FormulaType;

/// Placeholder image target the page prompt asks the model to use for figures.
pub const FIGURE_PLACEHOLDER: &str = "figure";

/// System prompt for converting one page image into Markdown.
pub const PAGE_CONVERSION_PROMPT: &str = r#"You are an expert document converter. Convert the page image into clean, well-structured Markdown.

Follow these rules precisely:

1. TEXT
   - Preserve ALL text content completely and in human reading order
   - Keep the original language; do not translate

2. STRUCTURE
   - Use # for the page title, ## for sections, ### for subsections
   - Use - for unordered lists and 1. 2. 3. for ordered lists
   - Indent nested list items by two spaces per level

3. TABLES
   - Convert every table to GFM pipe format
   - Put the header row first, followed by a | --- | separator row
   - If a table has no header row, omit the separator row

4. FIGURES
   - For every photo, chart, diagram or illustration write one line
     ![short caption](figure)
   - Use the printed caption when there is one

5. FORMULAS
   - Put every display formula on its own lines between $$ and $$
   - Use LaTeX; inline math stays inside the sentence as $...$

6. IGNORE
   - Page numbers, running headers and footers, decorative lines

7. OUTPUT
   - Output ONLY the Markdown content
   - Do NOT wrap it in ```markdown fences
   - Do NOT add commentary"#;

/// Reading hint listing the expected OCR languages.
pub fn ocr_language_hint(languages: &[OcrLanguage]) -> Option<String> {
    if languages.is_empty() {
        return None;
    }
    let names: Vec<&str> = languages.iter().map(OcrLanguage::name).collect();
    Some(format!(
        "The page is most likely written in: {}.",
        names.join(", ")
    ))
}

pub const CAPTION_PROMPT: &str = "You describe figures from documents. \
Answer with ONE factual English sentence describing what the figure shows. \
No preamble, no markdown.";

/// User text sent alongside a figure image (or alone, when only a caption exists).
pub fn caption_request(existing_caption: Option<&str>, has_image: bool) -> String {
    match (existing_caption, has_image) {
        (Some(c), true) => format!(
            "The image is a document page containing a figure captioned \"{}\". Describe that figure.",
            c
        ),
        (None, true) => "Describe the figure in this image.".to_string(),
        (Some(c), false) => format!(
            "A document figure is captioned \"{}\". Describe what it most likely shows.",
            c
        ),
        (None, false) => "Describe the figure.".to_string(),
    }
}

pub fn translation_prompt(from: DescriptionLanguage, to: DescriptionLanguage) -> String {
    format!(
        "Translate the user's text from {} to {}. \
         Output only the translation, without quotes or commentary.",
        from.name(),
        to.name()
    )
}

pub fn formula_prompt(formula_type: FormulaType, language: DescriptionLanguage) -> String {
    format!(
        "You explain mathematical formulas. The user sends a LaTeX formula \
         classified as {}. Describe what it expresses in ONE short {} sentence. \
         Output only that sentence.",
        formula_type.as_str(),
        language.name()
    )
}
