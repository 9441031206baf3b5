//! Document-level content analysis over the plain-text rendering.

use super::{AnalyzerOutput, AnalyzerReport};
use crate::model::{Element, ElementBody};
use crate::output::{ContentEnhancement, ContentStatistics, ContentType};
use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use once_cell::sync::Lazy;

/// Detection is skipped below this many alphabetic words.
const MIN_WORDS_FOR_DETECTION: usize = 3;

/// Only the head of long documents is fed to the detector.
const DETECTION_SAMPLE_CHARS: usize = 4000;

static DETECTOR: Lazy<LanguageDetector> = Lazy::new(|| {
    LanguageDetectorBuilder::from_languages(&[
        Language::French,
        Language::English,
        Language::German,
        Language::Spanish,
        Language::Italian,
        Language::Portuguese,
        Language::Dutch,
        Language::Russian,
        Language::Chinese,
        Language::Japanese,
        Language::Korean,
    ])
    .build()
});

fn iso_639_1(language: Language) -> &'static str {
    match language {
        Language::French => "fr",
        Language::English => "en",
        Language::German => "de",
        Language::Spanish => "es",
        Language::Italian => "it",
        Language::Portuguese => "pt",
        Language::Dutch => "nl",
        Language::Russian => "ru",
        Language::Chinese => "zh",
        Language::Japanese => "ja",
        Language::Korean => "ko",
        _ => "unknown",
    }
}

pub fn statistics(text: &str) -> ContentStatistics {
    ContentStatistics {
        word_count: text.split_whitespace().count(),
        character_count: text.chars().count(),
        line_count: text.lines().count(),
        paragraph_count: text.split("\n\n").filter(|p| !p.trim().is_empty()).count(),
    }
}

/// First match wins: formulas, then images, then tables.
pub fn content_type(body: &ElementBody) -> ContentType {
    if body.has_formulas() {
        ContentType::DocumentWithFormulas
    } else if body
        .elements
        .iter()
        .any(|e| matches!(e, Element::Figure { .. }))
    {
        ContentType::DocumentWithImages
    } else if body.has_tables() {
        ContentType::DocumentWithTables
    } else {
        ContentType::Document
    }
}

/// ISO 639-1 code of the dominant language, or `"unknown"`.
pub fn detect_language(text: &str) -> String {
    let words = text
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .count();
    // CJK text has few whitespace-separated words.
    let has_cjk = text.chars().any(is_cjk);
    if words < MIN_WORDS_FOR_DETECTION && !has_cjk {
        return "unknown".to_string();
    }
    let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
    DETECTOR
        .detect_language_of(sample)
        .map(iso_639_1)
        .unwrap_or("unknown")
        .to_string()
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF)
}

/// Flesch reading ease, clamped to 0–100 and rounded to two decimals.
pub fn readability(text: &str) -> f64 {
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphabetic))
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphabetic))
        .count()
        .max(1);
    let syllable_total: usize = words.iter().map(|w| syllables(w)).sum();

    let words_per_sentence = words.len() as f64 / sentences as f64;
    let syllables_per_word = syllable_total as f64 / words.len() as f64;
    let score = 206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word;
    (score.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

fn is_vowel(c: char) -> bool {
    matches!(
        c.to_lowercase().next().unwrap_or(c),
        'a' | 'e' | 'i' | 'o' | 'u' | 'y'
            | 'à' | 'â' | 'ä' | 'é' | 'è' | 'ê' | 'ë' | 'î' | 'ï' | 'ô' | 'ö' | 'ù' | 'û' | 'ü'
            | 'ÿ' | 'á' | 'í' | 'ó' | 'ú'
    )
}

/// Vowel groups, at least one per word.
fn syllables(word: &str) -> usize {
    let mut count = 0;
    let mut in_group = false;
    for c in word.chars().filter(|c| c.is_alphabetic()) {
        let vowel = is_vowel(c);
        if vowel && !in_group {
            count += 1;
        }
        in_group = vowel;
    }
    count.max(1)
}

pub fn enhance(body: &ElementBody, plain_text: &str) -> AnalyzerReport {
    AnalyzerReport {
        output: AnalyzerOutput::ContentEnhancement(ContentEnhancement {
            statistics: statistics(plain_text),
            content_type: content_type(body),
            language_detected: detect_language(plain_text),
            readability_score: readability(plain_text),
        }),
        gaps: Vec::new(),
    }
}
