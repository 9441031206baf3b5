//! Merge rendered content, analyzer reports and metadata into one result.
//!
//! Pure and synchronous: no I/O, no collaborator calls.

use crate::config::RequestOptions;
use crate::error::ErrorKind;
use crate::model::{
    heading_level, strip_math_delimiters, DocumentFormat, Element, ElementBody, SourceKind, SourceSpec,
};
use crate::output::{
    ConversionResult, DocumentStructure, EnrichmentGap, FeatureTag, FigureEntry, FormulaEntry,
    HeadingEntry, ListEntry, ProcessingMetadata, TableEntry,
};
use crate::pipeline::enrich::{AnalyzerOutput, EnrichmentOutcome};
use std::time::Duration;

/// Everything the aggregator needs for one document.
pub struct AggregateInput<'a> {
    pub spec: &'a SourceSpec,
    pub format: DocumentFormat,
    pub options: &'a RequestOptions,
    pub body: &'a ElementBody,
    pub content: String,
    pub outcome: EnrichmentOutcome,
    pub elapsed: Duration,
}

/// Positions of every structural element, in reading order.
pub fn document_structure(body: &ElementBody) -> DocumentStructure {
    let mut s = DocumentStructure::default();
    for (index, element) in body.elements.iter().enumerate() {
        match element {
            Element::Heading { level, text } => s.headings.push(HeadingEntry {
                index,
                text: text.clone(),
                level: heading_level(*level),
            }),
            Element::ListItem { text, depth } => s.lists.push(ListEntry {
                index,
                text: text.clone(),
                depth: *depth,
            }),
            Element::Figure { image_ref, caption } => s.figures.push(FigureEntry {
                index,
                image_ref: image_ref.clone(),
                caption: caption.clone(),
            }),
            Element::Table(grid) => s.tables.push(TableEntry {
                index,
                rows: grid.rows(),
                cols: grid.cols(),
            }),
            Element::Formula { raw_text, .. } => s.formulas.push(FormulaEntry {
                index,
                text: strip_math_delimiters(raw_text).to_string(),
            }),
            Element::Paragraph { .. } => {}
        }
    }
    s
}

pub fn aggregate(input: AggregateInput<'_>) -> ConversionResult {
    let AggregateInput {
        spec,
        format,
        options,
        body,
        content,
        outcome,
        elapsed,
    } = input;

    let mut result = ConversionResult {
        content,
        output_format: options.output_format,
        source: spec.kind,
        source_url: None,
        filename: None,
        enhanced_features: Vec::new(),
        image_descriptions: None,
        formula_enrichments: None,
        table_analysis: None,
        content_enhancement: None,
        enrichment_gaps: Vec::new(),
        document_structure: document_structure(body),
        metadata: ProcessingMetadata {
            file_path: spec.display_name(),
            processing_time: elapsed.as_secs_f64(),
            features_used: Vec::new(),
            format,
            element_count: body.len(),
            ocr_languages: options.ocr_languages.clone(),
        },
    };
    match spec.kind {
        SourceKind::Url => result.source_url = Some(spec.locator_or_payload.clone()),
        SourceKind::Inline => result.filename = spec.declared_filename.clone(),
    }

    let mut features = Vec::with_capacity(outcome.reports.len() + 1);
    for report in outcome.reports {
        let feature = report.output.feature();
        features.push(feature);
        result
            .enrichment_gaps
            .extend(report.gaps.into_iter().map(|gap| {
                debug_assert!(gap.index() < body.len());
                EnrichmentGap {
                    feature,
                    index: gap.index(),
                    kind: ErrorKind::EnrichmentPartialFailure,
                    message: gap.to_string(),
                }
            }));
        match report.output {
            AnalyzerOutput::ImageDescriptions(list) => result.image_descriptions = Some(list),
            AnalyzerOutput::FormulaEnrichments(list) => result.formula_enrichments = Some(list),
            AnalyzerOutput::TableAnalysis(list) => result.table_analysis = Some(list),
            AnalyzerOutput::ContentEnhancement(c) => result.content_enhancement = Some(c),
        }
    }
    features.push(FeatureTag::StructureAnalysis);
    features.sort();
    features.dedup();

    result.enhanced_features = features.clone();
    result.metadata.features_used = features;
    result
}
