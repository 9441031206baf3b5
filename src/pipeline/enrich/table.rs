//! Templated table analysis: dimensions, header heuristic, numeric density.

use super::{AnalyzerOutput, AnalyzerReport};
use crate::error::ElementError;
use crate::model::{Element, ElementBody, TableGrid};
use crate::output::{TableAnalysis, TableType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Non-header cells at or above this numeric share make a data table.
const DATA_TABLE_THRESHOLD: f64 = 0.25;

/// Header cells longer than this on average read as body text.
const MAX_HEADER_CELL_LEN: f64 = 40.0;

static RE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+(]?[$€£¥]?\s*\d[\d\s.,']*\)?\s*(%|[$€£¥]|[kKmM])?$").unwrap()
});

pub fn is_numeric_cell(cell: &str) -> bool {
    let cell = cell.trim();
    !cell.is_empty() && RE_NUMERIC.is_match(cell)
}

/// Header presence: the converter's answer if it gave one, else a heuristic.
pub fn detect_headers(grid: &TableGrid) -> bool {
    if let Some(known) = grid.has_headers {
        return known;
    }
    if grid.rows() < 2 {
        return false;
    }
    let first = &grid.cells[0];
    if first.is_empty() || first.iter().any(|c| c.trim().is_empty()) {
        return false;
    }
    if first.iter().any(|c| is_numeric_cell(c)) {
        return false;
    }
    let avg_len =
        first.iter().map(|c| c.trim().chars().count()).sum::<usize>() as f64 / first.len() as f64;
    avg_len <= MAX_HEADER_CELL_LEN
}

/// Share of non-empty body cells that parse as numbers.
pub fn numeric_ratio(grid: &TableGrid, has_headers: bool) -> f64 {
    let skip = usize::from(has_headers);
    let (numeric, total) = grid
        .cells
        .iter()
        .skip(skip)
        .flatten()
        .filter(|c| !c.trim().is_empty())
        .fold((0usize, 0usize), |(n, t), c| {
            (n + usize::from(is_numeric_cell(c)), t + 1)
        });
    if total == 0 {
        0.0
    } else {
        numeric as f64 / total as f64
    }
}

pub fn analyze_table(index: usize, grid: &TableGrid) -> Result<TableAnalysis, ElementError> {
    let (rows, cols) = (grid.rows(), grid.cols());
    if rows == 0 || cols == 0 {
        return Err(ElementError::EmptyTable { index });
    }

    let has_headers = detect_headers(grid);
    let ratio = numeric_ratio(grid, has_headers);
    let table_type = if ratio >= DATA_TABLE_THRESHOLD {
        TableType::DataTable
    } else {
        TableType::LayoutTable
    };

    let (mut description_fr, mut description_en) = match table_type {
        TableType::DataTable => ("Tableau de données".to_string(), "Data table".to_string()),
        TableType::LayoutTable => (
            "Tableau de mise en page".to_string(),
            "Layout table".to_string(),
        ),
    };
    if has_headers {
        description_fr.push_str(" avec en-têtes");
        description_en.push_str(" with headers");
    }

    Ok(TableAnalysis {
        index,
        table_type,
        description_fr,
        description_en,
        rows,
        cols,
        has_headers,
        numeric_ratio: (ratio * 100.0).round() / 100.0,
        summary: format!("Tableau de {} lignes et {} colonnes", rows, cols),
        summary_en: format!("Table with {} rows and {} columns", rows, cols),
    })
}

/// Analyze every table of `body`, in element order.
pub fn analyze_tables(body: &ElementBody) -> AnalyzerReport {
    let mut analyses = Vec::new();
    let mut gaps = Vec::new();
    for (index, element) in body.elements.iter().enumerate() {
        if let Element::Table(grid) = element {
            match analyze_table(index, grid) {
                Ok(a) => analyses.push(a),
                Err(gap) => gaps.push(gap),
            }
        }
    }
    AnalyzerReport {
        output: AnalyzerOutput::TableAnalysis(analyses),
        gaps,
    }
}
