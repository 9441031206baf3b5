//! Formula classification, canonical LaTeX and bilingual descriptions.

use super::{call_with_timeout, AnalyzerOutput, AnalyzerReport, FormulaDescriber};
use crate::error::{BoxError, ElementError};
use crate::model::{DescriptionLanguage, Element, ElementBody};
use crate::output::{FormulaEnrichment, FormulaType};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Classify a formula by the first matching marker.
///
/// Precedence: `+`/`-` → arithmetic, `=` → equation, `^`/`**` → exponential.
/// So `a + b = c` is arithmetic, not an equation.
pub fn classify(raw: &str) -> FormulaType {
    if raw.contains('+') || raw.contains('-') {
        FormulaType::Arithmetic
    } else if raw.contains('=') {
        FormulaType::Equation
    } else if raw.contains('^') || raw.contains("**") {
        FormulaType::Exponential
    } else {
        FormulaType::Other
    }
}

/// Strip math delimiters, collapse whitespace and wrap in `$…$`.
pub fn canonical_latex(raw: &str) -> String {
    let mut body = raw.to_string();
    for delimiter in ["\\[", "\\]", "\\(", "\\)", "$"] {
        body = body.replace(delimiter, "");
    }
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("${}$", collapsed)
}

/// Fixed bilingual text per formula type. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFormulaDescriber;

impl TemplateFormulaDescriber {
    pub fn text(formula_type: FormulaType, language: DescriptionLanguage) -> &'static str {
        use DescriptionLanguage::{En, Fr};
        match (formula_type, language) {
            (FormulaType::Arithmetic, Fr) => "Opération arithmétique",
            (FormulaType::Arithmetic, En) => "Arithmetic operation",
            (FormulaType::Equation, Fr) => "Équation mathématique",
            (FormulaType::Equation, En) => "Mathematical equation",
            (FormulaType::Exponential, Fr) => "Expression exponentielle",
            (FormulaType::Exponential, En) => "Exponential expression",
            (FormulaType::Other, Fr) => "Expression mathématique",
            (FormulaType::Other, En) => "Mathematical expression",
        }
    }
}

#[async_trait]
impl FormulaDescriber for TemplateFormulaDescriber {
    fn model_id(&self) -> &str {
        "template"
    }

    async fn describe(
        &self,
        _latex: &str,
        formula_type: FormulaType,
        language: DescriptionLanguage,
    ) -> Result<String, BoxError> {
        Ok(Self::text(formula_type, language).to_string())
    }
}

/// Enrich every formula of `body`, in element order.
pub async fn enrich_formulas(
    body: &ElementBody,
    describer: &dyn FormulaDescriber,
    budget: Duration,
) -> AnalyzerReport {
    let mut enrichments = Vec::new();
    let mut gaps = Vec::new();

    for (index, element) in body.elements.iter().enumerate() {
        let Element::Formula { raw_text, span } = element else {
            continue;
        };
        let formula_type = classify(raw_text);
        let canonical = canonical_latex(raw_text);

        let described = describe_both(index, &canonical, formula_type, describer, budget).await;
        match described {
            Ok((description_fr, description_en)) => enrichments.push(FormulaEnrichment {
                index,
                original: raw_text.clone(),
                formula_type,
                description_fr,
                description_en,
                canonical_latex: canonical,
                position: *span,
            }),
            Err(gap) => gaps.push(gap),
        }
    }

    debug!("Enriched {} formula(s)", enrichments.len());
    AnalyzerReport {
        output: AnalyzerOutput::FormulaEnrichments(enrichments),
        gaps,
    }
}

async fn describe_both(
    index: usize,
    latex: &str,
    formula_type: FormulaType,
    describer: &dyn FormulaDescriber,
    budget: Duration,
) -> Result<(String, String), ElementError> {
    let fr = call_with_timeout(
        index,
        describer.model_id(),
        budget,
        describer.describe(latex, formula_type, DescriptionLanguage::Fr),
    )
    .await?;
    let en = call_with_timeout(
        index,
        describer.model_id(),
        budget,
        describer.describe(latex, formula_type, DescriptionLanguage::En),
    )
    .await?;
    Ok((fr.trim().to_string(), en.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;

    #[test]
    fn classification_precedence() {
        assert_eq!(classify("a + b = c"), FormulaType::Arithmetic);
        assert_eq!(classify("x = y"), FormulaType::Equation);
        assert_eq!(classify("x^2"), FormulaType::Exponential);
        assert_eq!(classify("x ** 2"), FormulaType::Exponential);
        assert_eq!(classify("\\sqrt{x}"), FormulaType::Other);
        assert_eq!(classify("e^{-x}"), FormulaType::Arithmetic);
    }

    #[test]
    fn canonical_form() {
        assert_eq!(canonical_latex("$$ E =\n  mc^2 $$"), "$E = mc^2$");
        assert_eq!(canonical_latex("\\[ a+b \\]"), "$a+b$");
        assert_eq!(canonical_latex("x"), "$x$");
    }

    #[test]
    fn template_texts_are_bilingual() {
        assert_eq!(
            TemplateFormulaDescriber::text(FormulaType::Equation, DescriptionLanguage::Fr),
            "Équation mathématique"
        );
        assert_eq!(
            TemplateFormulaDescriber::text(FormulaType::Other, DescriptionLanguage::En),
            "Mathematical expression"
        );
    }

    struct FailingDescriber;

    #[async_trait]
    impl FormulaDescriber for FailingDescriber {
        fn model_id(&self) -> &str {
            "failing"
        }

        async fn describe(
            &self,
            _latex: &str,
            _formula_type: FormulaType,
            _language: DescriptionLanguage,
        ) -> Result<String, BoxError> {
            Err("quota exceeded".into())
        }
    }

    fn body() -> ElementBody {
        ElementBody::new(vec![
            Element::paragraph("Intro"),
            Element::formula("$E = mc^2$", Span::new(10, 20)),
            Element::formula("$$x^2$$", Span::new(30, 37)),
        ])
    }

    #[tokio::test]
    async fn enrichment_records_index_and_position() {
        let report =
            enrich_formulas(&body(), &TemplateFormulaDescriber, Duration::from_secs(1)).await;
        let AnalyzerOutput::FormulaEnrichments(list) = report.output else {
            panic!("wrong output variant");
        };
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].index, 1);
        assert_eq!(list[0].formula_type, FormulaType::Equation);
        assert_eq!(list[0].canonical_latex, "$E = mc^2$");
        assert_eq!(list[0].position, Span::new(10, 20));
        assert_eq!(list[0].description_en, "Mathematical equation");
        assert_eq!(list[1].formula_type, FormulaType::Exponential);
        assert_eq!(list[1].description_fr, "Expression exponentielle");
        assert!(report.gaps.is_empty());
    }

    #[tokio::test]
    async fn describer_failure_becomes_gap() {
        let report = enrich_formulas(&body(), &FailingDescriber, Duration::from_secs(1)).await;
        let AnalyzerOutput::FormulaEnrichments(list) = report.output else {
            panic!("wrong output variant");
        };
        assert!(list.is_empty());
        assert_eq!(report.gaps.len(), 2);
        assert_eq!(report.gaps[0].index(), 1);
    }
}
