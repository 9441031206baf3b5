//! LLM-backed enrichment collaborators.

use super::encode::to_image_data;
use super::llm::{chat_with_retry, CallPolicy};
use crate::error::BoxError;
use crate::model::DescriptionLanguage;
use crate::output::FormulaType;
use crate::pipeline::enrich::{FigureInput, FormulaDescriber, ImageCaptioner, Translator};
use crate::prompts::{caption_request, formula_prompt, translation_prompt, CAPTION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use std::sync::Arc;

/// Captions are single sentences.
const SHORT_ANSWER_TOKENS: usize = 256;

/// Strip wrapping quotes and whitespace the model sometimes adds.
fn tidy(answer: &str) -> String {
    answer
        .trim()
        .trim_matches(|c| c == '"' || c == '\u{201C}' || c == '\u{201D}')
        .trim()
        .to_string()
}

fn non_empty(answer: String, what: &str) -> Result<String, BoxError> {
    if answer.is_empty() {
        return Err(format!("model returned an empty {}", what).into());
    }
    Ok(answer)
}

pub struct LlmCaptioner {
    provider: Arc<dyn LLMProvider>,
    model: String,
    policy: CallPolicy,
}

impl LlmCaptioner {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>, policy: CallPolicy) -> Self {
        Self {
            provider,
            model: model.into(),
            policy: policy.with_max_tokens(SHORT_ANSWER_TOKENS),
        }
    }
}

#[async_trait]
impl ImageCaptioner for LlmCaptioner {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn caption(&self, figure: FigureInput<'_>) -> Result<String, BoxError> {
        let request = caption_request(figure.caption, figure.image.is_some());
        let user = match figure.image {
            Some(image) => ChatMessage::user_with_images(request, vec![to_image_data(image)]),
            None => ChatMessage::user(request),
        };
        let messages = vec![ChatMessage::system(CAPTION_PROMPT), user];
        let label = format!("caption figure {}", figure.index);
        let reply = chat_with_retry(&self.provider, &messages, &self.policy, &label).await?;
        non_empty(tidy(&reply.content), "caption")
    }
}

pub struct LlmTranslator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    policy: CallPolicy,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>, policy: CallPolicy) -> Self {
        Self {
            provider,
            model: model.into(),
            policy: policy.with_max_tokens(SHORT_ANSWER_TOKENS),
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn translate(
        &self,
        text: &str,
        from: DescriptionLanguage,
        to: DescriptionLanguage,
    ) -> Result<String, BoxError> {
        if from == to || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        let messages = vec![
            ChatMessage::system(translation_prompt(from, to)),
            ChatMessage::user(text),
        ];
        let label = format!("translate {}→{}", from.code(), to.code());
        let reply = chat_with_retry(&self.provider, &messages, &self.policy, &label).await?;
        non_empty(tidy(&reply.content), "translation")
    }
}

pub struct LlmFormulaDescriber {
    provider: Arc<dyn LLMProvider>,
    model: String,
    policy: CallPolicy,
}

impl LlmFormulaDescriber {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>, policy: CallPolicy) -> Self {
        Self {
            provider,
            model: model.into(),
            policy: policy.with_max_tokens(SHORT_ANSWER_TOKENS),
        }
    }
}

#[async_trait]
impl FormulaDescriber for LlmFormulaDescriber {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn describe(
        &self,
        latex: &str,
        formula_type: FormulaType,
        language: DescriptionLanguage,
    ) -> Result<String, BoxError> {
        let messages = vec![
            ChatMessage::system(formula_prompt(formula_type, language)),
            ChatMessage::user(latex),
        ];
        let label = format!("describe formula ({})", language.code());
        let reply = chat_with_retry(&self.provider, &messages, &self.policy, &label).await?;
        non_empty(tidy(&reply.content), "formula description")
    }
}
