//! LLM provider resolution, from most to least specific.
//!
//! 1. a pre-built provider on the config (shared by every model role),
//! 2. `provider_name` from the config with the role's model,
//! 3. `DOCENRICH_LLM_PROVIDER` (+ optional `DOCENRICH_MODEL` override),
//! 4. `OPENAI_API_KEY` present → OpenAI with the role's model,
//! 5. [`ProviderFactory::from_env`] auto-detection.

use crate::config::PipelineConfig;
use crate::error::EnrichError;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Provider to use for `model`.
pub fn resolve_provider(
    config: &PipelineConfig,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, EnrichError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let Ok(name) = std::env::var("DOCENRICH_LLM_PROVIDER") {
        if !name.is_empty() {
            let model = std::env::var("DOCENRICH_MODEL")
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| model.to_string());
            return create_provider(&name, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| EnrichError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or DOCENRICH_LLM_PROVIDER.\n\
                 Error: {}",
                e
            ),
        })?;
    Ok(llm_provider)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, EnrichError> {
    debug!("Creating LLM provider {} ({})", name, model);
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        EnrichError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}
