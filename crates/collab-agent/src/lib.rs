//! C1 Provider Adapter — uniform `complete`/`stream` surface over the
//! concrete wire formats each backend speaks.

pub mod anthropic;
pub mod anthropic_stream;
pub mod google;
pub mod ollama;
pub mod openai;
pub mod persona;
pub mod provider;
pub mod registry;
pub mod stream;

pub use persona::PersonaDescriptor;
pub use provider::{
    prime_with_persona_as_user_turn, ChatContext, ContextMessage, ContextRole, GenerationParams,
    LlmProvider, ProviderChunk, ProviderError,
};
pub use registry::{lookup, KnownModel, ProviderKind, KNOWN_MODELS};

use std::sync::Arc;

/// Construct a boxed adapter for a known model id, using the credentials in
/// `providers`. Returns `None` if the model is unknown or its provider has no
/// credentials configured (mirrors the Python original's `ModelFactory`).
pub fn build_provider(
    model_id: &str,
    providers: &collab_core::config::ProvidersConfig,
) -> Option<Arc<dyn LlmProvider>> {
    let known = registry::lookup(model_id)?;
    let persona = known.persona();

    let provider: Arc<dyn LlmProvider> = match known.provider {
        ProviderKind::Anthropic => {
            let cfg = providers.anthropic.as_ref()?;
            Arc::new(anthropic::AnthropicProvider::new(
                cfg.api_key.clone(),
                Some(cfg.base_url.clone()),
                known.native_model.to_string(),
                persona,
            ))
        }
        ProviderKind::OpenAi => {
            let cfg = providers.openai.as_ref()?;
            Arc::new(openai::OpenAiProvider::new(
                cfg.api_key.clone(),
                Some(cfg.base_url.clone()),
                known.native_model.to_string(),
                persona,
            ))
        }
        ProviderKind::Google => {
            let cfg = providers.google.as_ref()?;
            Arc::new(google::GoogleProvider::new(
                cfg.api_key.clone(),
                Some(cfg.base_url.clone()),
                known.native_model.to_string(),
                persona,
            ))
        }
        ProviderKind::Ollama => {
            let cfg = providers.ollama.as_ref()?;
            Arc::new(ollama::OllamaProvider::new(
                Some(cfg.base_url.clone()),
                known.native_model.to_string(),
                persona,
            ))
        }
    };

    Some(provider)
}
