//! Known-model catalog — maps a model identifier to the provider kind and
//! native model name needed to construct a C1 adapter for it, plus whether
//! credentials are configured for that provider. Backs
//! `/api/panels/available-models`, `/api/panels/presets`, and
//! `/api/panels/validate`.

use crate::persona::PersonaDescriptor;
use collab_core::config::ProvidersConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Google,
    Ollama,
}

/// A single entry in the known-model catalog.
pub struct KnownModel {
    /// Identifier used in panelist/preset requests (e.g. "gpt-4o").
    pub id: &'static str,
    pub provider: ProviderKind,
    /// Native model name sent on the wire.
    pub native_model: &'static str,
    pub role: &'static str,
    pub icon: &'static str,
    pub collaboration_style: &'static str,
}

pub const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        id: "gpt-4o",
        provider: ProviderKind::OpenAi,
        native_model: "gpt-4-0125-preview",
        role: "Strategist",
        icon: "🧭",
        collaboration_style: "structured",
    },
    KnownModel {
        id: "gpt-3.5",
        provider: ProviderKind::OpenAi,
        native_model: "gpt-3.5-turbo-16k",
        role: "Summarizer",
        icon: "📝",
        collaboration_style: "analytical",
    },
    KnownModel {
        id: "claude-3.5",
        provider: ProviderKind::Anthropic,
        native_model: "claude-3-5-sonnet-20241022",
        role: "Synthesizer",
        icon: "🔗",
        collaboration_style: "integrative",
    },
    KnownModel {
        id: "claude-3",
        provider: ProviderKind::Anthropic,
        native_model: "claude-3-sonnet-20240229",
        role: "Analyst",
        icon: "🔍",
        collaboration_style: "analytical",
    },
    KnownModel {
        id: "gemini-1.5",
        provider: ProviderKind::Google,
        native_model: "gemini-1.5-pro",
        role: "Creative",
        icon: "✨",
        collaboration_style: "exploratory",
    },
    KnownModel {
        id: "gemini-2.0",
        provider: ProviderKind::Google,
        native_model: "gemini-2.0-flash",
        role: "Rapid Responder",
        icon: "⚡",
        collaboration_style: "concise",
    },
    KnownModel {
        id: "llama-local",
        provider: ProviderKind::Ollama,
        native_model: "llama3.3",
        role: "Generalist",
        icon: "🦙",
        collaboration_style: "balanced",
    },
];

pub fn lookup(id: &str) -> Option<&'static KnownModel> {
    KNOWN_MODELS.iter().find(|m| m.id == id)
}

impl KnownModel {
    pub fn persona(&self) -> PersonaDescriptor {
        PersonaDescriptor {
            role: self.role.to_string(),
            icon: self.icon.to_string(),
            prompt_prefix: format!(
                "You are the {} on this panel. Be {} in how you collaborate.",
                self.role, self.collaboration_style
            ),
            collaboration_style: self.collaboration_style.to_string(),
        }
    }

    /// Whether credentials for this model's provider are present in config.
    pub fn has_credentials(&self, providers: &ProvidersConfig) -> bool {
        match self.provider {
            ProviderKind::Anthropic => providers.anthropic.is_some(),
            ProviderKind::OpenAi => providers.openai.is_some(),
            ProviderKind::Google => providers.google.is_some(),
            ProviderKind::Ollama => providers.ollama.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_model_succeeds() {
        assert!(lookup("gpt-4o").is_some());
    }

    #[test]
    fn lookup_unknown_model_fails() {
        assert!(lookup("ghost-1").is_none());
    }
}
