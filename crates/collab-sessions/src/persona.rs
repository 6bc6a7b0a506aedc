//! Persona catalog — a map keyed by persona id, loaded once at startup from
//! a TOML file (default `personas.toml`), the same way `CollabConfig` layers
//! its own config. Resolution order for one panelist spec: an inline
//! custom persona wins, then a catalog lookup by `persona_id`, then the
//! model's own catalog default (bare model identifier).

use std::collections::HashMap;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use collab_agent::PersonaDescriptor;

use crate::error::{Result, SessionError};
use crate::types::PanelistSpec;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonaCatalog {
    #[serde(default)]
    pub personas: HashMap<String, PersonaDescriptor>,
}

impl PersonaCatalog {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path.unwrap_or("personas.toml");
        if !std::path::Path::new(path).exists() {
            return Ok(Self::default());
        }
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("COLLAB_PERSONA_").split("_"))
            .extract()
            .map_err(|e| SessionError::InvalidRequest(format!("failed to load persona catalog: {e}")))
    }

    pub fn get(&self, id: &str) -> Option<&PersonaDescriptor> {
        self.personas.get(id)
    }
}

/// Resolve one panelist spec to a concrete persona: custom-supplied,
/// default-by-id, or bare-model-identifier, in that order.
pub fn resolve_persona(spec: &PanelistSpec, catalog: &PersonaCatalog) -> PersonaDescriptor {
    if let Some(custom) = &spec.custom_persona {
        return custom.clone();
    }
    if let Some(persona_id) = &spec.persona_id {
        if let Some(found) = catalog.get(persona_id) {
            return found.clone();
        }
    }
    collab_agent::registry::lookup(&spec.model_id)
        .map(|known| known.persona())
        .unwrap_or_else(|| PersonaDescriptor::generic(&spec.model_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_persona_takes_precedence() {
        let spec = PanelistSpec {
            model_id: "gpt-4o".to_string(),
            persona_id: Some("strategist".to_string()),
            custom_persona: Some(PersonaDescriptor::generic("custom")),
        };
        let resolved = resolve_persona(&spec, &PersonaCatalog::default());
        assert_eq!(resolved.role, "custom");
    }

    #[test]
    fn bare_model_identifier_falls_back_to_known_catalog_default() {
        let spec = PanelistSpec {
            model_id: "gpt-4o".to_string(),
            persona_id: None,
            custom_persona: None,
        };
        let resolved = resolve_persona(&spec, &PersonaCatalog::default());
        assert_eq!(resolved.role, "Strategist");
    }

    #[test]
    fn unknown_model_gets_generic_persona() {
        let spec = PanelistSpec {
            model_id: "ghost-1".to_string(),
            persona_id: None,
            custom_persona: None,
        };
        let resolved = resolve_persona(&spec, &PersonaCatalog::default());
        assert_eq!(resolved.role, "ghost-1");
    }
}
