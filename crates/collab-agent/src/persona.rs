use serde::{Deserialize, Serialize};

/// Display + prompting facet of a panelist, independent of which provider
/// backs it. Loaded from the persona catalog (`collab-sessions::persona`) and
/// handed to the adapter at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaDescriptor {
    pub role: String,
    pub icon: String,
    pub prompt_prefix: String,
    pub collaboration_style: String,
}

impl PersonaDescriptor {
    pub fn generic(model_name: &str) -> Self {
        Self {
            role: model_name.to_string(),
            icon: "🤖".to_string(),
            prompt_prefix: String::new(),
            collaboration_style: "balanced".to_string(),
        }
    }
}
