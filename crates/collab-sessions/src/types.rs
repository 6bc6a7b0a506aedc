use serde::{Deserialize, Serialize};

use collab_agent::PersonaDescriptor;
use collab_core::types::{PanelistId, PanelistState, SessionId};

/// One entry of a `createSession` request's panelist list — accepts either a
/// bare model identifier, a catalog persona id, or a fully custom persona
/// supplied inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelistSpec {
    pub model_id: String,
    #[serde(default)]
    pub persona_id: Option<String>,
    #[serde(default)]
    pub custom_persona: Option<PersonaDescriptor>,
}

/// Body of `POST /api/sessions/create` (and its `/api/chat/sessions/create`
/// alias). Exactly one of `selected_models` (legacy, backward-compatible) or
/// `panelists` (current) must be present and non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateSessionRequest {
    pub mission: String,
    #[serde(default)]
    pub selected_models: Option<Vec<String>>,
    #[serde(default)]
    pub panelists: Option<Vec<PanelistSpec>>,
}

/// A panelist resolved to a concrete model + persona, ready to back a C1
/// adapter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPanelist {
    pub id: PanelistId,
    pub model_id: String,
    pub persona: PersonaDescriptor,
    #[serde(default)]
    pub state: PanelistState,
}

/// The persisted session shell C7 stores under `session:<id>` — panelists,
/// mission, timestamps, and the active flag. Does not carry the
/// conversation log; that's C4's snapshot, stored separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub mission: String,
    pub panelists: Vec<ResolvedPanelist>,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn new(mission: String, panelists: Vec<ResolvedPanelist>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: SessionId::new(),
            mission,
            panelists,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
