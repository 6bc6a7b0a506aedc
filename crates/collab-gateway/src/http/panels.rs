//! Model catalog + preset discovery endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use collab_agent::registry::KNOWN_MODELS;

use crate::app::AppState;

#[derive(Serialize)]
struct ModelInfo {
    id: &'static str,
    provider: &'static str,
    role: &'static str,
    icon: &'static str,
    collaboration_style: &'static str,
}

fn provider_name(kind: collab_agent::ProviderKind) -> &'static str {
    use collab_agent::ProviderKind::*;
    match kind {
        Anthropic => "anthropic",
        OpenAi => "openai",
        Google => "google",
        Ollama => "ollama",
    }
}

fn available_model_ids(state: &AppState) -> Vec<&'static str> {
    KNOWN_MODELS
        .iter()
        .filter(|m| m.has_credentials(&state.config.providers))
        .map(|m| m.id)
        .collect()
}

/// GET /api/panels/available-models — models with available credentials.
pub async fn available_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let models: Vec<ModelInfo> = KNOWN_MODELS
        .iter()
        .filter(|m| m.has_credentials(&state.config.providers))
        .map(|m| ModelInfo {
            id: m.id,
            provider: provider_name(m.provider),
            role: m.role,
            icon: m.icon,
            collaboration_style: m.collaboration_style,
        })
        .collect();
    Json(json!({ "models": models }))
}

struct Preset {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    models: &'static [&'static str],
    icon: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        id: "balanced",
        name: "Balanced Panel",
        description: "A well-rounded team with strategic, creative, and analytical perspectives",
        models: &["gpt-4o", "claude-3.5", "gemini-1.5"],
        icon: "⚖️",
    },
    Preset {
        id: "creative",
        name: "Creative Think Tank",
        description: "Maximum innovation with creative and exploratory models",
        models: &["claude-3.5", "claude-3", "gemini-2.0"],
        icon: "🎨",
    },
    Preset {
        id: "analytical",
        name: "Data-Driven Team",
        description: "Deep analysis with strategic and evidence-based approaches",
        models: &["gpt-4o", "gpt-4", "gemini-1.5"],
        icon: "📊",
    },
    Preset {
        id: "full",
        name: "Full Expert Panel",
        description: "All available models for maximum perspective diversity",
        models: &["gpt-4o", "claude-3.5", "gemini-1.5", "gpt-4", "claude-3", "gemini-2.0"],
        icon: "🌟",
    },
];

/// GET /api/panels/presets — filtered to presets with ≥ 2 available models.
pub async fn presets(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let available = available_model_ids(&state);
    let filtered: Vec<_> = PRESETS
        .iter()
        .filter_map(|preset| {
            let available_in_preset: Vec<&str> = preset
                .models
                .iter()
                .filter(|m| available.contains(m))
                .copied()
                .collect();
            if available_in_preset.len() >= 2 {
                Some(json!({
                    "id": preset.id,
                    "name": preset.name,
                    "description": preset.description,
                    "icon": preset.icon,
                    "models": available_in_preset,
                    "available_count": available_in_preset.len(),
                }))
            } else {
                None
            }
        })
        .collect();
    Json(json!({ "presets": filtered }))
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub models: Vec<String>,
}

/// POST /api/panels/validate — 2 ≤ len(models) ≤ 6, all known and available.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ValidateRequest>,
) -> Json<serde_json::Value> {
    if request.models.len() < 2 {
        return Json(json!({ "valid": false, "reason": "At least 2 models required for collaboration" }));
    }
    if request.models.len() > 6 {
        return Json(json!({ "valid": false, "reason": "Maximum 6 models recommended for optimal performance" }));
    }

    let available = available_model_ids(&state);
    let invalid: Vec<&String> = request
        .models
        .iter()
        .filter(|m| !available.contains(&m.as_str()))
        .collect();

    if !invalid.is_empty() {
        let names: Vec<&str> = invalid.iter().map(|s| s.as_str()).collect();
        return Json(json!({
            "valid": false,
            "reason": format!("Invalid or unavailable models: {}", names.join(", ")),
        }));
    }

    Json(json!({ "valid": true, "message": "Panel configuration is valid" }))
}
