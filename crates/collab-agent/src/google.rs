use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::persona::PersonaDescriptor;
use crate::provider::{
    prime_with_persona_as_user_turn, ChatContext, ContextRole, GenerationParams, LlmProvider,
    ProviderError,
};

/// Gemini's `contents` array only accepts `user`/`model` roles — there is no
/// system turn to target, so the persona prefix (and any system-role turns
/// already in the context) is folded in as a leading user turn plus a
/// priming assistant acknowledgment.
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    persona: PersonaDescriptor,
}

impl GoogleProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: String, persona: PersonaDescriptor) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            model,
            persona,
        }
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn persona(&self) -> &PersonaDescriptor {
        &self.persona
    }

    async fn complete(
        &self,
        ctx: &ChatContext,
        params: &GenerationParams,
    ) -> Result<String, ProviderError> {
        let primed = prime_with_persona_as_user_turn(&self.persona.prompt_prefix, ctx);
        let body = build_request_body(&primed, params);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        debug!(model = %self.model, "sending request to Google");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Google API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(api_resp
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }

    // No native streaming wire format grounded for this adapter — falls back
    // to the trait default (`complete` then a single chunk).
}

fn build_request_body(ctx: &ChatContext, params: &GenerationParams) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = ctx
        .iter()
        .map(|m| {
            let role = match m.role {
                ContextRole::Assistant => "model",
                _ => "user",
            };
            serde_json::json!({"role": role, "parts": [{"text": m.content}]})
        })
        .collect();

    let mut body = serde_json::json!({
        "contents": contents,
        "generationConfig": {
            "temperature": params.temperature,
        },
    });
    if let Some(max_tokens) = params.max_tokens {
        body["generationConfig"]["maxOutputTokens"] = serde_json::json!(max_tokens);
    }
    body
}

#[derive(Deserialize)]
struct ApiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}
