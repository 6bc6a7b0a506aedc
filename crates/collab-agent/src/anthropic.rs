use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::persona::PersonaDescriptor;
use crate::provider::{ChatContext, ContextRole, GenerationParams, LlmProvider, ProviderChunk, ProviderError};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    persona: PersonaDescriptor,
}

impl AnthropicProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: String, persona: PersonaDescriptor) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model,
            persona,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
        let body = build_request_body(&self.model, &self.persona.prompt_prefix, ctx, params, false);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %self.model, "sending request to Anthropic");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic API error");
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
            .content
            .into_iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Unknown => None,
            })
            .collect())
    }

    async fn stream(
        &self,
        ctx: &ChatContext,
        params: &GenerationParams,
        tx: mpsc::Sender<ProviderChunk>,
    ) -> Result<(), ProviderError> {
        let body = build_request_body(&self.model, &self.persona.prompt_prefix, ctx, params, true);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %self.model, "sending streaming request to Anthropic");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic streaming API error");
            let _ = tx.send(ProviderChunk::Err(text.clone())).await;
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        crate::anthropic_stream::process_stream(resp, tx).await;
        Ok(())
    }
}

fn build_request_body(
    model: &str,
    prompt_prefix: &str,
    ctx: &ChatContext,
    params: &GenerationParams,
    stream: bool,
) -> serde_json::Value {
    // Anthropic supports a native system turn; the persona prefix, and any
    // system-role turns already in the context, are merged into it. Every
    // other role maps straight through.
    let mut system_parts = Vec::new();
    if !prompt_prefix.is_empty() {
        system_parts.push(prompt_prefix.to_string());
    }
    let messages: Vec<serde_json::Value> = ctx
        .iter()
        .filter_map(|m| match m.role {
            ContextRole::System => {
                system_parts.push(m.content.clone());
                None
            }
            ContextRole::User => Some(serde_json::json!({"role": "user", "content": m.content})),
            ContextRole::Assistant => {
                Some(serde_json::json!({"role": "assistant", "content": m.content}))
            }
        })
        .collect();

    serde_json::json!({
        "model": model,
        "max_tokens": params.max_tokens.unwrap_or(4096),
        "temperature": params.temperature,
        "system": system_parts.join("\n\n"),
        "messages": messages,
        "stream": stream,
    })
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unknown,
}
