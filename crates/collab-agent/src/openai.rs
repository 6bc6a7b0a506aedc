use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::persona::PersonaDescriptor;
use crate::provider::{ChatContext, ContextRole, GenerationParams, LlmProvider, ProviderChunk, ProviderError};
use crate::stream::{parse_sse_line, SseParsed};

/// OpenAI-compatible adapter — covers OpenAI itself and any self-hosted or
/// third-party endpoint speaking the same `/v1/chat/completions` wire format
/// (base URL override is all a local Ollama-compatible or vendor-compatible
/// endpoint needs).
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_path: String,
    provider_name: String,
    model: String,
    persona: PersonaDescriptor,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        persona: PersonaDescriptor,
    ) -> Self {
        Self::with_path(
            "openai",
            api_key,
            base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
            "/v1/chat/completions".to_string(),
            model,
            persona,
        )
    }

    pub fn with_path(
        name: impl Into<String>,
        api_key: String,
        base_url: String,
        chat_path: String,
        model: String,
        persona: PersonaDescriptor,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider_name: name.into(),
            api_key,
            base_url,
            chat_path,
            model,
            persona,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
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
        let url = format!("{}{}", self.base_url, self.chat_path);

        debug!(model = %self.model, provider = %self.provider_name, "sending request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI-compatible API error");
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
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn stream(
        &self,
        ctx: &ChatContext,
        params: &GenerationParams,
        tx: mpsc::Sender<ProviderChunk>,
    ) -> Result<(), ProviderError> {
        let body = build_request_body(&self.model, &self.persona.prompt_prefix, ctx, params, true);
        let url = format!("{}{}", self.base_url, self.chat_path);

        debug!(model = %self.model, provider = %self.provider_name, "sending streaming request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "OpenAI-compatible streaming API error");
            let _ = tx.send(ProviderChunk::Err(text.clone())).await;
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        process_openai_stream(resp, tx).await;
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
    let mut messages = Vec::with_capacity(ctx.len() + 1);
    if !prompt_prefix.is_empty() {
        messages.push(serde_json::json!({"role": "system", "content": prompt_prefix}));
    }
    for m in ctx {
        let role = match m.role {
            ContextRole::System => "system",
            ContextRole::User => "user",
            ContextRole::Assistant => "assistant",
        };
        messages.push(serde_json::json!({"role": role, "content": m.content}));
    }

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "temperature": params.temperature,
        "stream": stream,
    });
    if let Some(max_tokens) = params.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    body
}

/// OpenAI SSE format is standard `event`/`data` lines; `data: [DONE]` ends the
/// stream. Line buffering handles partial lines split across HTTP chunks.
async fn process_openai_stream(resp: reqwest::Response, tx: mpsc::Sender<ProviderChunk>) {
    use futures_util::StreamExt;

    let mut line_buf = String::new();
    let mut byte_stream = resp.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(ProviderChunk::Err(e.to_string())).await;
                return;
            }
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(_) => continue,
        };

        line_buf.push_str(text);
        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, remainder) = lines.split_at(lines.len() - 1);
        let remainder = remainder.first().unwrap_or(&"").to_string();

        for line in complete {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(SseParsed::Data(data)) = parse_sse_line(line) {
                if data.trim() == "[DONE]" {
                    line_buf = remainder;
                    let _ = tx.send(ProviderChunk::End).await;
                    return;
                }

                if let Ok(chunk_resp) = serde_json::from_str::<StreamChunk>(&data) {
                    for choice in &chunk_resp.choices {
                        if let Some(content) = &choice.delta.content {
                            if !content.is_empty() {
                                debug!(len = content.len(), "openai stream text delta");
                                if tx
                                    .send(ProviderChunk::Data(content.clone()))
                                    .await
                                    .is_err()
                                {
                                    return; // receiver dropped
                                }
                            }
                        }
                    }
                }
            }
        }

        line_buf = remainder;
    }

    let _ = tx.send(ProviderChunk::End).await;
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
