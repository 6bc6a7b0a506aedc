use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::persona::PersonaDescriptor;
use crate::provider::{ChatContext, ContextRole, GenerationParams, LlmProvider, ProviderChunk, ProviderError};

/// Local Ollama endpoint. Same messages-array shape as OpenAI, but Ollama's
/// streaming wire format is newline-delimited JSON rather than SSE.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    persona: PersonaDescriptor,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>, model: String, persona: PersonaDescriptor) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            model,
            persona,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
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
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %self.model, "sending request to Ollama");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(e.to_string())
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(api_resp.message.content)
    }

    async fn stream(
        &self,
        ctx: &ChatContext,
        params: &GenerationParams,
        tx: mpsc::Sender<ProviderChunk>,
    ) -> Result<(), ProviderError> {
        let body = build_request_body(&self.model, &self.persona.prompt_prefix, ctx, params, true);
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %self.model, "sending streaming request to Ollama");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(e.to_string())
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama streaming API error");
            let _ = tx.send(ProviderChunk::Err(text.clone())).await;
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        process_ollama_stream(resp, tx).await;
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

    serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": stream,
        "options": {
            "temperature": params.temperature,
            "num_predict": params.max_tokens,
        },
    })
}

/// Ollama's streaming format is newline-delimited JSON, one object per line —
/// not SSE. Each chunk carries `done: false` until the final one.
async fn process_ollama_stream(resp: reqwest::Response, tx: mpsc::Sender<ProviderChunk>) {
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

            match serde_json::from_str::<StreamChunk>(line) {
                Ok(chunk_data) => {
                    if chunk_data.done {
                        line_buf = remainder;
                        let _ = tx.send(ProviderChunk::End).await;
                        return;
                    }
                    let text = chunk_data.message.content;
                    if !text.is_empty() {
                        debug!(len = text.len(), "ollama stream text delta");
                        if tx.send(ProviderChunk::Data(text)).await.is_err() {
                            return; // receiver dropped
                        }
                    }
                }
                Err(e) => {
                    warn!(line, err = %e, "failed to parse Ollama stream chunk");
                }
            }
        }

        line_buf = remainder;
    }

    let _ = tx.send(ProviderChunk::End).await;
}

#[derive(Deserialize)]
struct ApiResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    message: OllamaMessage,
    done: bool,
}
