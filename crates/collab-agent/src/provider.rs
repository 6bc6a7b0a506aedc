use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::persona::PersonaDescriptor;

/// One turn in a chat-style context, uniform across all backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: ContextRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextRole {
    System,
    User,
    Assistant,
}

/// Ordered chat-style context handed to an adapter.
pub type ChatContext = Vec<ContextMessage>;

/// Generation parameters. `max_tokens` is optional — omitting it defers to
/// the provider's own default.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// A single unit pulled from an adapter's lazy stream. Adapters return these
/// instead of raising mid-stream, so a channel consumer sees every failure as
/// an ordinary value rather than an unwind it has to catch.
#[derive(Debug, Clone)]
pub enum ProviderChunk {
    /// Incremental text content from the model.
    Data(String),
    /// Stream completed successfully.
    End,
    /// Upstream failure. The orchestrator treats this exactly like a raised
    /// error from `stream()`/`complete()` — adapters choose whichever is more
    /// natural for their transport.
    Err(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Uniform streaming interface over one remote generator (C1).
///
/// Each adapter translates `ChatContext` into its backend's native request
/// shape: emitting the persona prefix as a system turn (or, where the backend
/// disallows system turns, as a leading user turn followed by a priming
/// assistant acknowledgment), and filtering out roles its backend can't
/// ingest. Upstream failures surface as a terminal `"[Error: <msg>]"` chunk
/// rather than propagating raw — timeouts and retries are the orchestrator's
/// job, not the adapter's.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Model identifier this adapter instance talks to.
    fn model_name(&self) -> &str;

    fn persona(&self) -> &PersonaDescriptor;

    /// Estimate the token count of a string. May be a real tokenizer or a
    /// ~4-chars-per-token heuristic — exactness is explicitly out of scope.
    fn estimate_tokens(&self, text: &str) -> u32 {
        ((text.chars().count() as f32) / 4.0).ceil() as u32
    }

    /// Full, non-streaming completion.
    async fn complete(
        &self,
        ctx: &ChatContext,
        params: &GenerationParams,
    ) -> Result<String, ProviderError>;

    /// Stream a response through `tx`. Default implementation falls back to
    /// `complete` and emits it as a single chunk — adapters with a native
    /// streaming wire format override this.
    async fn stream(
        &self,
        ctx: &ChatContext,
        params: &GenerationParams,
        tx: mpsc::Sender<ProviderChunk>,
    ) -> Result<(), ProviderError> {
        match self.complete(ctx, params).await {
            Ok(text) => {
                let _ = tx.send(ProviderChunk::Data(text)).await;
                let _ = tx.send(ProviderChunk::End).await;
                Ok(())
            }
            Err(e) => {
                let _ = tx.send(ProviderChunk::Err(e.to_string())).await;
                Err(e)
            }
        }
    }
}

/// Prepend a persona prefix to a context as a system turn, or — when the
/// backend disallows system turns — as a leading user turn plus a priming
/// assistant acknowledgment. Shared by adapters whose wire format needs the
/// fallback shape (see `crate::google`).
pub fn prime_with_persona_as_user_turn(prefix: &str, ctx: &ChatContext) -> ChatContext {
    if prefix.is_empty() {
        return ctx.clone();
    }
    let mut out = Vec::with_capacity(ctx.len() + 2);
    out.push(ContextMessage {
        role: ContextRole::User,
        content: prefix.to_string(),
    });
    out.push(ContextMessage {
        role: ContextRole::Assistant,
        content: "Understood.".to_string(),
    });
    out.extend(ctx.iter().filter(|m| m.role != ContextRole::System).cloned());
    out
}
