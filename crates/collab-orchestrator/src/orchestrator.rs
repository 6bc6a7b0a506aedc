//! Streaming Orchestrator (C5) — fans one session's mission out to its
//! active participants, merges their partial outputs in arrival order, and
//! finalizes each completed or failed stream back into Group Memory.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use collab_agent::{ChatContext, ContextMessage, ContextRole, GenerationParams, LlmProvider, ProviderChunk};
use collab_core::types::{Author, MessageId, MessageKind, PanelistId};
use collab_memory::{ContextEntryRole, GroupMemory, Message};

/// Model-name prefix treated as "large-context" — these families get a
/// wider context budget than the rest.
const LARGE_CONTEXT_PREFIX: &str = "gpt-4";
const LARGE_CONTEXT_LIMIT: u32 = 8_000;
const DEFAULT_CONTEXT_LIMIT: u32 = 4_000;

/// Substring cues checked on the growing per-participant buffer to produce an
/// advisory `anchorMessageId` ahead of C2's authoritative classification.
/// Intentionally a narrower list than C2's own cue tables.
const REALTIME_HINT_PHRASES: &[&str] = &[
    "building on",
    "as mentioned",
    "following up",
    "to add to",
    "expanding on",
    "great point",
];

/// One panelist wired into an orchestration session.
#[derive(Clone)]
pub struct Participant {
    pub id: PanelistId,
    pub role: String,
    pub provider: Arc<dyn LlmProvider>,
}

/// One unit of the orchestrator's lazy outbound sequence.
#[derive(Debug, Clone)]
pub struct OutboundChunk {
    /// `None` for system-authored notices (provider failures).
    pub participant_id: Option<PanelistId>,
    pub content: String,
    pub kind: MessageKind,
    pub complete: bool,
    pub anchor_message_id: Option<MessageId>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

pub struct StreamingOrchestrator {
    memory: Arc<GroupMemory>,
    participants: Vec<Participant>,
    idle_timeout: Duration,
}

impl StreamingOrchestrator {
    pub fn new(memory: Arc<GroupMemory>, participants: Vec<Participant>, idle_timeout: Duration) -> Self {
        Self {
            memory,
            participants,
            idle_timeout,
        }
    }

    /// Entry point: build the user's mission message, fan it out to every
    /// active participant, and yield merged chunks until all streams have
    /// terminated.
    pub fn orchestrate(
        self: Arc<Self>,
        user_input: String,
        kind: MessageKind,
        cancel: CancellationToken,
    ) -> impl Stream<Item = OutboundChunk> {
        stream! {
            let user_message = Message::new(Author::User, kind, user_input);
            let _ = self.memory.append(user_message).await;

            let (tx, mut rx) = mpsc::channel::<Envelope>(128);

            for p in &self.participants {
                let limit = if p.provider.model_name().starts_with(LARGE_CONTEXT_PREFIX) {
                    LARGE_CONTEXT_LIMIT
                } else {
                    DEFAULT_CONTEXT_LIMIT
                };
                let ctx = to_chat_context(self.memory.budgeted_context_view(limit).await);
                tokio::spawn(run_participant(
                    p.clone(),
                    ctx,
                    self.idle_timeout,
                    tx.clone(),
                    cancel.clone(),
                ));
            }
            drop(tx);

            while let Some(envelope) = rx.recv().await {
                match envelope {
                    Envelope::Data { id, text, buffer_snapshot } => {
                        let anchor = if contains_realtime_hint(&buffer_snapshot) {
                            self.memory
                                .message_id_for_anchor_search(&Author::Participant(id.clone()))
                                .await
                        } else {
                            None
                        };
                        yield OutboundChunk {
                            participant_id: Some(id),
                            content: text,
                            kind: MessageKind::Response,
                            complete: false,
                            anchor_message_id: anchor,
                            metadata: serde_json::Map::new(),
                        };
                    }
                    Envelope::Complete { id, buffer } => {
                        let message = Message::new(Author::Participant(id.clone()), MessageKind::Response, buffer);
                        let _ = self.memory.append(message).await;
                        yield OutboundChunk {
                            participant_id: Some(id),
                            content: String::new(),
                            kind: MessageKind::Response,
                            complete: true,
                            anchor_message_id: None,
                            metadata: serde_json::Map::new(),
                        };
                    }
                    Envelope::Failed { id, role, error } => {
                        warn!(participant = %id, %error, "participant stream failed");
                        let notice = format!(
                            "[System Notice] {role} has temporarily left the conversation due to a technical issue."
                        );
                        let mut metadata = serde_json::Map::new();
                        metadata.insert("error_type".into(), serde_json::json!("provider_failure"));
                        metadata.insert("failed_model".into(), serde_json::json!(id.to_string()));
                        metadata.insert("error_details".into(), serde_json::json!(error));

                        let mut system_message = Message::new(Author::System, MessageKind::System, notice.clone());
                        system_message.metadata = metadata.clone();
                        let _ = self.memory.append(system_message).await;

                        yield OutboundChunk {
                            participant_id: None,
                            content: notice,
                            kind: MessageKind::System,
                            complete: true,
                            anchor_message_id: None,
                            metadata,
                        };
                    }
                    Envelope::Cancelled { id } => {
                        // Partial buffer is discarded; no system message is appended.
                        debug!(participant = %id, "participant stream cancelled");
                    }
                }
            }
        }
    }
}

enum Envelope {
    Data {
        id: PanelistId,
        text: String,
        buffer_snapshot: String,
    },
    Complete {
        id: PanelistId,
        buffer: String,
    },
    Failed {
        id: PanelistId,
        role: String,
        error: String,
    },
    Cancelled {
        id: PanelistId,
    },
}

fn to_chat_context(entries: Vec<collab_memory::ContextEntry>) -> ChatContext {
    entries
        .into_iter()
        .map(|e| ContextMessage {
            role: match e.role {
                ContextEntryRole::System => ContextRole::System,
                ContextEntryRole::User => ContextRole::User,
                ContextEntryRole::Assistant => ContextRole::Assistant,
            },
            content: e.content,
        })
        .collect()
}

fn contains_realtime_hint(buffer: &str) -> bool {
    let lower = buffer.to_lowercase();
    REALTIME_HINT_PHRASES.iter().any(|p| lower.contains(p))
}

/// Drive one participant's adapter stream to completion, cancellation, or
/// idle-chunk timeout, forwarding every unit into the session's merge
/// channel. One task is spawned per participant, all feeding the same
/// mpsc channel.
async fn run_participant(
    participant: Participant,
    ctx: ChatContext,
    idle_timeout: Duration,
    out_tx: mpsc::Sender<Envelope>,
    cancel: CancellationToken,
) {
    let (inner_tx, mut inner_rx) = mpsc::channel::<ProviderChunk>(32);
    let provider = participant.provider.clone();
    let params = GenerationParams::default();
    let stream_task = tokio::spawn(async move {
        let _ = provider.stream(&ctx, &params, inner_tx).await;
    });

    let mut buffer = String::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                stream_task.abort();
                let _ = out_tx.send(Envelope::Cancelled { id: participant.id.clone() }).await;
                return;
            }

            chunk = tokio::time::timeout(idle_timeout, inner_rx.recv()) => {
                match chunk {
                    Ok(Some(ProviderChunk::Data(text))) => {
                        buffer.push_str(&text);
                        if out_tx
                            .send(Envelope::Data {
                                id: participant.id.clone(),
                                text,
                                buffer_snapshot: buffer.clone(),
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Ok(Some(ProviderChunk::End)) => {
                        let _ = out_tx
                            .send(Envelope::Complete { id: participant.id.clone(), buffer })
                            .await;
                        return;
                    }
                    Ok(Some(ProviderChunk::Err(error))) => {
                        let _ = out_tx
                            .send(Envelope::Failed {
                                id: participant.id.clone(),
                                role: participant.role.clone(),
                                error,
                            })
                            .await;
                        return;
                    }
                    Ok(None) => {
                        let _ = out_tx
                            .send(Envelope::Failed {
                                id: participant.id.clone(),
                                role: participant.role.clone(),
                                error: "stream closed without a terminal chunk".to_string(),
                            })
                            .await;
                        return;
                    }
                    Err(_elapsed) => {
                        let _ = out_tx
                            .send(Envelope::Failed {
                                id: participant.id.clone(),
                                role: participant.role.clone(),
                                error: format!("idle timeout after {idle_timeout:?}"),
                            })
                            .await;
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use collab_agent::{ChatContext as Ctx, GenerationParams as Params, PersonaDescriptor, ProviderError};
    use futures_util::StreamExt;

    struct AlwaysOk {
        reply: String,
        persona: PersonaDescriptor,
    }

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "test"
        }
        fn model_name(&self) -> &str {
            "test-model"
        }
        fn persona(&self) -> &PersonaDescriptor {
            &self.persona
        }
        async fn complete(&self, _ctx: &Ctx, _params: &Params) -> Result<String, ProviderError> {
            Ok(self.reply.clone())
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "test"
        }
        fn model_name(&self) -> &str {
            "test-model"
        }
        fn persona(&self) -> &PersonaDescriptor {
            static P: std::sync::OnceLock<PersonaDescriptor> = std::sync::OnceLock::new();
            P.get_or_init(|| PersonaDescriptor::generic("test"))
        }
        async fn complete(&self, _ctx: &Ctx, _params: &Params) -> Result<String, ProviderError> {
            Err(ProviderError::Unavailable("boom".into()))
        }
    }

    #[tokio::test]
    async fn successful_participant_emits_data_then_complete() {
        let memory = Arc::new(GroupMemory::new(None, 3000));
        let participant = Participant {
            id: PanelistId::new(),
            role: "Strategist".to_string(),
            provider: Arc::new(AlwaysOk {
                reply: "here is my plan".to_string(),
                persona: PersonaDescriptor::generic("test"),
            }),
        };
        let orchestrator = Arc::new(StreamingOrchestrator::new(memory, vec![participant], Duration::from_secs(5)));
        let cancel = CancellationToken::new();
        let stream = orchestrator.orchestrate("plan a launch".to_string(), MessageKind::Mission, cancel);
        tokio::pin!(stream);

        let mut saw_complete = false;
        while let Some(chunk) = stream.next().await {
            if chunk.complete {
                saw_complete = true;
            }
        }
        assert!(saw_complete);
    }

    #[tokio::test]
    async fn failing_participant_emits_system_notice() {
        let memory = Arc::new(GroupMemory::new(None, 3000));
        let participant = Participant {
            id: PanelistId::new(),
            role: "Analyst".to_string(),
            provider: Arc::new(AlwaysFail),
        };
        let orchestrator = Arc::new(StreamingOrchestrator::new(memory, vec![participant], Duration::from_secs(5)));
        let cancel = CancellationToken::new();
        let stream = orchestrator.orchestrate("plan a launch".to_string(), MessageKind::Mission, cancel);
        tokio::pin!(stream);

        let mut notices = 0;
        while let Some(chunk) = stream.next().await {
            if chunk.participant_id.is_none() {
                notices += 1;
                assert!(chunk.content.contains("temporarily left the conversation"));
            }
        }
        assert_eq!(notices, 1);
    }
}
