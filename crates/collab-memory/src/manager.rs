use std::sync::Arc;

use collab_agent::LlmProvider;
use collab_core::types::{Author, CollaborationEventKind, MessageId, MessageKind};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::error::MemoryError;
use crate::synapse::{self, BagOfWordsEmbedder};
use crate::summarizer;
use crate::types::{
    CollaborationEvent, ContextEntry, ContextEntryRole, GroupMemorySnapshot, MemoryStats,
    MemoryUpdate, Message, SynapseConnection,
};

/// Preceding-message window C2 classifies against.
const SYNAPSE_WINDOW: usize = 10;
/// Tokens reserved for the model's own response when budgeting context.
const RESPONSE_RESERVE_TOKENS: u32 = 200;
/// Kinds whose finalization triggers C2 classification.
fn triggers_synapse_check(kind: MessageKind) -> bool {
    matches!(kind, MessageKind::Response | MessageKind::Synthesis | MessageKind::Analysis)
}

struct State {
    messages: Vec<Message>,
    synapses: Vec<SynapseConnection>,
    events: Vec<CollaborationEvent>,
    summary: Option<String>,
    summarized_through: usize,
}

/// Group Memory (C4): the shared, per-session conversation log plus the
/// derived synapse graph and rolling summary. All mutation is serialized
/// through a single async mutex per session — the critical section performs
/// no blocking I/O, so an async mutex (rather than the corpus's usual
/// `std::sync::Mutex` around a sqlite handle) is the right primitive here.
pub struct GroupMemory {
    state: Mutex<State>,
    updates: broadcast::Sender<MemoryUpdate>,
    embedder: Option<BagOfWordsEmbedder>,
    summarizer_backend: Option<Arc<dyn LlmProvider>>,
    summary_context_limit: u32,
}

impl GroupMemory {
    pub fn new(summarizer_backend: Option<Arc<dyn LlmProvider>>, summary_context_limit: u32) -> Self {
        let (updates, _) = broadcast::channel(128);
        Self {
            state: Mutex::new(State {
                messages: Vec::new(),
                synapses: Vec::new(),
                events: Vec::new(),
                summary: None,
                summarized_through: 0,
            }),
            updates,
            embedder: Some(BagOfWordsEmbedder),
            summarizer_backend,
            summary_context_limit,
        }
    }

    /// Append a finalized message, running C2 classification and the C3
    /// trigger check as part of the same serialized step.
    pub async fn append(&self, mut message: Message) -> Result<(), MemoryError> {
        let mut state = self.state.lock().await;

        if triggers_synapse_check(message.kind) {
            let start = state.messages.len().saturating_sub(SYNAPSE_WINDOW);
            let preceding = state.messages[start..].to_vec();
            if let Some(classification) = synapse::detect(self.embedder.as_ref(), &message, &preceding) {
                message.synapse_refs.push(classification.anchor.clone());
                let synapse = SynapseConnection {
                    id: collab_core::types::SynapseId::new(),
                    kind: classification.kind,
                    strength: classification.strength,
                    from_message: message.id.clone(),
                    anchor_message: classification.anchor,
                    created_at: chrono::Utc::now(),
                };
                state.events.push(CollaborationEvent {
                    kind: CollaborationEventKind::SynapseDetected,
                    payload: serde_json::json!({
                        "synapse_id": synapse.id.to_string(),
                        "kind": format!("{:?}", synapse.kind),
                        "strength": synapse.strength,
                    }),
                    created_at: chrono::Utc::now(),
                });
                let _ = self.updates.send(MemoryUpdate::SynapseDetected(synapse.clone()));
                state.synapses.push(synapse);
                debug!(message_id = %message.id, "synapse detected");
            }
        }

        state.messages.push(message.clone());
        let _ = self.updates.send(MemoryUpdate::MessageAdded(message));

        if summarizer::should_summarize(&state.messages, self.summary_context_limit, state.summarized_through) {
            let snapshot_messages = state.messages.clone();
            drop(state);
            let new_summary =
                summarizer::create_summary(self.summarizer_backend.as_ref(), &snapshot_messages).await;
            let mut state = self.state.lock().await;
            if let Some(summary) = new_summary {
                state.summary = Some(summary);
                state.summarized_through = snapshot_messages.len().saturating_sub(10);
            }
            let _ = self.updates.send(MemoryUpdate::ContextUpdated);
        } else {
            let _ = self.updates.send(MemoryUpdate::ContextUpdated);
        }

        Ok(())
    }

    /// Last `max_messages` log entries, role-mapped, with the summary (if
    /// any) as a leading system turn.
    pub async fn context_view(&self, max_messages: usize) -> Vec<ContextEntry> {
        let state = self.state.lock().await;
        render_context(&state.messages, state.summary.as_deref(), max_messages)
    }

    /// Token-budgeted variant: walks backward from the newest message,
    /// admitting entries while the running estimate fits the budget, then
    /// restores chronological order.
    pub async fn budgeted_context_view(&self, token_limit: u32) -> Vec<ContextEntry> {
        let state = self.state.lock().await;
        let summary_tokens = state
            .summary
            .as_ref()
            .map(|s| estimate_tokens(s))
            .unwrap_or(0);
        let budget = token_limit.saturating_sub(summary_tokens).saturating_sub(RESPONSE_RESERVE_TOKENS);

        let mut admitted = Vec::new();
        let mut running = 0u32;
        for m in state.messages.iter().rev() {
            let cost = estimate_tokens(&m.content);
            if running + cost > budget {
                break;
            }
            running += cost;
            admitted.push(m.clone());
        }
        admitted.reverse();

        render_context(&admitted, state.summary.as_deref(), admitted.len())
    }

    pub async fn stats(&self) -> MemoryStats {
        let state = self.state.lock().await;
        let mut synapses_by_kind = std::collections::BTreeMap::new();
        for s in &state.synapses {
            *synapses_by_kind.entry(format!("{:?}", s.kind)).or_insert(0) += 1;
        }
        let mut messages_by_participant = std::collections::BTreeMap::new();
        for m in &state.messages {
            if let Author::Participant(id) = &m.author {
                *messages_by_participant.entry(id.to_string()).or_insert(0) += 1;
            }
        }
        let message_count = state.messages.len();
        let synapse_count = state.synapses.len();
        MemoryStats {
            message_count,
            synapse_count,
            synapses_by_kind,
            messages_by_participant,
            collaboration_density: synapse_count as f32 / message_count.max(1) as f32,
        }
    }

    /// Subscribe to memory updates. Dropping the receiver unsubscribes.
    /// Subscribers must not block this call path — the broadcast channel's
    /// bounded buffer plus lagging-receiver semantics enforce that.
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryUpdate> {
        self.updates.subscribe()
    }

    pub async fn snapshot(&self) -> GroupMemorySnapshot {
        let state = self.state.lock().await;
        GroupMemorySnapshot {
            messages: state.messages.clone(),
            synapses: state.synapses.clone(),
            events: state.events.clone(),
            summary: state.summary.clone(),
            summarized_through: state.summarized_through,
        }
    }

    /// Repopulate state from a snapshot and return. The reference
    /// implementation's equivalent carries a dead, duplicate tail that
    /// re-derives stats after already returning; that's reference noise, not
    /// reproduced here.
    pub async fn restore(&self, snapshot: GroupMemorySnapshot) {
        let mut state = self.state.lock().await;
        state.messages = snapshot.messages;
        state.synapses = snapshot.synapses;
        state.events = snapshot.events;
        state.summary = snapshot.summary;
        state.summarized_through = snapshot.summarized_through;
    }

    /// Recent 10 messages, used by C5's real-time synapse hint.
    pub async fn recent(&self, n: usize) -> Vec<Message> {
        let state = self.state.lock().await;
        let start = state.messages.len().saturating_sub(n);
        state.messages[start..].to_vec()
    }

    pub async fn message_id_for_anchor_search(&self, author_to_exclude: &Author) -> Option<MessageId> {
        let state = self.state.lock().await;
        state
            .messages
            .iter()
            .rev()
            .take(5)
            .find(|m| &m.author != author_to_exclude)
            .map(|m| m.id.clone())
    }
}

fn estimate_tokens(text: &str) -> u32 {
    ((text.chars().count() as f32) / 4.0).ceil() as u32
}

const BUILDING_ON_MARKER: &str = "[Building on previous ideas] ";

fn render_context(
    messages: &[Message],
    summary: Option<&str>,
    max_messages: usize,
) -> Vec<ContextEntry> {
    let mut out = Vec::new();
    if let Some(summary) = summary {
        out.push(ContextEntry {
            role: ContextEntryRole::System,
            content: summary.to_string(),
            metadata: serde_json::Map::new(),
        });
    }

    let start = messages.len().saturating_sub(max_messages);
    for m in &messages[start..] {
        let role = match (m.kind, &m.author) {
            (MessageKind::System, _) => ContextEntryRole::System,
            (_, Author::Participant(_)) => ContextEntryRole::Assistant,
            _ => ContextEntryRole::User,
        };
        let mut content = m.content.clone();
        if role == ContextEntryRole::Assistant && !m.synapse_refs.is_empty() {
            content = format!("{BUILDING_ON_MARKER}{content}");
        }
        out.push(ContextEntry {
            role,
            content,
            metadata: m.metadata.clone(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use collab_core::types::PanelistId;

    #[tokio::test]
    async fn append_and_context_view_roundtrip() {
        let memory = GroupMemory::new(None, 3000);
        memory
            .append(Message::new(Author::User, MessageKind::Mission, "plan a launch".into()))
            .await
            .unwrap();
        let a = PanelistId::new();
        memory
            .append(Message::new(
                Author::Participant(a),
                MessageKind::Response,
                "here is a plan".into(),
            ))
            .await
            .unwrap();

        let view = memory.context_view(20).await;
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].role, ContextEntryRole::User);
        assert_eq!(view[1].role, ContextEntryRole::Assistant);
    }

    #[tokio::test]
    async fn building_on_marker_added_when_synapse_detected() {
        let memory = GroupMemory::new(None, 3000);
        let a = PanelistId::new();
        let b = PanelistId::new();
        memory
            .append(Message::new(
                Author::Participant(a),
                MessageKind::Response,
                "we should invest in renewables".into(),
            ))
            .await
            .unwrap();
        memory
            .append(Message::new(
                Author::Participant(b),
                MessageKind::Response,
                "building on that, furthermore subsidies would help".into(),
            ))
            .await
            .unwrap();

        let stats = memory.stats().await;
        assert_eq!(stats.synapse_count, 1);

        let view = memory.context_view(20).await;
        assert!(view[1].content.starts_with(BUILDING_ON_MARKER));
    }

    #[tokio::test]
    async fn snapshot_restore_is_lossless() {
        let memory = GroupMemory::new(None, 3000);
        memory
            .append(Message::new(Author::User, MessageKind::Mission, "go".into()))
            .await
            .unwrap();
        let snap = memory.snapshot().await;

        let restored = GroupMemory::new(None, 3000);
        restored.restore(snap).await;
        assert_eq!(restored.stats().await.message_count, 1);
    }

    #[tokio::test]
    async fn budgeted_view_respects_limit() {
        let memory = GroupMemory::new(None, 3000);
        for i in 0..5 {
            memory
                .append(Message::new(
                    Author::User,
                    MessageKind::Mission,
                    format!("turn {i} {}", "word ".repeat(50)),
                ))
                .await
                .unwrap();
        }
        let view = memory.budgeted_context_view(250).await;
        assert!(view.len() < 5);
    }
}
