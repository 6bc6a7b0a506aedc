//! Context Summarizer (C3) — maintains a rolling summary of the older part
//! of a session's log so panelists with a tight token budget still see the
//! gist of the conversation that scrolled past their context window.

use std::sync::Arc;

use collab_agent::{ChatContext, ContextMessage, ContextRole, GenerationParams, LlmProvider};
use tracing::warn;

use crate::types::Message;

const RECENT_KEEP: usize = 10;
const TRIGGER_WINDOW: usize = 20;
const TRIGGER_MIN_MESSAGES: usize = 10;
const TRIGGER_MIN_NEW_MESSAGES: usize = 10;
const TRIGGER_FRACTION: f32 = 0.7;
const TRUNCATE_CHARS: usize = 500;

const RUBRIC: &str = "Summarize this multi-participant discussion in 200 words or fewer. \
Capture: the mission, key insights from each participant, decisions or conclusions reached, \
and any points of agreement or disagreement.";

/// Whether the log has grown enough, relative to `context_limit`, to warrant
/// a fresh summarization pass. `summarized_through` is the message count
/// already covered by the last summary; until enough new messages have
/// accumulated past that point, a size/window trigger fires on every call
/// and re-summarizes the same log over and over.
pub fn should_summarize(messages: &[Message], context_limit: u32, summarized_through: usize) -> bool {
    if messages.len() < TRIGGER_MIN_MESSAGES {
        return false;
    }
    if messages.len().saturating_sub(summarized_through) < TRIGGER_MIN_NEW_MESSAGES {
        return false;
    }
    let window = &messages[messages.len().saturating_sub(TRIGGER_WINDOW)..];
    let estimated: u32 = window.iter().map(|m| estimate_tokens(&m.content)).sum();
    (estimated as f32) > (context_limit as f32) * TRIGGER_FRACTION
}

fn estimate_tokens(text: &str) -> u32 {
    ((text.chars().count() as f32) / 4.0).ceil() as u32
}

/// Produce a fresh summary of everything but the last `RECENT_KEEP` messages.
/// Falls back to a deterministic basic summary if the backend errors or is
/// absent — summarization must never fail a session.
pub async fn create_summary(
    backend: Option<&Arc<dyn LlmProvider>>,
    messages: &[Message],
) -> Option<String> {
    if messages.len() <= RECENT_KEEP {
        return None;
    }
    let older = &messages[..messages.len() - RECENT_KEEP];

    let Some(backend) = backend else {
        return Some(basic_summary(older));
    };

    let transcript: String = older
        .iter()
        .map(|m| {
            let truncated: String = m.content.chars().take(TRUNCATE_CHARS).collect();
            format!("{}: {}...\n", label(m), truncated)
        })
        .collect();

    let ctx: ChatContext = vec![
        ContextMessage {
            role: ContextRole::System,
            content: RUBRIC.to_string(),
        },
        ContextMessage {
            role: ContextRole::User,
            content: transcript,
        },
    ];

    match backend.complete(&ctx, &GenerationParams::default()).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            warn!(error = %e, "summarization backend failed, falling back to basic summary");
            Some(basic_summary(older))
        }
    }
}

fn label(m: &Message) -> String {
    m.author.to_string()
}

/// Deterministic fallback used when no summarizer backend is configured, or
/// the backend call fails: message count, per-author counts, and the first
/// user turn truncated to 100 chars.
fn basic_summary(messages: &[Message]) -> String {
    let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    for m in messages {
        *counts.entry(m.author.to_string()).or_insert(0) += 1;
    }
    let breakdown = counts
        .iter()
        .map(|(k, v)| format!("{k} ({v})"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!("Previous discussion ({} messages): {breakdown}", messages.len());

    if let Some(first_user) = messages
        .iter()
        .find(|m| matches!(m.author, collab_core::types::Author::User))
    {
        let truncated: String = first_user.content.chars().take(100).collect();
        out.push_str(&format!(". Initial request: {truncated}..."));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use collab_core::types::{Author, MessageKind};

    fn msg(author: Author, content: &str) -> Message {
        Message::new(author, MessageKind::Response, content.to_string())
    }

    #[test]
    fn fewer_than_ten_messages_never_triggers() {
        let messages: Vec<Message> = (0..5)
            .map(|_| msg(Author::User, &"x".repeat(1000)))
            .collect();
        assert!(!should_summarize(&messages, 100, 0));
    }

    #[test]
    fn large_recent_window_triggers() {
        let messages: Vec<Message> = (0..20)
            .map(|_| msg(Author::User, &"word ".repeat(200)))
            .collect();
        assert!(should_summarize(&messages, 1000, 0));
    }

    #[test]
    fn does_not_retrigger_before_enough_new_messages_arrive() {
        let messages: Vec<Message> = (0..20)
            .map(|_| msg(Author::User, &"word ".repeat(200)))
            .collect();
        assert!(!should_summarize(&messages, 1000, 15));
    }

    #[tokio::test]
    async fn no_backend_falls_back_to_basic_summary() {
        let messages: Vec<Message> = (0..15)
            .map(|i| {
                if i == 0 {
                    msg(Author::User, "please plan the launch")
                } else {
                    msg(Author::User, "some turn")
                }
            })
            .collect();
        let summary = create_summary(None, &messages).await.unwrap();
        assert!(summary.contains("Previous discussion"));
        assert!(summary.contains("Initial request"));
    }

    #[tokio::test]
    async fn short_log_produces_no_summary() {
        let messages: Vec<Message> = (0..3).map(|_| msg(Author::User, "hi")).collect();
        assert!(create_summary(None, &messages).await.is_none());
    }
}
