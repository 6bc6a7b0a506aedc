//! Synapse Detector (C2) — classifies whether a newly finalized message
//! builds on a recent message from a different participant.
//!
//! Two-tier, with graceful degradation: a semantic tier (cosine similarity
//! over a local bag-of-words embedding) is preferred; if the embedder is
//! unavailable the detector falls back to lexical Jaccard overlap. Either way
//! it must never raise into C4 — failure degrades, it doesn't propagate.

use std::sync::LazyLock;

use regex::Regex;

use collab_core::types::SynapseKind;

use crate::types::Message;

const SEMANTIC_CANDIDATE_THRESHOLD: f32 = 0.40;
const CLASSIFICATION_FLOOR: f32 = 0.5;
const BUILDING_FALLBACK_SIMILARITY: f32 = 0.70;
const KEYWORD_ONLY_EMISSION_THRESHOLD: f32 = 0.3;

struct CueTable {
    kind: SynapseKind,
    keywords: &'static [&'static str],
    regexes: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static cue regex is valid"))
        .collect()
}

static BUILDING: LazyLock<CueTable> = LazyLock::new(|| CueTable {
    kind: SynapseKind::Building,
    keywords: &[
        "building on",
        "expanding",
        "adding to",
        "furthermore",
        "additionally",
        "moreover",
    ],
    regexes: compile(&[r"as \w+ mentioned", r"following up on", r"to add to"]),
});

static SYNTHESIS: LazyLock<CueTable> = LazyLock::new(|| CueTable {
    kind: SynapseKind::Synthesis,
    keywords: &[
        "combining",
        "synthesizing",
        "bringing together",
        "integrating",
        "merging",
    ],
    regexes: compile(&[r"taking both .* and", r"synthesis of", r"integrated approach"]),
});

static REINFORCEMENT: LazyLock<CueTable> = LazyLock::new(|| CueTable {
    kind: SynapseKind::Reinforcement,
    keywords: &[
        "agree",
        "absolutely",
        "exactly",
        "reinforcing",
        "supporting",
        "confirm",
    ],
    regexes: compile(&[r"i (?:strongly )?agree", r"exactly right", r"spot on"]),
});

static CLARIFICATION: LazyLock<CueTable> = LazyLock::new(|| CueTable {
    kind: SynapseKind::Clarification,
    keywords: &[
        "clarifying",
        "specifically",
        "precisely",
        "to be clear",
        "in other words",
    ],
    regexes: compile(&[r"to clarify", r"more specifically", r"what i mean is"]),
});

fn cue_tables() -> [&'static CueTable; 4] {
    [&BUILDING, &SYNTHESIS, &REINFORCEMENT, &CLARIFICATION]
}

/// A synapse classification result, ready to become a `SynapseConnection`.
pub struct Classification {
    pub kind: SynapseKind,
    pub strength: f32,
    pub anchor: collab_core::types::MessageId,
}

/// Local token-hashing bag-of-words embedding. No sentence-transformer crate
/// exists in the dependency stack; this preserves the two-tier degrade
/// structure without fabricating one. See DESIGN.md for the rationale.
pub struct BagOfWordsEmbedder;

impl BagOfWordsEmbedder {
    /// 256-bucket hashed term-frequency vector, L2-normalized.
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }
        const BUCKETS: usize = 256;
        let mut v = vec![0f32; BUCKETS];
        for token in text.to_lowercase().split_whitespace() {
            let bucket = (fnv1a(token) as usize) % BUCKETS;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return None;
        }
        for x in &mut v {
            *x /= norm;
        }
        Some(v)
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}

fn jaccard(a: &str, b: &str) -> f32 {
    let wa: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let wb: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let inter = wa.intersection(&wb).count() as f32;
    let union_len = wa.len().max(wb.len()) as f32;
    inter / union_len
}

fn keyword_score(text: &str, table: &CueTable) -> f32 {
    let lower = text.to_lowercase();
    let keyword_hits = table.keywords.iter().filter(|kw| lower.contains(*kw)).count();
    let regex_hits = table.regexes.iter().filter(|re| re.is_match(&lower)).count();
    (keyword_hits as f32) * 0.3 + (regex_hits as f32) * 0.4
}

/// Run C2 over a newly finalized message and the `N=10` preceding messages.
/// Returns `None` when no candidate clears the emission threshold — this is
/// the expected common case, not an error.
pub fn detect(
    embedder: Option<&BagOfWordsEmbedder>,
    message: &Message,
    preceding: &[Message],
) -> Option<Classification> {
    let candidates: Vec<&Message> = preceding
        .iter()
        .filter(|m| m.author != message.author)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let embed_self = embedder.and_then(|e| e.embed(&message.content));

    if let (Some(embedder), Some(self_vec)) = (embedder, embed_self.as_ref()) {
        if let Some((best, s)) = candidates
            .iter()
            .filter_map(|m| embedder.embed(&m.content).map(|v| (*m, cosine(self_vec, &v))))
            .filter(|(_, s)| *s >= SEMANTIC_CANDIDATE_THRESHOLD)
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
        {
            return classify_semantic(message, best, s);
        }
    }

    classify_keyword_only(message, &candidates)
}

fn similarity_bonus(s: f32) -> f32 {
    if s >= 0.85 {
        0.3
    } else if s >= 0.70 {
        0.2
    } else if s >= 0.55 {
        0.1
    } else {
        0.0
    }
}

fn classify_semantic(message: &Message, anchor: &Message, s: f32) -> Option<Classification> {
    let bonus = similarity_bonus(s);
    let mut best: Option<(SynapseKind, f32)> = None;
    for table in cue_tables() {
        let raw = keyword_score(&message.content, table) + bonus;
        let score = raw * table.kind.weight();
        best = match best {
            Some((bk, bs)) if bs > score => Some((bk, bs)),
            Some((bk, bs)) if bs == score && bk.tie_rank() <= table.kind.tie_rank() => {
                Some((bk, bs))
            }
            _ => Some((table.kind, score)),
        };
    }
    let (kind, score) = best?;
    if score >= CLASSIFICATION_FLOOR {
        return Some(Classification {
            kind,
            strength: score.clamp(0.0, 1.0),
            anchor: anchor.id.clone(),
        });
    }
    if s >= BUILDING_FALLBACK_SIMILARITY {
        return Some(Classification {
            kind: SynapseKind::Building,
            strength: (s * 0.7).clamp(0.0, 1.0),
            anchor: anchor.id.clone(),
        });
    }
    None
}

/// No embedder configured: scores every candidate against every cue table
/// and keeps the single best `(candidate, kind)` pair, rather than fixating
/// on the most recent candidate alone — a strong building phrase anchored to
/// an older message would otherwise be missed.
fn classify_keyword_only(message: &Message, candidates: &[&Message]) -> Option<Classification> {
    let mut best: Option<(&Message, SynapseKind, f32)> = None;
    for candidate in candidates {
        let overlap = jaccard(&message.content.to_lowercase(), &candidate.content.to_lowercase());
        for table in cue_tables() {
            let raw = keyword_score(&message.content, table) + overlap * 0.3;
            let score = raw * table.kind.weight();
            best = match best {
                Some((bc, bk, bs)) if bs > score => Some((bc, bk, bs)),
                Some((bc, bk, bs)) if bs == score && bk.tie_rank() <= table.kind.tie_rank() => {
                    Some((bc, bk, bs))
                }
                _ => Some((candidate, table.kind, score)),
            };
        }
    }
    let (anchor, kind, score) = best?;
    if score >= KEYWORD_ONLY_EMISSION_THRESHOLD {
        Some(Classification {
            kind,
            strength: score.clamp(0.0, 1.0),
            anchor: anchor.id.clone(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collab_core::types::{Author, MessageKind, PanelistId};

    fn msg(author: Author, content: &str) -> Message {
        Message::new(author, MessageKind::Response, content.to_string())
    }

    #[test]
    fn building_phrase_classified_without_embedder() {
        let a = PanelistId::new();
        let b = PanelistId::new();
        let prior = msg(Author::Participant(a), "the budget should favor renewables");
        let current = msg(
            Author::Participant(b),
            "building on that, furthermore we should phase in subsidies",
        );
        let result = detect(None, &current, std::slice::from_ref(&prior));
        let classification = result.expect("building phrase should classify");
        assert_eq!(classification.kind, SynapseKind::Building);
        assert_eq!(classification.anchor, prior.id);
    }

    #[test]
    fn same_author_candidates_are_excluded() {
        let a = PanelistId::new();
        let prior = msg(Author::Participant(a.clone()), "initial point");
        let current = msg(Author::Participant(a), "building on that");
        assert!(detect(None, &current, std::slice::from_ref(&prior)).is_none());
    }

    #[test]
    fn unrelated_message_does_not_classify() {
        let a = PanelistId::new();
        let b = PanelistId::new();
        let prior = msg(Author::Participant(a), "the weather today is mild");
        let current = msg(Author::Participant(b), "quarterly revenue rose 4 percent");
        assert!(detect(None, &current, std::slice::from_ref(&prior)).is_none());
    }

    #[test]
    fn semantic_tier_degrades_when_embedder_yields_no_candidate() {
        let embedder = BagOfWordsEmbedder;
        let a = PanelistId::new();
        let b = PanelistId::new();
        let prior = msg(Author::Participant(a), "");
        let current = msg(Author::Participant(b), "building on that point");
        // Empty prior content has no embedding; detector must still consider
        // the keyword-only path rather than panicking.
        let _ = detect(Some(&embedder), &current, std::slice::from_ref(&prior));
    }
}
