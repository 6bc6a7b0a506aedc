use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// UUIDv7 — time-sortable, so logs and DB rows sort chronologically
            /// without a separate `created_at` index.
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

opaque_id!(SessionId);
opaque_id!(PanelistId);
opaque_id!(MessageId);
opaque_id!(SynapseId);
opaque_id!(EventId);

/// Author of a message: the end user, a named panelist, or the system itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Participant(PanelistId),
    System,
}

impl Author {
    pub fn is_participant(&self) -> bool {
        matches!(self, Author::Participant(_))
    }

    pub fn participant_id(&self) -> Option<&PanelistId> {
        match self {
            Author::Participant(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::User => write!(f, "user"),
            Author::Participant(id) => write!(f, "{id}"),
            Author::System => write!(f, "system"),
        }
    }
}

/// Observable projection of a panelist's provider adapter; not a coordination lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PanelistState {
    #[default]
    Standby,
    Thinking,
    Responding,
    Building,
    Synthesizing,
    Complete,
    Error,
}

/// What kind of turn a message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Mission,
    Response,
    Synthesis,
    Analysis,
    Creative,
    Guidance,
    System,
}

/// The typed relation one finalized message can hold to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynapseKind {
    Reinforcement,
    Building,
    Synthesis,
    Contrast,
    Clarification,
}

impl SynapseKind {
    /// Kind-specific multiplicative weight used by the classifier.
    pub fn weight(self) -> f32 {
        match self {
            SynapseKind::Building => 0.8,
            SynapseKind::Synthesis => 0.9,
            SynapseKind::Reinforcement => 0.7,
            SynapseKind::Clarification => 0.6,
            SynapseKind::Contrast => 0.6,
        }
    }

    /// Tie-break precedence: BUILDING > SYNTHESIS > REINFORCEMENT > CLARIFICATION.
    /// Lower rank wins a tie.
    pub fn tie_rank(self) -> u8 {
        match self {
            SynapseKind::Building => 0,
            SynapseKind::Synthesis => 1,
            SynapseKind::Reinforcement => 2,
            SynapseKind::Clarification => 3,
            SynapseKind::Contrast => 4,
        }
    }
}

/// Kind of a logged collaboration event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationEventKind {
    SynapseDetected,
    ProviderFailure,
}
