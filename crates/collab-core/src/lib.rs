pub mod config;
pub mod error;
pub mod types;

pub use config::CollabConfig;
pub use error::{CoreError, Result};
pub use types::{
    Author, CollaborationEventKind, EventId, MessageId, MessageKind, PanelistId, PanelistState,
    SessionId, SynapseId, SynapseKind,
};
