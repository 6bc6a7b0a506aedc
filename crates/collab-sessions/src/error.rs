use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid session request: {0}")]
    InvalidRequest(String),

    #[error("panelist could not be constructed for model '{model_id}': {reason}")]
    PanelistConstructionFailed { model_id: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "session_not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::PanelistConstructionFailed { .. } => "panelist_construction_failed",
            Self::Database(_) => "database_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
