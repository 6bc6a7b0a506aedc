use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),
}

impl MemoryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "memory_serialization_error",
            Self::EmbeddingUnavailable(_) => "embedding_unavailable",
        }
    }
}
