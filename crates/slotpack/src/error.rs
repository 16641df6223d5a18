use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("state deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("invalid input: {reason}")]
    InvalidInput { reason: &'static str },

    #[error("no storage backend registered")]
    StorageUnavailable,

    #[error("truncated save data: field needs {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("payload was not compressed")]
    DecompressionFailed,

    #[error("save class not found: {name}")]
    ClassNotFound { name: String },

    #[error("save slot not found: {slot}")]
    SlotNotFound { slot: String },

    #[error("corrupted save data")]
    Corrupted,
}

impl SaveError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            SaveError::Io(_) => true,
            SaveError::StorageUnavailable => true,
            // Registering the class and retrying the load can succeed
            SaveError::ClassNotFound { .. } => true,
            SaveError::SlotNotFound { .. } => true,
            SaveError::InvalidInput { .. } => false,
            SaveError::Truncated { .. } => false,
            SaveError::DecompressionFailed => false,
            SaveError::Corrupted => false,
            _ => false,
        }
    }
}
