use std::path::PathBuf;

use thiserror::Error;

use crate::sink::TransportError;
use crate::types::ServoId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("action group '{name}' not found at {}", .path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("playback busy: another action group is streaming")]
    Busy,

    #[error("servo {servo} transport failure: {source}")]
    TransportFailure {
        servo: ServoId,
        #[source]
        source: TransportError,
    },

    #[error("invalid frame in action group '{name}': {reason}")]
    InvalidFrame { name: String, reason: String },

    #[error("playback worker panicked: {0}")]
    Worker(String),

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
