use std::path::{Path, PathBuf};

use thiserror::Error;

use super::hooks::HookError;

/// Failure to turn bytes into a document, or a document into bytes
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Placeholder file of a slot that was never written
    #[error("save file is empty")]
    Empty,

    #[error("invalid save document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode save file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("failed to encode save document for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("save task did not complete: {0}")]
    Task(String),
}

impl StoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn decode(path: impl Into<PathBuf>, source: DecodeError) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn encode(path: impl Into<PathBuf>, source: DecodeError) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }

    /// Path the failure happened at, if it concerns a file
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Io { path, .. } | Self::Decode { path, .. } | Self::Encode { path, .. } => {
                Some(path)
            }
            Self::Hook(_) | Self::Task(_) => None,
        }
    }

    /// True for the placeholder file of a never-saved slot
    pub fn is_empty_slot(&self) -> bool {
        matches!(
            self,
            Self::Decode {
                source: DecodeError::Empty,
                ..
            }
        )
    }
}
