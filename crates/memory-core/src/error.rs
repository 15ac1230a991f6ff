//! Error kinds (spec §7). Named by kind, not by internal type — every
//! downstream crate maps its own plumbing errors (rusqlite, io, regex)
//! into one of these variants at its boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflicting edit on {id}")]
    ConflictingEdit { id: String },

    #[error("circuit '{name}' is open")]
    CircuitOpen { name: String },

    #[error("dependency failed: {0}")]
    DependencyFailed(String),

    #[error("corrupt record at {path}: {reason}")]
    Corruption { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl MemoryError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        MemoryError::NotFound { kind, id: id.into() }
    }

    pub fn corruption(path: impl Into<String>, reason: impl Into<String>) -> Self {
        MemoryError::Corruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn dependency_failed(reason: impl std::fmt::Display) -> Self {
        MemoryError::DependencyFailed(reason.to_string())
    }

    /// Exit code mapping for the CLI surface (spec §6).
    pub fn exit_code(&self) -> i32 {
        match self {
            MemoryError::InvalidInput(_) => 1,
            MemoryError::NotFound { .. } => 2,
            MemoryError::ConflictingEdit { .. } => 3,
            MemoryError::CircuitOpen { .. } | MemoryError::DependencyFailed(_) => 4,
            MemoryError::Corruption { .. } => 3,
            MemoryError::Io(_) | MemoryError::Json(_) | MemoryError::TomlDe(_) => 4,
        }
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;
