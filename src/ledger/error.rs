//! Error types raised by store implementations.

use thiserror::Error;

use crate::game::player::PlayerId;

/// Errors surfaced by [`super::Store`] implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("player {0} not found")]
    NotFound(PlayerId),

    #[error("player {0} already exists")]
    Duplicate(PlayerId),

    #[error("conditional update failed: {0}")]
    ConditionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted data: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
