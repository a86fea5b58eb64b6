//! Engine error taxonomy.
//!
//! Every variant is a stable kind callers can match on. Storage detail is
//! logged where it happens and never carried in the error itself.

use thiserror::Error;

use crate::game::player::PlayerId;
use crate::game::validate::{Rejection, Resource};
use crate::ledger::StorageError;

/// Errors returned by [`super::GameEngine`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed or out-of-range request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No player with this identity.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// Unknown identity or banned player on a mutating action.
    #[error("player not found or banned")]
    NotFoundOrBanned,

    /// Not enough energy or coins.
    #[error("insufficient {0:?}")]
    InsufficientResource(Resource),

    /// Second tap inside the minimum interval.
    #[error("rate limited")]
    RateLimited,

    /// Daily reward already claimed today.
    #[error("daily reward already claimed")]
    AlreadyClaimed,

    /// Player already created.
    #[error("player {0} already exists")]
    AlreadyExists(PlayerId),

    /// Store unreachable or too slow.
    #[error("storage unavailable")]
    StorageUnavailable,

    /// Unexpected failure; details are only in the logs.
    #[error("internal server error")]
    Internal,
}

impl From<Rejection> for EngineError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::InvalidInput(reason) => EngineError::InvalidInput(reason.to_string()),
            Rejection::NotFoundOrBanned => EngineError::NotFoundOrBanned,
            Rejection::InsufficientResource(resource) => EngineError::InsufficientResource(resource),
            Rejection::TooFast => EngineError::RateLimited,
            Rejection::AlreadyClaimed => EngineError::AlreadyClaimed,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => EngineError::NotFound(id),
            StorageError::Duplicate(id) => EngineError::AlreadyExists(id),
            StorageError::Unavailable(_) | StorageError::Io(_) => EngineError::StorageUnavailable,
            StorageError::ConditionFailed(_)
            | StorageError::Serialization(_)
            | StorageError::Corrupted(_) => EngineError::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_mapping() {
        assert_eq!(EngineError::from(Rejection::TooFast), EngineError::RateLimited);
        assert_eq!(EngineError::from(Rejection::AlreadyClaimed), EngineError::AlreadyClaimed);
        assert_eq!(
            EngineError::from(Rejection::InsufficientResource(Resource::Coins)),
            EngineError::InsufficientResource(Resource::Coins)
        );
        assert_eq!(
            EngineError::from(Rejection::InvalidInput("taps out of range")),
            EngineError::InvalidInput("taps out of range".into())
        );
    }

    #[test]
    fn test_storage_detail_not_leaked() {
        let err = EngineError::from(StorageError::ConditionFailed("row 7 at revision 3".into()));
        assert_eq!(err, EngineError::Internal);
        assert!(!err.to_string().contains("revision"));

        let err = EngineError::from(StorageError::Unavailable("connection refused".into()));
        assert_eq!(err, EngineError::StorageUnavailable);
        assert!(!err.to_string().contains("refused"));
    }

    #[test]
    fn test_io_failure_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "disk gone");
        assert_eq!(EngineError::from(StorageError::from(io)), EngineError::StorageUnavailable);
    }

    #[test]
    fn test_storage_identity_errors() {
        assert_eq!(EngineError::from(StorageError::NotFound(PlayerId(4))), EngineError::NotFound(PlayerId(4)));
        assert_eq!(
            EngineError::from(StorageError::Duplicate(PlayerId(4))),
            EngineError::AlreadyExists(PlayerId(4))
        );
    }
}
