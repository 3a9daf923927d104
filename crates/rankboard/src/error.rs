//! Error types for the leaderboard engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all leaderboard operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Member is absent from the board's score index.
    #[error("could not find data for member {member_id} in leaderboard {leaderboard_id}")]
    MemberNotFound {
        leaderboard_id: String,
        member_id: String,
    },

    /// Caller-supplied argument rejected before reaching the backend.
    #[error("{0}")]
    Validation(String),

    /// Transport or script failure, propagated unchanged. Retry policy
    /// belongs to the caller.
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl Error {
    pub fn member_not_found(leaderboard_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Error::MemberNotFound {
            leaderboard_id: leaderboard_id.into(),
            member_id: member_id.into(),
        }
    }

    pub fn is_member_not_found(&self) -> bool {
        matches!(self, Error::MemberNotFound { .. })
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Backend(err.into())
    }
}
