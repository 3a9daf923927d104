//! Whole-board expiration policy seam.
//!
//! Some deployments bake an absolute expiry into a board's backend key the
//! first time it is written. How that timestamp derives from the board's
//! public id is the caller's business; the engine only consumes the result.

use crate::error::Result;

/// Supplies the absolute expiry for a board's backend key.
#[cfg_attr(test, mockall::automock)]
pub trait ExpirationPolicy: Send + Sync {
    /// Unix seconds at which the board key should expire, or `-1` to leave
    /// the key without a whole-board TTL.
    ///
    /// A timestamp in the past is forwarded to the backend unchanged, which
    /// expires the key as soon as the first write lands.
    fn board_expire_at(&self, public_id: &str) -> Result<i64>;
}

/// Policy that never expires boards.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExpiration;

impl ExpirationPolicy for NoExpiration {
    fn board_expire_at(&self, _public_id: &str) -> Result<i64> {
        Ok(-1)
    }
}
