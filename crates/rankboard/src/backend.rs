//! Ordered-store abstraction the engine runs against.

use async_trait::async_trait;

use crate::error::Result;
use crate::member::Order;

mod redis;

pub use self::redis::RedisRankingBackend;

/// A backend reply value, mirroring the shapes scripts can produce.
///
/// Script replies are heterogeneous arrays: integers for ranks, bulk
/// strings for members and scores, nil for absent entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Int(i64),
    Data(String),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&str> {
        match self {
            Reply::Data(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Unwraps an array reply; any other shape yields an empty list.
    pub fn into_array(self) -> Vec<Reply> {
        match self {
            Reply::Array(items) => items,
            _ => Vec::new(),
        }
    }
}

/// Narrow interface over an ordered-map store with ranked sets.
///
/// Scripts passed to [`eval`](RankingBackend::eval) execute atomically with
/// respect to every other command touching the same keys; the engine's
/// multi-step primitives rely on that to stay all-or-nothing. Ties between
/// equal scores break lexicographically on the member id, reversed for
/// descending reads. Implementations over a non-Redis store must replicate
/// that tie-break.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RankingBackend: Send + Sync {
    /// Runs a script atomically against the given keys and arguments.
    async fn eval(&self, script: &str, keys: &[String], args: &[String]) -> Result<Reply>;

    /// 0-based rank of `member` in the ordering, `None` when absent.
    async fn rank_of(&self, key: &str, member: &str, order: Order) -> Result<Option<u64>>;

    /// Members at offsets `start..=stop` of the ordering (0-based, inclusive,
    /// clamped to the set), best rank first, with their scores.
    async fn range_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        order: Order,
    ) -> Result<Vec<(String, i64)>>;

    /// Up to `count` members with score in `[min, max]`, highest score
    /// first, skipping `offset`. Bounds use the backend's score-range syntax,
    /// so `"-inf"` is a valid lower bound.
    async fn rev_range_by_score(
        &self,
        key: &str,
        min: &str,
        max: &str,
        offset: isize,
        count: isize,
    ) -> Result<Vec<String>>;

    /// Number of members in the ranked set; 0 for a missing key.
    async fn cardinality(&self, key: &str) -> Result<u64>;

    /// Removes members from the ranked set; returns how many existed.
    async fn remove_members(&self, key: &str, members: &[String]) -> Result<u64>;

    /// Drops the key outright.
    async fn delete_key(&self, key: &str) -> Result<()>;
}
