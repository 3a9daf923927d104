//! Leaderboard engine over a ranked-set store (Redis).
//!
//! A [`Leaderboard`] is a cheap handle bound to one board's public id and a
//! page size. Boards are created implicitly on first write and hold members
//! as `(public_id, score)` pairs ranked by score, descending by default.
//! Every multi-step mutation runs as a single server-side script, so
//! previous-rank capture, the score write, and expiration bookkeeping commit
//! together or not at all.
//!
//! ## Backend Key Patterns
//!
//! ```text
//! {board}           → sorted set, member → score
//! {board}:ttl       → sorted set, member → expiry unix seconds
//! expiration-sets   → set of every {board}:ttl key ever written
//! ```
//!
//! Removing members or whole boards leaves the `:ttl` sibling and the
//! registry untouched; reconciling those is the job of an external
//! compactor iterating `expiration-sets`.
//!
//! ## Usage
//!
//! ```ignore
//! let backend = Arc::new(RedisRankingBackend::from_config(&config)?);
//! let board = Leaderboard::new(backend, "season-42", 20);
//!
//! board.set_member_score("alice", 1500, true, None).await?;
//! let top = board.get_leaders(1, Order::Descending).await?;
//! let window = board.get_around_me("alice", Order::Descending, false).await?;
//! ```

mod backend;
mod config;
mod error;
mod expiration;
mod leaderboard;
mod member;
mod scripts;
#[cfg(test)]
mod test_utils;

pub use backend::{RankingBackend, RedisRankingBackend, Reply};
pub use config::Config;
pub use error::{Error, Result};
pub use expiration::{ExpirationPolicy, NoExpiration};
pub use leaderboard::Leaderboard;
pub use member::{Member, MemberScore, Order};
pub use scripts::{expiry_index_key, EXPIRATION_SETS_KEY};
