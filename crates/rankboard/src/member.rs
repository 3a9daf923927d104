//! Result and argument types exchanged with callers.

use serde::{Deserialize, Serialize};

/// Sort direction for ranked reads. Boards rank high scores first by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Descending,
    Ascending,
}

impl Order {
    /// Coerces an order string: `"asc"` means ascending, anything else
    /// (including invalid input) means descending.
    pub fn from_str_lossy(value: &str) -> Self {
        if value == "asc" {
            Order::Ascending
        } else {
            Order::Descending
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Order::Descending => "desc",
            Order::Ascending => "asc",
        }
    }
}

/// A score assignment for one member, as submitted to the bulk writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberScore {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub score: i64,
}

impl MemberScore {
    pub fn new(public_id: impl Into<String>, score: i64) -> Self {
        Self {
            public_id: public_id.into(),
            score,
        }
    }
}

/// A board member enriched with ranking data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(rename = "publicID")]
    pub public_id: String,
    pub score: i64,
    /// 1-based position in the board's ordering.
    pub rank: i64,
    /// Rank immediately before the latest write, 1-based. `-1` when the
    /// member was newly inserted or the caller did not ask for it.
    #[serde(default = "absent_rank")]
    pub previous_rank: i64,
    /// Unix seconds at which the member's score expires; 0 when unset.
    #[serde(default)]
    pub expire_at: i64,
}

fn absent_rank() -> i64 {
    -1
}
