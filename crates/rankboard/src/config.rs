//! Engine configuration sourced from the environment.

use serde::{Deserialize, Serialize};

/// Connection and paging defaults, deserialized from `RANKBOARD_`-prefixed
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub redis_url: String,
    /// Page size applied when callers do not pick one per board.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
}

fn default_page_size() -> usize {
    20
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("RANKBOARD_").from_env()
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}
