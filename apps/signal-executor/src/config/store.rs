//! Tracked-order store configuration.

use serde::{Deserialize, Serialize};

/// Supported store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Process memory; lost on restart.
    Memory,
    /// Redis documents.
    Redis,
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend.
    #[serde(default = "default_kind")]
    pub kind: StoreKind,
    /// Redis URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Key namespace; defaults to the venue kind.
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            url: None,
            namespace: None,
        }
    }
}

const fn default_kind() -> StoreKind {
    StoreKind::Memory
}
