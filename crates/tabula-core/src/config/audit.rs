//! Sync journal configuration.

use serde::{Deserialize, Serialize};

/// Where sync step reports are recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether the journal is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory holding `sync.log` (JSON Lines).
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Also emit a structured tracing event per step.
    #[serde(default = "default_enabled")]
    pub stdout: bool,

    /// Record successful steps, not only failures.
    #[serde(default = "default_enabled")]
    pub log_success: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            directory: default_directory(),
            stdout: default_enabled(),
            log_success: default_enabled(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_directory() -> String {
    ".tabula".to_string()
}
