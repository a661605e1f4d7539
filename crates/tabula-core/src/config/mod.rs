//! Configuration types for Tabula.
//!
//! Configuration is loaded from a single YAML file (`tabula.yaml` by default)
//! into a [`TabulaConfig`]. Every section is optional and falls back to
//! defaults, so an empty file is a valid configuration.
//!
//! ```yaml
//! project: backoffice
//! connections:
//!   default:
//!     url_env: DATABASE_URL
//! store:
//!   path: .tabula/state.json
//! menu:
//!   group_name: crud-system
//! permission:
//!   namespace: crud
//! introspection:
//!   timeout_seconds: 10
//! ```

pub mod audit;
pub mod connection;
pub mod sync;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use audit::AuditConfig;
pub use connection::ConnectionConfig;
pub use sync::{IntrospectionConfig, MenuConfig, PermissionConfig};

/// Name of the connection used when a request does not name one.
pub const DEFAULT_CONNECTION: &str = "default";

/// Complete Tabula configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabulaConfig {
    #[serde(default)]
    pub project: Option<String>,

    /// Named database connections available for introspection.
    #[serde(default = "default_connections")]
    pub connections: BTreeMap<String, ConnectionConfig>,

    /// Where configuration and derived artifacts are persisted.
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub menu: MenuConfig,

    #[serde(default)]
    pub permission: PermissionConfig,

    #[serde(default)]
    pub introspection: IntrospectionConfig,

    /// Sync journal.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for TabulaConfig {
    fn default() -> Self {
        Self {
            project: None,
            connections: default_connections(),
            store: StoreConfig::default(),
            menu: MenuConfig::default(),
            permission: PermissionConfig::default(),
            introspection: IntrospectionConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// Snapshot store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot file holding configs, menus, permissions and role links.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_connections() -> BTreeMap<String, ConnectionConfig> {
    let mut connections = BTreeMap::new();
    connections.insert(DEFAULT_CONNECTION.to_string(), ConnectionConfig::default());
    connections
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".tabula/state.json")
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown connection: {0}")]
    UnknownConnection(String),
}

impl TabulaConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve relative paths against the file's directory.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if config.store.path.is_relative() {
            config.store.path = base_dir.join(&config.store.path);
        }

        let journal_dir = PathBuf::from(&config.audit.directory);
        if journal_dir.is_relative() {
            config.audit.directory = base_dir.join(journal_dir).to_string_lossy().into_owned();
        }

        Ok(config)
    }

    /// Get a connection by name.
    pub fn connection(&self, name: &str) -> Result<&ConnectionConfig, ConfigError> {
        self.connections
            .get(name)
            .ok_or_else(|| ConfigError::UnknownConnection(name.to_string()))
    }
}
