//! CLI command implementations.

pub mod crud;
pub mod menu;
pub mod permission;
pub mod schema;

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tabula_adapter_pg::PostgresSchemaProvider;
use tabula_core::TabulaConfig;
use tabula_runtime::{
    create_sink, MemoryStore, Orchestrator, SchemaProvider, StaticSchemaProvider, SyncContext,
};

/// Everything a command needs: loaded configuration, state store and
/// schema source.
pub struct Workspace {
    pub config: TabulaConfig,
    pub store: Arc<MemoryStore>,
    pub schema: Arc<dyn SchemaProvider>,
    pub ctx: SyncContext,
}

impl Workspace {
    pub fn open(
        config_path: &Path,
        site_id: u64,
        actor: Option<String>,
        schema_file: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let config = if config_path.exists() {
            TabulaConfig::load_with_context(config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?
        } else {
            tracing::debug!("{} not found, using defaults", config_path.display());
            TabulaConfig::default()
        };

        let store = MemoryStore::load(&config.store.path)
            .with_context(|| format!("Failed to load state from {}", config.store.path.display()))?;

        let schema: Arc<dyn SchemaProvider> = match schema_file {
            Some(path) => Arc::new(
                StaticSchemaProvider::from_json_file(path)
                    .with_context(|| format!("Failed to read schema file {}", path.display()))?,
            ),
            None => Arc::new(PostgresSchemaProvider::from_config(&config)),
        };

        Ok(Self {
            config,
            store: Arc::new(store),
            schema,
            ctx: SyncContext {
                site_id,
                actor,
            },
        })
    }

    pub fn orchestrator(&self) -> anyhow::Result<Orchestrator> {
        let journal = create_sink(&self.config.audit).with_context(|| {
            format!("Failed to open sync journal in {}", self.config.audit.directory)
        })?;
        Ok(
            Orchestrator::in_memory(self.store.clone(), self.schema.clone(), &self.config)
                .with_journal(journal),
        )
    }

    /// Write the state store back to disk.
    pub fn persist(&self) -> anyhow::Result<()> {
        self.store
            .persist(&self.config.store.path)
            .with_context(|| format!("Failed to write {}", self.config.store.path.display()))
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
