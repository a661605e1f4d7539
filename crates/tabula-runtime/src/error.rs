//! Error types for the runtime crate.

use thiserror::Error;

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated on {entity}: {key}")]
    UniqueViolation { entity: &'static str, key: String },

    /// The record to update does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: u64 },

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Errors raised while fetching a schema snapshot.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema introspection for {table} timed out after {seconds}s")]
    Timeout { table: String, seconds: u64 },

    #[error("table {table} not found on connection {connection}")]
    TableNotFound { table: String, connection: String },

    #[error("schema provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

/// A dependent-artifact synchronization failure.
///
/// The orchestrator never propagates these; they end up in step reports
/// and the sync journal.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("menu sync failed: {0}")]
    Menu(#[source] StoreError),

    #[error("permission sync failed: {0}")]
    Permission(#[source] StoreError),

    /// Some nodes failed while the rest of the pass completed.
    #[error("permission sync incomplete, {failed} node(s) failed: {summary}")]
    PartialPermission { failed: usize, summary: String },
}

/// Errors returned to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request was rejected before anything was persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request conflicts with existing state.
    #[error("{0}")]
    Business(String),

    /// The primary configuration write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}
