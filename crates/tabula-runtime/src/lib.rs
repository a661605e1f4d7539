//! # tabula-runtime
//!
//! The engine behind Tabula:
//!
//! - [`inference`]: column type inference cascade
//! - [`merge`]: schema snapshot + stored overrides into a [`MergedView`]
//! - [`store`]: storage traits and the in-memory snapshot store
//! - [`menu_sync`] / [`permission_sync`]: derived artifact synchronizers
//! - [`orchestrator`]: the save/delete saga tying them together
//! - [`audit`]: the sync journal

pub mod audit;
pub mod error;
pub mod inference;
pub mod menu_sync;
pub mod merge;
pub mod orchestrator;
pub mod permission_sync;
pub mod schema;
pub mod slug;
pub mod store;

pub use audit::{
    create_sink, JsonlAuditSink, MemoryAuditSink, NullAuditSink, SyncAuditSink, SyncEvent,
    SyncJournal, SyncStep, SyncStepReport, TracingAuditSink,
};
pub use error::{EngineError, SchemaError, StoreError, SyncError};
pub use inference::{explain_column_type, infer_column_type, suggest_form_type};
pub use menu_sync::{MenuSyncOutcome, MenuSynchronizer};
pub use merge::{merge, FieldView, MergedView};
pub use orchestrator::{DeleteOutcome, Orchestrator, SaveOutcome, SaveRequest, SyncContext};
pub use permission_sync::{desired_actions, PermissionSyncOutcome, PermissionSynchronizer};
pub use schema::{fetch_columns, SchemaProvider, StaticSchemaProvider};
pub use store::{ConfigStore, MemoryStore, MenuStore, PermissionStore, StoreSnapshot};
