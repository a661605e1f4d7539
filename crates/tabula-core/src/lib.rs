//! # tabula-core
//!
//! Records and configuration shared by every Tabula crate:
//!
//! - [`model`]: CRUD configurations, field overrides, menu entries,
//!   permission nodes and introspected column descriptors
//! - [`config`]: the `tabula.yaml` configuration layer

pub mod config;
pub mod model;

pub use config::{
    AuditConfig, ConfigError, ConnectionConfig, IntrospectionConfig, MenuConfig,
    PermissionConfig, StoreConfig, TabulaConfig, DEFAULT_CONNECTION,
};
pub use model::{
    ColumnDescriptor, ColumnType, ConfigOptions, ConfigStatus, CrudConfig, FeatureToggleInput,
    FeatureToggles, FieldOverride, HttpMethod, IdentityField, IdentitySnapshot, MenuEntry,
    NewMenuEntry, NewPermission, OptionItem, PermissionKind, PermissionNode, Relation,
};
