//! Records shared between the engine, its stores and the CLI.

pub mod column;
pub mod column_type;
pub mod crud;
pub mod menu;
pub mod permission;

pub use column::ColumnDescriptor;
pub use column_type::{ColumnType, UnknownColumnType};
pub use crud::{
    ConfigOptions, ConfigStatus, CrudConfig, FeatureToggleInput, FeatureToggles, FieldOverride,
    IdentityField, IdentitySnapshot, OptionItem, Relation,
};
pub use menu::{MenuEntry, NewMenuEntry};
pub use permission::{HttpMethod, NewPermission, PermissionKind, PermissionNode};
