//! Per-table CRUD configuration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feature toggles controlling which actions (and permission children) exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    #[serde(default = "default_true")]
    pub search: bool,
    #[serde(default = "default_true")]
    pub add: bool,
    #[serde(default = "default_true")]
    pub edit: bool,
    #[serde(default = "default_true")]
    pub delete: bool,
    #[serde(default = "default_true")]
    pub export: bool,
    #[serde(default)]
    pub soft_delete: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            search: true,
            add: true,
            edit: true,
            delete: true,
            export: true,
            soft_delete: false,
        }
    }
}

/// Partially specified toggles, as submitted by a caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggleInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete: Option<bool>,
}

impl FeatureToggleInput {
    /// Fill unset toggles from `base`.
    pub fn resolve(&self, base: FeatureToggles) -> FeatureToggles {
        FeatureToggles {
            search: self.search.unwrap_or(base.search),
            add: self.add.unwrap_or(base.add),
            edit: self.edit.unwrap_or(base.edit),
            delete: self.delete.unwrap_or(base.delete),
            export: self.export.unwrap_or(base.export),
            soft_delete: self.soft_delete.unwrap_or(base.soft_delete),
        }
    }
}

/// Lifecycle status of a configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ConfigStatus {
    #[default]
    Configuring,
    Generated,
}

impl TryFrom<u8> for ConfigStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ConfigStatus::Configuring),
            2 => Ok(ConfigStatus::Generated),
            other => Err(format!("invalid config status: {}", other)),
        }
    }
}

impl From<ConfigStatus> for u8 {
    fn from(status: ConfigStatus) -> Self {
        match status {
            ConfigStatus::Configuring => 1,
            ConfigStatus::Generated => 2,
        }
    }
}

/// One selectable option of a badge/select/radio field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub value: String,
    pub label: String,
}

/// Foreign-table lookup used by relation fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub table: String,
    #[serde(default = "default_label_field")]
    pub label_field: String,
    #[serde(default = "default_value_field")]
    pub value_field: String,
    #[serde(default)]
    pub multiple: bool,
}

/// Per-field override. Every key left `None` falls back to the schema default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOverride {
    /// Column name this override applies to.
    pub field: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Edit widget (`text`, `select`, `datetime`, ...). Free-form on purpose:
    /// unknown widgets are kept and simply fall through during inference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_type: Option<String>,
    /// Explicit list column type; unknown values render as `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<i32>,
}

impl FieldOverride {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }
}

/// Free-form options blob stored with a configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureToggles>,
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Persisted configuration for one (site, table, connection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrudConfig {
    pub id: u64,
    pub site_id: u64,
    pub table_name: String,
    pub db_connection: String,
    pub model_name: String,
    pub controller_name: String,
    pub module_name: String,
    pub route_slug: String,
    pub route_prefix: String,
    #[serde(default)]
    pub icon: String,
    pub page_size: u32,
    #[serde(default)]
    pub soft_delete: bool,

    // Scalar feature columns written by older releases; they take precedence
    // over `options.features` when any of them is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_search: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_add: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_edit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_export: Option<bool>,

    #[serde(default)]
    pub options: ConfigOptions,
    #[serde(default)]
    pub fields: Vec<FieldOverride>,
    #[serde(default = "default_true")]
    pub sync_to_menu: bool,
    #[serde(default)]
    pub status: ConfigStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrudConfig {
    /// Look up the override for a field.
    pub fn field(&self, name: &str) -> Option<&FieldOverride> {
        self.fields.iter().find(|f| f.field == name)
    }

    fn has_legacy_features(&self) -> bool {
        self.enable_search.is_some()
            || self.enable_add.is_some()
            || self.enable_edit.is_some()
            || self.enable_delete.is_some()
            || self.enable_export.is_some()
    }

    /// Toggles as stored, without falling back to engine defaults.
    ///
    /// Legacy scalar columns win over `options.features`. The `soft_delete`
    /// flag always comes from the record itself.
    pub fn stored_features(&self) -> Option<FeatureToggles> {
        let mut features = if self.has_legacy_features() {
            FeatureToggles {
                search: self.enable_search.unwrap_or(true),
                add: self.enable_add.unwrap_or(true),
                edit: self.enable_edit.unwrap_or(true),
                delete: self.enable_delete.unwrap_or(true),
                export: self.enable_export.unwrap_or(true),
                soft_delete: false,
            }
        } else {
            self.options.features?
        };
        features.soft_delete = self.soft_delete;
        Some(features)
    }

    /// Effective toggles for this record.
    pub fn features(&self) -> FeatureToggles {
        self.stored_features().unwrap_or(FeatureToggles {
            soft_delete: self.soft_delete,
            ..FeatureToggles::default()
        })
    }

    /// Write toggles into both the scalar columns and `options.features`.
    pub fn set_features(&mut self, features: FeatureToggles) {
        self.enable_search = Some(features.search);
        self.enable_add = Some(features.add);
        self.enable_edit = Some(features.edit);
        self.enable_delete = Some(features.delete);
        self.enable_export = Some(features.export);
        self.soft_delete = features.soft_delete;
        self.options.features = Some(features);
    }

    pub fn identity(&self) -> IdentitySnapshot {
        IdentitySnapshot::of(self)
    }
}

/// An identity field whose change triggers artifact resynchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    ModelName,
    ModuleName,
    RouteSlug,
    Icon,
}

/// Identity values captured around a save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub model_name: Option<String>,
    pub module_name: Option<String>,
    pub route_slug: Option<String>,
    pub icon: Option<String>,
    /// Carried for permission paths; not itself an identity field.
    pub route_prefix: Option<String>,
}

impl IdentitySnapshot {
    pub fn of(config: &CrudConfig) -> Self {
        Self {
            model_name: Some(config.model_name.clone()),
            module_name: Some(config.module_name.clone()),
            route_slug: Some(config.route_slug.clone()),
            icon: Some(config.icon.clone()),
            route_prefix: Some(config.route_prefix.clone()),
        }
    }

    /// Identity fields that differ between `self` (before) and `after`.
    pub fn diff(&self, after: &IdentitySnapshot) -> Vec<IdentityField> {
        let mut changed = Vec::new();
        if self.model_name != after.model_name {
            changed.push(IdentityField::ModelName);
        }
        if self.module_name != after.module_name {
            changed.push(IdentityField::ModuleName);
        }
        if self.route_slug != after.route_slug {
            changed.push(IdentityField::RouteSlug);
        }
        if self.icon != after.icon {
            changed.push(IdentityField::Icon);
        }
        changed
    }
}

fn default_true() -> bool {
    true
}

fn default_label_field() -> String {
    "name".to_string()
}

fn default_value_field() -> String {
    "id".to_string()
}
