//! Merge a schema snapshot with persisted overrides into an editable view.
//!
//! Merging is pure and total: it produces a view with schema-only defaults
//! when no configuration has been saved yet. Identity fields are left `None`
//! in that case so callers can propose their own values.

use serde::{Deserialize, Serialize};
use tabula_core::{
    ColumnDescriptor, ColumnType, ConfigStatus, CrudConfig, FeatureToggles, FieldOverride,
    OptionItem, Relation,
};

use crate::inference::{explain_column_type, suggest_form_type};
use crate::slug::humanize;

/// Columns never editable through generated forms.
const SYSTEM_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

/// Column that signals soft-delete support.
pub const SOFT_DELETE_COLUMN: &str = "deleted_at";

/// Page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// One field of the merged view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldView {
    pub name: String,
    pub db_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub label: String,
    pub listable: bool,
    pub searchable: bool,
    pub sortable: bool,
    pub editable: bool,
    pub required: bool,
    pub form_type: String,
    pub column_type: ColumnType,
    /// Which inference strategy produced `column_type`.
    pub inferred_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionItem>,
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
    pub disabled: bool,
    pub readonly: bool,
}

/// View-ready configuration for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedView {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<u64>,
    pub model_name: Option<String>,
    pub controller_name: Option<String>,
    pub module_name: Option<String>,
    pub route_slug: Option<String>,
    pub route_prefix: Option<String>,
    pub icon: Option<String>,
    pub page_size: u32,
    pub sync_to_menu: bool,
    pub status: ConfigStatus,
    pub features: FeatureToggles,
    pub fields: Vec<FieldView>,
}

/// Build the schema-only view of a column.
fn schema_defaults(column: &ColumnDescriptor) -> FieldView {
    let name = column.name.to_ascii_lowercase();
    let editable = !SYSTEM_COLUMNS.contains(&name.as_str());
    let listable = name != "password" && name != SOFT_DELETE_COLUMN && !column.is_long_text();
    let sortable = name == "id" || name.ends_with("_at");
    let (column_type, inferred_by) = explain_column_type(column, None);

    FieldView {
        name: column.name.clone(),
        db_type: column.db_type.clone(),
        nullable: column.nullable,
        comment: column.comment.clone(),
        label: column
            .comment
            .as_ref()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| humanize(&column.name)),
        listable,
        searchable: false,
        sortable,
        editable,
        required: editable && !column.nullable && column.default.is_none(),
        form_type: suggest_form_type(column).to_string(),
        column_type,
        inferred_by: inferred_by.to_string(),
        default_value: column.default.clone(),
        options: Vec::new(),
        relation: None,
        placeholder: None,
        help: None,
        min: None,
        max: None,
        step: None,
        disabled: false,
        readonly: false,
    }
}

/// Overlay every key present in `over` onto `view`.
fn apply_override(view: &mut FieldView, column: &ColumnDescriptor, over: &FieldOverride) {
    if let Some(label) = &over.label {
        view.label = label.clone();
    }
    if let Some(v) = over.listable {
        view.listable = v;
    }
    if let Some(v) = over.searchable {
        view.searchable = v;
    }
    if let Some(v) = over.sortable {
        view.sortable = v;
    }
    if let Some(v) = over.editable {
        view.editable = v;
    }
    if let Some(v) = over.required {
        view.required = v;
    }
    if let Some(form_type) = over.form_type.as_ref().filter(|f| !f.trim().is_empty()) {
        view.form_type = form_type.clone();
    }
    if let Some(default_value) = &over.default_value {
        view.default_value = Some(default_value.clone());
    }
    if let Some(options) = &over.options {
        view.options = options.clone();
    }
    if let Some(relation) = &over.relation {
        view.relation = Some(relation.clone());
    }
    if over.placeholder.is_some() {
        view.placeholder = over.placeholder.clone();
    }
    if over.help.is_some() {
        view.help = over.help.clone();
    }
    if over.min.is_some() {
        view.min = over.min;
    }
    if over.max.is_some() {
        view.max = over.max;
    }
    if over.step.is_some() {
        view.step = over.step;
    }
    if let Some(v) = over.disabled {
        view.disabled = v;
    }
    if let Some(v) = over.readonly {
        view.readonly = v;
    }

    let (column_type, inferred_by) = explain_column_type(column, Some(over));
    view.column_type = column_type;
    view.inferred_by = inferred_by.to_string();
}

/// Toggles used when nothing has been stored for the table.
pub fn default_features(columns: &[ColumnDescriptor]) -> FeatureToggles {
    FeatureToggles {
        soft_delete: columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(SOFT_DELETE_COLUMN)),
        ..FeatureToggles::default()
    }
}

/// Merge `columns` (in schema order) with an optional persisted config.
pub fn merge(table_name: &str, columns: &[ColumnDescriptor], config: Option<&CrudConfig>) -> MergedView {
    let mut fields: Vec<FieldView> = columns
        .iter()
        .map(|column| {
            let mut view = schema_defaults(column);
            if let Some(over) = config.and_then(|c| c.field(&column.name)) {
                apply_override(&mut view, column, over);
            }
            view
        })
        .collect();

    // Stable: fields without an explicit sort keep schema order.
    if let Some(config) = config {
        fields.sort_by_key(|f| config.field(&f.name).and_then(|o| o.sort).unwrap_or(i32::MAX));
    }

    let features = match config {
        Some(config) => config.stored_features().unwrap_or(FeatureToggles {
            soft_delete: config.soft_delete,
            ..default_features(columns)
        }),
        None => default_features(columns),
    };

    MergedView {
        table_name: table_name.to_string(),
        config_id: config.map(|c| c.id),
        model_name: config.map(|c| c.model_name.clone()),
        controller_name: config.map(|c| c.controller_name.clone()),
        module_name: config.map(|c| c.module_name.clone()),
        route_slug: config.map(|c| c.route_slug.clone()),
        route_prefix: config.map(|c| c.route_prefix.clone()),
        icon: config.map(|c| c.icon.clone()),
        page_size: config.map(|c| c.page_size).unwrap_or(DEFAULT_PAGE_SIZE),
        sync_to_menu: config.map(|c| c.sync_to_menu).unwrap_or(true),
        status: config.map(|c| c.status).unwrap_or_default(),
        features,
        fields,
    }
}
