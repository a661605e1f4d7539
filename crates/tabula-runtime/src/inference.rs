//! Field-type inference.
//!
//! A column resolves to a [`ColumnType`] through an ordered cascade of pure
//! strategies; the first one that answers wins:
//!
//! | # | strategy | source |
//! |---|----------|--------|
//! | 1 | `explicit` | override `column_type` (unknown values become `text`) |
//! | 2 | `form_type` | override `form_type`, direct or translated |
//! | 3 | `name` | column name heuristics |
//! | 4 | `db_type` | database type family, `text` otherwise |

use tabula_core::{ColumnDescriptor, ColumnType, FieldOverride};

type Strategy = fn(&ColumnDescriptor, Option<&FieldOverride>) -> Option<ColumnType>;

const CASCADE: [(&str, Strategy); 4] = [
    ("explicit", from_explicit),
    ("form_type", from_form_type),
    ("name", from_name),
    ("db_type", from_db_type),
];

/// Resolve the semantic type of a column.
pub fn infer_column_type(column: &ColumnDescriptor, hint: Option<&FieldOverride>) -> ColumnType {
    explain_column_type(column, hint).0
}

/// Resolve the semantic type of a column along with the strategy that decided it.
pub fn explain_column_type(
    column: &ColumnDescriptor,
    hint: Option<&FieldOverride>,
) -> (ColumnType, &'static str) {
    CASCADE
        .iter()
        .find_map(|(name, strategy)| strategy(column, hint).map(|t| (t, *name)))
        .unwrap_or((ColumnType::Text, "db_type"))
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

fn from_explicit(_column: &ColumnDescriptor, hint: Option<&FieldOverride>) -> Option<ColumnType> {
    let raw = non_blank(hint?.column_type.as_ref())?;
    Some(raw.parse().unwrap_or(ColumnType::Text))
}

fn from_form_type(_column: &ColumnDescriptor, hint: Option<&FieldOverride>) -> Option<ColumnType> {
    let form = non_blank(hint?.form_type.as_ref())?;
    direct_form_type(&form).or_else(|| translated_form_type(&form))
}

/// Widgets whose list rendering shares their name.
fn direct_form_type(form: &str) -> Option<ColumnType> {
    match form {
        "text" | "textarea" => Some(ColumnType::Text),
        "number" => Some(ColumnType::Number),
        "date" => Some(ColumnType::Date),
        "image" => Some(ColumnType::Image),
        "images" => Some(ColumnType::Images),
        "icon" => Some(ColumnType::Icon),
        "switch" => Some(ColumnType::Switch),
        "code" => Some(ColumnType::Code),
        "custom" => Some(ColumnType::Custom),
        _ => None,
    }
}

/// Widgets that render as a different list type.
fn translated_form_type(form: &str) -> Option<ColumnType> {
    match form {
        "datetime" | "timestamp" => Some(ColumnType::Date),
        "url" => Some(ColumnType::Link),
        "radio" | "select" => Some(ColumnType::Badge),
        "relation" => Some(ColumnType::Relation),
        "checkbox" | "rich_text" | "number_range" => Some(ColumnType::Text),
        "email" | "color" | "password" | "file" => Some(ColumnType::Text),
        _ => None,
    }
}

fn is_flag_name(name: &str) -> bool {
    matches!(name, "status" | "enabled" | "active" | "visible")
        || name.starts_with("is_")
        || name.starts_with("has_")
}

fn is_image_name(name: &str) -> bool {
    name == "image" || name.contains("_image") || name.contains("image_")
}

fn from_name(column: &ColumnDescriptor, _hint: Option<&FieldOverride>) -> Option<ColumnType> {
    let name = column.name.to_ascii_lowercase();

    if name.ends_with("_at") || name.ends_with("_time") {
        return Some(ColumnType::Date);
    }
    if name == "icon" || name.ends_with("_icon") || name == "avatar" {
        return Some(ColumnType::Icon);
    }
    if is_image_name(&name) {
        return Some(ColumnType::Image);
    }
    if is_flag_name(&name) && column.is_boolean_like() {
        return Some(ColumnType::Switch);
    }
    None
}

fn is_numeric_type(base: &str) -> bool {
    matches!(
        base,
        "tinyint"
            | "smallint"
            | "mediumint"
            | "int"
            | "int2"
            | "int4"
            | "int8"
            | "integer"
            | "bigint"
            | "serial"
            | "smallserial"
            | "bigserial"
            | "decimal"
            | "numeric"
            | "float"
            | "float4"
            | "float8"
            | "double"
            | "real"
    )
}

fn is_temporal_type(base: &str) -> bool {
    matches!(base, "date" | "datetime" | "timestamp" | "timestamptz")
}

fn from_db_type(column: &ColumnDescriptor, _hint: Option<&FieldOverride>) -> Option<ColumnType> {
    let base = column.base_type();
    let resolved = if is_numeric_type(&base) {
        ColumnType::Number
    } else if is_temporal_type(&base) {
        ColumnType::Date
    } else if matches!(base.as_str(), "json" | "jsonb") {
        ColumnType::Code
    } else {
        ColumnType::Text
    };
    Some(resolved)
}

/// Default edit widget for a column without an explicit `form_type`.
pub fn suggest_form_type(column: &ColumnDescriptor) -> &'static str {
    let name = column.name.to_ascii_lowercase();
    let base = column.base_type();

    match name.as_str() {
        "password" => return "password",
        "email" => return "email",
        "url" | "link" | "website" => return "url",
        _ => {}
    }
    if is_flag_name(&name) && column.is_boolean_like() {
        return "switch";
    }
    if name == "icon" || name.ends_with("_icon") {
        return "icon";
    }
    if is_image_name(&name) || name == "avatar" {
        return "image";
    }
    if base == "date" {
        return "date";
    }
    if is_temporal_type(&base) || name.ends_with("_at") || name.ends_with("_time") {
        return "datetime";
    }
    if matches!(base.as_str(), "json" | "jsonb") {
        return "code";
    }
    if column.is_long_text() {
        return "textarea";
    }
    if is_numeric_type(&base) {
        return "number";
    }
    "text"
}
