//! Column descriptors returned by schema introspection.

use serde::{Deserialize, Serialize};

/// One column of an introspected table.
///
/// `db_type` is kept as reported by the database (e.g. `tinyint(1) unsigned`,
/// `character varying`); use [`ColumnDescriptor::base_type`] for matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub db_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, db_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: db_type.into(),
            nullable: false,
            default: None,
            comment: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Lowercased type name without length/precision or modifiers.
    ///
    /// `"TINYINT(1) UNSIGNED"` becomes `"tinyint"`,
    /// `"timestamp without time zone"` becomes `"timestamp"`.
    pub fn base_type(&self) -> String {
        let lowered = self.db_type.trim().to_ascii_lowercase();
        let head = lowered
            .split(['(', ' '])
            .next()
            .unwrap_or_default()
            .to_string();
        head
    }

    /// Whether the column stores a boolean-like flag.
    pub fn is_boolean_like(&self) -> bool {
        matches!(
            self.base_type().as_str(),
            "bool" | "boolean" | "bit" | "tinyint"
        )
    }

    /// Whether the column stores long free-form text.
    pub fn is_long_text(&self) -> bool {
        matches!(
            self.base_type().as_str(),
            "text" | "mediumtext" | "longtext" | "json" | "jsonb"
        )
    }
}
