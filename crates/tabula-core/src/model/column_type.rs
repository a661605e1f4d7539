//! Semantic column types used for list/search/edit rendering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of semantic UI types a column can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Date,
    Icon,
    Image,
    Images,
    Switch,
    Badge,
    Code,
    Link,
    Relation,
    Custom,
}

impl ColumnType {
    pub const ALL: [ColumnType; 12] = [
        ColumnType::Text,
        ColumnType::Number,
        ColumnType::Date,
        ColumnType::Icon,
        ColumnType::Image,
        ColumnType::Images,
        ColumnType::Switch,
        ColumnType::Badge,
        ColumnType::Code,
        ColumnType::Link,
        ColumnType::Relation,
        ColumnType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Icon => "icon",
            ColumnType::Image => "image",
            ColumnType::Images => "images",
            ColumnType::Switch => "switch",
            ColumnType::Badge => "badge",
            ColumnType::Code => "code",
            ColumnType::Link => "link",
            ColumnType::Relation => "relation",
            ColumnType::Custom => "custom",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Returned when a string does not name a [`ColumnType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown column type: {0}")]
pub struct UnknownColumnType(pub String);

impl FromStr for ColumnType {
    type Err = UnknownColumnType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ColumnType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| UnknownColumnType(s.to_string()))
    }
}
