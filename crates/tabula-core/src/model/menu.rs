//! Navigation menu entries derived from CRUD configurations.

use serde::{Deserialize, Serialize};

/// Site-scoped menu tree node. Unique on (site, parent, path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub id: u64,
    pub site_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub icon: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(default)]
    pub sort: i32,
}

/// A menu entry that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMenuEntry {
    pub site_id: u64,
    pub parent_id: Option<u64>,
    pub name: String,
    pub title: String,
    pub icon: String,
    pub path: String,
    pub permission: Option<String>,
    pub sort: i32,
}

impl NewMenuEntry {
    pub fn into_entry(self, id: u64) -> MenuEntry {
        MenuEntry {
            id,
            site_id: self.site_id,
            parent_id: self.parent_id,
            name: self.name,
            title: self.title,
            icon: self.icon,
            path: self.path,
            permission: self.permission,
            sort: self.sort,
        }
    }
}
