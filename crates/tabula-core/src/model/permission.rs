//! Hierarchical access-control permissions derived from CRUD configurations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a node groups other permissions or grants a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Group,
    Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Globally keyed permission tree node. Unique on `slug`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionNode {
    pub id: u64,
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    pub kind: PermissionKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub sort: i32,
}

/// A permission node that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub slug: String,
    pub name: String,
    pub parent_id: Option<u64>,
    pub kind: PermissionKind,
    pub path: String,
    pub method: Option<HttpMethod>,
    pub icon: String,
    pub sort: i32,
}

impl NewPermission {
    pub fn into_node(self, id: u64) -> PermissionNode {
        PermissionNode {
            id,
            slug: self.slug,
            name: self.name,
            parent_id: self.parent_id,
            kind: self.kind,
            path: self.path,
            method: self.method,
            icon: self.icon,
            sort: self.sort,
        }
    }
}
