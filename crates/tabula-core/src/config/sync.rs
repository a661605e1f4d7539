//! Settings for the derived-artifact synchronizers.

use serde::{Deserialize, Serialize};

/// Menu synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    /// Name of the site-scoped parent group every CRUD menu hangs under.
    #[serde(default = "default_group_name")]
    pub group_name: String,

    /// Title shown for the parent group.
    #[serde(default = "default_group_title")]
    pub group_title: String,

    #[serde(default = "default_group_icon")]
    pub group_icon: String,

    /// Path prefix; a config's menu lives at `{path_prefix}/{route_slug}`.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            group_name: default_group_name(),
            group_title: default_group_title(),
            group_icon: default_group_icon(),
            path_prefix: default_path_prefix(),
        }
    }
}

impl MenuConfig {
    pub fn group_path(&self) -> String {
        format!("{}/{}", self.path_prefix.trim_end_matches('/'), self.group_name)
    }

    pub fn entry_path(&self, route_slug: &str) -> String {
        format!("{}/{}", self.path_prefix.trim_end_matches('/'), route_slug)
    }
}

/// Permission synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Slug namespace; groups are `{namespace}.{route_slug}`.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Path prefix; permission paths start with `{path_prefix}/{route_prefix}`.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            path_prefix: default_path_prefix(),
        }
    }
}

impl PermissionConfig {
    /// Slug of the group node for a route slug (`crud` when the slug is empty).
    pub fn group_slug(&self, route_slug: &str) -> String {
        if route_slug.is_empty() {
            self.namespace.clone()
        } else {
            format!("{}.{}", self.namespace, route_slug)
        }
    }

    /// Base path for a route prefix.
    pub fn base_path(&self, route_prefix: &str) -> String {
        format!("{}/{}", self.path_prefix.trim_end_matches('/'), route_prefix)
    }
}

/// Schema introspection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    /// Upper bound for one `get_columns` call.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_group_name() -> String {
    "crud-system".to_string()
}

fn default_group_title() -> String {
    "System".to_string()
}

fn default_group_icon() -> String {
    "fa-cogs".to_string()
}

fn default_path_prefix() -> String {
    "/u".to_string()
}

fn default_namespace() -> String {
    "crud".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}
