//! Storage traits for configurations and derived artifacts.
//!
//! Menus and permissions are stored as flat arenas keyed by id with explicit
//! `parent_id` references. Tree walks are computed on demand through
//! repeated child lookups ([`menu_subtree`], [`permission_subtree`]).

pub mod memory;

use async_trait::async_trait;
use tabula_core::{CrudConfig, MenuEntry, NewMenuEntry, NewPermission, PermissionNode};

use crate::error::StoreError;

pub use memory::{MemoryStore, StoreSnapshot};

/// CRUD over persisted configurations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config(&self, id: u64) -> Result<Option<CrudConfig>, StoreError>;

    async fn find_config(
        &self,
        site_id: u64,
        table_name: &str,
        db_connection: &str,
    ) -> Result<Option<CrudConfig>, StoreError>;

    /// Route slugs are unique across all sites.
    async fn find_config_by_slug(&self, route_slug: &str) -> Result<Option<CrudConfig>, StoreError>;

    async fn list_configs(&self, site_id: u64) -> Result<Vec<CrudConfig>, StoreError>;

    /// Insert a new record; the store assigns `id`.
    async fn insert_config(&self, config: CrudConfig) -> Result<CrudConfig, StoreError>;

    async fn update_config(&self, config: &CrudConfig) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete_config(&self, id: u64) -> Result<bool, StoreError>;
}

/// Site-scoped menu tree. Unique on (site, parent, path).
#[async_trait]
pub trait MenuStore: Send + Sync {
    async fn get_menu(&self, id: u64) -> Result<Option<MenuEntry>, StoreError>;

    async fn find_menu(
        &self,
        site_id: u64,
        parent_id: Option<u64>,
        path: &str,
    ) -> Result<Option<MenuEntry>, StoreError>;

    /// Top-level entry with the given name.
    async fn find_root_menu(&self, site_id: u64, name: &str)
    -> Result<Option<MenuEntry>, StoreError>;

    async fn child_menus(&self, parent_id: u64) -> Result<Vec<MenuEntry>, StoreError>;

    async fn list_menus(&self, site_id: u64) -> Result<Vec<MenuEntry>, StoreError>;

    async fn insert_menu(&self, entry: NewMenuEntry) -> Result<MenuEntry, StoreError>;

    async fn update_menu(&self, entry: &MenuEntry) -> Result<(), StoreError>;

    async fn delete_menu(&self, id: u64) -> Result<bool, StoreError>;
}

/// Global permission tree plus role associations. Unique on slug.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_permission(&self, id: u64) -> Result<Option<PermissionNode>, StoreError>;

    async fn find_permission(&self, slug: &str) -> Result<Option<PermissionNode>, StoreError>;

    async fn child_permissions(&self, parent_id: u64) -> Result<Vec<PermissionNode>, StoreError>;

    async fn list_permissions(&self) -> Result<Vec<PermissionNode>, StoreError>;

    async fn insert_permission(&self, node: NewPermission) -> Result<PermissionNode, StoreError>;

    async fn update_permission(&self, node: &PermissionNode) -> Result<(), StoreError>;

    async fn delete_permission(&self, id: u64) -> Result<bool, StoreError>;

    async fn attach_role(&self, role: &str, permission_id: u64) -> Result<(), StoreError>;

    async fn roles_of(&self, permission_id: u64) -> Result<Vec<String>, StoreError>;

    /// Remove every role association of a node; returns how many were removed.
    async fn detach_roles(&self, permission_id: u64) -> Result<usize, StoreError>;
}

/// All descendants of `root_id`, deepest first. `root_id` itself is excluded.
pub async fn menu_subtree(
    store: &dyn MenuStore,
    root_id: u64,
) -> Result<Vec<MenuEntry>, StoreError> {
    let mut ordered = Vec::new();
    let mut frontier = vec![root_id];
    while let Some(id) = frontier.pop() {
        for child in store.child_menus(id).await? {
            frontier.push(child.id);
            ordered.push(child);
        }
    }
    ordered.reverse();
    Ok(ordered)
}

/// All descendants of `root_id`, deepest first. `root_id` itself is excluded.
pub async fn permission_subtree(
    store: &dyn PermissionStore,
    root_id: u64,
) -> Result<Vec<PermissionNode>, StoreError> {
    let mut ordered = Vec::new();
    let mut frontier = vec![root_id];
    while let Some(id) = frontier.pop() {
        for child in store.child_permissions(id).await? {
            frontier.push(child.id);
            ordered.push(child);
        }
    }
    ordered.reverse();
    Ok(ordered)
}

/// Ancestor chain of a permission, nearest first.
pub async fn permission_ancestors(
    store: &dyn PermissionStore,
    node: &PermissionNode,
) -> Result<Vec<PermissionNode>, StoreError> {
    let mut chain = Vec::new();
    let mut next = node.parent_id;
    while let Some(id) = next {
        match store.get_permission(id).await? {
            // A cycle would only come from a corrupted snapshot; stop rather than loop.
            Some(parent) if !chain.iter().any(|p: &PermissionNode| p.id == parent.id) => {
                next = parent.parent_id;
                chain.push(parent);
            }
            _ => break,
        }
    }
    Ok(chain)
}
