//! In-memory arena store with JSON snapshot persistence.
//!
//! All three store traits are implemented over one set of arenas guarded by
//! a single `RwLock`, so uniqueness checks and writes are atomic with respect
//! to each other. [`MemoryStore::load`] and [`MemoryStore::persist`] move the
//! whole state to and from a snapshot file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tabula_core::{CrudConfig, MenuEntry, NewMenuEntry, NewPermission, PermissionNode};

use super::{ConfigStore, MenuStore, PermissionStore};
use crate::error::StoreError;

/// Serialized form of the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub configs: Vec<CrudConfig>,
    #[serde(default)]
    pub menus: Vec<MenuEntry>,
    #[serde(default)]
    pub permissions: Vec<PermissionNode>,
    /// `(role, permission_id)` pairs.
    #[serde(default)]
    pub role_permissions: Vec<(String, u64)>,
}

#[derive(Debug, Default)]
struct Arenas {
    configs: BTreeMap<u64, CrudConfig>,
    menus: BTreeMap<u64, MenuEntry>,
    permissions: BTreeMap<u64, PermissionNode>,
    role_permissions: BTreeSet<(String, u64)>,
    next_config_id: u64,
    next_menu_id: u64,
    next_permission_id: u64,
}

impl Arenas {
    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let configs: BTreeMap<u64, CrudConfig> =
            snapshot.configs.into_iter().map(|c| (c.id, c)).collect();
        let menus: BTreeMap<u64, MenuEntry> =
            snapshot.menus.into_iter().map(|m| (m.id, m)).collect();
        let permissions: BTreeMap<u64, PermissionNode> =
            snapshot.permissions.into_iter().map(|p| (p.id, p)).collect();

        Self {
            next_config_id: configs.keys().max().copied().unwrap_or(0),
            next_menu_id: menus.keys().max().copied().unwrap_or(0),
            next_permission_id: permissions.keys().max().copied().unwrap_or(0),
            configs,
            menus,
            permissions,
            role_permissions: snapshot.role_permissions.into_iter().collect(),
        }
    }

    fn to_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            configs: self.configs.values().cloned().collect(),
            menus: self.menus.values().cloned().collect(),
            permissions: self.permissions.values().cloned().collect(),
            role_permissions: self.role_permissions.iter().cloned().collect(),
        }
    }

    fn check_config_unique(&self, config: &CrudConfig) -> Result<(), StoreError> {
        for other in self.configs.values().filter(|c| c.id != config.id) {
            if other.site_id == config.site_id
                && other.table_name == config.table_name
                && other.db_connection == config.db_connection
            {
                return Err(StoreError::UniqueViolation {
                    entity: "crud_config",
                    key: format!("{}/{}", config.db_connection, config.table_name),
                });
            }
            // Permission groups are keyed by slug alone, so slugs are global.
            if other.route_slug == config.route_slug {
                return Err(StoreError::UniqueViolation {
                    entity: "crud_config",
                    key: format!("route_slug={}", config.route_slug),
                });
            }
        }
        Ok(())
    }

    fn check_menu_unique(
        &self,
        id: u64,
        site_id: u64,
        parent_id: Option<u64>,
        path: &str,
    ) -> Result<(), StoreError> {
        let taken = self.menus.values().any(|m| {
            m.id != id && m.site_id == site_id && m.parent_id == parent_id && m.path == path
        });
        if taken {
            return Err(StoreError::UniqueViolation {
                entity: "menu",
                key: format!("site={} parent={:?} path={}", site_id, parent_id, path),
            });
        }
        Ok(())
    }

    fn check_permission_unique(&self, id: u64, slug: &str) -> Result<(), StoreError> {
        if self.permissions.values().any(|p| p.id != id && p.slug == slug) {
            return Err(StoreError::UniqueViolation {
                entity: "permission",
                key: slug.to_string(),
            });
        }
        Ok(())
    }
}

/// Arena store implementing [`ConfigStore`], [`MenuStore`] and [`PermissionStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    arenas: RwLock<Arenas>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            arenas: RwLock::new(Arenas::from_snapshot(snapshot)),
        }
    }

    /// Load a snapshot file; a missing file yields an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            configs = snapshot.configs.len(),
            menus = snapshot.menus.len(),
            permissions = snapshot.permissions.len(),
            "Loaded store snapshot from {}",
            path.display()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current state to `path`, replacing it atomically.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.snapshot()?)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        Ok(self.read()?.to_snapshot())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Arenas>, StoreError> {
        self.arenas.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Arenas>, StoreError> {
        self.arenas.write().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config(&self, id: u64) -> Result<Option<CrudConfig>, StoreError> {
        Ok(self.read()?.configs.get(&id).cloned())
    }

    async fn find_config(
        &self,
        site_id: u64,
        table_name: &str,
        db_connection: &str,
    ) -> Result<Option<CrudConfig>, StoreError> {
        Ok(self
            .read()?
            .configs
            .values()
            .find(|c| {
                c.site_id == site_id
                    && c.table_name == table_name
                    && c.db_connection == db_connection
            })
            .cloned())
    }

    async fn find_config_by_slug(&self, route_slug: &str) -> Result<Option<CrudConfig>, StoreError> {
        Ok(self
            .read()?
            .configs
            .values()
            .find(|c| c.route_slug == route_slug)
            .cloned())
    }

    async fn list_configs(&self, site_id: u64) -> Result<Vec<CrudConfig>, StoreError> {
        Ok(self
            .read()?
            .configs
            .values()
            .filter(|c| c.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn insert_config(&self, mut config: CrudConfig) -> Result<CrudConfig, StoreError> {
        let mut arenas = self.write()?;
        config.id = arenas.next_config_id + 1;
        arenas.check_config_unique(&config)?;
        arenas.next_config_id = config.id;
        arenas.configs.insert(config.id, config.clone());
        Ok(config)
    }

    async fn update_config(&self, config: &CrudConfig) -> Result<(), StoreError> {
        let mut arenas = self.write()?;
        if !arenas.configs.contains_key(&config.id) {
            return Err(StoreError::NotFound {
                entity: "crud_config",
                id: config.id,
            });
        }
        arenas.check_config_unique(config)?;
        arenas.configs.insert(config.id, config.clone());
        Ok(())
    }

    async fn delete_config(&self, id: u64) -> Result<bool, StoreError> {
        Ok(self.write()?.configs.remove(&id).is_some())
    }
}

#[async_trait]
impl MenuStore for MemoryStore {
    async fn get_menu(&self, id: u64) -> Result<Option<MenuEntry>, StoreError> {
        Ok(self.read()?.menus.get(&id).cloned())
    }

    async fn find_menu(
        &self,
        site_id: u64,
        parent_id: Option<u64>,
        path: &str,
    ) -> Result<Option<MenuEntry>, StoreError> {
        Ok(self
            .read()?
            .menus
            .values()
            .find(|m| m.site_id == site_id && m.parent_id == parent_id && m.path == path)
            .cloned())
    }

    async fn find_root_menu(
        &self,
        site_id: u64,
        name: &str,
    ) -> Result<Option<MenuEntry>, StoreError> {
        Ok(self
            .read()?
            .menus
            .values()
            .find(|m| m.site_id == site_id && m.parent_id.is_none() && m.name == name)
            .cloned())
    }

    async fn child_menus(&self, parent_id: u64) -> Result<Vec<MenuEntry>, StoreError> {
        Ok(self
            .read()?
            .menus
            .values()
            .filter(|m| m.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn list_menus(&self, site_id: u64) -> Result<Vec<MenuEntry>, StoreError> {
        Ok(self
            .read()?
            .menus
            .values()
            .filter(|m| m.site_id == site_id)
            .cloned()
            .collect())
    }

    async fn insert_menu(&self, entry: NewMenuEntry) -> Result<MenuEntry, StoreError> {
        let mut arenas = self.write()?;
        arenas.check_menu_unique(0, entry.site_id, entry.parent_id, &entry.path)?;
        arenas.next_menu_id += 1;
        let entry = entry.into_entry(arenas.next_menu_id);
        arenas.menus.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update_menu(&self, entry: &MenuEntry) -> Result<(), StoreError> {
        let mut arenas = self.write()?;
        if !arenas.menus.contains_key(&entry.id) {
            return Err(StoreError::NotFound {
                entity: "menu",
                id: entry.id,
            });
        }
        arenas.check_menu_unique(entry.id, entry.site_id, entry.parent_id, &entry.path)?;
        arenas.menus.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete_menu(&self, id: u64) -> Result<bool, StoreError> {
        Ok(self.write()?.menus.remove(&id).is_some())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_permission(&self, id: u64) -> Result<Option<PermissionNode>, StoreError> {
        Ok(self.read()?.permissions.get(&id).cloned())
    }

    async fn find_permission(&self, slug: &str) -> Result<Option<PermissionNode>, StoreError> {
        Ok(self
            .read()?
            .permissions
            .values()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn child_permissions(&self, parent_id: u64) -> Result<Vec<PermissionNode>, StoreError> {
        Ok(self
            .read()?
            .permissions
            .values()
            .filter(|p| p.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn list_permissions(&self) -> Result<Vec<PermissionNode>, StoreError> {
        Ok(self.read()?.permissions.values().cloned().collect())
    }

    async fn insert_permission(&self, node: NewPermission) -> Result<PermissionNode, StoreError> {
        let mut arenas = self.write()?;
        arenas.check_permission_unique(0, &node.slug)?;
        arenas.next_permission_id += 1;
        let node = node.into_node(arenas.next_permission_id);
        arenas.permissions.insert(node.id, node.clone());
        Ok(node)
    }

    async fn update_permission(&self, node: &PermissionNode) -> Result<(), StoreError> {
        let mut arenas = self.write()?;
        if !arenas.permissions.contains_key(&node.id) {
            return Err(StoreError::NotFound {
                entity: "permission",
                id: node.id,
            });
        }
        arenas.check_permission_unique(node.id, &node.slug)?;
        arenas.permissions.insert(node.id, node.clone());
        Ok(())
    }

    async fn delete_permission(&self, id: u64) -> Result<bool, StoreError> {
        let mut arenas = self.write()?;
        arenas.role_permissions.retain(|(_, pid)| *pid != id);
        Ok(arenas.permissions.remove(&id).is_some())
    }

    async fn attach_role(&self, role: &str, permission_id: u64) -> Result<(), StoreError> {
        let mut arenas = self.write()?;
        if !arenas.permissions.contains_key(&permission_id) {
            return Err(StoreError::NotFound {
                entity: "permission",
                id: permission_id,
            });
        }
        arenas
            .role_permissions
            .insert((role.to_string(), permission_id));
        Ok(())
    }

    async fn roles_of(&self, permission_id: u64) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read()?
            .role_permissions
            .iter()
            .filter(|(_, pid)| *pid == permission_id)
            .map(|(role, _)| role.clone())
            .collect())
    }

    async fn detach_roles(&self, permission_id: u64) -> Result<usize, StoreError> {
        let mut arenas = self.write()?;
        let before = arenas.role_permissions.len();
        arenas.role_permissions.retain(|(_, pid)| *pid != permission_id);
        Ok(before - arenas.role_permissions.len())
    }
}
