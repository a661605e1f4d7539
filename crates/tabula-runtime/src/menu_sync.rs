//! Menu synchronization.
//!
//! Each configuration with `sync_to_menu` owns one entry at
//! `{path_prefix}/{route_slug}` under a shared, site-scoped group entry.

use serde::Serialize;
use std::sync::Arc;
use tabula_core::{CrudConfig, IdentitySnapshot, MenuConfig, MenuEntry, NewMenuEntry, PermissionConfig};

use crate::error::StoreError;
use crate::store::{menu_subtree, MenuStore};

/// What one menu sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MenuSyncOutcome {
    pub group_id: u64,
    pub menu_id: u64,
    pub group_created: bool,
    pub created: bool,
    pub updated: bool,
    /// Entries removed because the route slug changed.
    pub removed_stale: usize,
}

impl MenuSyncOutcome {
    /// Whether the pass wrote anything.
    pub fn wrote(&self) -> bool {
        self.group_created || self.created || self.updated || self.removed_stale > 0
    }
}

pub struct MenuSynchronizer {
    store: Arc<dyn MenuStore>,
    menu: MenuConfig,
    permission: PermissionConfig,
}

impl MenuSynchronizer {
    pub fn new(store: Arc<dyn MenuStore>, menu: MenuConfig, permission: PermissionConfig) -> Self {
        Self {
            store,
            menu,
            permission,
        }
    }

    /// The entry a configuration should have, minus placement.
    fn desired(&self, site_id: u64, group_id: u64, config: &CrudConfig) -> NewMenuEntry {
        NewMenuEntry {
            site_id,
            parent_id: Some(group_id),
            name: config.route_slug.clone(),
            title: config.module_name.clone(),
            icon: config.icon.clone(),
            path: self.menu.entry_path(&config.route_slug),
            permission: Some(self.permission.group_slug(&config.route_slug)),
            sort: 0,
        }
    }

    /// Bring the menu of `config` in line with its identity.
    ///
    /// `old` is the identity before the save; its route slug decides whether
    /// a stale entry has to be removed first.
    pub async fn sync(
        &self,
        site_id: u64,
        config: &CrudConfig,
        old: &IdentitySnapshot,
    ) -> Result<MenuSyncOutcome, StoreError> {
        let mut outcome = MenuSyncOutcome::default();

        let (group, group_created) = self.ensure_group(site_id).await?;
        outcome.group_id = group.id;
        outcome.group_created = group_created;

        if let Some(old_slug) = old.route_slug.as_deref()
            && old_slug != config.route_slug
        {
            let stale_path = self.menu.entry_path(old_slug);
            if let Some(stale) = self.store.find_menu(site_id, Some(group.id), &stale_path).await? {
                outcome.removed_stale = self.remove_entry(&stale).await?;
                tracing::info!(
                    "Removed stale menu {} (model {:?}) for config {}",
                    stale_path,
                    old.model_name,
                    config.id
                );
            }
        }

        let desired = self.desired(site_id, group.id, config);
        match self.store.find_menu(site_id, Some(group.id), &desired.path).await? {
            Some(existing) => {
                outcome.menu_id = existing.id;
                outcome.updated = self.patch(existing, &desired).await?;
            }
            None => match self.store.insert_menu(desired.clone()).await {
                Ok(entry) => {
                    tracing::info!("Created menu {} for config {}", entry.path, config.id);
                    outcome.menu_id = entry.id;
                    outcome.created = true;
                }
                Err(e) if e.is_unique_violation() => {
                    // Lost a race with a concurrent save: adopt the winner.
                    let existing = self
                        .store
                        .find_menu(site_id, Some(group.id), &desired.path)
                        .await?
                        .ok_or(e)?;
                    outcome.menu_id = existing.id;
                    outcome.updated = self.patch(existing, &desired).await?;
                }
                Err(e) => return Err(e),
            },
        }

        if !outcome.wrote() {
            tracing::debug!("Menu for config {} already up to date", config.id);
        }
        Ok(outcome)
    }

    /// Remove the menu entry of `config` and its descendants.
    ///
    /// The group entry stays. Returns how many entries were deleted.
    pub async fn teardown(&self, site_id: u64, config: &CrudConfig) -> Result<usize, StoreError> {
        let Some(group) = self.store.find_root_menu(site_id, &self.menu.group_name).await? else {
            return Ok(0);
        };
        let path = self.menu.entry_path(&config.route_slug);
        match self.store.find_menu(site_id, Some(group.id), &path).await? {
            Some(entry) => {
                let removed = self.remove_entry(&entry).await?;
                tracing::info!("Removed menu {} for config {}", path, config.id);
                Ok(removed)
            }
            None => Ok(0),
        }
    }

    async fn ensure_group(&self, site_id: u64) -> Result<(MenuEntry, bool), StoreError> {
        let name = &self.menu.group_name;
        if let Some(group) = self.store.find_root_menu(site_id, name).await? {
            return Ok((group, false));
        }

        let group = NewMenuEntry {
            site_id,
            parent_id: None,
            name: name.clone(),
            title: self.menu.group_title.clone(),
            icon: self.menu.group_icon.clone(),
            path: self.menu.group_path(),
            permission: None,
            sort: 0,
        };
        match self.store.insert_menu(group).await {
            Ok(group) => {
                tracing::info!("Created menu group {} for site {}", name, site_id);
                Ok((group, true))
            }
            Err(e) if e.is_unique_violation() => {
                let group = self.store.find_root_menu(site_id, name).await?.ok_or(e)?;
                Ok((group, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Write only the fields that differ. Returns whether a write happened.
    async fn patch(&self, mut entry: MenuEntry, desired: &NewMenuEntry) -> Result<bool, StoreError> {
        let mut changed = false;
        if entry.name != desired.name {
            entry.name = desired.name.clone();
            changed = true;
        }
        if entry.title != desired.title {
            entry.title = desired.title.clone();
            changed = true;
        }
        if entry.icon != desired.icon {
            entry.icon = desired.icon.clone();
            changed = true;
        }
        if entry.permission != desired.permission {
            entry.permission = desired.permission.clone();
            changed = true;
        }
        if !changed {
            return Ok(false);
        }
        self.store.update_menu(&entry).await?;
        tracing::info!("Updated menu {}", entry.path);
        Ok(true)
    }

    async fn remove_entry(&self, entry: &MenuEntry) -> Result<usize, StoreError> {
        let mut removed = 0;
        for child in menu_subtree(self.store.as_ref(), entry.id).await? {
            if self.store.delete_menu(child.id).await? {
                removed += 1;
            }
        }
        if self.store.delete_menu(entry.id).await? {
            removed += 1;
        }
        Ok(removed)
    }
}
