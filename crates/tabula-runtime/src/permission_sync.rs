//! Permission tree synchronization.
//!
//! A configuration owns one group node `{namespace}.{route_slug}` and one
//! action child per route its enabled features expose. Every pass is
//! best-effort per node: a failing child is recorded in the outcome and the
//! rest of the pass continues. Only the group node itself is mandatory.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tabula_core::{
    CrudConfig, FeatureToggles, HttpMethod, IdentitySnapshot, NewPermission, PermissionConfig,
    PermissionKind, PermissionNode,
};

use crate::error::StoreError;
use crate::store::{permission_subtree, PermissionStore};

/// One action child a configuration should own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    /// Appended to the group slug after a `.`.
    pub action: &'static str,
    pub label: &'static str,
    pub method: HttpMethod,
    pub path: String,
    /// Fixed position, independent of which features are enabled.
    pub sort: i32,
}

/// Action children implied by `features`, in display order. `base` is the
/// route base path, e.g. `/u/articles`.
pub fn desired_actions(features: FeatureToggles, base: &str) -> Vec<ActionSpec> {
    use HttpMethod::*;

    let all: [(bool, &'static str, &'static str, HttpMethod, String); 13] = [
        (features.search, "list", "List", Get, base.to_string()),
        (features.add, "create", "Create", Get, format!("{base}/create")),
        (features.add, "store", "Store", Post, base.to_string()),
        (features.edit, "edit", "Edit", Get, format!("{base}/*/edit")),
        (features.edit, "update", "Update", Put, format!("{base}/*")),
        (features.delete, "delete", "Delete", Delete, format!("{base}/*")),
        (features.export, "export", "Export", Get, format!("{base}/export")),
        (features.soft_delete, "trash", "Trash", Get, format!("{base}/trash")),
        (features.soft_delete, "restore", "Restore", Put, format!("{base}/*/restore")),
        (features.soft_delete, "force_delete", "Force Delete", Delete, format!("{base}/*/force")),
        (features.soft_delete, "batch_restore", "Batch Restore", Put, format!("{base}/batch-restore")),
        (
            features.soft_delete,
            "batch_force_delete",
            "Batch Force Delete",
            Delete,
            format!("{base}/batch-force"),
        ),
        (features.soft_delete, "clear_trash", "Clear Trash", Delete, format!("{base}/trash")),
    ];

    all.into_iter()
        .zip(1..)
        .filter(|((enabled, ..), _)| *enabled)
        .map(|((_, action, label, method, path), sort)| ActionSpec {
            action,
            label,
            method,
            path,
            sort,
        })
        .collect()
}

/// A node that could not be written or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub slug: String,
    pub error: String,
}

/// What one permission pass did, by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSyncOutcome {
    pub group_id: Option<u64>,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub detached_roles: usize,
    pub failures: Vec<NodeFailure>,
}

impl PermissionSyncOutcome {
    pub fn wrote(&self) -> bool {
        !self.created.is_empty()
            || !self.updated.is_empty()
            || !self.deleted.is_empty()
            || self.detached_roles > 0
    }

    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.slug, f.error))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn fail(&mut self, slug: &str, error: StoreError) {
        tracing::warn!("Permission node {} failed: {}", slug, error);
        self.failures.push(NodeFailure {
            slug: slug.to_string(),
            error: error.to_string(),
        });
    }
}

pub struct PermissionSynchronizer {
    store: Arc<dyn PermissionStore>,
    settings: PermissionConfig,
}

impl PermissionSynchronizer {
    pub fn new(store: Arc<dyn PermissionStore>, settings: PermissionConfig) -> Self {
        Self { store, settings }
    }

    pub fn group_slug(&self, route_slug: &str) -> String {
        self.settings.group_slug(route_slug)
    }

    /// Group node plus action children `config` should own.
    pub fn desired(&self, config: &CrudConfig) -> (NewPermission, Vec<NewPermission>) {
        let group_slug = self.group_slug(&config.route_slug);
        let base = self.settings.base_path(&config.route_prefix);

        let group = NewPermission {
            slug: group_slug.clone(),
            name: config.module_name.clone(),
            parent_id: None,
            kind: PermissionKind::Group,
            path: base.clone(),
            method: None,
            icon: config.icon.clone(),
            sort: 0,
        };
        let children = desired_actions(config.features(), &base)
            .into_iter()
            .map(|spec| NewPermission {
                slug: format!("{}.{}", group_slug, spec.action),
                name: format!("{} - {}", config.module_name, spec.label),
                parent_id: None,
                kind: PermissionKind::Action,
                path: spec.path,
                method: Some(spec.method),
                icon: String::new(),
                sort: spec.sort,
            })
            .collect();
        (group, children)
    }

    /// Bring the permission subtree of `config` in line with its identity
    /// and features. `old` is the identity before the save.
    ///
    /// Only a failure to find or write the group node is returned as an
    /// error; everything else lands in [`PermissionSyncOutcome::failures`].
    pub async fn sync(
        &self,
        config: &CrudConfig,
        old: &IdentitySnapshot,
    ) -> Result<PermissionSyncOutcome, StoreError> {
        let mut outcome = PermissionSyncOutcome::default();
        let (group, children) = self.desired(config);

        if let Some(old_slug) = old.route_slug.as_deref()
            && old_slug != config.route_slug
        {
            let old_group_slug = self.group_slug(old_slug);
            if old_group_slug != group.slug {
                match self.store.find_permission(&old_group_slug).await {
                    Ok(Some(stale)) => {
                        self.remove_subtree(&stale, &mut outcome).await;
                        tracing::info!(
                            "Removed stale permission subtree {} for config {}",
                            old_group_slug,
                            config.id
                        );
                    }
                    Ok(None) => {}
                    Err(e) => outcome.fail(&old_group_slug, e),
                }
            }
        }

        let group_id = self.upsert(group, &mut outcome).await?;
        outcome.group_id = Some(group_id);

        let mut wanted = BTreeSet::new();
        for mut child in children {
            child.parent_id = Some(group_id);
            wanted.insert(child.slug.clone());
            let slug = child.slug.clone();
            if let Err(e) = self.upsert(child, &mut outcome).await {
                outcome.fail(&slug, e);
            }
        }

        match self.store.child_permissions(group_id).await {
            Ok(existing) => {
                for node in existing.iter().filter(|n| !wanted.contains(&n.slug)) {
                    self.remove_subtree(node, &mut outcome).await;
                }
            }
            Err(e) => outcome.fail(&self.group_slug(&config.route_slug), e),
        }

        if !outcome.wrote() && outcome.failures.is_empty() {
            tracing::debug!("Permissions for config {} already up to date", config.id);
        }
        Ok(outcome)
    }

    /// Remove the whole subtree of `config`, detaching roles first.
    pub async fn teardown(&self, config: &CrudConfig) -> Result<PermissionSyncOutcome, StoreError> {
        let mut outcome = PermissionSyncOutcome::default();
        let slug = self.group_slug(&config.route_slug);
        if let Some(group) = self.store.find_permission(&slug).await? {
            outcome.group_id = Some(group.id);
            self.remove_subtree(&group, &mut outcome).await;
            tracing::info!(
                "Removed permission subtree {} ({} nodes) for config {}",
                slug,
                outcome.deleted.len(),
                config.id
            );
        }
        Ok(outcome)
    }

    /// Create `desired` or patch the node already holding its slug.
    /// Returns the node id.
    async fn upsert(
        &self,
        desired: NewPermission,
        outcome: &mut PermissionSyncOutcome,
    ) -> Result<u64, StoreError> {
        if let Some(existing) = self.store.find_permission(&desired.slug).await? {
            return self.patch(existing, &desired, outcome).await;
        }

        match self.store.insert_permission(desired.clone()).await {
            Ok(node) => {
                tracing::info!("Created permission {}", node.slug);
                outcome.created.push(node.slug);
                Ok(node.id)
            }
            Err(e) if e.is_unique_violation() => {
                let existing = self.store.find_permission(&desired.slug).await?.ok_or(e)?;
                self.patch(existing, &desired, outcome).await
            }
            Err(e) => Err(e),
        }
    }

    async fn patch(
        &self,
        mut node: PermissionNode,
        desired: &NewPermission,
        outcome: &mut PermissionSyncOutcome,
    ) -> Result<u64, StoreError> {
        let changed = node.name != desired.name
            || node.parent_id != desired.parent_id
            || node.kind != desired.kind
            || node.path != desired.path
            || node.method != desired.method
            || node.icon != desired.icon
            || node.sort != desired.sort;
        if !changed {
            return Ok(node.id);
        }

        if node.parent_id != desired.parent_id {
            tracing::debug!(
                "Reparenting permission {} from {:?} to {:?}",
                node.slug,
                node.parent_id,
                desired.parent_id
            );
        }
        node.name = desired.name.clone();
        node.parent_id = desired.parent_id;
        node.kind = desired.kind;
        node.path = desired.path.clone();
        node.method = desired.method;
        node.icon = desired.icon.clone();
        node.sort = desired.sort;

        self.store.update_permission(&node).await?;
        tracing::info!("Updated permission {}", node.slug);
        outcome.updated.push(node.slug);
        Ok(node.id)
    }

    /// Delete `root` and its descendants, deepest first.
    async fn remove_subtree(&self, root: &PermissionNode, outcome: &mut PermissionSyncOutcome) {
        match permission_subtree(self.store.as_ref(), root.id).await {
            Ok(descendants) => {
                for node in &descendants {
                    self.remove_node(node, outcome).await;
                }
            }
            Err(e) => outcome.fail(&root.slug, e),
        }
        self.remove_node(root, outcome).await;
    }

    async fn remove_node(&self, node: &PermissionNode, outcome: &mut PermissionSyncOutcome) {
        match self.store.detach_roles(node.id).await {
            Ok(detached) => outcome.detached_roles += detached,
            Err(e) => {
                // Deleting a node that still has roles would leave dangling grants.
                outcome.fail(&node.slug, e);
                return;
            }
        }
        match self.store.delete_permission(node.id).await {
            Ok(true) => outcome.deleted.push(node.slug.clone()),
            Ok(false) => {}
            Err(e) => outcome.fail(&node.slug, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tabula_core::{ConfigOptions, ConfigStatus};

    fn config(slug: &str) -> CrudConfig {
        let now = Utc::now();
        CrudConfig {
            id: 1,
            site_id: 1,
            table_name: "articles".to_string(),
            db_connection: "default".to_string(),
            model_name: "Article".to_string(),
            controller_name: "ArticleController".to_string(),
            module_name: "Articles".to_string(),
            route_slug: slug.to_string(),
            route_prefix: slug.to_string(),
            icon: "fa-book".to_string(),
            page_size: 15,
            soft_delete: false,
            enable_search: None,
            enable_add: None,
            enable_edit: None,
            enable_delete: None,
            enable_export: None,
            options: ConfigOptions::default(),
            fields: Vec::new(),
            sync_to_menu: true,
            status: ConfigStatus::Configuring,
            created_at: now,
            updated_at: now,
        }
    }

    fn synchronizer(store: Arc<MemoryStore>) -> PermissionSynchronizer {
        PermissionSynchronizer::new(store, PermissionConfig::default())
    }

    async fn child_slugs(store: &MemoryStore, group_id: u64) -> Vec<String> {
        let mut slugs: Vec<String> = store
            .child_permissions(group_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        slugs.sort();
        slugs
    }

    #[test]
    fn test_desired_actions_for_soft_delete() {
        let features = FeatureToggles {
            search: false,
            add: false,
            edit: false,
            delete: false,
            export: false,
            soft_delete: true,
        };
        let actions = desired_actions(features, "/u/posts");
        let pairs: Vec<(String, String)> = actions
            .iter()
            .map(|a| (a.method.to_string(), a.path.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("GET".to_string(), "/u/posts/trash".to_string()),
                ("PUT".to_string(), "/u/posts/*/restore".to_string()),
                ("DELETE".to_string(), "/u/posts/*/force".to_string()),
                ("PUT".to_string(), "/u/posts/batch-restore".to_string()),
                ("DELETE".to_string(), "/u/posts/batch-force".to_string()),
                ("DELETE".to_string(), "/u/posts/trash".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_sync_creates_group_and_children() {
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone());
        let cfg = config("articles");

        let outcome = sync.sync(&cfg, &IdentitySnapshot::default()).await.unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.created.len(), 8);

        let group = store.find_permission("crud.articles").await.unwrap().unwrap();
        assert_eq!(group.kind, PermissionKind::Group);
        assert_eq!(group.path, "/u/articles");

        let edit = store.find_permission("crud.articles.edit").await.unwrap().unwrap();
        assert_eq!(edit.parent_id, Some(group.id));
        assert_eq!(edit.path, "/u/articles/*/edit");
        assert_eq!(edit.method, Some(HttpMethod::Get));
        assert_eq!(edit.name, "Articles - Edit");
    }

    #[tokio::test]
    async fn test_second_sync_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone());
        let cfg = config("articles");
        sync.sync(&cfg, &IdentitySnapshot::default()).await.unwrap();

        let again = sync.sync(&cfg, &cfg.identity()).await.unwrap();
        assert!(!again.wrote());
        assert_eq!(again.failures, Vec::new());
    }

    #[tokio::test]
    async fn test_disabled_feature_children_are_collected_with_roles() {
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone());
        let mut cfg = config("articles");
        sync.sync(&cfg, &IdentitySnapshot::default()).await.unwrap();

        let export = store.find_permission("crud.articles.export").await.unwrap().unwrap();
        store.attach_role("auditor", export.id).await.unwrap();

        cfg.set_features(FeatureToggles {
            export: false,
            ..FeatureToggles::default()
        });
        let outcome = sync.sync(&cfg, &cfg.identity()).await.unwrap();
        assert_eq!(outcome.deleted, vec!["crud.articles.export".to_string()]);
        assert_eq!(outcome.detached_roles, 1);
        assert!(outcome.created.is_empty());
        assert!(store.roles_of(export.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone());
        let foo = config("foo");
        sync.sync(&foo, &IdentitySnapshot::default()).await.unwrap();

        let bar = config("bar");
        let outcome = sync.sync(&bar, &foo.identity()).await.unwrap();
        assert_eq!(outcome.deleted.len(), 8);
        assert!(store.find_permission("crud.foo").await.unwrap().is_none());

        let group = store.find_permission("crud.bar").await.unwrap().unwrap();
        assert_eq!(
            child_slugs(&store, group.id).await,
            vec![
                "crud.bar.create",
                "crud.bar.delete",
                "crud.bar.edit",
                "crud.bar.export",
                "crud.bar.list",
                "crud.bar.store",
                "crud.bar.update",
            ]
        );
    }

    #[tokio::test]
    async fn test_stray_child_is_reparented() {
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone());
        let orphan = store
            .insert_permission(NewPermission {
                slug: "crud.articles.list".to_string(),
                name: "old".to_string(),
                parent_id: None,
                kind: PermissionKind::Action,
                path: "/old".to_string(),
                method: None,
                icon: String::new(),
                sort: 0,
            })
            .await
            .unwrap();

        let outcome = sync.sync(&config("articles"), &IdentitySnapshot::default()).await.unwrap();
        assert!(outcome.updated.contains(&"crud.articles.list".to_string()));
        let node = store.get_permission(orphan.id).await.unwrap().unwrap();
        assert_eq!(node.parent_id, outcome.group_id);
        assert_eq!(node.path, "/u/articles");
    }

    #[tokio::test]
    async fn test_teardown_removes_everything() {
        let store = Arc::new(MemoryStore::new());
        let sync = synchronizer(store.clone());
        let cfg = config("articles");
        sync.sync(&cfg, &IdentitySnapshot::default()).await.unwrap();

        let outcome = sync.teardown(&cfg).await.unwrap();
        assert_eq!(outcome.deleted.len(), 8);
        assert!(store.list_permissions().await.unwrap().is_empty());
    }
}
