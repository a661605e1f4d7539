//! End-to-end save/delete scenarios over the in-memory store.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tabula_core::{
    ColumnDescriptor, FeatureToggleInput, MenuEntry, NewMenuEntry, NewPermission, PermissionNode,
    TabulaConfig,
};
use tabula_runtime::{
    ConfigStore, EngineError, MemoryAuditSink, MemoryStore, MenuStore, Orchestrator,
    PermissionStore, SaveRequest, StaticSchemaProvider, StoreError, SyncContext, SyncStep,
};

/// Wraps a [`MemoryStore`] and counts menu/permission writes.
struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            writes: AtomicUsize::new(0),
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MenuStore for CountingStore {
    async fn get_menu(&self, id: u64) -> Result<Option<MenuEntry>, StoreError> {
        self.inner.get_menu(id).await
    }

    async fn find_menu(
        &self,
        site_id: u64,
        parent_id: Option<u64>,
        path: &str,
    ) -> Result<Option<MenuEntry>, StoreError> {
        self.inner.find_menu(site_id, parent_id, path).await
    }

    async fn find_root_menu(
        &self,
        site_id: u64,
        name: &str,
    ) -> Result<Option<MenuEntry>, StoreError> {
        self.inner.find_root_menu(site_id, name).await
    }

    async fn child_menus(&self, parent_id: u64) -> Result<Vec<MenuEntry>, StoreError> {
        self.inner.child_menus(parent_id).await
    }

    async fn list_menus(&self, site_id: u64) -> Result<Vec<MenuEntry>, StoreError> {
        self.inner.list_menus(site_id).await
    }

    async fn insert_menu(&self, entry: NewMenuEntry) -> Result<MenuEntry, StoreError> {
        self.bump();
        self.inner.insert_menu(entry).await
    }

    async fn update_menu(&self, entry: &MenuEntry) -> Result<(), StoreError> {
        self.bump();
        self.inner.update_menu(entry).await
    }

    async fn delete_menu(&self, id: u64) -> Result<bool, StoreError> {
        self.bump();
        self.inner.delete_menu(id).await
    }
}

#[async_trait]
impl PermissionStore for CountingStore {
    async fn get_permission(&self, id: u64) -> Result<Option<PermissionNode>, StoreError> {
        self.inner.get_permission(id).await
    }

    async fn find_permission(&self, slug: &str) -> Result<Option<PermissionNode>, StoreError> {
        self.inner.find_permission(slug).await
    }

    async fn child_permissions(&self, parent_id: u64) -> Result<Vec<PermissionNode>, StoreError> {
        self.inner.child_permissions(parent_id).await
    }

    async fn list_permissions(&self) -> Result<Vec<PermissionNode>, StoreError> {
        self.inner.list_permissions().await
    }

    async fn insert_permission(&self, node: NewPermission) -> Result<PermissionNode, StoreError> {
        self.bump();
        self.inner.insert_permission(node).await
    }

    async fn update_permission(&self, node: &PermissionNode) -> Result<(), StoreError> {
        self.bump();
        self.inner.update_permission(node).await
    }

    async fn delete_permission(&self, id: u64) -> Result<bool, StoreError> {
        self.bump();
        self.inner.delete_permission(id).await
    }

    async fn attach_role(&self, role: &str, permission_id: u64) -> Result<(), StoreError> {
        self.inner.attach_role(role, permission_id).await
    }

    async fn roles_of(&self, permission_id: u64) -> Result<Vec<String>, StoreError> {
        self.inner.roles_of(permission_id).await
    }

    async fn detach_roles(&self, permission_id: u64) -> Result<usize, StoreError> {
        let detached = self.inner.detach_roles(permission_id).await?;
        if detached > 0 {
            self.bump();
        }
        Ok(detached)
    }
}

/// Every call fails, as if the permission backend were unreachable.
struct UnavailablePermissions;

fn unavailable() -> StoreError {
    StoreError::Backend("permission backend unavailable".to_string())
}

#[async_trait]
impl PermissionStore for UnavailablePermissions {
    async fn get_permission(&self, _: u64) -> Result<Option<PermissionNode>, StoreError> {
        Err(unavailable())
    }

    async fn find_permission(&self, _: &str) -> Result<Option<PermissionNode>, StoreError> {
        Err(unavailable())
    }

    async fn child_permissions(&self, _: u64) -> Result<Vec<PermissionNode>, StoreError> {
        Err(unavailable())
    }

    async fn list_permissions(&self) -> Result<Vec<PermissionNode>, StoreError> {
        Err(unavailable())
    }

    async fn insert_permission(&self, _: NewPermission) -> Result<PermissionNode, StoreError> {
        Err(unavailable())
    }

    async fn update_permission(&self, _: &PermissionNode) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn delete_permission(&self, _: u64) -> Result<bool, StoreError> {
        Err(unavailable())
    }

    async fn attach_role(&self, _: &str, _: u64) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn roles_of(&self, _: u64) -> Result<Vec<String>, StoreError> {
        Err(unavailable())
    }

    async fn detach_roles(&self, _: u64) -> Result<usize, StoreError> {
        Err(unavailable())
    }
}

fn schema() -> Arc<StaticSchemaProvider> {
    Arc::new(StaticSchemaProvider::new().with_table(
        "default",
        "admin_articles",
        vec![
            ColumnDescriptor::new("id", "int"),
            ColumnDescriptor::new("title", "varchar(255)"),
            ColumnDescriptor::new("status", "tinyint"),
        ],
    ))
}

fn in_memory() -> (Orchestrator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let orch = Orchestrator::in_memory(store.clone(), schema(), &TabulaConfig::default());
    (orch, store)
}

async fn child_slugs(store: &dyn PermissionStore, group_slug: &str) -> Vec<String> {
    let Some(group) = store.find_permission(group_slug).await.unwrap() else {
        return Vec::new();
    };
    let mut slugs: Vec<String> = store
        .child_permissions(group.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.slug)
        .collect();
    slugs.sort();
    slugs
}

async fn menu_paths(store: &dyn MenuStore, site_id: u64) -> Vec<String> {
    store
        .list_menus(site_id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.path)
        .collect()
}

#[tokio::test]
async fn test_first_save_with_defaults_builds_all_artifacts() {
    let (orch, store) = in_memory();
    let ctx = SyncContext::new(1).with_actor("alice");

    let outcome = orch.save(&ctx, SaveRequest::new("admin_articles")).await.unwrap();
    assert!(outcome.created);
    assert!(outcome.steps.iter().all(|s| s.ok), "{:?}", outcome.steps);

    let config = store.get_config(outcome.config_id).await.unwrap().unwrap();
    assert_eq!(config.route_slug, "admin-articles");
    assert_eq!(config.route_prefix, "admin-articles");
    assert_eq!(config.model_name, "AdminArticles");
    assert_eq!(config.controller_name, "AdminArticlesController");
    assert_eq!(config.module_name, "Admin Articles");

    let paths = menu_paths(store.as_ref(), 1).await;
    assert_eq!(paths, vec!["/u/crud-system", "/u/admin-articles"]);
    let entry = store
        .list_menus(1)
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.path == "/u/admin-articles")
        .unwrap();
    assert_eq!(entry.permission.as_deref(), Some("crud.admin-articles"));

    assert_eq!(
        child_slugs(store.as_ref(), "crud.admin-articles").await,
        vec![
            "crud.admin-articles.create",
            "crud.admin-articles.delete",
            "crud.admin-articles.edit",
            "crud.admin-articles.export",
            "crud.admin-articles.list",
            "crud.admin-articles.store",
            "crud.admin-articles.update",
        ]
    );
}

#[tokio::test]
async fn test_repeated_save_writes_no_artifacts() {
    let configs = Arc::new(MemoryStore::new());
    let artifacts = Arc::new(CountingStore::new());
    let orch = Orchestrator::new(
        configs.clone(),
        artifacts.clone(),
        artifacts.clone(),
        schema(),
        &TabulaConfig::default(),
    );
    let ctx = SyncContext::default();

    let request = SaveRequest {
        icon: Some("fa-newspaper".to_string()),
        ..SaveRequest::new("admin_articles")
    };
    orch.save(&ctx, request.clone()).await.unwrap();
    let after_first = artifacts.writes();
    assert!(after_first > 0);

    let second = orch.save(&ctx, request).await.unwrap();
    assert!(!second.created);
    assert!(second.identity_changes.is_empty());
    assert_eq!(artifacts.writes(), after_first);
    assert!(second.step(SyncStep::MenuSync).unwrap().skipped);
    assert_eq!(configs.list_configs(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_disabling_and_reenabling_a_feature() {
    let (orch, store) = in_memory();
    let ctx = SyncContext::default();
    orch.save(&ctx, SaveRequest::new("admin_articles")).await.unwrap();
    let before = child_slugs(store.as_ref(), "crud.admin-articles").await;

    let list = store
        .find_permission("crud.admin-articles.list")
        .await
        .unwrap()
        .unwrap();

    let disable = SaveRequest {
        features: Some(FeatureToggleInput {
            add: Some(false),
            ..FeatureToggleInput::default()
        }),
        ..SaveRequest::new("admin_articles")
    };
    orch.save(&ctx, disable).await.unwrap();
    let without_add = child_slugs(store.as_ref(), "crud.admin-articles").await;
    let removed: Vec<&String> = before.iter().filter(|s| !without_add.contains(s)).collect();
    assert_eq!(
        removed,
        vec!["crud.admin-articles.create", "crud.admin-articles.store"]
    );

    // Untouched siblings keep their ids.
    let list_again = store
        .find_permission("crud.admin-articles.list")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list_again.id, list.id);

    let enable = SaveRequest {
        features: Some(FeatureToggleInput {
            add: Some(true),
            ..FeatureToggleInput::default()
        }),
        ..SaveRequest::new("admin_articles")
    };
    orch.save(&ctx, enable).await.unwrap();
    assert_eq!(child_slugs(store.as_ref(), "crud.admin-articles").await, before);
}

#[tokio::test]
async fn test_soft_delete_adds_trash_actions() {
    let (orch, store) = in_memory();
    let request = SaveRequest {
        soft_delete: Some(true),
        route_prefix: Some("content/articles".to_string()),
        ..SaveRequest::new("admin_articles")
    };
    orch.save(&SyncContext::default(), request).await.unwrap();

    let restore = store
        .find_permission("crud.admin-articles.restore")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restore.path, "/u/content/articles/*/restore");
    assert_eq!(child_slugs(store.as_ref(), "crud.admin-articles").await.len(), 13);
}

#[tokio::test]
async fn test_renaming_slug_moves_menu_and_permissions() {
    let (orch, store) = in_memory();
    let ctx = SyncContext::default();
    let foo = SaveRequest {
        route_slug: Some("foo".to_string()),
        ..SaveRequest::new("admin_articles")
    };
    orch.save(&ctx, foo).await.unwrap();

    let bar = SaveRequest {
        route_slug: Some("bar".to_string()),
        ..SaveRequest::new("admin_articles")
    };
    let outcome = orch.save(&ctx, bar).await.unwrap();
    assert!(!outcome.created);
    assert!(!outcome.identity_changes.is_empty());

    assert_eq!(
        menu_paths(store.as_ref(), 1).await,
        vec!["/u/crud-system", "/u/bar"]
    );
    assert!(store.find_permission("crud.foo").await.unwrap().is_none());
    assert!(child_slugs(store.as_ref(), "crud.foo").await.is_empty());
    assert_eq!(child_slugs(store.as_ref(), "crud.bar").await.len(), 7);
}

#[tokio::test]
async fn test_delete_removes_artifacts_and_detaches_roles() {
    let (orch, store) = in_memory();
    let ctx = SyncContext::default();
    let kept = orch.save(&ctx, SaveRequest::new("admin_users")).await.unwrap();
    let doomed = orch.save(&ctx, SaveRequest::new("admin_articles")).await.unwrap();

    let edit = store
        .find_permission("crud.admin-articles.edit")
        .await
        .unwrap()
        .unwrap();
    store.attach_role("editor", edit.id).await.unwrap();
    let sibling = store
        .find_permission("crud.admin-users.edit")
        .await
        .unwrap()
        .unwrap();
    store.attach_role("editor", sibling.id).await.unwrap();

    let outcome = orch.delete(&ctx, doomed.config_id).await.unwrap();
    assert!(outcome.steps.iter().all(|s| s.ok), "{:?}", outcome.steps);

    assert!(store.get_config(doomed.config_id).await.unwrap().is_none());
    assert!(store.get_config(kept.config_id).await.unwrap().is_some());
    assert!(store.find_permission("crud.admin-articles").await.unwrap().is_none());
    assert!(store.roles_of(edit.id).await.unwrap().is_empty());
    assert_eq!(store.roles_of(sibling.id).await.unwrap(), vec!["editor".to_string()]);
    assert_eq!(child_slugs(store.as_ref(), "crud.admin-users").await.len(), 7);
    assert_eq!(
        menu_paths(store.as_ref(), 1).await,
        vec!["/u/crud-system", "/u/admin-users"]
    );

    let again = orch.delete(&ctx, doomed.config_id).await.unwrap_err();
    assert!(matches!(again, EngineError::Business(_)));
}

#[tokio::test]
async fn test_failing_permission_store_does_not_fail_save() {
    let store = Arc::new(MemoryStore::new());
    let journal = Arc::new(MemoryAuditSink::new());
    let orch = Orchestrator::new(
        store.clone(),
        store.clone(),
        Arc::new(UnavailablePermissions),
        schema(),
        &TabulaConfig::default(),
    )
    .with_journal(journal.clone());
    let ctx = SyncContext::new(1).with_actor("bob");

    let outcome = orch.save(&ctx, SaveRequest::new("admin_articles")).await.unwrap();
    assert!(store.get_config(outcome.config_id).await.unwrap().is_some());

    let report = outcome.step(SyncStep::PermissionSync).unwrap();
    assert!(!report.ok);
    assert!(report.error.as_deref().unwrap().contains("unavailable"));
    assert!(outcome.step(SyncStep::MenuSync).unwrap().ok);

    let events = journal.events();
    assert_eq!(events.len(), outcome.steps.len());
    let failed = events.iter().find(|e| !e.report.ok).unwrap();
    assert_eq!(failed.report.step, SyncStep::PermissionSync);
    assert_eq!(failed.actor.as_deref(), Some("bob"));

    // Delete still goes through; the teardown failure is only reported.
    let deleted = orch.delete(&ctx, outcome.config_id).await.unwrap();
    assert!(!deleted.step(SyncStep::PermissionTeardown).unwrap().ok);
    assert!(store.get_config(outcome.config_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_slug_collision_is_a_business_error() {
    let (orch, store) = in_memory();
    let ctx = SyncContext::default();
    let first = SaveRequest {
        route_slug: Some("news".to_string()),
        ..SaveRequest::new("admin_articles")
    };
    orch.save(&ctx, first).await.unwrap();

    let second = SaveRequest {
        route_slug: Some(" news ".to_string()),
        ..SaveRequest::new("posts")
    };
    let err = orch.save(&ctx, second).await.unwrap_err();
    assert!(matches!(err, EngineError::Business(_)), "{err}");
    assert_eq!(store.list_configs(1).await.unwrap().len(), 1);

    // Permission groups are global, so another site may not reuse the slug.
    let other_site = SaveRequest {
        route_slug: Some("news".to_string()),
        ..SaveRequest::new("posts")
    };
    let err = orch.save(&SyncContext::new(2), other_site).await.unwrap_err();
    assert!(matches!(err, EngineError::Business(_)), "{err}");
    assert!(store.list_configs(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_other_site_cannot_take_over_permission_subtree() {
    let (orch, store) = in_memory();
    let home = SyncContext::new(1);
    orch.save(&home, SaveRequest::new("admin_articles")).await.unwrap();
    let before = child_slugs(store.as_ref(), "crud.admin-articles").await;
    assert!(before.contains(&"crud.admin-articles.export".to_string()));

    let intruder = SaveRequest {
        features: Some(FeatureToggleInput {
            export: Some(false),
            ..FeatureToggleInput::default()
        }),
        ..SaveRequest::new("admin_articles")
    };
    let err = orch.save(&SyncContext::new(2), intruder).await.unwrap_err();
    assert!(matches!(err, EngineError::Business(_)), "{err}");
    assert!(store.list_configs(2).await.unwrap().is_empty());
    assert_eq!(child_slugs(store.as_ref(), "crud.admin-articles").await, before);

    // With its own slug the second site gets its own subtree and deleting
    // it leaves the first site's artifacts alone.
    let own = SaveRequest {
        route_slug: Some("site2-articles".to_string()),
        ..SaveRequest::new("admin_articles")
    };
    let saved = orch.save(&SyncContext::new(2), own).await.unwrap();
    orch.delete(&SyncContext::new(2), saved.config_id).await.unwrap();

    assert!(store.find_permission("crud.site2-articles").await.unwrap().is_none());
    assert!(store.find_permission("crud.admin-articles").await.unwrap().is_some());
    assert_eq!(child_slugs(store.as_ref(), "crud.admin-articles").await, before);
    assert_eq!(store.list_configs(1).await.unwrap().len(), 1);
    assert_eq!(
        menu_paths(store.as_ref(), 1).await,
        vec!["/u/crud-system", "/u/admin-articles"]
    );
}

#[tokio::test]
async fn test_first_save_enables_soft_delete_for_deleted_at_tables() {
    let store = Arc::new(MemoryStore::new());
    let schema = StaticSchemaProvider::new().with_table(
        "default",
        "posts",
        vec![
            ColumnDescriptor::new("id", "int"),
            ColumnDescriptor::new("deleted_at", "timestamp").nullable(),
        ],
    );
    let orch = Orchestrator::in_memory(store.clone(), Arc::new(schema), &TabulaConfig::default());
    let ctx = SyncContext::default();

    let view = orch.merge_view(&ctx, "posts", "default").await.unwrap();
    assert!(view.features.soft_delete);

    orch.save(&ctx, SaveRequest::new("posts")).await.unwrap();
    let saved = orch.merge_view(&ctx, "posts", "default").await.unwrap();
    assert!(saved.features.soft_delete);
    assert!(store.find_permission("crud.posts.trash").await.unwrap().is_some());
    assert_eq!(child_slugs(store.as_ref(), "crud.posts").await.len(), 13);

    // An explicit flag still wins.
    let off = SaveRequest {
        soft_delete: Some(false),
        ..SaveRequest::new("posts")
    };
    orch.save(&ctx, off).await.unwrap();
    assert!(store.find_permission("crud.posts.trash").await.unwrap().is_none());
}

#[tokio::test]
async fn test_menu_follows_sync_to_menu_flag() {
    let (orch, store) = in_memory();
    let ctx = SyncContext::default();
    let off = SaveRequest {
        sync_to_menu: false,
        ..SaveRequest::new("admin_articles")
    };
    let outcome = orch.save(&ctx, off.clone()).await.unwrap();
    assert!(outcome.step(SyncStep::MenuSync).unwrap().skipped);
    assert!(menu_paths(store.as_ref(), 1).await.is_empty());

    // Turning the flag on creates the menu even without an identity change.
    orch.save(&ctx, SaveRequest::new("admin_articles")).await.unwrap();
    assert_eq!(
        menu_paths(store.as_ref(), 1).await,
        vec!["/u/crud-system", "/u/admin-articles"]
    );

    // Turning it off again leaves the existing entry alone.
    orch.save(&ctx, off).await.unwrap();
    assert_eq!(menu_paths(store.as_ref(), 1).await.len(), 2);
}

#[tokio::test]
async fn test_merge_reflects_saved_overrides() {
    let (orch, _) = in_memory();
    let ctx = SyncContext::default();

    let fresh = orch.merge_view(&ctx, "admin_articles", "default").await.unwrap();
    let types: Vec<String> = fresh.fields.iter().map(|f| f.column_type.to_string()).collect();
    assert_eq!(types, vec!["number", "text", "switch"]);

    let request: SaveRequest = serde_json::from_value(serde_json::json!({
        "table_name": "admin_articles",
        "features": { "export": false },
        "fields_config": [
            { "field": "title", "searchable": true, "form_type": "url" }
        ]
    }))
    .unwrap();
    orch.save(&ctx, request).await.unwrap();

    let merged = orch.merge_view(&ctx, "admin_articles", "default").await.unwrap();
    assert!(!merged.features.export);
    let title = merged.fields.iter().find(|f| f.name == "title").unwrap();
    assert!(title.searchable);
    assert_eq!(title.column_type.to_string(), "link");
}
