//! Save/delete saga over a configuration and its derived artifacts.
//!
//! The configuration write is the only step whose failure reaches the
//! caller. Menu and permission synchronization run afterwards; their
//! failures are logged, recorded as step reports and swallowed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tabula_core::{
    ConfigOptions, ConfigStatus, CrudConfig, FeatureToggleInput, FeatureToggles, FieldOverride,
    IdentityField, IdentitySnapshot, TabulaConfig, DEFAULT_CONNECTION,
};

use crate::audit::{NullAuditSink, SyncAuditSink, SyncEvent, SyncStep, SyncStepReport};
use crate::error::{EngineError, StoreError, SyncError};
use crate::menu_sync::MenuSynchronizer;
use crate::merge::{default_features, merge, MergedView, DEFAULT_PAGE_SIZE};
use crate::permission_sync::PermissionSynchronizer;
use crate::schema::{fetch_columns, SchemaProvider};
use crate::slug::{
    controller_name_from_table, model_name_from_table, module_name_from_table,
    normalize_route_prefix, normalize_slug, slug_from_table,
};
use crate::store::{ConfigStore, MemoryStore, MenuStore, PermissionStore};

const MAX_PAGE_SIZE: u32 = 100;

/// Who is acting, and on which site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncContext {
    pub site_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl SyncContext {
    pub fn new(site_id: u64) -> Self {
        Self {
            site_id,
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new(1)
    }
}

/// A configuration save as submitted by a caller.
///
/// Blank identity fields are derived from the table name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub table_name: String,
    #[serde(default = "default_connection")]
    pub db_connection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureToggleInput>,
    #[serde(default, alias = "fields")]
    pub fields_config: Vec<FieldOverride>,
    #[serde(default = "default_true")]
    pub sync_to_menu: bool,
    #[serde(default)]
    pub status: ConfigStatus,
    /// Extra keys stored verbatim in the configuration's options blob.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

fn default_connection() -> String {
    DEFAULT_CONNECTION.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

impl SaveRequest {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            db_connection: default_connection(),
            model_name: None,
            controller_name: None,
            module_name: None,
            route_slug: None,
            route_prefix: None,
            icon: None,
            page_size: DEFAULT_PAGE_SIZE,
            soft_delete: None,
            features: None,
            fields_config: Vec::new(),
            sync_to_menu: true,
            status: ConfigStatus::default(),
            options: serde_json::Map::new(),
        }
    }
}

/// Result of a save: the persisted id plus one report per saga step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub config_id: u64,
    pub created: bool,
    pub identity_changes: Vec<IdentityField>,
    pub steps: Vec<SyncStepReport>,
}

impl SaveOutcome {
    pub fn step(&self, step: SyncStep) -> Option<&SyncStepReport> {
        self.steps.iter().find(|r| r.step == step)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub config_id: u64,
    pub steps: Vec<SyncStepReport>,
}

impl DeleteOutcome {
    pub fn step(&self, step: SyncStep) -> Option<&SyncStepReport> {
        self.steps.iter().find(|r| r.step == step)
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Keep the last override per field name, in first-seen order.
fn dedupe_fields(fields: Vec<FieldOverride>) -> Vec<FieldOverride> {
    let mut out: Vec<FieldOverride> = Vec::with_capacity(fields.len());
    for field in fields {
        if field.field.trim().is_empty() {
            continue;
        }
        match out.iter_mut().find(|f| f.field == field.field) {
            Some(existing) => *existing = field,
            None => out.push(field),
        }
    }
    out
}

fn to_detail<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Drives configuration saves and deletes.
pub struct Orchestrator {
    configs: Arc<dyn ConfigStore>,
    schema: Arc<dyn SchemaProvider>,
    menus: MenuSynchronizer,
    permissions: PermissionSynchronizer,
    journal: Arc<dyn SyncAuditSink>,
    introspection_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        configs: Arc<dyn ConfigStore>,
        menus: Arc<dyn MenuStore>,
        permissions: Arc<dyn PermissionStore>,
        schema: Arc<dyn SchemaProvider>,
        settings: &TabulaConfig,
    ) -> Self {
        Self {
            configs,
            schema,
            menus: MenuSynchronizer::new(menus, settings.menu.clone(), settings.permission.clone()),
            permissions: PermissionSynchronizer::new(permissions, settings.permission.clone()),
            journal: Arc::new(NullAuditSink),
            introspection_timeout: Duration::from_secs(settings.introspection.timeout_seconds),
        }
    }

    /// All three stores backed by one [`MemoryStore`].
    pub fn in_memory(
        store: Arc<MemoryStore>,
        schema: Arc<dyn SchemaProvider>,
        settings: &TabulaConfig,
    ) -> Self {
        Self::new(store.clone(), store.clone(), store, schema, settings)
    }

    pub fn with_journal(mut self, journal: Arc<dyn SyncAuditSink>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_introspection_timeout(mut self, timeout: Duration) -> Self {
        self.introspection_timeout = timeout;
        self
    }

    /// Schema snapshot merged with the stored configuration, if any.
    pub async fn merge_view(
        &self,
        ctx: &SyncContext,
        table_name: &str,
        connection: &str,
    ) -> Result<MergedView, EngineError> {
        let columns =
            fetch_columns(self.schema.as_ref(), table_name, connection, self.introspection_timeout)
                .await?;
        let config = self
            .configs
            .find_config(ctx.site_id, table_name, connection)
            .await?;
        Ok(merge(table_name, &columns, config.as_ref()))
    }

    /// Defaults for a table seen for the first time. The save still goes
    /// through when the schema cannot be read.
    async fn schema_features(&self, table_name: &str, connection: &str) -> FeatureToggles {
        match fetch_columns(self.schema.as_ref(), table_name, connection, self.introspection_timeout)
            .await
        {
            Ok(columns) => default_features(&columns),
            Err(e) => {
                tracing::warn!(table = table_name, connection, "Using default features: {}", e);
                FeatureToggles::default()
            }
        }
    }

    pub async fn list(&self, ctx: &SyncContext) -> Result<Vec<CrudConfig>, EngineError> {
        Ok(self.configs.list_configs(ctx.site_id).await?)
    }

    /// Persist `request` and resynchronize its derived artifacts.
    pub async fn save(
        &self,
        ctx: &SyncContext,
        request: SaveRequest,
    ) -> Result<SaveOutcome, EngineError> {
        let table_name = request.table_name.trim().to_string();
        if table_name.is_empty() {
            return Err(EngineError::Validation("table_name must not be blank".to_string()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&request.page_size) {
            return Err(EngineError::Validation(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, request.page_size
            )));
        }
        let db_connection =
            non_blank(Some(&request.db_connection)).unwrap_or_else(default_connection);

        let route_slug = match normalize_slug(request.route_slug.as_deref().unwrap_or_default()) {
            slug if slug.is_empty() => slug_from_table(&table_name),
            slug => slug,
        };
        if route_slug.is_empty() {
            return Err(EngineError::Validation(format!(
                "no route slug can be derived from table name {:?}",
                table_name
            )));
        }
        let route_prefix =
            match normalize_route_prefix(request.route_prefix.as_deref().unwrap_or_default()) {
                prefix if prefix.is_empty() => route_slug.clone(),
                prefix => prefix,
            };

        let existing = self
            .configs
            .find_config(ctx.site_id, &table_name, &db_connection)
            .await?;
        let old_identity = existing
            .as_ref()
            .map(IdentitySnapshot::of)
            .unwrap_or_default();
        let menu_was_synced = existing.as_ref().is_some_and(|c| c.sync_to_menu);

        if let Some(other) = self
            .configs
            .find_config_by_slug(&route_slug)
            .await?
            && existing.as_ref().is_none_or(|e| e.id != other.id)
        {
            return Err(EngineError::Business(format!(
                "route slug {:?} is already used by table {} on site {}",
                route_slug, other.table_name, other.site_id
            )));
        }

        let now = Utc::now();
        let base_features = match existing.as_ref() {
            Some(config) => config.features(),
            None => self.schema_features(&table_name, &db_connection).await,
        };
        let mut features = request
            .features
            .unwrap_or_default()
            .resolve(base_features);
        if let Some(soft_delete) = request.soft_delete {
            features.soft_delete = soft_delete;
        }

        let mut record = existing.clone().unwrap_or_else(|| CrudConfig {
            id: 0,
            site_id: ctx.site_id,
            table_name: table_name.clone(),
            db_connection: db_connection.clone(),
            model_name: String::new(),
            controller_name: String::new(),
            module_name: String::new(),
            route_slug: String::new(),
            route_prefix: String::new(),
            icon: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            soft_delete: false,
            enable_search: None,
            enable_add: None,
            enable_edit: None,
            enable_delete: None,
            enable_export: None,
            options: ConfigOptions::default(),
            fields: Vec::new(),
            sync_to_menu: true,
            status: ConfigStatus::default(),
            created_at: now,
            updated_at: now,
        });
        record.model_name = non_blank(request.model_name.as_ref())
            .unwrap_or_else(|| model_name_from_table(&table_name));
        record.controller_name = non_blank(request.controller_name.as_ref())
            .unwrap_or_else(|| controller_name_from_table(&table_name));
        record.module_name = non_blank(request.module_name.as_ref())
            .unwrap_or_else(|| module_name_from_table(&table_name));
        record.route_slug = route_slug;
        record.route_prefix = route_prefix;
        record.icon = non_blank(request.icon.as_ref()).unwrap_or_default();
        record.page_size = request.page_size;
        record.set_features(features);
        record.options.extra.extend(request.options);
        record.fields = dedupe_fields(request.fields_config);
        record.sync_to_menu = request.sync_to_menu;
        record.status = request.status;
        record.updated_at = now;

        let (config_id, created) = self.write_config(ctx, record).await?;
        let persisted = self
            .configs
            .get_config(config_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "crud_config",
                id: config_id,
            })?;

        let changes = old_identity.diff(&persisted.identity());
        let mut steps = vec![SyncStepReport::success(
            SyncStep::SaveConfig,
            serde_json::json!({ "created": created, "identity_changes": changes }),
        )];

        steps.push(
            self.run_menu_sync(ctx, &persisted, &old_identity, &changes, menu_was_synced)
                .await,
        );
        steps.push(self.run_permission_sync(&persisted, &old_identity).await);

        for report in &steps {
            self.journal.record(SyncEvent::new(
                ctx.site_id,
                ctx.actor.clone(),
                persisted.id,
                &persisted.table_name,
                report.clone(),
            ));
        }

        Ok(SaveOutcome {
            config_id: persisted.id,
            created,
            identity_changes: changes,
            steps,
        })
    }

    /// Insert or update the record. Returns `(id, created)`.
    async fn write_config(
        &self,
        ctx: &SyncContext,
        mut record: CrudConfig,
    ) -> Result<(u64, bool), EngineError> {
        if record.id != 0 {
            self.configs
                .update_config(&record)
                .await
                .map_err(|e| slug_conflict(&record, e))?;
            return Ok((record.id, false));
        }

        match self.configs.insert_config(record.clone()).await {
            Ok(inserted) => {
                tracing::info!(
                    "Created crud config {} for {}.{}",
                    inserted.id,
                    inserted.db_connection,
                    inserted.table_name
                );
                Ok((inserted.id, true))
            }
            Err(e) if e.is_unique_violation() => {
                // A concurrent save created the row first; update it instead.
                let Some(winner) = self
                    .configs
                    .find_config(ctx.site_id, &record.table_name, &record.db_connection)
                    .await?
                else {
                    return Err(slug_conflict(&record, e));
                };
                record.id = winner.id;
                record.created_at = winner.created_at;
                self.configs
                    .update_config(&record)
                    .await
                    .map_err(|e| slug_conflict(&record, e))?;
                Ok((record.id, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn run_menu_sync(
        &self,
        ctx: &SyncContext,
        config: &CrudConfig,
        old: &IdentitySnapshot,
        changes: &[IdentityField],
        was_synced: bool,
    ) -> SyncStepReport {
        if !config.sync_to_menu {
            return SyncStepReport::skipped(SyncStep::MenuSync, "sync_to_menu disabled");
        }
        if changes.is_empty() && was_synced {
            tracing::debug!("Identity of config {} unchanged, menu left alone", config.id);
            return SyncStepReport::skipped(SyncStep::MenuSync, "identity unchanged");
        }

        match self.menus.sync(ctx.site_id, config, old).await {
            Ok(outcome) => SyncStepReport::success(SyncStep::MenuSync, to_detail(&outcome)),
            Err(e) => {
                let err = SyncError::Menu(e);
                tracing::warn!(
                    config_id = config.id,
                    old_slug = ?old.route_slug,
                    new_slug = %config.route_slug,
                    "{}",
                    err
                );
                SyncStepReport::failure(SyncStep::MenuSync, err, serde_json::Value::Null)
            }
        }
    }

    async fn run_permission_sync(
        &self,
        config: &CrudConfig,
        old: &IdentitySnapshot,
    ) -> SyncStepReport {
        match self.permissions.sync(config, old).await {
            Ok(outcome) if outcome.failures.is_empty() => {
                SyncStepReport::success(SyncStep::PermissionSync, to_detail(&outcome))
            }
            Ok(outcome) => {
                let err = SyncError::PartialPermission {
                    failed: outcome.failures.len(),
                    summary: outcome.failure_summary(),
                };
                tracing::warn!(config_id = config.id, slug = %config.route_slug, "{}", err);
                SyncStepReport::failure(SyncStep::PermissionSync, err, to_detail(&outcome))
            }
            Err(e) => {
                let err = SyncError::Permission(e);
                tracing::warn!(
                    config_id = config.id,
                    old_slug = ?old.route_slug,
                    new_slug = %config.route_slug,
                    "{}",
                    err
                );
                SyncStepReport::failure(SyncStep::PermissionSync, err, serde_json::Value::Null)
            }
        }
    }

    /// Tear down the derived artifacts of a configuration, then remove it.
    pub async fn delete(
        &self,
        ctx: &SyncContext,
        config_id: u64,
    ) -> Result<DeleteOutcome, EngineError> {
        let config = self
            .configs
            .get_config(config_id)
            .await?
            .filter(|c| c.site_id == ctx.site_id)
            .ok_or_else(|| EngineError::Business(format!("crud config {} not found", config_id)))?;

        let mut steps = Vec::new();

        if config.sync_to_menu {
            steps.push(match self.menus.teardown(ctx.site_id, &config).await {
                Ok(removed) => SyncStepReport::success(
                    SyncStep::MenuTeardown,
                    serde_json::json!({ "removed": removed }),
                ),
                Err(e) => {
                    let err = SyncError::Menu(e);
                    tracing::warn!(config_id, slug = %config.route_slug, "{}", err);
                    SyncStepReport::failure(SyncStep::MenuTeardown, err, serde_json::Value::Null)
                }
            });
        } else {
            steps.push(SyncStepReport::skipped(SyncStep::MenuTeardown, "sync_to_menu disabled"));
        }

        steps.push(match self.permissions.teardown(&config).await {
            Ok(outcome) if outcome.failures.is_empty() => {
                SyncStepReport::success(SyncStep::PermissionTeardown, to_detail(&outcome))
            }
            Ok(outcome) => {
                let err = SyncError::PartialPermission {
                    failed: outcome.failures.len(),
                    summary: outcome.failure_summary(),
                };
                tracing::warn!(config_id, slug = %config.route_slug, "{}", err);
                SyncStepReport::failure(SyncStep::PermissionTeardown, err, to_detail(&outcome))
            }
            Err(e) => {
                let err = SyncError::Permission(e);
                tracing::warn!(config_id, slug = %config.route_slug, "{}", err);
                SyncStepReport::failure(
                    SyncStep::PermissionTeardown,
                    err,
                    serde_json::Value::Null,
                )
            }
        });

        let removed = self.configs.delete_config(config_id).await?;
        tracing::info!("Deleted crud config {} ({})", config_id, config.table_name);
        steps.push(SyncStepReport::success(
            SyncStep::DeleteConfig,
            serde_json::json!({ "removed": removed }),
        ));

        for report in &steps {
            self.journal.record(SyncEvent::new(
                ctx.site_id,
                ctx.actor.clone(),
                config_id,
                &config.table_name,
                report.clone(),
            ));
        }

        Ok(DeleteOutcome { config_id, steps })
    }
}

fn slug_conflict(record: &CrudConfig, error: StoreError) -> EngineError {
    if error.is_unique_violation() {
        EngineError::Business(format!(
            "route slug {:?} collides with another configuration: {}",
            record.route_slug, error
        ))
    } else {
        error.into()
    }
}
