//! Sync journal.
//!
//! Every step of a save or delete saga produces a [`SyncStepReport`]. The
//! orchestrator returns the reports to its caller and also hands each one,
//! wrapped in a [`SyncEvent`], to a [`SyncAuditSink`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tabula_core::AuditConfig;
use uuid::Uuid;

/// Journal file name inside the configured directory.
pub const JOURNAL_FILE: &str = "sync.log";

/// One step of a save/delete saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    /// The primary configuration write.
    SaveConfig,
    MenuSync,
    PermissionSync,
    MenuTeardown,
    PermissionTeardown,
    DeleteConfig,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStep::SaveConfig => "save_config",
            SyncStep::MenuSync => "menu_sync",
            SyncStep::PermissionSync => "permission_sync",
            SyncStep::MenuTeardown => "menu_teardown",
            SyncStep::PermissionTeardown => "permission_teardown",
            SyncStep::DeleteConfig => "delete_config",
        };
        f.write_str(s)
    }
}

/// Outcome of one saga step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStepReport {
    pub step: SyncStep,
    pub ok: bool,
    /// The step was not needed (no identity change, menu sync disabled).
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Step-specific counters and ids.
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl SyncStepReport {
    pub fn success(step: SyncStep, detail: serde_json::Value) -> Self {
        Self {
            step,
            ok: true,
            skipped: false,
            error: None,
            detail,
        }
    }

    pub fn skipped(step: SyncStep, reason: &str) -> Self {
        Self {
            step,
            ok: true,
            skipped: true,
            error: None,
            detail: serde_json::json!({ "reason": reason }),
        }
    }

    pub fn failure(step: SyncStep, error: impl fmt::Display, detail: serde_json::Value) -> Self {
        Self {
            step,
            ok: false,
            skipped: false,
            error: Some(error.to_string()),
            detail,
        }
    }
}

/// A journal line: one step report plus who/what/when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub site_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub config_id: u64,
    pub table_name: String,
    #[serde(flatten)]
    pub report: SyncStepReport,
}

impl SyncEvent {
    pub fn new(
        site_id: u64,
        actor: Option<String>,
        config_id: u64,
        table_name: impl Into<String>,
        report: SyncStepReport,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            site_id,
            actor,
            config_id,
            table_name: table_name.into(),
            report,
        }
    }
}

/// Destination for sync events. Recording never fails the caller.
pub trait SyncAuditSink: Send + Sync {
    fn record(&self, event: SyncEvent);
}

/// Emits one structured tracing event per step.
pub struct TracingAuditSink;

impl SyncAuditSink for TracingAuditSink {
    fn record(&self, event: SyncEvent) {
        let report = &event.report;
        if report.ok {
            tracing::info!(
                step = %report.step,
                skipped = report.skipped,
                config_id = event.config_id,
                table = %event.table_name,
                site_id = event.site_id,
                detail = %report.detail,
                "sync step completed"
            );
        } else {
            tracing::warn!(
                step = %report.step,
                config_id = event.config_id,
                table = %event.table_name,
                site_id = event.site_id,
                error = report.error.as_deref().unwrap_or_default(),
                "sync step failed"
            );
        }
    }
}

/// Appends events as JSON Lines.
pub struct JsonlAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Open (or create) the journal file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SyncAuditSink for JsonlAuditSink {
    fn record(&self, event: SyncEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to serialize sync event: {}", e);
                return;
            }
        };
        let Ok(mut file) = self.file.lock() else {
            tracing::error!("Sync journal lock poisoned, dropping event {}", event.event_id);
            return;
        };
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::error!("Failed to append to {}: {}", self.path.display(), e);
        }
    }
}

/// Keeps events in memory; used by tests and embedders that inspect reports.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl SyncAuditSink for MemoryAuditSink {
    fn record(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Discards everything.
pub struct NullAuditSink;

impl SyncAuditSink for NullAuditSink {
    fn record(&self, _event: SyncEvent) {}
}

/// Fans out to several sinks, optionally dropping successful steps.
pub struct SyncJournal {
    sinks: Vec<Arc<dyn SyncAuditSink>>,
    log_success: bool,
}

impl SyncJournal {
    pub fn new(sinks: Vec<Arc<dyn SyncAuditSink>>, log_success: bool) -> Self {
        Self { sinks, log_success }
    }
}

impl SyncAuditSink for SyncJournal {
    fn record(&self, event: SyncEvent) {
        if event.report.ok && !self.log_success {
            return;
        }
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}

/// Build the journal described by `config`.
pub fn create_sink(config: &AuditConfig) -> io::Result<Arc<dyn SyncAuditSink>> {
    if !config.enabled {
        return Ok(Arc::new(NullAuditSink));
    }

    let mut sinks: Vec<Arc<dyn SyncAuditSink>> = Vec::new();
    let path = Path::new(&config.directory).join(JOURNAL_FILE);
    sinks.push(Arc::new(JsonlAuditSink::open(&path)?));
    if config.stdout {
        sinks.push(Arc::new(TracingAuditSink));
    }
    tracing::debug!("Sync journal at {}", path.display());

    Ok(Arc::new(SyncJournal::new(sinks, config.log_success)))
}
