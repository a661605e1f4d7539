//! `tabula crud` commands.

use anyhow::{Context, bail};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use tabula_runtime::SaveRequest;

use super::{print_json, Workspace};

/// Schema every save file is checked against before it is deserialized.
const SAVE_REQUEST_SCHEMA: &str = include_str!("../../../../schemas/SaveRequest.schema.json");

/// Validate a raw payload, returning one message per violation.
fn validate_payload(payload: &JsonValue) -> anyhow::Result<Vec<String>> {
    let schema: JsonValue =
        serde_json::from_str(SAVE_REQUEST_SCHEMA).context("Embedded SaveRequest schema is invalid")?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| anyhow::anyhow!("Failed to compile SaveRequest schema: {}", e))?;

    Ok(validator
        .iter_errors(payload)
        .map(|error| {
            let path = error.instance_path().to_string();
            let location = if path.is_empty() { "(root)".to_string() } else { path };
            format!("{}: {}", location, error)
        })
        .collect())
}

/// Read a YAML or JSON save file and turn it into a [`SaveRequest`].
pub fn load_save_request(path: &Path) -> anyhow::Result<SaveRequest> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    // YAML is a superset of JSON, so one parser covers both.
    let payload: JsonValue = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let violations = validate_payload(&payload)?;
    if !violations.is_empty() {
        for violation in &violations {
            tracing::error!("{}: {}", path.display(), violation);
        }
        bail!(
            "{} is not a valid save request ({} problem(s))",
            path.display(),
            violations.len()
        );
    }

    serde_json::from_value(payload).with_context(|| format!("Invalid save request {}", path.display()))
}

pub async fn run_merge(ws: &Workspace, table: &str, connection: &str) -> anyhow::Result<()> {
    let view = ws.orchestrator()?.merge_view(&ws.ctx, table, connection).await?;
    print_json(&view)
}

pub async fn run_save(ws: &Workspace, file: &Path) -> anyhow::Result<()> {
    let request = load_save_request(file)?;
    let outcome = ws.orchestrator()?.save(&ws.ctx, request).await?;
    ws.persist()?;

    let failed = outcome.steps.iter().filter(|s| !s.ok).count();
    if failed > 0 {
        tracing::warn!(
            "Config {} saved, {} sync step(s) failed; see the sync journal",
            outcome.config_id,
            failed
        );
    } else {
        tracing::info!("Config {} saved", outcome.config_id);
    }
    print_json(&outcome)
}

pub async fn run_delete(ws: &Workspace, id: u64) -> anyhow::Result<()> {
    let outcome = ws.orchestrator()?.delete(&ws.ctx, id).await?;
    ws.persist()?;
    print_json(&outcome)
}

pub async fn run_list(ws: &Workspace) -> anyhow::Result<()> {
    let configs = ws.orchestrator()?.list(&ws.ctx).await?;
    if configs.is_empty() {
        println!("No configurations for site {}", ws.ctx.site_id);
        return Ok(());
    }

    println!(
        "{:<6} {:<24} {:<12} {:<24} {:<6} {}",
        "ID", "TABLE", "CONNECTION", "ROUTE", "MENU", "STATUS"
    );
    for config in configs {
        println!(
            "{:<6} {:<24} {:<12} {:<24} {:<6} {:?}",
            config.id,
            config.table_name,
            config.db_connection,
            config.route_slug,
            if config.sync_to_menu { "yes" } else { "no" },
            config.status
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_yaml_save_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "articles.yaml",
            r#"
table_name: admin_articles
route_slug: news
features:
  export: false
fields_config:
  - field: title
    searchable: true
"#,
        );
        let request = load_save_request(&path).unwrap();
        assert_eq!(request.table_name, "admin_articles");
        assert_eq!(request.route_slug.as_deref(), Some("news"));
        assert_eq!(request.features.unwrap().export, Some(false));
        assert_eq!(request.fields_config[0].searchable, Some(true));
        assert_eq!(request.page_size, 15);
    }

    #[test]
    fn test_load_json_save_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.json", r#"{"table_name":"posts","page_size":50}"#);
        assert_eq!(load_save_request(&path).unwrap().page_size, 50);
    }

    #[test]
    fn test_schema_violations_are_reported() {
        let payload = serde_json::json!({
            "page_size": 500,
            "fields_config": [{ "label": "no field name" }],
            "unexpected": true
        });
        let violations = validate_payload(&payload).unwrap();
        assert!(violations.len() >= 3, "{:?}", violations);
        assert!(violations.iter().any(|v| v.contains("/page_size")));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.yaml", "table_name: ''\n");
        assert!(load_save_request(&path).is_err());
    }
}
