//! `tabula schema` commands.

use std::time::Duration;
use tabula_runtime::{explain_column_type, fetch_columns, suggest_form_type};

use super::Workspace;

pub async fn run_columns(ws: &Workspace, table: &str, connection: &str) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(ws.config.introspection.timeout_seconds);
    let columns = fetch_columns(ws.schema.as_ref(), table, connection, timeout).await?;

    println!(
        "{:<24} {:<20} {:<8} {:<10} {:<10} {}",
        "COLUMN", "DB TYPE", "NULL", "TYPE", "BY", "FORM"
    );
    for column in &columns {
        let (column_type, strategy) = explain_column_type(column, None);
        println!(
            "{:<24} {:<20} {:<8} {:<10} {:<10} {}",
            column.name,
            column.db_type,
            if column.nullable { "yes" } else { "no" },
            column_type,
            strategy,
            suggest_form_type(column)
        );
    }
    Ok(())
}
