//! Schema snapshot providers.
//!
//! The engine never runs introspection queries itself; it asks a
//! [`SchemaProvider`] for the ordered columns of a table. Providers return an
//! empty list for unknown tables.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tabula_core::ColumnDescriptor;

use crate::error::SchemaError;

#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Ordered column descriptors of `table` on `connection`.
    async fn get_columns(
        &self,
        table: &str,
        connection: &str,
    ) -> anyhow::Result<Vec<ColumnDescriptor>>;
}

/// Fetch columns with an upper time bound. Unknown tables are an error here.
pub async fn fetch_columns(
    provider: &dyn SchemaProvider,
    table: &str,
    connection: &str,
    timeout: Duration,
) -> Result<Vec<ColumnDescriptor>, SchemaError> {
    let columns = tokio::time::timeout(timeout, provider.get_columns(table, connection))
        .await
        .map_err(|_| SchemaError::Timeout {
            table: table.to_string(),
            seconds: timeout.as_secs(),
        })??;

    if columns.is_empty() {
        return Err(SchemaError::TableNotFound {
            table: table.to_string(),
            connection: connection.to_string(),
        });
    }
    Ok(columns)
}

/// Provider backed by fixed column lists.
///
/// Used in tests and for offline work against a saved snapshot file shaped as
/// `{ "<connection>": { "<table>": [ColumnDescriptor, ...] } }`.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    tables: BTreeMap<String, BTreeMap<String, Vec<ColumnDescriptor>>>,
}

impl StaticSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(
        mut self,
        connection: &str,
        table: &str,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        self.tables
            .entry(connection.to_string())
            .or_default()
            .insert(table.to_string(), columns);
        self
    }

    /// Load a snapshot file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let tables = serde_json::from_slice(&bytes)?;
        Ok(Self { tables })
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    async fn get_columns(
        &self,
        table: &str,
        connection: &str,
    ) -> anyhow::Result<Vec<ColumnDescriptor>> {
        Ok(self
            .tables
            .get(connection)
            .and_then(|tables| tables.get(table))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;

    #[async_trait]
    impl SchemaProvider for SlowProvider {
        async fn get_columns(&self, _: &str, _: &str) -> anyhow::Result<Vec<ColumnDescriptor>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![ColumnDescriptor::new("id", "int")])
        }
    }

    #[tokio::test]
    async fn test_static_provider_lookup() {
        let provider = StaticSchemaProvider::new().with_table(
            "default",
            "articles",
            vec![ColumnDescriptor::new("id", "int")],
        );

        let columns = fetch_columns(&provider, "articles", "default", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(columns.len(), 1);

        let missing = fetch_columns(&provider, "articles", "replica", Duration::from_secs(1)).await;
        assert!(matches!(missing, Err(SchemaError::TableNotFound { .. })));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let result = fetch_columns(&SlowProvider, "t", "default", Duration::from_millis(20)).await;
        assert!(matches!(result, Err(SchemaError::Timeout { .. })));
    }

    #[test]
    fn test_from_json_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"default":{"articles":[{"name":"id","db_type":"int"}]}}"#,
        )
        .unwrap();
        let provider = StaticSchemaProvider::from_json_file(file.path()).unwrap();
        assert_eq!(provider.tables["default"]["articles"][0].name, "id");
    }
}
