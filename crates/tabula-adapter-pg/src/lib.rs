//! Postgres schema snapshot provider.
//!
//! Columns are read from `information_schema.columns` in ordinal order;
//! comments come from `col_description`. One lazily connected pool is kept
//! per named connection.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tabula_core::{ColumnDescriptor, ConnectionConfig, TabulaConfig};
use tabula_runtime::SchemaProvider;

const COLUMNS_QUERY: &str = r#"
    select
      c.column_name,
      c.data_type,
      c.udt_name,
      c.character_maximum_length::int4 as char_length,
      c.numeric_precision::int4 as numeric_precision,
      c.numeric_scale::int4 as numeric_scale,
      c.is_nullable,
      c.column_default,
      col_description(
        format('%I.%I', c.table_schema, c.table_name)::regclass,
        c.ordinal_position::int4
      ) as column_comment
    from information_schema.columns c
    where c.table_schema = $1 and c.table_name = $2
    order by c.ordinal_position
"#;

/// Map a Postgres column type to the short spelling the inference engine
/// understands (`int4` becomes `int`, `varchar` with a length becomes
/// `varchar(255)`, and so on).
pub fn normalize_pg_type(
    data_type: &str,
    udt_name: &str,
    char_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
) -> String {
    if data_type.eq_ignore_ascii_case("ARRAY") {
        return format!("{}[]", udt_name.trim_start_matches('_'));
    }
    match udt_name {
        "int2" => "smallint".to_string(),
        "int4" => "int".to_string(),
        "int8" => "bigint".to_string(),
        "bool" => "boolean".to_string(),
        "float4" => "real".to_string(),
        "float8" => "double".to_string(),
        "numeric" => match (numeric_precision, numeric_scale) {
            (Some(p), Some(s)) => format!("decimal({},{})", p, s),
            _ => "decimal".to_string(),
        },
        "varchar" => match char_length {
            Some(n) => format!("varchar({})", n),
            None => "varchar".to_string(),
        },
        "bpchar" => match char_length {
            Some(n) => format!("char({})", n),
            None => "char".to_string(),
        },
        "timestamp" | "timestamptz" | "date" | "time" | "timetz" | "json" | "jsonb" | "text"
        | "uuid" | "bytea" | "inet" => udt_name.to_string(),
        _ => data_type.to_ascii_lowercase(),
    }
}

/// Split an optionally schema-qualified table name.
fn split_table<'a>(table: &'a str, default_schema: &'a str) -> (&'a str, &'a str) {
    match table.split_once('.') {
        Some((schema, name)) if !schema.is_empty() && !name.is_empty() => (schema, name),
        _ => (default_schema, table),
    }
}

/// [`SchemaProvider`] backed by live Postgres databases.
pub struct PostgresSchemaProvider {
    connections: BTreeMap<String, ConnectionConfig>,
    pools: Mutex<BTreeMap<String, PgPool>>,
}

impl PostgresSchemaProvider {
    pub fn new(connections: BTreeMap<String, ConnectionConfig>) -> Self {
        Self {
            connections,
            pools: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn from_config(config: &TabulaConfig) -> Self {
        Self::new(config.connections.clone())
    }

    fn settings(&self, connection: &str) -> anyhow::Result<&ConnectionConfig> {
        self.connections
            .get(connection)
            .ok_or_else(|| anyhow::anyhow!("unknown connection '{}'", connection))
    }

    /// Pool for `connection`, created on first use. Connecting happens lazily
    /// on the first query.
    fn pool(&self, connection: &str) -> anyhow::Result<PgPool> {
        let settings = self.settings(connection)?;
        let mut pools = self
            .pools
            .lock()
            .map_err(|_| anyhow::anyhow!("connection pool cache poisoned"))?;
        if let Some(pool) = pools.get(connection) {
            return Ok(pool.clone());
        }

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .connect_lazy(&settings.connection_string())?;
        tracing::debug!("Created pool for connection '{}'", connection);
        pools.insert(connection.to_string(), pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl SchemaProvider for PostgresSchemaProvider {
    async fn get_columns(
        &self,
        table: &str,
        connection: &str,
    ) -> anyhow::Result<Vec<ColumnDescriptor>> {
        let settings = self.settings(connection)?;
        let (schema, name) = split_table(table, &settings.schema);
        let pool = self.pool(connection)?;

        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(schema)
            .bind(name)
            .fetch_all(&pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let column_name: String = row.try_get("column_name")?;
            let data_type: String = row.try_get("data_type")?;
            let udt_name: String = row.try_get("udt_name")?;
            let is_nullable: String = row.try_get("is_nullable")?;

            columns.push(ColumnDescriptor {
                name: column_name,
                db_type: normalize_pg_type(
                    &data_type,
                    &udt_name,
                    row.try_get("char_length")?,
                    row.try_get("numeric_precision")?,
                    row.try_get("numeric_scale")?,
                ),
                nullable: is_nullable == "YES",
                default: row.try_get("column_default")?,
                comment: row.try_get("column_comment")?,
            });
        }

        tracing::debug!(
            "Introspected {} column(s) of {}.{} on '{}'",
            columns.len(),
            schema,
            name,
            connection
        );
        Ok(columns)
    }
}
