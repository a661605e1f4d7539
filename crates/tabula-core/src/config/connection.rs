//! Named database connections used for schema introspection.
//!
//! Each connection resolves to a URL, checked in this order:
//! 1. `url_env` - an environment variable holding the full URL
//! 2. `url` - the URL itself
//! 3. Individual fields (host, port, database, username, password_env)
//!
//! Tabula never writes credentials back; it only reads them.

use serde::{Deserialize, Serialize};

/// Connection settings for one named database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Environment variable holding the connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_env: Option<String>,

    /// Connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_username")]
    pub username: String,

    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Schema searched when a table name is not qualified.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Maximum pooled connections used while introspecting.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url_env: None,
            url: None,
            host: default_host(),
            port: default_port(),
            database: default_database(),
            username: default_username(),
            password_env: None,
            schema: default_schema(),
            max_connections: default_max_connections(),
        }
    }
}

impl ConnectionConfig {
    /// Resolve the connection URL.
    pub fn connection_string(&self) -> String {
        if let Some(env_var) = &self.url_env
            && let Ok(url) = std::env::var(env_var)
        {
            return url;
        }

        if let Some(url) = &self.url {
            return url.clone();
        }

        let password = self
            .password_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok());
        match password {
            Some(password) => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.username, password, self.host, self.port, self.database
            ),
            None => format!(
                "postgresql://{}@{}:{}/{}",
                self.username, self.host, self.port, self.database
            ),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "postgres".to_string()
}

fn default_username() -> String {
    "postgres".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_from_fields() {
        let config = ConnectionConfig {
            host: "db".to_string(),
            database: "admin".to_string(),
            username: "tabula".to_string(),
            ..Default::default()
        };
        assert_eq!(config.connection_string(), "postgresql://tabula@db:5432/admin");
    }

    #[test]
    fn test_direct_url_wins_over_fields() {
        let config = ConnectionConfig {
            url: Some("postgresql://a:b@remote:6543/x".to_string()),
            host: "ignored".to_string(),
            ..Default::default()
        };
        assert_eq!(config.connection_string(), "postgresql://a:b@remote:6543/x");
    }

    #[test]
    fn test_url_env_wins_over_url() {
        // SAFETY: test-only environment mutation with a unique variable name
        unsafe {
            std::env::set_var("TABULA_TEST_CONN_URL", "postgresql://env@envhost:1/envdb");
        }

        let config = ConnectionConfig {
            url_env: Some("TABULA_TEST_CONN_URL".to_string()),
            url: Some("postgresql://direct@host/db".to_string()),
            ..Default::default()
        };
        assert_eq!(config.connection_string(), "postgresql://env@envhost:1/envdb");

        // SAFETY: cleanup
        unsafe {
            std::env::remove_var("TABULA_TEST_CONN_URL");
        }
    }
}
