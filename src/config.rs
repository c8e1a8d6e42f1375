//! Connection settings read from the environment.

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const DATABASE_SQLX_LOGGING: &str = "DATABASE_SQLX_LOGGING";

const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    /// Pool size; an in-memory SQLite database is pinned to one connection
    /// when unset.
    pub max_connections: Option<u32>,
    pub sqlx_logging: bool,
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: None,
            sqlx_logging: false,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl StoreConfig {
    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_SQLX_LOGGING`, falling back to defaults for unset keys.
    ///
    /// # Errors
    ///
    /// `DbErr::Custom` if a set value cannot be parsed.
    pub fn from_env() -> Result<Self, DbErr> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`StoreConfig::from_env`] with a custom source of values.
    ///
    /// # Errors
    ///
    /// `DbErr::Custom` if a set value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbErr> {
        let mut config = Self::default();

        if let Some(url) = lookup(DATABASE_URL).filter(|url| !url.trim().is_empty()) {
            config.database_url = url;
        }

        if let Some(raw) = lookup(DATABASE_MAX_CONNECTIONS) {
            let max = raw.trim().parse::<u32>().map_err(|err| {
                DbErr::Custom(format!("invalid {DATABASE_MAX_CONNECTIONS} {raw:?}: {err}"))
            })?;
            if max == 0 {
                return Err(DbErr::Custom(format!(
                    "{DATABASE_MAX_CONNECTIONS} must be at least 1"
                )));
            }
            config.max_connections = Some(max);
        }

        if let Some(raw) = lookup(DATABASE_SQLX_LOGGING) {
            config.sqlx_logging = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(DbErr::Custom(format!(
                        "invalid {DATABASE_SQLX_LOGGING} {other:?}"
                    )));
                }
            };
        }

        Ok(config)
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.database_url.starts_with("sqlite") && self.database_url.contains(":memory:")
    }

    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.database_url.clone());
        let max_connections = match self.max_connections {
            Some(max) => Some(max),
            None if self.is_in_memory() => Some(1),
            None => None,
        };
        if let Some(max) = max_connections {
            options.max_connections(max).min_connections(1);
        }
        options
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.connect_timeout)
            .sqlx_logging(self.sqlx_logging);
        options
    }

    /// # Errors
    ///
    /// Returns the connection error unchanged.
    pub async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        tracing::debug!(
            in_memory = self.is_in_memory(),
            max_connections = ?self.max_connections,
            "Connecting to database"
        );
        Database::connect(self.connect_options())
            .await
            .inspect_err(|err| tracing::error!(error = ?err, "Database connection failed"))
    }
}
