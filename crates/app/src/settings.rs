//! Settings for the `finance` binary.
//!
//! Read from an optional `settings.toml` (see `settings.example.toml`) and
//! overridden by `FINANCE__*` environment variables, e.g.
//! `FINANCE__APP__LEVEL=debug` or `FINANCE__DATABASE__SQLITE__PATH=./ledger.db`.
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_SETTINGS_PATH: &str = "settings";

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite { path: String },
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite {
            path: "./finance.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct App {
    pub level: String,
    pub page_size: u64,
    pub storage_timeout_ms: Option<u64>,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            page_size: 20,
            storage_timeout_ms: None,
        }
    }
}

impl App {
    pub fn storage_timeout(&self) -> Option<Duration> {
        self.storage_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
}

impl Settings {
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_SETTINGS_PATH)).required(false))
            .add_source(
                Environment::with_prefix("FINANCE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn from_toml(raw: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let settings = from_toml("");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.app.page_size, 20);
        assert_eq!(settings.app.storage_timeout(), None);
    }

    #[test]
    fn reads_sqlite_database_and_timeout() {
        let settings = from_toml(
            r#"
            [app]
            level = "debug"
            storage_timeout_ms = 1500

            [database.sqlite]
            path = "/var/lib/finance/ledger.db"
            "#,
        );
        assert_eq!(settings.app.level, "debug");
        assert_eq!(
            settings.app.storage_timeout(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            settings.database,
            Database::Sqlite {
                path: "/var/lib/finance/ledger.db".to_string()
            }
        );
    }

    #[test]
    fn reads_memory_database() {
        let settings = from_toml(r#"database = "memory""#);
        assert_eq!(settings.database, Database::Memory);
    }
}
