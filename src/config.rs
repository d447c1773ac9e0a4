use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CatalogError, CommandResult};
use crate::util::path_display;

const CONFIG_FILE_NAME: &str = "catalog.json";
const DEFAULT_DATABASE_FILE_NAME: &str = "inventory.db";
const DEFAULT_CACHE_TTL_MS: i64 = 120_000;
const DEFAULT_CACHE_CAPACITY: usize = 480;
const DEFAULT_SLOW_QUERY_MS: u64 = 60;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    pub database_file_name: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub cache_ttl_ms: i64,
    pub cache_capacity: usize,
    pub slow_query_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_file_name: DEFAULT_DATABASE_FILE_NAME.to_string(),
            admin_username: None,
            admin_password: None,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            slow_query_ms: DEFAULT_SLOW_QUERY_MS,
        }
    }
}

impl CatalogConfig {
    /// Reads `catalog.json` from the data dir when present, then applies
    /// `INVENTORY_*` environment overrides.
    pub fn load(data_dir: &Path) -> CommandResult<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|error| {
                CatalogError::io(
                    format!("Could not read config '{}'", path_display(&path)),
                    error,
                )
            })?;
            serde_json::from_str::<Self>(&raw).map_err(|error| {
                CatalogError::config(
                    format!("Could not parse config '{}'", path_display(&path)),
                    error,
                )
            })?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("INVENTORY_DB_FILE").filter(|value| !value.trim().is_empty()) {
            self.database_file_name = value;
        }
        if let Some(value) = lookup("INVENTORY_ADMIN_USERNAME") {
            self.admin_username = Some(value);
        }
        if let Some(value) = lookup("INVENTORY_ADMIN_PASSWORD") {
            self.admin_password = Some(value);
        }
        if let Some(value) = lookup("INVENTORY_CACHE_TTL_MS") {
            match value.parse::<i64>() {
                Ok(ttl) => self.cache_ttl_ms = ttl,
                Err(_) => tracing::warn!(value = %value, "Ignoring invalid INVENTORY_CACHE_TTL_MS"),
            }
        }
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::CatalogConfig;
    use std::collections::HashMap;
    use std::fs;

    #[test]
    fn defaults_apply_without_config_file() {
        let directory = tempfile::tempdir().expect("temp dir");
        let config = CatalogConfig::load(directory.path()).expect("load config");
        assert_eq!(
            config.database_path(directory.path()),
            directory.path().join("inventory.db")
        );
        assert_eq!(config.cache_ttl_ms, 120_000);
    }

    #[test]
    fn reads_partial_config_file() {
        let directory = tempfile::tempdir().expect("temp dir");
        fs::write(
            directory.path().join("catalog.json"),
            r#"{ "adminUsername": "keeper", "adminPassword": "s3cret", "cacheTtlMs": 0 }"#,
        )
        .expect("write config");

        let config = CatalogConfig::load(directory.path()).expect("load config");
        assert_eq!(config.admin_username.as_deref(), Some("keeper"));
        assert_eq!(config.cache_ttl_ms, 0);
        assert_eq!(config.database_file_name, "inventory.db");
    }

    #[test]
    fn rejects_malformed_config_file() {
        let directory = tempfile::tempdir().expect("temp dir");
        fs::write(directory.path().join("catalog.json"), "{ not json").expect("write config");
        let error = CatalogConfig::load(directory.path()).expect_err("malformed config");
        assert_eq!(error.code(), "config");
    }

    #[test]
    fn environment_overrides_win() {
        let overrides = HashMap::from([
            ("INVENTORY_DB_FILE", "shop.db"),
            ("INVENTORY_ADMIN_USERNAME", "keeper"),
            ("INVENTORY_CACHE_TTL_MS", "not-a-number"),
        ]);
        let mut config = CatalogConfig::default();
        config.apply_overrides(|key| overrides.get(key).map(|value| value.to_string()));

        assert_eq!(config.database_file_name, "shop.db");
        assert_eq!(config.admin_username.as_deref(), Some("keeper"));
        assert_eq!(config.admin_password, None);
        assert_eq!(config.cache_ttl_ms, 120_000);
    }
}
