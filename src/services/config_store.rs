// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::MAX_BATCH_SIZE;

const MAX_BACKUPS: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `name[:model]`, e.g. `openai:gpt-4o-mini`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_reviews")]
    pub max_reviews: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            max_reviews: default_max_reviews(),
        }
    }
}

impl ClassifierConfig {
    /// Reviews actually sent out; never more than the batch cap.
    pub fn effective_max_reviews(&self) -> usize {
        self.max_reviews.clamp(1, MAX_BATCH_SIZE)
    }
}

fn default_true() -> bool { true }
fn default_provider() -> String { "openai:gpt-4o-mini".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_reviews() -> usize { MAX_BATCH_SIZE }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("reviewGuard"))
    }

    /// Store at the default location, if the platform has one.
    pub fn open_default() -> Option<Self> {
        Self::default_config_dir().map(Self::new)
    }

    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(io_err(&self.config_dir))
    }

    /// Load configuration; a missing file yields defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(io_err(&self.config_file))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration, backing up the previous file first.
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content).map_err(io_err(&self.config_file))
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(io_err(&backup_dir))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(io_err(&backup_file))?;

        self.cleanup_old_backups(&backup_dir, MAX_BACKUPS)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(io_err(backup_dir))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Timestamped names sort chronologically.
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<(), ConfigError> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.classifier.enabled);
        assert_eq!(config.classifier.provider, "openai:gpt-4o-mini");
        assert_eq!(config.classifier.max_reviews, 100);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"version":"1","classifier":{"timeoutSecs":5}}"#).unwrap();
        assert_eq!(config.classifier.timeout_secs, 5);
        assert!(config.classifier.enabled);
        assert_eq!(config.classifier.provider, "openai:gpt-4o-mini");
    }

    #[test]
    fn test_max_reviews_capped_at_batch_limit() {
        let mut classifier = ClassifierConfig::default();
        classifier.max_reviews = 500;
        assert_eq!(classifier.effective_max_reviews(), MAX_BATCH_SIZE);
        classifier.max_reviews = 0;
        assert_eq!(classifier.effective_max_reviews(), 1);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("nested"));
        let config = store.load().unwrap();
        assert_eq!(config.version, "");
    }

    #[test]
    fn test_api_key_round_trip_with_backups() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());

        store.set_api_key("openai", "sk-test").unwrap();
        let keys = store.load().unwrap().api_keys;
        assert_eq!(keys.get("openai").map(String::as_str), Some("sk-test"));

        store.delete_api_key("openai").unwrap();
        assert!(store.load().unwrap().api_keys.get("openai").is_none());

        let backups = fs::read_dir(dir.path().join("backups")).unwrap().count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), "{not json").unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        assert!(matches!(store.load(), Err(ConfigError::Json(_))));
    }
}
