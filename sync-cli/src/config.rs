use anyhow::{Context, Result};
use mirror_sync::{PathValidator, ProtectedRoot, SavedPaths, TargetStore, DEFAULT_INTERVAL, DEFAULT_SAVE_MARKERS};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::telemetry::LoggingConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    /// Last pair accepted by `run`
    #[serde(default)]
    pub paths: Option<SavedPaths>,
    #[serde(default)]
    pub guardrails: GuardrailConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub presets: PresetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Set once the user has accepted that the destination gets overwritten
    #[serde(default)]
    pub overwrite_acknowledged: bool,
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Segments a destination must contain to count as a save folder
    #[serde(default = "default_save_markers")]
    pub save_markers: Vec<String>,
    /// Additional folders that may never be used as a destination, children included
    #[serde(default)]
    pub protected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Folder holding one directory per user id, relative to the local app-data root
    #[serde(default = "default_user_root")]
    pub user_root: PathBuf,
    /// Pattern a user id directory name must match
    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,
    /// Save folder relative to a user id directory
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetConfig {
    /// Directory holding the bundled save sets, next to the executable when absent
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overwrite_acknowledged: false,
            interval: default_interval(),
            log_level: default_log_level(),
        }
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            save_markers: default_save_markers(),
            protected: Vec::new(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            user_root: default_user_root(),
            id_pattern: default_id_pattern(),
            profile_dir: default_profile_dir(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.settings.interval.is_zero() {
            anyhow::bail!("settings.interval must be greater than zero");
        }
        if self.guardrails.save_markers.iter().any(|m| m.trim().is_empty()) {
            anyhow::bail!("guardrails.save_markers cannot contain empty entries");
        }
        regex::Regex::new(&self.discovery.id_pattern)
            .with_context(|| format!("Invalid discovery.id_pattern '{}'", self.discovery.id_pattern))?;
        Ok(())
    }

    /// Validator for this platform with the configured markers and extra protected folders
    pub fn validator(&self) -> PathValidator {
        self.guardrails.protected.iter().fold(
            PathValidator::from_env().with_save_markers(self.guardrails.save_markers.iter().cloned()),
            |validator, root| validator.with_protected_root(ProtectedRoot::subtree(root.clone())),
        )
    }
}

/// Shared handle to the configuration file. Every change is written back immediately.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Arc<Mutex<AppConfig>>,
}

impl ConfigStore {
    /// Load `path`, creating it with defaults when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = if path.exists() {
            AppConfig::load(&path)?
        } else {
            let config = AppConfig::default();
            config.save(&path)?;
            config
        };
        config.validate()?;

        Ok(Self {
            path,
            config: Arc::new(Mutex::new(config)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> AppConfig {
        self.config.lock().clone()
    }

    /// Apply `change` and persist the result.
    pub fn update(&self, change: impl FnOnce(&mut AppConfig)) -> Result<()> {
        let mut config = self.config.lock();
        change(&mut config);
        config.save(&self.path)
    }

    pub fn reset(&self) -> Result<()> {
        self.update(|config| *config = AppConfig::default())
    }
}

impl TargetStore for ConfigStore {
    fn save(&self, paths: &SavedPaths) -> Result<()> {
        self.update(|config| config.paths = Some(paths.clone()))
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("save-mirror")
        .join("config.toml")
}

// Default value functions
fn default_interval() -> Duration { DEFAULT_INTERVAL }
fn default_log_level() -> String { "info".to_string() }

fn default_save_markers() -> Vec<String> {
    DEFAULT_SAVE_MARKERS.iter().map(|m| m.to_string()).collect()
}

fn default_user_root() -> PathBuf {
    ["Saber", "Space Marine 2", "storage", "steam", "user"].iter().collect()
}

fn default_id_pattern() -> String { r"^7656\d{13}$".to_string() }

fn default_profile_dir() -> PathBuf {
    ["Main", "config"].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let store = ConfigStore::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.current(), AppConfig::default());
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[settings]\ninterval = \"5s\"\n").unwrap();

        let config = ConfigStore::open(&path).unwrap().current();

        assert_eq!(config.settings.interval, Duration::from_secs(5));
        assert!(!config.settings.overwrite_acknowledged);
        assert_eq!(config.guardrails.save_markers, vec!["storage", "steam", "user"]);
        assert!(config.paths.is_none());
    }

    #[test]
    fn test_store_persists_saved_paths() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let store = ConfigStore::open(&path).unwrap();

        let paths = SavedPaths {
            source: r"D:\Presets\maxed\Main\config".to_string(),
            destination: r"C:\Users\me\AppData\Local\Saber\Space Marine 2\storage\steam\user\76561198000000000\Main\config".to_string(),
        };
        TargetStore::save(&store, &paths).unwrap();

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded.paths, Some(paths));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::open(temp_dir.path().join("config.toml")).unwrap();

        store.update(|c| c.settings.overwrite_acknowledged = true).unwrap();
        assert!(AppConfig::load(store.path()).unwrap().settings.overwrite_acknowledged);

        store.reset().unwrap();
        assert_eq!(AppConfig::load(store.path()).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.settings.interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.discovery.id_pattern = "(".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validator_uses_configured_guardrails() {
        let mut config = AppConfig::default();
        config.guardrails.save_markers = vec!["profiles".to_string()];
        config.guardrails.protected = vec!["/srv/backups".to_string()];

        let validator = config.validator();

        assert_eq!(validator.save_markers(), &["profiles".to_string()]);
        if cfg!(not(windows)) {
            assert!(validator.is_system_directory("/srv/backups/daily"));
            assert!(validator.looks_like_application_save_path("/games/profiles"));
        }
    }
}
