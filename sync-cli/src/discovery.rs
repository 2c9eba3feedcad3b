//! Locating the game's save folder and the bundled presets

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::config::{DiscoveryConfig, PresetConfig};

/// A user id directory found under the save root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveCandidate {
    pub id: String,
    pub path: PathBuf,
}

/// Finds per-user save folders below the local app-data root.
#[derive(Debug)]
pub struct SaveLocator {
    user_root: PathBuf,
    id_pattern: Regex,
    profile_dir: PathBuf,
}

impl SaveLocator {
    pub fn new(config: &DiscoveryConfig, app_data: impl AsRef<Path>) -> Result<Self> {
        let id_pattern = Regex::new(&config.id_pattern)
            .with_context(|| format!("Invalid id pattern '{}'", config.id_pattern))?;

        Ok(Self {
            user_root: app_data.as_ref().join(&config.user_root),
            id_pattern,
            profile_dir: config.profile_dir.clone(),
        })
    }

    /// Use `LOCALAPPDATA`, or the platform's local data directory when it is not set.
    pub fn from_env(config: &DiscoveryConfig) -> Result<Self> {
        let app_data = std::env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .or_else(dirs::data_local_dir)
            .context("Cannot determine the local app-data folder")?;
        Self::new(config, app_data)
    }

    pub fn user_root(&self) -> &Path {
        &self.user_root
    }

    /// All user id directories, sorted by id.
    pub fn candidates(&self) -> Result<Vec<SaveCandidate>> {
        if !self.user_root.is_dir() {
            bail!(
                "No save folder at {}; make sure the game is installed and has been started once",
                self.user_root.display()
            );
        }

        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(&self.user_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.id_pattern.is_match(&name) {
                candidates.push(SaveCandidate {
                    path: entry.path().join(&self.profile_dir),
                    id: name,
                });
            } else {
                debug!("Skipping {} under the save root", name);
            }
        }

        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(candidates)
    }

    /// The save folder for `id`, or the only one present when no id is given.
    pub fn resolve(&self, id: Option<&str>) -> Result<SaveCandidate> {
        let candidates = self.candidates()?;

        match id {
            Some(id) => candidates
                .into_iter()
                .find(|candidate| candidate.id == id)
                .with_context(|| format!("No user folder named {} under {}", id, self.user_root.display())),
            None => match candidates.len() {
                0 => bail!("No user folders under {}", self.user_root.display()),
                1 => Ok(candidates.into_iter().next().context("candidate vanished")?),
                n => bail!(
                    "Found {} user folders ({}); pick one with --id",
                    n,
                    candidates.iter().map(|c| c.id.as_str()).collect::<Vec<_>>().join(", ")
                ),
            },
        }
    }
}

/// Directory that holds one folder per preset
pub fn preset_root(config: &PresetConfig) -> Result<PathBuf> {
    if let Some(root) = &config.root {
        return Ok(root.clone());
    }
    let exe = std::env::current_exe().context("Cannot locate the running executable")?;
    let dir = exe.parent().context("Executable has no parent directory")?;
    Ok(dir.join("Save"))
}

/// Source folder for a bundled preset
pub fn preset_path(root: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    let valid = matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
    if !valid || name.contains(['/', '\\']) {
        bail!("Invalid preset name '{}'", name);
    }

    let path = root.join(name).join("Main").join("config");
    if !path.is_dir() {
        bail!("Preset '{}' not found at {}", name, path.display());
    }
    Ok(path)
}

/// Names of the presets present under `root`, sorted
pub fn list_presets(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.path().join("Main").join("config").is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn locator(app_data: &Path) -> SaveLocator {
        SaveLocator::new(&DiscoveryConfig::default(), app_data).unwrap()
    }

    fn make_user(app_data: &Path, id: &str) {
        let dir = locator(app_data).user_root().join(id).join("Main").join("config");
        std::fs::create_dir_all(dir).unwrap();
    }

    #[test]
    fn test_single_user_is_resolved() {
        let temp_dir = TempDir::new().unwrap();
        make_user(temp_dir.path(), "76561198000000001");
        std::fs::create_dir_all(locator(temp_dir.path()).user_root().join("shared")).unwrap();

        let found = locator(temp_dir.path()).resolve(None).unwrap();

        assert_eq!(found.id, "76561198000000001");
        assert!(found.path.ends_with(Path::new("76561198000000001").join("Main").join("config")));
        assert!(found.path.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_several_users_need_an_id() {
        let temp_dir = TempDir::new().unwrap();
        make_user(temp_dir.path(), "76561198000000002");
        make_user(temp_dir.path(), "76561198000000001");
        let locator = locator(temp_dir.path());

        let ids: Vec<_> = locator.candidates().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["76561198000000001", "76561198000000002"]);

        let err = locator.resolve(None).unwrap_err();
        assert!(err.to_string().contains("--id"));

        let chosen = locator.resolve(Some("76561198000000002")).unwrap();
        assert_eq!(chosen.id, "76561198000000002");
        assert!(locator.resolve(Some("76561198000000009")).is_err());
    }

    #[test]
    fn test_ids_must_match_pattern() {
        let temp_dir = TempDir::new().unwrap();
        make_user(temp_dir.path(), "1234");
        make_user(temp_dir.path(), "765611980000000011");

        assert!(locator(temp_dir.path()).candidates().unwrap().is_empty());
        assert!(locator(temp_dir.path()).resolve(None).is_err());
    }

    #[test]
    fn test_missing_save_root_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let err = locator(temp_dir.path()).candidates().unwrap_err();
        assert!(err.to_string().contains("started once"));
    }

    #[test]
    fn test_presets() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("maxed").join("Main").join("config")).unwrap();
        std::fs::create_dir_all(root.join("broken")).unwrap();

        assert_eq!(list_presets(root).unwrap(), vec!["maxed"]);
        assert!(preset_path(root, "maxed").unwrap().ends_with("config"));
        assert!(preset_path(root, "broken").is_err());
        assert!(preset_path(root, "../maxed").is_err());
        assert!(preset_path(root, r"maxed\..").is_err());
        assert!(preset_path(root, "").is_err());
        assert!(list_presets(&root.join("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_configured_preset_root_wins() {
        let config = PresetConfig { root: Some(PathBuf::from("/opt/presets")) };
        assert_eq!(preset_root(&config).unwrap(), PathBuf::from("/opt/presets"));
        assert!(preset_root(&PresetConfig::default()).unwrap().ends_with("Save"));
    }
}
