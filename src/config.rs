use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

const APP_DIR: &str = "pt";
const CONFIG_FILE: &str = "config.yml";
const TOKEN_FILE: &str = "token";
const KNOWN_KEYS: &[&str] = &["ignoreAssignees", "branchPrefix"];

/// User configuration read from `<config-dir>/pt/config.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Assignee logins / team slugs to hide. Each entry is a regex.
    pub ignore_assignees: Vec<String>,
    /// Branch prefix; defaults to the local part of `user.email`.
    pub branch_prefix: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parses the config, warning about keys it does not know.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        for key in unknown_keys(content)? {
            warn!("Ignoring unknown config key '{}'", key);
        }

        Ok(serde_yaml::from_str(content)?)
    }

    /// Loads the user config, or defaults when no config file exists.
    pub fn load() -> Result<Self> {
        let Some(path) = config_path() else {
            return Ok(Self::default());
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::from_file(&path)
    }
}

/// Top-level keys in `content` that [`Config`] does not use.
pub fn unknown_keys(content: &str) -> Result<Vec<String>> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)?;
    let Some(mapping) = value.as_mapping() else {
        return Ok(Vec::new());
    };

    Ok(mapping
        .keys()
        .map(|key| match key.as_str() {
            Some(name) => name.to_string(),
            None => format!("{:?}", key),
        })
        .filter(|name| !KNOWN_KEYS.contains(&name.as_str()))
        .collect())
}

/// Resolves the base configuration directory from `XDG_CONFIG_HOME` and
/// `HOME` values.
pub fn config_dir_from(xdg_config_home: Option<&str>, home: Option<&Path>) -> Option<PathBuf> {
    xdg_config_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home.map(|home| home.join(".config")))
}

/// The tool's own directory inside the user's configuration directory.
pub fn app_dir() -> Option<PathBuf> {
    let xdg = std::env::var("XDG_CONFIG_HOME").ok();
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir);

    config_dir_from(xdg.as_deref(), home.as_deref()).map(|dir| dir.join(APP_DIR))
}

pub fn config_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join(CONFIG_FILE))
}

pub fn token_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join(TOKEN_FILE))
}
