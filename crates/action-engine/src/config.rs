use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Explicit action-group directory. Skips probing when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_root: Option<PathBuf>,
    #[serde(default = "paths::default_search_roots")]
    pub search_roots: Vec<PathBuf>,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_probe_action")]
    pub probe_action: String,
    #[serde(default = "default_cache")]
    pub cache: bool,
}

fn default_extension() -> String {
    paths::ACTION_EXTENSION.to_string()
}

fn default_probe_action() -> String {
    paths::PROBE_ACTION.to_string()
}

fn default_cache() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_root: None,
            search_roots: paths::default_search_roots(),
            extension: default_extension(),
            probe_action: default_probe_action(),
            cache: default_cache(),
        }
    }
}

impl EngineConfig {
    /// Config pinned to one action directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            action_root: Some(root.into()),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: EngineConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// The configured root, or the first search root holding the probe action.
    pub fn resolve_root(&self) -> PathBuf {
        match &self.action_root {
            Some(root) => root.clone(),
            None => paths::resolve_action_root(
                &self.search_roots,
                &self.probe_action,
                &self.extension,
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.extension.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "extension is empty".to_string(),
            });
        } else if self.extension.starts_with('.') {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "extension '{}' has a leading dot; files resolve as '<name>.{}'",
                    self.extension, self.extension
                ),
            });
        }

        if self.probe_action.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "probe_action is empty; root probing can never match".to_string(),
            });
        }

        if let Some(root) = &self.action_root {
            if !root.is_dir() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("action_root '{}' is not a directory", root.display()),
                });
            }
        } else if self.search_roots.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "no action_root and no search_roots; falling back to {}",
                    paths::DEFAULT_ACTION_ROOT
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
