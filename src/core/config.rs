//! Configuration for shipline
//!
//! `ship.toml` registers the repositories the orchestrator may touch and the
//! execution policy for release runs. Searched in order: ship.toml,
//! .ship.toml, .config/ship.toml.

use crate::core::error::{ConfigError, ResultExt, ShipError, ShipResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Keys for windows, iterations and repos: alphanumeric start, then
/// alphanumeric plus `.`, `_`, `-`. Keeps branch names derived from keys
/// valid git refnames.
pub fn valid_key(key: &str) -> bool {
  static KEY_RE: OnceLock<Regex> = OnceLock::new();
  let re = KEY_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());
  re.is_match(key)
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipConfig {
  #[serde(default)]
  pub settings: Settings,
  #[serde(default)]
  pub repos: Vec<RepoConfig>,
}

/// Execution and naming policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
  /// Default branch new release branches are cut from
  #[serde(default = "default_branch")]
  pub default_branch: String,

  /// Release branch pattern; `{window}` is replaced by the window key
  #[serde(default = "default_release_pattern")]
  pub release_branch_pattern: String,

  /// Feature branch pattern; `{iteration}` is replaced by the iteration key
  #[serde(default = "default_feature_pattern")]
  pub feature_branch_pattern: String,

  /// Retry budget shared by every task of a run
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,

  /// Fixed sleep between retry attempts, in milliseconds
  #[serde(default = "default_backoff_ms")]
  pub retry_backoff_ms: u64,

  /// Manifest file the version-bump task edits on the release branch
  #[serde(default = "default_manifest")]
  pub manifest_path: String,
}

fn default_branch() -> String {
  "main".to_string()
}

fn default_release_pattern() -> String {
  "release/{window}".to_string()
}

fn default_feature_pattern() -> String {
  "feature/{iteration}".to_string()
}

fn default_max_retries() -> u32 {
  3
}

fn default_backoff_ms() -> u64 {
  500
}

fn default_manifest() -> String {
  "Cargo.toml".to_string()
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      default_branch: default_branch(),
      release_branch_pattern: default_release_pattern(),
      feature_branch_pattern: default_feature_pattern(),
      max_retries: default_max_retries(),
      retry_backoff_ms: default_backoff_ms(),
      manifest_path: default_manifest(),
    }
  }
}

impl Settings {
  /// Release branch name for a window
  pub fn release_branch(&self, window_key: &str) -> String {
    self.release_branch_pattern.replace("{window}", window_key)
  }

  /// Feature branch name for an iteration
  pub fn feature_branch(&self, iteration_key: &str) -> String {
    self.feature_branch_pattern.replace("{iteration}", iteration_key)
  }
}

/// One registered repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
  /// Stable identifier used by iterations and run tasks
  pub id: String,

  /// Display name (defaults to id)
  #[serde(default)]
  pub name: Option<String>,

  /// Local path to the repository working tree
  pub path: PathBuf,

  /// Per-repo default branch override
  #[serde(default)]
  pub default_branch: Option<String>,

  /// Per-repo manifest path override
  #[serde(default)]
  pub manifest: Option<String>,
}

impl RepoConfig {
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or(&self.id)
  }
}

impl ShipConfig {
  /// Find config file in search order: ship.toml, .ship.toml, .config/ship.toml
  pub fn find_config_path(root: &Path) -> Option<PathBuf> {
    let candidates = vec![
      root.join("ship.toml"),
      root.join(".ship.toml"),
      root.join(".config").join("ship.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from ship.toml (searches multiple locations)
  pub fn load(root: &Path) -> ShipResult<Self> {
    let config_path = Self::find_config_path(root).ok_or_else(|| {
      ShipError::Config(ConfigError::NotFound {
        root: root.to_path_buf(),
      })
    })?;

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config: ShipConfig = toml_edit::de::from_str(&content)
      .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    config
      .validate()
      .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    Ok(config)
  }

  /// Save config to ship.toml (default location)
  pub fn save(&self, root: &Path) -> ShipResult<()> {
    let config_path = root.join("ship.toml");
    let content = toml_edit::ser::to_string_pretty(self).context("Failed to serialize config to TOML")?;
    fs::write(&config_path, content).with_context(|| format!("Failed to write config to {}", config_path.display()))?;
    Ok(())
  }

  /// Check if config exists at the given path
  pub fn exists(root: &Path) -> bool {
    Self::find_config_path(root).is_some()
  }

  /// Create a new empty config
  pub fn new() -> Self {
    Self {
      settings: Settings::default(),
      repos: Vec::new(),
    }
  }

  /// Look up a registered repository by id
  pub fn repo(&self, id: &str) -> ShipResult<&RepoConfig> {
    self
      .repos
      .iter()
      .find(|r| r.id == id)
      .ok_or_else(|| ShipError::Config(ConfigError::RepoNotConfigured { id: id.to_string() }))
  }

  /// Validate the configuration before use
  pub fn validate(&self) -> ShipResult<()> {
    if self.settings.max_retries == 0 {
      return Err(ShipError::message("max_retries must be at least 1"));
    }

    if !self.settings.release_branch_pattern.contains("{window}") {
      return Err(ShipError::with_help(
        format!(
          "release_branch_pattern '{}' must contain the {{window}} placeholder",
          self.settings.release_branch_pattern
        ),
        "Example: release_branch_pattern = \"release/{window}\"",
      ));
    }

    if !self.settings.feature_branch_pattern.contains("{iteration}") {
      return Err(ShipError::with_help(
        format!(
          "feature_branch_pattern '{}' must contain the {{iteration}} placeholder",
          self.settings.feature_branch_pattern
        ),
        "Example: feature_branch_pattern = \"feature/{iteration}\"",
      ));
    }

    let mut seen = std::collections::HashSet::new();
    for repo in &self.repos {
      if repo.id.is_empty() {
        return Err(ShipError::Config(ConfigError::MissingField {
          field: "repos.id".to_string(),
        }));
      }
      if !valid_key(&repo.id) {
        return Err(ShipError::message(format!(
          "Invalid repo id '{}': must match [A-Za-z0-9][A-Za-z0-9._-]*",
          repo.id
        )));
      }
      if !seen.insert(repo.id.as_str()) {
        return Err(ShipError::message(format!("Duplicate repo id '{}' in ship.toml", repo.id)));
      }
    }

    Ok(())
  }
}

impl Default for ShipConfig {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_valid_keys() {
    assert!(valid_key("2025-R1"));
    assert!(valid_key("sprint_42"));
    assert!(valid_key("core.api"));
    assert!(!valid_key(""));
    assert!(!valid_key("-leading-dash"));
    assert!(!valid_key("has space"));
    assert!(!valid_key("wild/card"));
  }

  #[test]
  fn test_branch_patterns() {
    let settings = Settings::default();
    assert_eq!(settings.release_branch("2025-R1"), "release/2025-R1");
    assert_eq!(settings.feature_branch("sprint-42"), "feature/sprint-42");
  }

  #[test]
  fn test_validate_duplicate_repo_ids() {
    let mut config = ShipConfig::new();
    config.repos.push(RepoConfig {
      id: "core".to_string(),
      name: None,
      path: PathBuf::from("/tmp/core"),
      default_branch: None,
      manifest: None,
    });
    config.repos.push(RepoConfig {
      id: "core".to_string(),
      name: None,
      path: PathBuf::from("/tmp/other"),
      default_branch: None,
      manifest: None,
    });

    assert!(config.validate().is_err());
  }

  #[test]
  fn test_validate_pattern_placeholders() {
    let mut config = ShipConfig::new();
    config.settings.release_branch_pattern = "release/fixed".to_string();
    assert!(config.validate().is_err());

    config.settings.release_branch_pattern = "rel/{window}".to_string();
    config.settings.feature_branch_pattern = "feat".to_string();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_zero_retries_rejected() {
    let mut config = ShipConfig::new();
    config.settings.max_retries = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_roundtrip_through_toml() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut config = ShipConfig::new();
    config.repos.push(RepoConfig {
      id: "svc-a".to_string(),
      name: Some("Service A".to_string()),
      path: PathBuf::from("repos/svc-a"),
      default_branch: Some("master".to_string()),
      manifest: None,
    });

    config.save(temp.path()).unwrap();
    let loaded = ShipConfig::load(temp.path()).unwrap();

    assert_eq!(loaded.repos.len(), 1);
    assert_eq!(loaded.repos[0].display_name(), "Service A");
    assert_eq!(loaded.repos[0].default_branch.as_deref(), Some("master"));
    assert_eq!(loaded.settings.max_retries, 3);
  }
}
