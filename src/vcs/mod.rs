//! Version control gateway abstraction
//!
//! The orchestration core only depends on this logical contract; the wire
//! protocol of the hosted service behind it is out of scope. All operations
//! are synchronous and must be safe to call repeatedly: "already done"
//! (existing branch, existing tag) is success, not an error. Refusals the
//! VCS reports as part of its contract are values (`Ok(false)`,
//! `MergeStatus::Failed`); only transport/infrastructure failures are `Err`.

pub mod system_git;

pub use system_git::SystemGit;

use crate::core::config::{RepoConfig, Settings};
use crate::core::error::ShipResult;
use crate::core::plan::GateSummary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reference to one repository as the gateway sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRef {
  pub id: String,
  pub name: String,
  pub path: PathBuf,
  pub default_branch: String,
  pub manifest: String,
}

impl RepoRef {
  /// Resolve a configured repository against the global settings
  pub fn from_config(repo: &RepoConfig, settings: &Settings) -> Self {
    Self {
      id: repo.id.clone(),
      name: repo.display_name().to_string(),
      path: repo.path.clone(),
      default_branch: repo.default_branch.clone().unwrap_or_else(|| settings.default_branch.clone()),
      manifest: repo.manifest.clone().unwrap_or_else(|| settings.manifest_path.clone()),
    }
  }
}

/// Outcome of a merge as reported by the VCS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
  Success,
  /// Unmergeable state; requires manual resolution, never auto-retried
  Conflict,
  /// Recoverable failure (missing branch, refused merge)
  Failed,
}

/// Result of `merge_branch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
  pub status: MergeStatus,
  /// Raw conflict description when status is Conflict
  #[serde(default)]
  pub conflict_info: Option<String>,
}

impl MergeResult {
  pub fn success() -> Self {
    Self {
      status: MergeStatus::Success,
      conflict_info: None,
    }
  }

  pub fn conflict(info: impl Into<String>) -> Self {
    Self {
      status: MergeStatus::Conflict,
      conflict_info: Some(info.into()),
    }
  }

  pub fn failed(reason: impl Into<String>) -> Self {
    Self {
      status: MergeStatus::Failed,
      conflict_info: Some(reason.into()),
    }
  }
}

/// Logical contract of the external version control system
///
/// `Send + Sync` so run workers can share one gateway across threads.
pub trait VcsGateway: Send + Sync {
  fn branch_exists(&self, repo: &RepoRef, branch: &str) -> ShipResult<bool>;

  /// Returns `Ok(false)` when the VCS refuses the creation (not an error)
  fn create_branch(&self, repo: &RepoRef, branch: &str, source: &str) -> ShipResult<bool>;

  fn merge_branch(&self, repo: &RepoRef, source: &str, target: &str, message: &str) -> ShipResult<MergeResult>;

  fn archive_branch(&self, repo: &RepoRef, branch: &str, reason: &str) -> ShipResult<bool>;

  /// Existing tag is treated as already done and returns `Ok(true)`
  fn create_tag(&self, repo: &RepoRef, tag: &str, r#ref: &str, message: &str) -> ShipResult<bool>;

  /// Returns the pipeline id, or `None` when no pipeline is configured
  fn trigger_pipeline(&self, repo: &RepoRef, r#ref: &str) -> ShipResult<Option<String>>;

  /// Read a file at a ref; `None` when the file does not exist there
  fn read_file(&self, repo: &RepoRef, r#ref: &str, path: &str) -> ShipResult<Option<String>>;

  /// Commit new file content onto a branch
  fn commit_file(&self, repo: &RepoRef, branch: &str, path: &str, content: &str, message: &str) -> ShipResult<bool>;

  /// Branch-protection metadata for dry-run planning; `None` when the
  /// backend has no such concept
  fn gate_summary(&self, repo: &RepoRef, branch: &str) -> ShipResult<Option<GateSummary>>;
}
