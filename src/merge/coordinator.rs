//! Cross-repository branch creation and merge coordination
//!
//! One pass touches every repository of an iteration (or of a whole window)
//! and classifies each repository's outcome independently; a failure in one
//! repository never blocks the others. Conflicts are surfaced with the raw
//! conflict description and are never retried automatically. A missing
//! binding or a binding without a release branch is "nothing to do" and
//! yields an empty result list.

use crate::core::iteration::{Iteration, WindowIteration};
use crate::vcs::{MergeStatus, RepoRef, VcsGateway};

/// Archive reason recorded when an iteration is detached from a window
pub const DETACH_ARCHIVE_REASON: &str = "unpublished";

/// Outcome of one branch operation in one repository
///
/// The three terminal states are mutually exclusive; a legitimately skipped
/// merge (absent source branch) is reported as Success with a skip message.
#[derive(Debug, Clone)]
pub struct BranchOutcome {
  pub repo_id: String,
  pub repo_name: String,
  pub status: MergeStatus,
  pub message: Option<String>,
}

impl BranchOutcome {
  fn success(repo: &RepoRef, message: Option<String>) -> Self {
    Self {
      repo_id: repo.id.clone(),
      repo_name: repo.name.clone(),
      status: MergeStatus::Success,
      message,
    }
  }

  fn conflict(repo: &RepoRef, info: Option<String>) -> Self {
    Self {
      repo_id: repo.id.clone(),
      repo_name: repo.name.clone(),
      status: MergeStatus::Conflict,
      message: info,
    }
  }

  fn failed(repo: &RepoRef, message: impl Into<String>) -> Self {
    Self {
      repo_id: repo.id.clone(),
      repo_name: repo.name.clone(),
      status: MergeStatus::Failed,
      message: Some(message.into()),
    }
  }

  pub fn is_success(&self) -> bool {
    self.status == MergeStatus::Success
  }
}

/// One iteration's slice of a merge pass: the iteration, its binding and
/// its resolved repositories
pub struct MergeUnit<'a> {
  pub iteration: &'a Iteration,
  pub binding: &'a WindowIteration,
  pub repos: Vec<RepoRef>,
}

/// Coordinates branch creation and merges across many repositories
pub struct MergeCoordinator<'a> {
  gateway: &'a dyn VcsGateway,
}

impl<'a> MergeCoordinator<'a> {
  pub fn new(gateway: &'a dyn VcsGateway) -> Self {
    Self { gateway }
  }

  /// Attach-flow merge: ensure the release branch exists in every repository
  /// of the iteration, then merge the feature branch into it where the
  /// feature branch exists.
  ///
  /// Returns an empty list when the binding has no release branch yet.
  pub fn merge_iteration(&self, unit: &MergeUnit<'_>) -> Vec<BranchOutcome> {
    let Some(release_branch) = unit.binding.release_branch.as_deref() else {
      return Vec::new();
    };

    let mut outcomes = Vec::with_capacity(unit.repos.len());
    for repo in &unit.repos {
      outcomes.push(self.merge_one(repo, &unit.iteration.feature_branch, release_branch));
    }
    outcomes
  }

  /// Detach flow: archive the release branch in every repository of the
  /// detached iteration, reason "unpublished".
  pub fn detach_iteration(&self, unit: &MergeUnit<'_>) -> Vec<BranchOutcome> {
    let Some(release_branch) = unit.binding.release_branch.as_deref() else {
      return Vec::new();
    };

    let mut outcomes = Vec::with_capacity(unit.repos.len());
    for repo in &unit.repos {
      let outcome = match self.gateway.archive_branch(repo, release_branch, DETACH_ARCHIVE_REASON) {
        Ok(true) => BranchOutcome::success(repo, Some(format!("archived branch '{}'", release_branch))),
        Ok(false) => BranchOutcome::failed(repo, format!("archival of branch '{}' was refused", release_branch)),
        Err(e) => BranchOutcome::failed(repo, e.to_string()),
      };
      outcomes.push(outcome);
    }
    outcomes
  }

  /// Publish-time batch merge: run the attach-flow merge logic for every
  /// attached iteration, in attach order.
  pub fn merge_window(&self, units: &[MergeUnit<'_>]) -> Vec<BranchOutcome> {
    let mut outcomes = Vec::new();
    for unit in units {
      outcomes.extend(self.merge_iteration(unit));
    }
    outcomes
  }

  /// One repository: ensure target branch, then merge source into it
  fn merge_one(&self, repo: &RepoRef, feature_branch: &str, release_branch: &str) -> BranchOutcome {
    // Ensure the release branch exists, cutting it from the default branch
    match self.gateway.branch_exists(repo, release_branch) {
      Ok(true) => {}
      Ok(false) => match self.gateway.create_branch(repo, release_branch, &repo.default_branch) {
        Ok(true) => {}
        Ok(false) => {
          return BranchOutcome::failed(
            repo,
            format!("release branch '{}' is missing and could not be created", release_branch),
          );
        }
        Err(e) => return BranchOutcome::failed(repo, e.to_string()),
      },
      Err(e) => return BranchOutcome::failed(repo, e.to_string()),
    }

    // Absent feature branch: merge is skipped and counted as success.
    // Kept for compatibility; `merge_branch` must not be called here.
    match self.gateway.branch_exists(repo, feature_branch) {
      Ok(true) => {}
      Ok(false) => {
        return BranchOutcome::success(
          repo,
          Some(format!("feature branch '{}' does not exist, merge skipped", feature_branch)),
        );
      }
      Err(e) => return BranchOutcome::failed(repo, e.to_string()),
    }

    let message = format!("Merge {} into {}", feature_branch, release_branch);
    match self.gateway.merge_branch(repo, feature_branch, release_branch, &message) {
      Ok(result) => match result.status {
        MergeStatus::Success => BranchOutcome::success(repo, None),
        MergeStatus::Conflict => BranchOutcome::conflict(repo, result.conflict_info),
        MergeStatus::Failed => BranchOutcome::failed(repo, result.conflict_info.unwrap_or_else(|| "merge failed".to_string())),
      },
      Err(e) => BranchOutcome::failed(repo, e.to_string()),
    }
  }
}
