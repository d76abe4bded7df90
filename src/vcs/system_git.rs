//! System git gateway - zero dependencies, drives local repositories
//!
//! Implements the `VcsGateway` contract with git plumbing commands against
//! local working trees, so the whole pipeline can run without a hosted
//! service. Subprocesses run with an isolated environment (no global config
//! surprises). Merge conflicts are detected from the unmerged index and the
//! merge is aborted, leaving the repository clean.

use crate::core::error::{ShipError, ShipResult, VcsError};
use crate::core::plan::GateSummary;
use crate::vcs::{MergeResult, RepoRef, VcsGateway};
use std::process::{Command, Output};

/// Gateway backed by system git
#[derive(Debug, Default)]
pub struct SystemGit;

impl SystemGit {
  pub fn new() -> Self {
    Self
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to the repo path
  /// - Clears environment variables, whitelisting only PATH and HOME
  /// - Pins identity and safe behavior regardless of user config
  fn git_cmd(&self, repo: &RepoRef) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&repo.path);

    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }

    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false");
    cmd.arg("-c").arg("user.name=shipline");
    cmd.arg("-c").arg("user.email=shipline@localhost");

    cmd
  }

  /// Run a git command; `Err` only for spawn failures or a missing repo
  fn run(&self, repo: &RepoRef, args: &[&str]) -> ShipResult<Output> {
    let output = self
      .git_cmd(repo)
      .args(args)
      .output()
      .map_err(|e| ShipError::message(format!("Failed to execute git: {}", e)))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("not a git repository") {
      return Err(ShipError::Vcs(VcsError::RepoNotFound {
        path: repo.path.clone(),
      }));
    }

    Ok(output)
  }

  /// Run a git command that must succeed
  fn run_ok(&self, repo: &RepoRef, args: &[&str]) -> ShipResult<Output> {
    let output = self.run(repo, args)?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ShipError::Vcs(VcsError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: stderr.to_string(),
      }));
    }
    Ok(output)
  }

  fn ref_exists(&self, repo: &RepoRef, full_ref: &str) -> ShipResult<bool> {
    let output = self.run(repo, &["show-ref", "--verify", "--quiet", full_ref])?;
    Ok(output.status.success())
  }

  /// Files left unmerged by an in-progress merge
  fn unmerged_files(&self, repo: &RepoRef) -> ShipResult<Vec<String>> {
    let output = self.run(repo, &["diff", "--name-only", "--diff-filter=U"])?;
    Ok(
      String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(String::from)
        .filter(|l| !l.is_empty())
        .collect(),
    )
  }
}

impl VcsGateway for SystemGit {
  fn branch_exists(&self, repo: &RepoRef, branch: &str) -> ShipResult<bool> {
    self.ref_exists(repo, &format!("refs/heads/{}", branch))
  }

  fn create_branch(&self, repo: &RepoRef, branch: &str, source: &str) -> ShipResult<bool> {
    // Existing branch is "already done", not a refusal
    if self.branch_exists(repo, branch)? {
      return Ok(true);
    }
    if !self.branch_exists(repo, source)? {
      return Ok(false);
    }

    let output = self.run(repo, &["branch", branch, source])?;
    Ok(output.status.success())
  }

  fn merge_branch(&self, repo: &RepoRef, source: &str, target: &str, message: &str) -> ShipResult<MergeResult> {
    if !self.branch_exists(repo, target)? {
      return Ok(MergeResult::failed(format!("target branch '{}' does not exist", target)));
    }
    if !self.branch_exists(repo, source)? {
      return Ok(MergeResult::failed(format!("source branch '{}' does not exist", source)));
    }

    let checkout = self.run(repo, &["checkout", target])?;
    if !checkout.status.success() {
      let stderr = String::from_utf8_lossy(&checkout.stderr);
      return Ok(MergeResult::failed(format!("checkout of '{}' failed: {}", target, stderr)));
    }

    let merge = self.run(repo, &["merge", "--no-ff", "-m", message, source])?;
    if merge.status.success() {
      return Ok(MergeResult::success());
    }

    let conflicts = self.unmerged_files(repo)?;
    if !conflicts.is_empty() {
      // Leave the repository clean; the conflict is surfaced, not resolved
      let _ = self.run(repo, &["merge", "--abort"]);
      return Ok(MergeResult::conflict(format!(
        "conflicting files: {}",
        conflicts.join(", ")
      )));
    }

    let stderr = String::from_utf8_lossy(&merge.stderr);
    Ok(MergeResult::failed(stderr.trim().to_string()))
  }

  fn archive_branch(&self, repo: &RepoRef, branch: &str, reason: &str) -> ShipResult<bool> {
    // Already gone counts as archived
    if !self.branch_exists(repo, branch)? {
      return Ok(true);
    }

    let archive_ref = format!("archive/{}/{}", reason, branch);
    if !self.branch_exists(repo, &archive_ref)? {
      let copy = self.run(repo, &["branch", &archive_ref, branch])?;
      if !copy.status.success() {
        return Ok(false);
      }
    }

    // The branch may be checked out; park HEAD on the default branch first
    let _ = self.run(repo, &["checkout", &repo.default_branch]);

    let delete = self.run(repo, &["branch", "-D", branch])?;
    Ok(delete.status.success())
  }

  fn create_tag(&self, repo: &RepoRef, tag: &str, r#ref: &str, message: &str) -> ShipResult<bool> {
    if self.ref_exists(repo, &format!("refs/tags/{}", tag))? {
      return Ok(true);
    }

    let output = self.run(repo, &["tag", "-a", tag, "-m", message, r#ref])?;
    Ok(output.status.success())
  }

  fn trigger_pipeline(&self, _repo: &RepoRef, _ref: &str) -> ShipResult<Option<String>> {
    // Local repositories have no CI attached
    Ok(None)
  }

  fn read_file(&self, repo: &RepoRef, r#ref: &str, path: &str) -> ShipResult<Option<String>> {
    let spec = format!("{}:{}", r#ref, path);
    let output = self.run(repo, &["show", &spec])?;

    if !output.status.success() {
      return Ok(None);
    }

    Ok(Some(String::from_utf8(output.stdout)?))
  }

  fn commit_file(&self, repo: &RepoRef, branch: &str, path: &str, content: &str, message: &str) -> ShipResult<bool> {
    let checkout = self.run(repo, &["checkout", branch])?;
    if !checkout.status.success() {
      return Ok(false);
    }

    let file_path = repo.path.join(path);
    if let Some(parent) = file_path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&file_path, content)?;

    self.run_ok(repo, &["add", path])?;

    let commit = self.run(repo, &["commit", "-m", message])?;
    if commit.status.success() {
      return Ok(true);
    }

    // Identical content already committed; repeat-safe
    let stdout = String::from_utf8_lossy(&commit.stdout);
    Ok(stdout.contains("nothing to commit"))
  }

  fn gate_summary(&self, _repo: &RepoRef, _branch: &str) -> ShipResult<Option<GateSummary>> {
    // Plain git has no branch protection metadata
    Ok(None)
  }
}
