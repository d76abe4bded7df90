//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A control workspace with ship.toml plus a set of real git repositories
pub struct TestEnv {
  _root: TempDir,
  /// Directory holding ship.toml and .shipline/state.json
  pub control: PathBuf,
  repos_dir: PathBuf,
}

impl TestEnv {
  /// Create an empty control workspace (no repositories yet)
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let control = root.path().join("control");
    let repos_dir = root.path().join("repos");
    std::fs::create_dir_all(&control)?;
    std::fs::create_dir_all(&repos_dir)?;

    // No backoff sleeps in tests
    std::fs::write(
      control.join("ship.toml"),
      r#"[settings]
default_branch = "main"
release_branch_pattern = "release/{window}"
feature_branch_pattern = "feature/{iteration}"
max_retries = 2
retry_backoff_ms = 0
manifest_path = "Cargo.toml"
"#,
    )?;

    Ok(Self {
      _root: root,
      control,
      repos_dir,
    })
  }

  /// Create a git repository with a committed manifest and register it in
  /// ship.toml. The initial version carries a pre-release component so the
  /// version-bump task has something to strip.
  pub fn add_repo(&self, id: &str) -> Result<PathBuf> {
    let path = self.repos_dir.join(id);
    std::fs::create_dir_all(&path)?;

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    std::fs::write(
      path.join("Cargo.toml"),
      format!(
        r#"[package]
name = "{}"
version = "0.1.0-rc.1"
edition = "2021"
"#,
        id
      ),
    )?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial commit"])?;

    // Register the repo in ship.toml
    let config_path = self.control.join("ship.toml");
    let mut config = std::fs::read_to_string(&config_path)?;
    config.push_str(&format!("\n[[repos]]\nid = \"{}\"\npath = \"{}\"\n", id, path.display()));
    std::fs::write(&config_path, config)?;

    Ok(path)
  }

  /// Cut a feature branch off main with one committed file, back on main
  pub fn create_feature_branch(&self, repo: &str, iteration: &str) -> Result<()> {
    let path = self.repos_dir.join(repo);
    let branch = format!("feature/{}", iteration);

    git(&path, &["checkout", "-b", &branch])?;
    std::fs::write(path.join(format!("{}.txt", iteration)), format!("work for {}\n", iteration))?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", &format!("Work for {}", iteration)])?;
    git(&path, &["checkout", "main"])?;

    Ok(())
  }

  pub fn repo_path(&self, repo: &str) -> PathBuf {
    self.repos_dir.join(repo)
  }

  pub fn branch_exists(&self, repo: &str, branch: &str) -> Result<bool> {
    let path = self.repos_dir.join(repo);
    let output = Command::new("git")
      .current_dir(&path)
      .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
      .output()?;
    Ok(output.status.success())
  }

  pub fn tag_exists(&self, repo: &str, tag: &str) -> Result<bool> {
    let path = self.repos_dir.join(repo);
    let output = Command::new("git")
      .current_dir(&path)
      .args(["show-ref", "--verify", "--quiet", &format!("refs/tags/{}", tag)])
      .output()?;
    Ok(output.status.success())
  }

  /// Content of a file at a ref, e.g. `show("svc-a", "main", "Cargo.toml")`
  pub fn show(&self, repo: &str, r#ref: &str, path: &str) -> Result<String> {
    let output = git(&self.repos_dir.join(repo), &["show", &format!("{}:{}", r#ref, path)])?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }

  /// Parsed .shipline/state.json
  pub fn state(&self) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(self.control.join(".shipline").join("state.json"))?;
    Ok(serde_json::from_str(&content)?)
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run the shipline CLI, expecting success
pub fn run_shipline(cwd: &Path, args: &[&str]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_shipline");

  let output = Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run shipline")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "shipline command failed: shipline {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

/// Run the shipline CLI, expecting a non-zero exit; returns (exit code, stderr)
pub fn run_shipline_err(cwd: &Path, args: &[&str]) -> Result<(i32, String)> {
  let bin = env!("CARGO_BIN_EXE_shipline");

  let output = Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run shipline")?;

  if output.status.success() {
    anyhow::bail!("expected failure, but shipline {} succeeded", args.join(" "));
  }

  Ok((
    output.status.code().unwrap_or(-1),
    String::from_utf8_lossy(&output.stderr).to_string(),
  ))
}

/// Extract the run id from `run create` output
pub fn extract_run_id(stdout: &[u8]) -> Result<String> {
  let text = String::from_utf8_lossy(stdout);
  text
    .split_whitespace()
    .find(|token| token.starts_with("release::") || token.starts_with("retry::"))
    .map(String::from)
    .context("no run id in output")
}
