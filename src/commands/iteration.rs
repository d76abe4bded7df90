//! Iteration commands: create, attach to and detach from release windows

use crate::core::config::{valid_key, ShipConfig};
use crate::core::error::{NotFoundError, ShipError, ShipResult, StateError};
use crate::core::iteration::{Iteration, IterationStatus, WindowIteration};
use crate::core::store::StateStore;
use crate::core::window::WindowStatus;
use crate::merge::{BranchOutcome, MergeCoordinator, MergeUnit};
use crate::vcs::{MergeStatus, RepoRef, SystemGit};
use chrono::Utc;
use serde::Serialize;
use std::env;

/// Run the iteration create command
pub fn run_iteration_create(key: String, name: Option<String>, repos: Vec<String>) -> ShipResult<()> {
  if !valid_key(&key) {
    return Err(ShipError::with_help(
      format!("Invalid iteration key '{}'", key),
      "Keys start with an alphanumeric character and may contain '.', '_' and '-'.",
    ));
  }
  if repos.is_empty() {
    return Err(ShipError::with_help(
      "An iteration must touch at least one repository",
      "Pass one or more --repo <id> flags.",
    ));
  }

  let root = env::current_dir()?;
  let config = ShipConfig::load(&root)?;
  for repo_id in &repos {
    config.repo(repo_id)?;
  }

  let mut store = StateStore::open(&root)?;
  let name = name.unwrap_or_else(|| key.clone());
  let feature_branch = config.settings.feature_branch(&key);
  store.insert_iteration(Iteration::new(&key, name, &feature_branch, repos, Utc::now()))?;
  store.save()?;

  println!("\n✅ Created iteration '{}' (feature branch: {})\n", key, feature_branch);
  Ok(())
}

/// Run the iteration attach command
///
/// Attaching creates the window's release branch in every repository the
/// iteration touches and merges the feature branch into it where that branch
/// exists. A frozen or closed window rejects the attach.
pub fn run_iteration_attach(window_key: String, iteration_key: String) -> ShipResult<()> {
  let root = env::current_dir()?;
  let config = ShipConfig::load(&root)?;
  let mut store = StateStore::open(&root)?;
  let now = Utc::now();

  let window = store.window(&window_key)?;
  window.ensure_not_frozen()?;
  if window.status == WindowStatus::Closed {
    return Err(ShipError::State(StateError::InvalidTransition {
      action: "attach to".to_string(),
      window: window_key.clone(),
      current: window.status.to_string(),
    }));
  }

  let iteration = store.iteration(&iteration_key)?.clone();
  if iteration.status == IterationStatus::Closed {
    return Err(ShipError::message(format!("Iteration '{}' is closed and cannot be attached", iteration_key)));
  }

  let mut binding = WindowIteration::new(&window_key, &iteration_key, now);
  binding.release_branch = Some(config.settings.release_branch(&window_key));

  let repos = iteration
    .repos
    .iter()
    .map(|id| Ok(RepoRef::from_config(config.repo(id)?, &config.settings)))
    .collect::<ShipResult<Vec<_>>>()?;

  let gateway = SystemGit;
  let coordinator = MergeCoordinator::new(&gateway);
  let outcomes = coordinator.merge_iteration(&MergeUnit {
    iteration: &iteration,
    binding: &binding,
    repos,
  });

  binding.last_merge_at = Some(now);
  store.insert_binding(binding)?;
  store.save()?;

  println!("\n✅ Attached iteration '{}' to window '{}'\n", iteration_key, window_key);
  print_branch_outcomes(&outcomes);
  Ok(())
}

/// Run the iteration detach command
///
/// Detaching archives the window's release branch (reason "unpublished") in
/// every repository of the iteration and removes the binding.
pub fn run_iteration_detach(window_key: String, iteration_key: String) -> ShipResult<()> {
  let root = env::current_dir()?;
  let config = ShipConfig::load(&root)?;
  let mut store = StateStore::open(&root)?;

  store.window(&window_key)?.ensure_not_frozen()?;

  let binding = store
    .binding(&window_key, &iteration_key)
    .cloned()
    .ok_or_else(|| {
      ShipError::NotFound(NotFoundError::Binding {
        window: window_key.clone(),
        iteration: iteration_key.clone(),
      })
    })?;
  let iteration = store.iteration(&iteration_key)?.clone();

  let repos = iteration
    .repos
    .iter()
    .map(|id| Ok(RepoRef::from_config(config.repo(id)?, &config.settings)))
    .collect::<ShipResult<Vec<_>>>()?;

  let gateway = SystemGit;
  let coordinator = MergeCoordinator::new(&gateway);
  let outcomes = coordinator.detach_iteration(&MergeUnit {
    iteration: &iteration,
    binding: &binding,
    repos,
  });

  store.remove_binding(&window_key, &iteration_key)?;
  store.save()?;

  println!("\n✅ Detached iteration '{}' from window '{}'\n", iteration_key, window_key);
  print_branch_outcomes(&outcomes);
  Ok(())
}

/// One row of `iteration list` output
#[derive(Debug, Serialize)]
struct IterationRow {
  key: String,
  name: String,
  status: String,
  feature_branch: String,
  repos: Vec<String>,
  windows: Vec<String>,
}

/// Run the iteration list command
pub fn run_iteration_list(json: bool) -> ShipResult<()> {
  let root = env::current_dir()?;
  let store = StateStore::open(&root)?;

  let rows: Vec<IterationRow> = store
    .state
    .iterations
    .iter()
    .map(|it| IterationRow {
      key: it.key.clone(),
      name: it.name.clone(),
      status: match it.status {
        IterationStatus::Open => "open".to_string(),
        IterationStatus::Closed => "closed".to_string(),
      },
      feature_branch: it.feature_branch.clone(),
      repos: it.repos.clone(),
      windows: store
        .state
        .bindings
        .iter()
        .filter(|b| b.iteration_key == it.key)
        .map(|b| b.window_key.clone())
        .collect(),
    })
    .collect();

  if json {
    println!("{}", serde_json::to_string_pretty(&rows)?);
    return Ok(());
  }

  println!("\n🔁 Iterations\n");
  println!("{:<16} {:<10} {:<24} {:<24} WINDOWS", "KEY", "STATUS", "FEATURE BRANCH", "REPOS");
  println!("{:-<100}", "");
  for row in &rows {
    println!(
      "{:<16} {:<10} {:<24} {:<24} {}",
      row.key,
      row.status,
      row.feature_branch,
      row.repos.join(","),
      if row.windows.is_empty() { "-".to_string() } else { row.windows.join(",") },
    );
  }
  println!();

  Ok(())
}

/// Print per-repository branch operation outcomes
pub(crate) fn print_branch_outcomes(outcomes: &[BranchOutcome]) {
  if outcomes.is_empty() {
    return;
  }

  for outcome in outcomes {
    let (icon, label) = match outcome.status {
      MergeStatus::Success => ("✅", "success"),
      MergeStatus::Conflict => ("⚠️", "conflict"),
      MergeStatus::Failed => ("❌", "failed"),
    };
    match &outcome.message {
      Some(message) => println!("   {} {:<20} {} ({})", icon, outcome.repo_name, label, message),
      None => println!("   {} {:<20} {}", icon, outcome.repo_name, label),
    }
  }
  println!();
}
