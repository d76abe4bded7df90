//! Release window lifecycle commands

use crate::commands::iteration::print_branch_outcomes;
use crate::core::config::{valid_key, ShipConfig};
use crate::core::error::{ShipError, ShipResult, StateError};
use crate::core::store::StateStore;
use crate::core::window::ReleaseWindow;
use crate::merge::{MergeCoordinator, MergeUnit};
use crate::vcs::{RepoRef, SystemGit};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::env;

/// Run the window create command
pub fn run_window_create(key: String, name: Option<String>, planned_at: Option<String>) -> ShipResult<()> {
  if !valid_key(&key) {
    return Err(ShipError::with_help(
      format!("Invalid window key '{}'", key),
      "Keys start with an alphanumeric character and may contain '.', '_' and '-'.",
    ));
  }

  let planned = planned_at.map(|raw| parse_planned_at(&raw)).transpose()?;

  let root = env::current_dir()?;
  let mut store = StateStore::open(&root)?;

  let name = name.unwrap_or_else(|| key.clone());
  store.insert_window(ReleaseWindow::new(&key, name, planned, Utc::now()))?;
  store.save()?;

  println!("\n✅ Created release window '{}' (draft)\n", key);
  Ok(())
}

fn parse_planned_at(raw: &str) -> ShipResult<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| {
      ShipError::with_help(
        format!("Invalid planned time '{}': {}", raw, e),
        "Use RFC 3339, e.g. 2026-09-01T12:00:00Z",
      )
    })
}

/// Run the window publish command
///
/// Publishing requires at least one attached iteration and triggers a batch
/// merge of every attached iteration's feature branch into the window's
/// release branches. Per-repository merge failures are reported, they do not
/// roll back the publish.
pub fn run_window_publish(key: String) -> ShipResult<()> {
  let root = env::current_dir()?;
  let config = ShipConfig::load(&root)?;
  let mut store = StateStore::open(&root)?;
  let now = Utc::now();

  if store.window_bindings(&key).is_empty() {
    store.window(&key)?; // missing window beats missing iterations
    return Err(ShipError::State(StateError::NoIterations { window: key }));
  }

  store.window_mut(&key)?.publish(now)?;

  // Batch merge over every attached iteration, in attach order
  let units = collect_merge_units(&store, &config, &key)?;
  let gateway = SystemGit;
  let coordinator = MergeCoordinator::new(&gateway);

  let unit_refs: Vec<MergeUnit<'_>> = units
    .iter()
    .map(|(iteration, binding, repos)| MergeUnit {
      iteration,
      binding,
      repos: repos.clone(),
    })
    .collect();
  let outcomes = coordinator.merge_window(&unit_refs);

  for (_, binding, _) in &units {
    if let Some(b) = store.binding_mut(&binding.window_key, &binding.iteration_key) {
      b.last_merge_at = Some(now);
    }
  }
  store.save()?;

  println!("\n✅ Published window '{}'\n", key);
  print_branch_outcomes(&outcomes);
  Ok(())
}

type MergeUnitData = (crate::core::iteration::Iteration, crate::core::iteration::WindowIteration, Vec<RepoRef>);

/// Owned copies of everything a window-wide merge pass needs
fn collect_merge_units(store: &StateStore, config: &ShipConfig, window_key: &str) -> ShipResult<Vec<MergeUnitData>> {
  let mut units = Vec::new();
  for binding in store.window_bindings(window_key) {
    let iteration = store.iteration(&binding.iteration_key)?.clone();
    let repos = iteration
      .repos
      .iter()
      .map(|id| Ok(RepoRef::from_config(config.repo(id)?, &config.settings)))
      .collect::<ShipResult<Vec<_>>>()?;
    units.push((iteration, binding.clone(), repos));
  }
  Ok(units)
}

/// Run the window close command
pub fn run_window_close(key: String) -> ShipResult<()> {
  let root = env::current_dir()?;
  let mut store = StateStore::open(&root)?;

  store.window_mut(&key)?.close(Utc::now())?;
  store.save()?;

  println!("\n✅ Window '{}' is closed\n", key);
  Ok(())
}

/// Run the window freeze command
pub fn run_window_freeze(key: String) -> ShipResult<()> {
  let root = env::current_dir()?;
  let mut store = StateStore::open(&root)?;

  store.window_mut(&key)?.freeze(Utc::now());
  store.save()?;

  println!("\n🧊 Window '{}' is frozen (attach/detach blocked)\n", key);
  Ok(())
}

/// Run the window unfreeze command
pub fn run_window_unfreeze(key: String) -> ShipResult<()> {
  let root = env::current_dir()?;
  let mut store = StateStore::open(&root)?;

  store.window_mut(&key)?.unfreeze(Utc::now());
  store.save()?;

  println!("\n✅ Window '{}' is unfrozen\n", key);
  Ok(())
}

/// One row of `window list` output
#[derive(Debug, Serialize)]
struct WindowRow {
  key: String,
  name: String,
  status: String,
  frozen: bool,
  iterations: usize,
  planned_at: Option<DateTime<Utc>>,
}

/// Run the window list command
pub fn run_window_list(json: bool) -> ShipResult<()> {
  let root = env::current_dir()?;
  let store = StateStore::open(&root)?;

  let rows: Vec<WindowRow> = store
    .state
    .windows
    .iter()
    .map(|w| WindowRow {
      key: w.key.clone(),
      name: w.name.clone(),
      status: w.status.to_string(),
      frozen: w.frozen,
      iterations: store.window_bindings(&w.key).len(),
      planned_at: w.planned_at,
    })
    .collect();

  if json {
    println!("{}", serde_json::to_string_pretty(&rows)?);
    return Ok(());
  }

  println!("\n📅 Release Windows\n");
  println!("{:<16} {:<20} {:<10} {:<8} {:<11} PLANNED", "KEY", "NAME", "STATUS", "FROZEN", "ITERATIONS");
  println!("{:-<90}", "");
  for row in &rows {
    println!(
      "{:<16} {:<20} {:<10} {:<8} {:<11} {}",
      row.key,
      row.name,
      row.status,
      if row.frozen { "yes" } else { "no" },
      row.iterations,
      row.planned_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
    );
  }
  println!();

  Ok(())
}
