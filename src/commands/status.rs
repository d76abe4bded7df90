//! Status overview: windows, attached iterations and recent runs

use crate::core::error::ShipResult;
use crate::core::run::TaskStatus;
use crate::core::store::StateStore;
use serde::Serialize;
use std::env;

#[derive(Debug, Serialize)]
struct WindowOverview {
  key: String,
  status: String,
  frozen: bool,
  iterations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RunOverview {
  id: String,
  window: String,
  operator: String,
  finished: bool,
  tasks_total: usize,
  tasks_failed: usize,
}

#[derive(Debug, Serialize)]
struct StatusReport {
  windows: Vec<WindowOverview>,
  runs: Vec<RunOverview>,
}

/// Run the status command
pub fn run_status(json: bool) -> ShipResult<()> {
  let root = env::current_dir()?;
  let store = StateStore::open(&root)?;

  let windows: Vec<WindowOverview> = store
    .state
    .windows
    .iter()
    .map(|w| WindowOverview {
      key: w.key.clone(),
      status: w.status.to_string(),
      frozen: w.frozen,
      iterations: store.window_bindings(&w.key).iter().map(|b| b.iteration_key.clone()).collect(),
    })
    .collect();

  let runs: Vec<RunOverview> = store
    .state
    .runs
    .iter()
    .map(|r| {
      let tasks = store.run_tasks(&r.id);
      RunOverview {
        id: r.id.clone(),
        window: r.window_key.clone(),
        operator: r.operator.clone(),
        finished: r.is_finished(),
        tasks_total: tasks.len(),
        tasks_failed: tasks.iter().filter(|t| t.status == TaskStatus::Failed).count(),
      }
    })
    .collect();

  let report = StatusReport { windows, runs };

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  println!("\n📊 Shipline Status\n");

  if report.windows.is_empty() {
    println!("   No release windows yet. Create one with `shipline window create <key>`.\n");
  } else {
    println!("{:<16} {:<10} {:<8} ITERATIONS", "WINDOW", "STATUS", "FROZEN");
    println!("{:-<70}", "");
    for w in &report.windows {
      println!(
        "{:<16} {:<10} {:<8} {}",
        w.key,
        w.status,
        if w.frozen { "yes" } else { "no" },
        if w.iterations.is_empty() { "-".to_string() } else { w.iterations.join(",") },
      );
    }
    println!();
  }

  if !report.runs.is_empty() {
    println!("{:<26} {:<16} {:<10} {:<10} {:<7} FAILED", "RUN", "WINDOW", "OPERATOR", "FINISHED", "TASKS");
    println!("{:-<90}", "");
    for r in &report.runs {
      println!(
        "{:<26} {:<16} {:<10} {:<10} {:<7} {}",
        r.id,
        r.window,
        r.operator,
        if r.finished { "yes" } else { "no" },
        r.tasks_total,
        r.tasks_failed,
      );
    }
    println!();
  }

  Ok(())
}
