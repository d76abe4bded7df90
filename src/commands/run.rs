//! Run commands: create, execute, inspect and retry release runs

use crate::core::config::ShipConfig;
use crate::core::error::{ShipError, ShipResult};
use crate::core::run::{RunTask, TaskStatus};
use crate::core::store::StateStore;
use crate::pipeline::{ExecutorRegistry, RunOrchestrator, RunSummary};
use crate::ui::progress::TaskProgress;
use crate::vcs::SystemGit;
use chrono::Utc;
use std::env;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn build_orchestrator() -> ShipResult<RunOrchestrator> {
  let root = env::current_dir()?;
  let config = ShipConfig::load(&root)?;
  let store = Arc::new(Mutex::new(StateStore::open(&root)?));
  Ok(RunOrchestrator::new(store, ExecutorRegistry::builtin(), Arc::new(SystemGit), config))
}

fn operator_name(operator: Option<String>) -> String {
  operator
    .or_else(|| env::var("USER").ok())
    .unwrap_or_else(|| "unknown".to_string())
}

/// Run the run create command
pub fn run_run_create(window_key: String, operator: Option<String>) -> ShipResult<()> {
  let orchestrator = build_orchestrator()?;
  let operator = operator_name(operator);

  let run_id = orchestrator.create_release_run(&window_key, &operator, Utc::now())?;
  let tasks = orchestrator.run_tasks(&run_id)?;

  println!("\n✅ Created run {} ({} tasks)", run_id, tasks.len());
  println!("\n   Execute it with: shipline run execute '{}'\n", run_id);
  Ok(())
}

/// Run the run execute command
///
/// Executes on a worker thread and reports completed tasks on a progress
/// bar; a failed run exits non-zero after printing the task table.
pub fn run_run_execute(run_id: String) -> ShipResult<()> {
  let orchestrator = build_orchestrator()?;
  let total = orchestrator.run_tasks(&run_id)?.len();

  let handle = orchestrator.execute_run_async(&run_id);

  if total > 0 {
    let mut bar = TaskProgress::new(total, format!("run {}", run_id));
    while !handle.is_finished() {
      let done = orchestrator
        .run_tasks(&run_id)?
        .iter()
        .filter(|t| t.status != TaskStatus::Pending && t.status != TaskStatus::Running)
        .count();
      bar.set(done);
      thread::sleep(Duration::from_millis(100));
    }
    bar.set(total);
  }

  let summary = handle
    .join()
    .map_err(|_| ShipError::message("Run execution thread panicked"))??;

  print_task_table(&orchestrator.run_tasks(&run_id)?);
  print_summary(&summary);

  if summary.is_success() {
    Ok(())
  } else {
    let failed_task = orchestrator
      .run_tasks(&run_id)?
      .into_iter()
      .find(|t| t.status == TaskStatus::Failed);
    let help = match failed_task {
      Some(task) => format!("Retry the failed task with: shipline run retry {}", task.id),
      None => format!("Inspect the run with: shipline run tasks '{}'", run_id),
    };
    Err(ShipError::with_help(format!("Run {} finished with failures", summary.run_id), help))
  }
}

/// Run the run tasks command
pub fn run_run_tasks(run_id: String, json: bool) -> ShipResult<()> {
  let orchestrator = build_orchestrator()?;
  let tasks = orchestrator.run_tasks(&run_id)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&tasks)?);
    return Ok(());
  }

  print_task_table(&tasks);
  Ok(())
}

/// Run the run retry command
///
/// Creates a fresh retry run around the failed task and executes it
/// immediately.
pub fn run_run_retry(task_id: u64, operator: Option<String>) -> ShipResult<()> {
  let orchestrator = build_orchestrator()?;
  let operator = operator_name(operator);

  let run_id = orchestrator.retry_task(task_id, &operator, Utc::now())?;
  println!("\n🔁 Retrying task #{} under run {}\n", task_id, run_id);

  let summary = orchestrator
    .execute_run_async(&run_id)
    .join()
    .map_err(|_| ShipError::message("Run execution thread panicked"))??;

  print_task_table(&orchestrator.run_tasks(&run_id)?);
  print_summary(&summary);

  if summary.is_success() {
    Ok(())
  } else {
    Err(ShipError::message(format!("Retry run {} failed again", run_id)))
  }
}

fn status_icon(status: TaskStatus) -> &'static str {
  match status {
    TaskStatus::Pending => "⏳",
    TaskStatus::Running => "▶️",
    TaskStatus::Completed => "✅",
    TaskStatus::Failed => "❌",
    TaskStatus::Skipped => "⏭️",
  }
}

fn print_task_table(tasks: &[RunTask]) {
  println!("\n📦 Tasks\n");
  println!("{:<6} {:<6} {:<26} {:<16} {:<12} {:<8} MESSAGE", "ORDER", "ID", "TYPE", "TARGET", "STATUS", "RETRIES");
  println!("{:-<110}", "");

  for task in tasks {
    println!(
      "{:<6} {:<6} {:<26} {:<16} {} {:<9} {:<8} {}",
      task.task_order,
      task.id,
      task.task_type.to_string(),
      task.target_id,
      status_icon(task.status),
      task.status.to_string(),
      format!("{}/{}", task.retry_count, task.max_retries),
      task.error_message.as_deref().unwrap_or("-"),
    );
  }
  println!();
}

fn print_summary(summary: &RunSummary) {
  println!(
    "   {} completed, {} skipped, {} failed, {} pending ({} total)\n",
    summary.completed, summary.skipped, summary.failed, summary.pending, summary.total
  );
}
