//! Deterministic task generation for release runs
//!
//! Generation is pure: the same window state always yields the same task
//! list. Iteration-close tasks come first, one per attached iteration in
//! attach order, then the fixed five-step repository sequence for every
//! (iteration, repository) pair in the same order. A repository touched by
//! several iterations gets the sequence once per iteration, so each
//! iteration's feature branch is archived; the later repo-level steps are
//! repeat-safe by handler contract.

use crate::core::iteration::Iteration;
use crate::core::run::{RunTask, TargetType, TaskStatus, TaskType};
use chrono::{DateTime, Utc};

/// Fixed per-repository pipeline, in execution order
pub const REPO_TASK_SEQUENCE: [TaskType; 5] = [
  TaskType::ArchiveFeatureBranch,
  TaskType::UpdateManifestVersion,
  TaskType::MergeReleaseToMaster,
  TaskType::CreateTag,
  TaskType::TriggerCiBuild,
];

/// Generate the full task list for one release run
///
/// `iterations` must already be in attach order; `first_task_id` is a
/// contiguous id range reserved by the store. `task_order` starts at 1 and
/// is strictly increasing.
pub fn generate_tasks(
  run_id: &str,
  iterations: &[&Iteration],
  max_retries: u32,
  first_task_id: u64,
  now: DateTime<Utc>,
) -> Vec<RunTask> {
  let mut tasks = Vec::new();

  for iteration in iterations {
    tasks.push(pending_task(
      run_id,
      first_task_id + tasks.len() as u64,
      tasks.len() as u32 + 1,
      TaskType::CloseIteration,
      TargetType::Iteration,
      &iteration.key,
      None,
      max_retries,
      now,
    ));
  }

  for iteration in iterations {
    for repo_id in &iteration.repos {
      for task_type in REPO_TASK_SEQUENCE {
        tasks.push(pending_task(
          run_id,
          first_task_id + tasks.len() as u64,
          tasks.len() as u32 + 1,
          task_type,
          TargetType::Repo,
          repo_id,
          Some(&iteration.key),
          max_retries,
          now,
        ));
      }
    }
  }

  tasks
}

#[allow(clippy::too_many_arguments)]
fn pending_task(
  run_id: &str,
  id: u64,
  task_order: u32,
  task_type: TaskType,
  target_type: TargetType,
  target_id: &str,
  iteration_key: Option<&str>,
  max_retries: u32,
  now: DateTime<Utc>,
) -> RunTask {
  RunTask {
    id,
    run_id: run_id.to_string(),
    task_type,
    task_order,
    target_type,
    target_id: target_id.to_string(),
    status: TaskStatus::Pending,
    retry_count: 0,
    max_retries,
    error_message: None,
    started_at: None,
    finished_at: None,
    created_at: now,
    iteration_key: iteration_key.map(|k| k.to_string()),
  }
}
