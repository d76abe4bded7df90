//! Task handler registry and the bounded-retry execution loop
//!
//! Handlers are looked up by task type; a task with no registered handler is
//! marked Skipped and does not fail the run. Handler errors are caught here
//! and recorded on the task, they never propagate out of `execute_task`.
//! Each failed attempt consumes one unit of the retry budget; the task only
//! becomes Failed once `retry_count` reaches `max_retries`.

use crate::core::config::ShipConfig;
use crate::core::error::ShipResult;
use crate::core::run::{RunStep, RunTask, StepResult, TaskStatus, TaskType};
use crate::core::store::StateStore;
use crate::pipeline::handlers;
use crate::vcs::VcsGateway;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Everything a handler may touch while executing one task
pub struct HandlerContext<'a> {
  pub store: &'a Mutex<StateStore>,
  pub gateway: &'a dyn VcsGateway,
  pub config: &'a ShipConfig,
  /// Window whose run is executing
  pub window_key: String,
}

/// One executable pipeline action
///
/// `execute` returns an optional human-readable note on success. Errors are
/// retryable by contract; a handler that wants "done, nothing to do" returns
/// `Ok`, never `Err`.
pub trait TaskHandler: Send + Sync {
  fn execute(&self, task: &RunTask, ctx: &HandlerContext<'_>) -> ShipResult<Option<String>>;
}

/// Terminal classification of one executed task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
  Completed,
  /// No handler registered; counts as success
  Skipped,
  /// Retry budget exhausted
  Failed,
}

impl TaskOutcome {
  pub fn is_success(self) -> bool {
    !matches!(self, TaskOutcome::Failed)
  }
}

/// Maps task types to their handlers
pub struct ExecutorRegistry {
  handlers: HashMap<TaskType, Box<dyn TaskHandler>>,
}

impl ExecutorRegistry {
  /// Empty registry; every task will be skipped
  pub fn empty() -> Self {
    Self { handlers: HashMap::new() }
  }

  /// Registry with the full built-in pipeline
  pub fn builtin() -> Self {
    let mut registry = Self::empty();
    registry.register(TaskType::CloseIteration, Box::new(handlers::CloseIterationHandler));
    registry.register(TaskType::ArchiveFeatureBranch, Box::new(handlers::ArchiveFeatureBranchHandler));
    registry.register(TaskType::UpdateManifestVersion, Box::new(handlers::UpdateManifestVersionHandler));
    registry.register(TaskType::MergeReleaseToMaster, Box::new(handlers::MergeReleaseToMasterHandler));
    registry.register(TaskType::CreateTag, Box::new(handlers::CreateTagHandler));
    registry.register(TaskType::TriggerCiBuild, Box::new(handlers::TriggerCiBuildHandler));
    registry
  }

  pub fn register(&mut self, task_type: TaskType, handler: Box<dyn TaskHandler>) {
    self.handlers.insert(task_type, handler);
  }

  pub fn has_handler(&self, task_type: TaskType) -> bool {
    self.handlers.contains_key(&task_type)
  }

  /// Execute one task to a terminal status, retrying within the budget
  ///
  /// Mutates the task in place; persisting the mutation is the caller's job.
  /// `backoff_ms` is the fixed sleep between attempts. The returned steps are
  /// the audit trail, one `RunStep` per attempt.
  pub fn execute_task(&self, task: &mut RunTask, ctx: &HandlerContext<'_>, backoff_ms: u64) -> (TaskOutcome, Vec<RunStep>) {
    task.status = TaskStatus::Running;
    task.started_at = Some(Utc::now());

    let mut steps = Vec::new();

    let Some(handler) = self.handlers.get(&task.task_type) else {
      task.status = TaskStatus::Skipped;
      task.error_message = Some(format!("no handler registered for {}", task.task_type));
      task.finished_at = Some(Utc::now());
      steps.push(RunStep {
        action: task.task_type,
        result: StepResult::Skipped,
        start_at: task.started_at.unwrap_or_else(Utc::now),
        end_at: Utc::now(),
        message: task.error_message.clone(),
      });
      return (TaskOutcome::Skipped, steps);
    };

    loop {
      let attempt_start = Utc::now();
      match handler.execute(task, ctx) {
        Ok(note) => {
          task.status = TaskStatus::Completed;
          task.error_message = None;
          task.finished_at = Some(Utc::now());
          steps.push(RunStep {
            action: task.task_type,
            result: StepResult::Success,
            start_at: attempt_start,
            end_at: Utc::now(),
            message: note,
          });
          return (TaskOutcome::Completed, steps);
        }
        Err(e) => {
          task.retry_count += 1;
          task.error_message = Some(e.to_string());
          steps.push(RunStep {
            action: task.task_type,
            result: StepResult::Failed,
            start_at: attempt_start,
            end_at: Utc::now(),
            message: Some(e.to_string()),
          });

          if !task.can_retry() {
            task.status = TaskStatus::Failed;
            task.finished_at = Some(Utc::now());
            return (TaskOutcome::Failed, steps);
          }

          if backoff_ms > 0 {
            thread::sleep(Duration::from_millis(backoff_ms));
          }
        }
      }
    }
  }
}
