//! Run aggregate: one execution attempt of a window's release pipeline
//!
//! A `Run` holds an ordered, append-only list of `RunItem`s; each item keeps
//! an immutable `RunStep` audit trail of every action attempted for one
//! (window, repo, iteration) tuple. `RunTask` rows are the executable units:
//! mutated in place while the run progresses, never deleted (a manual retry
//! inserts a fresh row and leaves the failed one for audit).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
  /// Close pipeline of a release window
  Release,
  /// Manual retry of a single failed task
  Retry,
}

impl fmt::Display for RunType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunType::Release => write!(f, "release"),
      RunType::Retry => write!(f, "retry"),
    }
  }
}

/// One execution instance of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
  /// `{run_type}::{start_millis}`
  pub id: String,

  pub run_type: RunType,
  pub window_key: String,

  /// Who triggered the run
  pub operator: String,

  pub started_at: DateTime<Utc>,

  /// None while in progress; `finish` is the only terminal mutation
  pub finished_at: Option<DateTime<Utc>>,

  /// Append-only
  #[serde(default)]
  pub items: Vec<RunItem>,
}

impl Run {
  pub fn new(run_type: RunType, window_key: impl Into<String>, operator: impl Into<String>, now: DateTime<Utc>) -> Self {
    Self {
      id: format!("{}::{}", run_type, now.timestamp_millis()),
      run_type,
      window_key: window_key.into(),
      operator: operator.into(),
      started_at: now,
      finished_at: None,
      items: Vec::new(),
    }
  }

  /// Append an item; items are never removed
  pub fn add_item(&mut self, item: RunItem) {
    self.items.push(item);
  }

  /// Finalize the run. Success or failure is read from the task statuses,
  /// not from the run itself.
  pub fn finish(&mut self, now: DateTime<Utc>) {
    self.finished_at = Some(now);
  }

  pub fn is_finished(&self) -> bool {
    self.finished_at.is_some()
  }
}

/// One (window, repo, iteration) tuple within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunItem {
  pub window_key: String,
  pub repo_id: String,
  pub iteration_key: String,

  pub planned_order: u32,

  #[serde(default)]
  pub executed_order: Option<u32>,

  /// Immutable audit trail, one record per action attempted
  #[serde(default)]
  pub steps: Vec<RunStep>,

  #[serde(default)]
  pub final_result: Option<StepResult>,
}

impl RunItem {
  pub fn new(window_key: impl Into<String>, repo_id: impl Into<String>, iteration_key: impl Into<String>, planned_order: u32) -> Self {
    Self {
      window_key: window_key.into(),
      repo_id: repo_id.into(),
      iteration_key: iteration_key.into(),
      planned_order,
      executed_order: None,
      steps: Vec::new(),
      final_result: None,
    }
  }

  /// Composite key making retries of the same tuple addressable
  pub fn key(&self) -> String {
    format!("{}::{}::{}", self.window_key, self.repo_id, self.iteration_key)
  }

  pub fn record_step(&mut self, step: RunStep) {
    self.steps.push(step);
  }
}

/// Outcome of one recorded action attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
  Success,
  Failed,
  Skipped,
}

/// Immutable record of one action attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
  pub action: TaskType,
  pub result: StepResult,
  pub start_at: DateTime<Utc>,
  pub end_at: DateTime<Utc>,
  #[serde(default)]
  pub message: Option<String>,
}

/// Pipeline action kinds, in the fixed per-repository order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
  CloseIteration,
  ArchiveFeatureBranch,
  UpdateManifestVersion,
  MergeReleaseToMaster,
  CreateTag,
  TriggerCiBuild,
}

impl fmt::Display for TaskType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskType::CloseIteration => write!(f, "close-iteration"),
      TaskType::ArchiveFeatureBranch => write!(f, "archive-feature-branch"),
      TaskType::UpdateManifestVersion => write!(f, "update-manifest-version"),
      TaskType::MergeReleaseToMaster => write!(f, "merge-release-to-master"),
      TaskType::CreateTag => write!(f, "create-tag"),
      TaskType::TriggerCiBuild => write!(f, "trigger-ci-build"),
    }
  }
}

/// What a task targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
  Iteration,
  Repo,
}

/// Execution status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Skipped,
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskStatus::Pending => write!(f, "pending"),
      TaskStatus::Running => write!(f, "running"),
      TaskStatus::Completed => write!(f, "completed"),
      TaskStatus::Failed => write!(f, "failed"),
      TaskStatus::Skipped => write!(f, "skipped"),
    }
  }
}

/// A unit of work belonging to a run
///
/// Invariants: `retry_count <= max_retries`; the transition to Failed only
/// happens once the retry budget is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTask {
  /// Store-allocated, unique across all runs
  pub id: u64,

  pub run_id: String,
  pub task_type: TaskType,

  /// Sort key for sequential execution, strictly increasing within a run
  pub task_order: u32,

  pub target_type: TargetType,

  /// Iteration key or repo id, depending on `target_type`
  pub target_id: String,

  pub status: TaskStatus,

  pub retry_count: u32,
  pub max_retries: u32,

  #[serde(default)]
  pub error_message: Option<String>,

  #[serde(default)]
  pub started_at: Option<DateTime<Utc>>,

  #[serde(default)]
  pub finished_at: Option<DateTime<Utc>>,

  pub created_at: DateTime<Utc>,

  /// The iteration a repo task belongs to (None for iteration targets)
  #[serde(default)]
  pub iteration_key: Option<String>,
}

impl RunTask {
  /// Whether another attempt is allowed; false exactly when the budget is
  /// spent
  pub fn can_retry(&self) -> bool {
    self.retry_count < self.max_retries
  }

  /// Clone this task into a fresh Pending row for a manual retry
  ///
  /// Same type/order/target; retry state and error reset. The original row
  /// is left untouched for audit.
  pub fn retry_clone(&self, id: u64, run_id: impl Into<String>, now: DateTime<Utc>) -> RunTask {
    RunTask {
      id,
      run_id: run_id.into(),
      task_type: self.task_type,
      task_order: self.task_order,
      target_type: self.target_type,
      target_id: self.target_id.clone(),
      status: TaskStatus::Pending,
      retry_count: 0,
      max_retries: self.max_retries,
      error_message: None,
      started_at: None,
      finished_at: None,
      created_at: now,
      iteration_key: self.iteration_key.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn task() -> RunTask {
    RunTask {
      id: 1,
      run_id: "release::1700000000000".to_string(),
      task_type: TaskType::CreateTag,
      task_order: 4,
      target_type: TargetType::Repo,
      target_id: "svc-a".to_string(),
      status: TaskStatus::Failed,
      retry_count: 3,
      max_retries: 3,
      error_message: Some("tag refused".to_string()),
      started_at: None,
      finished_at: None,
      created_at: Utc::now(),
      iteration_key: Some("sprint-1".to_string()),
    }
  }

  #[test]
  fn test_run_id_shape() {
    let now = Utc::now();
    let run = Run::new(RunType::Release, "2025-R1", "alice", now);
    assert_eq!(run.id, format!("release::{}", now.timestamp_millis()));
    assert!(!run.is_finished());
  }

  #[test]
  fn test_finish_is_terminal_marker() {
    let mut run = Run::new(RunType::Release, "2025-R1", "alice", Utc::now());
    run.finish(Utc::now());
    assert!(run.is_finished());
  }

  #[test]
  fn test_item_composite_key() {
    let item = RunItem::new("2025-R1", "svc-a", "sprint-1", 1);
    assert_eq!(item.key(), "2025-R1::svc-a::sprint-1");
  }

  #[test]
  fn test_can_retry_boundary() {
    let mut t = task();

    t.retry_count = 0;
    assert!(t.can_retry());
    t.retry_count = 2;
    assert!(t.can_retry());
    // false exactly when retry_count == max_retries
    t.retry_count = 3;
    assert!(!t.can_retry());
  }

  #[test]
  fn test_retry_clone_resets_state() {
    let original = task();
    let fresh = original.retry_clone(99, "retry::1700000001000", Utc::now());

    assert_eq!(fresh.id, 99);
    assert_eq!(fresh.status, TaskStatus::Pending);
    assert_eq!(fresh.retry_count, 0);
    assert_eq!(fresh.error_message, None);
    assert_eq!(fresh.task_type, original.task_type);
    assert_eq!(fresh.task_order, original.task_order);
    assert_eq!(fresh.target_id, original.target_id);

    // original unchanged
    assert_eq!(original.status, TaskStatus::Failed);
    assert_eq!(original.retry_count, 3);
    assert_eq!(original.error_message.as_deref(), Some("tag refused"));
  }
}
