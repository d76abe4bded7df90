//! Run orchestration: create, execute, inspect and retry release runs
//!
//! Execution is sequential by `task_order` and fail-fast: the first task
//! whose retry budget runs out stops the run and leaves every later task
//! Pending. The run's `finished_at` is set unconditionally, even when a task
//! failed or the store refused a write mid-run. Each task's terminal status
//! is persisted before the next task starts, so a crash leaves an accurate
//! picture behind.

use crate::core::config::ShipConfig;
use crate::core::error::{ShipError, ShipResult, StateError};
use crate::core::run::{Run, RunItem, RunStep, RunTask, RunType, StepResult, TargetType, TaskStatus};
use crate::core::store::StateStore;
use crate::core::window::WindowStatus;
use crate::pipeline::generator::generate_tasks;
use crate::pipeline::registry::{ExecutorRegistry, HandlerContext, TaskOutcome};
use crate::vcs::VcsGateway;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Aggregated result of one executed run
#[derive(Debug, Clone)]
pub struct RunSummary {
  pub run_id: String,
  pub total: usize,
  pub completed: usize,
  pub skipped: usize,
  pub failed: usize,
  pub pending: usize,
}

impl RunSummary {
  /// A run succeeds when every task reached a successful terminal status
  pub fn is_success(&self) -> bool {
    self.failed == 0 && self.pending == 0
  }
}

/// Drives release runs end to end
///
/// Cheap to clone; all state is shared behind `Arc`, which is what lets
/// `execute_run_async` hand a clone to a worker thread.
#[derive(Clone)]
pub struct RunOrchestrator {
  store: Arc<Mutex<StateStore>>,
  registry: Arc<ExecutorRegistry>,
  gateway: Arc<dyn VcsGateway>,
  config: Arc<ShipConfig>,
}

impl RunOrchestrator {
  pub fn new(store: Arc<Mutex<StateStore>>, registry: ExecutorRegistry, gateway: Arc<dyn VcsGateway>, config: ShipConfig) -> Self {
    Self {
      store,
      registry: Arc::new(registry),
      gateway,
      config: Arc::new(config),
    }
  }

  /// Create a release run for a published window and persist its task list
  ///
  /// A window with no attached iterations yields a valid zero-task run.
  /// Returns the new run id.
  pub fn create_release_run(&self, window_key: &str, operator: &str, now: DateTime<Utc>) -> ShipResult<String> {
    let mut store = self.store.lock().unwrap();

    let window = store.window(window_key)?;
    if window.status != WindowStatus::Published {
      return Err(ShipError::State(StateError::InvalidTransition {
        action: "run".to_string(),
        window: window_key.to_string(),
        current: window.status.to_string(),
      }));
    }

    // Attached iterations in attach order drive task generation
    let iteration_keys: Vec<String> = store.window_bindings(window_key).iter().map(|b| b.iteration_key.clone()).collect();
    let iterations: Vec<_> = iteration_keys
      .iter()
      .map(|key| store.iteration(key).cloned())
      .collect::<ShipResult<_>>()?;

    let run = Run::new(RunType::Release, window_key, operator, now);
    let run_id = run.id.clone();

    let iteration_refs: Vec<_> = iterations.iter().collect();
    let first_id = store.state.next_task_id;
    let tasks = generate_tasks(&run_id, &iteration_refs, self.config.settings.max_retries, first_id, now);
    store.allocate_task_ids(tasks.len() as u64);

    store.insert_run(run);
    store.insert_tasks(tasks);
    store.save()?;

    Ok(run_id)
  }

  /// Execute a run's pending tasks sequentially, fail-fast
  pub fn execute_run(&self, run_id: &str) -> ShipResult<RunSummary> {
    let result = self.execute_pending_tasks(run_id);

    // finished_at is set no matter how execution ended
    {
      let mut store = self.store.lock().unwrap();
      store.run_mut(run_id)?.finish(Utc::now());
      store.save()?;
    }

    result?;
    self.summarize(run_id)
  }

  /// Execute a run on a worker thread; join the handle for the summary
  pub fn execute_run_async(&self, run_id: &str) -> JoinHandle<ShipResult<RunSummary>> {
    let orchestrator = self.clone();
    let run_id = run_id.to_string();
    thread::spawn(move || orchestrator.execute_run(&run_id))
  }

  fn execute_pending_tasks(&self, run_id: &str) -> ShipResult<()> {
    let window_key = {
      let store = self.store.lock().unwrap();
      store.run(run_id)?.window_key.clone()
    };

    let mut executed: u32 = 0;
    loop {
      // Snapshot the next pending task; the lock is not held while the
      // handler runs (handlers take it themselves)
      let next = {
        let store = self.store.lock().unwrap();
        store.run_tasks(run_id).into_iter().find(|t| t.status == TaskStatus::Pending)
      };
      let Some(mut task) = next else {
        return Ok(());
      };
      let task_id = task.id;

      let ctx = HandlerContext {
        store: &self.store,
        gateway: self.gateway.as_ref(),
        config: &self.config,
        window_key: window_key.clone(),
      };
      let (outcome, steps) = self.registry.execute_task(&mut task, &ctx, self.config.settings.retry_backoff_ms);
      executed += 1;

      {
        let mut store = self.store.lock().unwrap();
        *store.task_mut(task_id)? = task.clone();
        record_audit(store.run_mut(run_id)?, &task, steps, executed);
        store.save()?;
      }

      if outcome == TaskOutcome::Failed {
        // fail-fast: later tasks stay Pending
        return Ok(());
      }
    }
  }

  /// Tasks of a run in execution order
  pub fn run_tasks(&self, run_id: &str) -> ShipResult<Vec<RunTask>> {
    let store = self.store.lock().unwrap();
    store.run(run_id)?;
    Ok(store.run_tasks(run_id))
  }

  /// Manual retry of a failed task
  ///
  /// Inserts a fresh Pending copy of the task under a new retry run and
  /// leaves the failed row untouched for audit. Returns the retry run id.
  pub fn retry_task(&self, task_id: u64, operator: &str, now: DateTime<Utc>) -> ShipResult<String> {
    let mut store = self.store.lock().unwrap();

    let original = store.task(task_id)?.clone();
    if original.status != TaskStatus::Failed {
      return Err(ShipError::with_help(
        format!("Task #{} is {}, only failed tasks can be retried", task_id, original.status),
        "Inspect the run with `shipline run tasks <run-id>`.",
      ));
    }

    let window_key = store.run(&original.run_id)?.window_key.clone();
    let run = Run::new(RunType::Retry, window_key, operator, now);
    let run_id = run.id.clone();

    let fresh = original.retry_clone(store.allocate_task_id(), &run_id, now);
    store.insert_run(run);
    store.insert_tasks(vec![fresh]);
    store.save()?;

    Ok(run_id)
  }

  fn summarize(&self, run_id: &str) -> ShipResult<RunSummary> {
    let store = self.store.lock().unwrap();
    store.run(run_id)?;
    let tasks = store.run_tasks(run_id);

    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    Ok(RunSummary {
      run_id: run_id.to_string(),
      total: tasks.len(),
      completed: count(TaskStatus::Completed),
      skipped: count(TaskStatus::Skipped),
      failed: count(TaskStatus::Failed),
      pending: count(TaskStatus::Pending),
    })
  }
}

/// Append the attempt trail of one executed task to the run's audit items
///
/// Items are keyed `window::repo::iteration`; the repo tasks of one
/// iteration share an item, iteration-scoped tasks use `-` for the repo
/// slot. `executed_order` tracks the position of the item's latest task in
/// the execution sequence; `final_result` is Failed as soon as any of the
/// item's tasks fails.
fn record_audit(run: &mut Run, task: &RunTask, steps: Vec<RunStep>, executed_order: u32) {
  let (repo_id, iteration_key) = match task.target_type {
    TargetType::Repo => (task.target_id.clone(), task.iteration_key.clone().unwrap_or_default()),
    TargetType::Iteration => ("-".to_string(), task.target_id.clone()),
  };

  let key = format!("{}::{}::{}", run.window_key, repo_id, iteration_key);
  let idx = match run.items.iter().position(|item| item.key() == key) {
    Some(idx) => idx,
    None => {
      run.add_item(RunItem::new(&run.window_key, repo_id, iteration_key, task.task_order));
      run.items.len() - 1
    }
  };

  let item = &mut run.items[idx];
  for step in steps {
    item.record_step(step);
  }
  item.executed_order = Some(executed_order);
  item.final_result = if task.status == TaskStatus::Failed || item.final_result == Some(StepResult::Failed) {
    Some(StepResult::Failed)
  } else if task.status == TaskStatus::Skipped && matches!(item.final_result, None | Some(StepResult::Skipped)) {
    Some(StepResult::Skipped)
  } else {
    Some(StepResult::Success)
  };
}
