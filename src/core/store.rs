//! Persistent state for windows, iterations, bindings, runs and tasks
//!
//! State lives in `.shipline/state.json` and is written back after every
//! mutation (persist-after-mutate); the store relies on the atomicity of a
//! single save rather than in-process locking. Constructed without a path,
//! the store is purely in-memory, which is what the unit tests use.

use crate::core::error::{NotFoundError, ResultExt, ShipError, ShipResult};
use crate::core::iteration::{Iteration, WindowIteration};
use crate::core::run::{Run, RunTask};
use crate::core::window::ReleaseWindow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const STATE_DIR: &str = ".shipline";
const STATE_FILE: &str = "state.json";

/// Serialized state shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
  #[serde(default)]
  pub windows: Vec<ReleaseWindow>,
  #[serde(default)]
  pub iterations: Vec<Iteration>,
  #[serde(default)]
  pub bindings: Vec<WindowIteration>,
  #[serde(default)]
  pub runs: Vec<Run>,
  #[serde(default)]
  pub tasks: Vec<RunTask>,
  /// Monotonic task-id counter; task rows are never deleted, so ids are
  /// never reused
  #[serde(default = "first_task_id")]
  pub next_task_id: u64,
}

fn first_task_id() -> u64 {
  1
}

/// File-backed state store
pub struct StateStore {
  /// None = in-memory only (tests)
  path: Option<PathBuf>,
  pub state: State,
}

impl StateStore {
  /// Open the store rooted at the control workspace, creating empty state
  /// if none exists yet
  pub fn open(root: &Path) -> ShipResult<Self> {
    let path = root.join(STATE_DIR).join(STATE_FILE);

    let state = if path.exists() {
      let content = fs::read_to_string(&path).with_context(|| format!("Failed to read state from {}", path.display()))?;
      serde_json::from_str(&content).with_context(|| format!("Failed to parse state from {}", path.display()))?
    } else {
      State {
        next_task_id: 1,
        ..State::default()
      }
    };

    Ok(Self { path: Some(path), state })
  }

  /// In-memory store (no file is ever written)
  pub fn in_memory() -> Self {
    Self {
      path: None,
      state: State {
        next_task_id: 1,
        ..State::default()
      },
    }
  }

  /// Write state back to disk. No-op for in-memory stores.
  pub fn save(&self) -> ShipResult<()> {
    let Some(ref path) = self.path else {
      return Ok(());
    };

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(&self.state).context("Failed to serialize state")?;
    fs::write(path, content).with_context(|| format!("Failed to write state to {}", path.display()))?;
    Ok(())
  }

  // Windows

  pub fn insert_window(&mut self, window: ReleaseWindow) -> ShipResult<()> {
    if self.state.windows.iter().any(|w| w.key == window.key) {
      return Err(ShipError::message(format!("Release window '{}' already exists", window.key)));
    }
    self.state.windows.push(window);
    Ok(())
  }

  pub fn window(&self, key: &str) -> ShipResult<&ReleaseWindow> {
    self
      .state
      .windows
      .iter()
      .find(|w| w.key == key)
      .ok_or_else(|| ShipError::NotFound(NotFoundError::Window { key: key.to_string() }))
  }

  pub fn window_mut(&mut self, key: &str) -> ShipResult<&mut ReleaseWindow> {
    self
      .state
      .windows
      .iter_mut()
      .find(|w| w.key == key)
      .ok_or_else(|| ShipError::NotFound(NotFoundError::Window { key: key.to_string() }))
  }

  // Iterations

  pub fn insert_iteration(&mut self, iteration: Iteration) -> ShipResult<()> {
    if self.state.iterations.iter().any(|i| i.key == iteration.key) {
      return Err(ShipError::message(format!("Iteration '{}' already exists", iteration.key)));
    }
    self.state.iterations.push(iteration);
    Ok(())
  }

  pub fn iteration(&self, key: &str) -> ShipResult<&Iteration> {
    self
      .state
      .iterations
      .iter()
      .find(|i| i.key == key)
      .ok_or_else(|| ShipError::NotFound(NotFoundError::Iteration { key: key.to_string() }))
  }

  pub fn iteration_mut(&mut self, key: &str) -> ShipResult<&mut Iteration> {
    self
      .state
      .iterations
      .iter_mut()
      .find(|i| i.key == key)
      .ok_or_else(|| ShipError::NotFound(NotFoundError::Iteration { key: key.to_string() }))
  }

  // Bindings

  pub fn insert_binding(&mut self, binding: WindowIteration) -> ShipResult<()> {
    if self.binding(&binding.window_key, &binding.iteration_key).is_some() {
      return Err(ShipError::message(format!(
        "Iteration '{}' is already attached to window '{}'",
        binding.iteration_key, binding.window_key
      )));
    }
    self.state.bindings.push(binding);
    Ok(())
  }

  pub fn binding(&self, window_key: &str, iteration_key: &str) -> Option<&WindowIteration> {
    self
      .state
      .bindings
      .iter()
      .find(|b| b.window_key == window_key && b.iteration_key == iteration_key)
  }

  pub fn binding_mut(&mut self, window_key: &str, iteration_key: &str) -> Option<&mut WindowIteration> {
    self
      .state
      .bindings
      .iter_mut()
      .find(|b| b.window_key == window_key && b.iteration_key == iteration_key)
  }

  /// Detach removes the binding row; branch archival is the caller's job
  pub fn remove_binding(&mut self, window_key: &str, iteration_key: &str) -> ShipResult<WindowIteration> {
    let idx = self
      .state
      .bindings
      .iter()
      .position(|b| b.window_key == window_key && b.iteration_key == iteration_key)
      .ok_or_else(|| {
        ShipError::NotFound(NotFoundError::Binding {
          window: window_key.to_string(),
          iteration: iteration_key.to_string(),
        })
      })?;
    Ok(self.state.bindings.remove(idx))
  }

  /// Bindings of a window ordered by attach time
  pub fn window_bindings(&self, window_key: &str) -> Vec<&WindowIteration> {
    let mut bindings: Vec<&WindowIteration> = self.state.bindings.iter().filter(|b| b.window_key == window_key).collect();
    bindings.sort_by_key(|b| b.attach_at);
    bindings
  }

  // Runs and tasks

  pub fn insert_run(&mut self, run: Run) {
    self.state.runs.push(run);
  }

  pub fn run(&self, id: &str) -> ShipResult<&Run> {
    self
      .state
      .runs
      .iter()
      .find(|r| r.id == id)
      .ok_or_else(|| ShipError::NotFound(NotFoundError::Run { id: id.to_string() }))
  }

  pub fn run_mut(&mut self, id: &str) -> ShipResult<&mut Run> {
    self
      .state
      .runs
      .iter_mut()
      .find(|r| r.id == id)
      .ok_or_else(|| ShipError::NotFound(NotFoundError::Run { id: id.to_string() }))
  }

  /// Allocate the next task id
  pub fn allocate_task_id(&mut self) -> u64 {
    let id = self.state.next_task_id;
    self.state.next_task_id += 1;
    id
  }

  /// Reserve a contiguous range of task ids, returning the first
  pub fn allocate_task_ids(&mut self, count: u64) -> u64 {
    let first = self.state.next_task_id;
    self.state.next_task_id += count;
    first
  }

  pub fn insert_tasks(&mut self, tasks: Vec<RunTask>) {
    self.state.tasks.extend(tasks);
  }

  pub fn task(&self, id: u64) -> ShipResult<&RunTask> {
    self
      .state
      .tasks
      .iter()
      .find(|t| t.id == id)
      .ok_or_else(|| ShipError::NotFound(NotFoundError::Task { id }))
  }

  pub fn task_mut(&mut self, id: u64) -> ShipResult<&mut RunTask> {
    self
      .state
      .tasks
      .iter_mut()
      .find(|t| t.id == id)
      .ok_or_else(|| ShipError::NotFound(NotFoundError::Task { id }))
  }

  /// Tasks of a run ordered by task_order
  pub fn run_tasks(&self, run_id: &str) -> Vec<RunTask> {
    let mut tasks: Vec<RunTask> = self.state.tasks.iter().filter(|t| t.run_id == run_id).cloned().collect();
    tasks.sort_by_key(|t| t.task_order);
    tasks
  }
}
