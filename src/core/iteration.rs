//! Iterations and window-iteration bindings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
  Open,
  Closed,
}

/// A unit of in-progress change spanning one or more repositories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
  /// Human key, unique across iterations
  pub key: String,

  pub name: String,

  /// Per-repository merge source, named after the iteration
  pub feature_branch: String,

  /// Ids of the repositories this iteration touches (unordered set)
  pub repos: Vec<String>,

  pub status: IterationStatus,

  pub created_at: DateTime<Utc>,
}

impl Iteration {
  pub fn new(
    key: impl Into<String>,
    name: impl Into<String>,
    feature_branch: impl Into<String>,
    repos: Vec<String>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      key: key.into(),
      name: name.into(),
      feature_branch: feature_branch.into(),
      repos,
      status: IterationStatus::Open,
      created_at: now,
    }
  }
}

/// Binding between a window and an iteration
///
/// Created on attach; removed on detach (detach also archives the release
/// branch on the external system). `release_branch` stays `None` until the
/// branch has been created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowIteration {
  pub window_key: String,
  pub iteration_key: String,
  pub attach_at: DateTime<Utc>,

  #[serde(default)]
  pub release_branch: Option<String>,

  #[serde(default)]
  pub last_merge_at: Option<DateTime<Utc>>,
}

impl WindowIteration {
  pub fn new(window_key: impl Into<String>, iteration_key: impl Into<String>, now: DateTime<Utc>) -> Self {
    Self {
      window_key: window_key.into(),
      iteration_key: iteration_key.into(),
      attach_at: now,
      release_branch: None,
      last_merge_at: None,
    }
  }
}
