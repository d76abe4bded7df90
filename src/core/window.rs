//! Release window entity and its lifecycle state machine
//!
//! A window moves Draft → Published → Closed. Freeze is an orthogonal,
//! idempotent flag: it blocks iteration attach/detach (enforced by the
//! attach/detach commands) but never blocks status transitions.

use crate::core::error::{ShipError, ShipResult, StateError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a release window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
  Draft,
  Published,
  Closed,
}

impl fmt::Display for WindowStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WindowStatus::Draft => write!(f, "draft"),
      WindowStatus::Published => write!(f, "published"),
      WindowStatus::Closed => write!(f, "closed"),
    }
  }
}

/// A bounded release cycle aggregating iterations destined to ship together
///
/// Mutated only through its own methods; never deleted (closed windows are
/// kept for history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseWindow {
  /// Human key, unique across windows
  pub key: String,

  /// Display name
  pub name: String,

  /// Planned release time
  pub planned_at: Option<DateTime<Utc>>,

  pub status: WindowStatus,

  /// Blocks attach/detach while set; independent of status
  pub frozen: bool,

  pub published_at: Option<DateTime<Utc>>,

  pub created_at: DateTime<Utc>,
}

impl ReleaseWindow {
  pub fn new(key: impl Into<String>, name: impl Into<String>, planned_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
    Self {
      key: key.into(),
      name: name.into(),
      planned_at,
      status: WindowStatus::Draft,
      frozen: false,
      published_at: None,
      created_at: now,
    }
  }

  /// Publish the window. Legal only from Draft.
  ///
  /// The caller must have verified that at least one iteration is attached;
  /// the state machine itself only guards the status transition.
  pub fn publish(&mut self, now: DateTime<Utc>) -> ShipResult<()> {
    match self.status {
      WindowStatus::Draft => {
        self.status = WindowStatus::Published;
        self.published_at = Some(now);
        Ok(())
      }
      current => Err(self.invalid("publish", current)),
    }
  }

  /// Close the window. Legal from Published; idempotent when already Closed.
  pub fn close(&mut self, _now: DateTime<Utc>) -> ShipResult<WindowStatus> {
    match self.status {
      WindowStatus::Published => {
        self.status = WindowStatus::Closed;
        Ok(WindowStatus::Closed)
      }
      WindowStatus::Closed => Ok(WindowStatus::Closed),
      current => Err(self.invalid("close", current)),
    }
  }

  /// Freeze the window. No-op if already frozen.
  pub fn freeze(&mut self, _now: DateTime<Utc>) {
    self.frozen = true;
  }

  /// Unfreeze the window. No-op if not frozen.
  pub fn unfreeze(&mut self, _now: DateTime<Utc>) {
    self.frozen = false;
  }

  /// Guard used by attach/detach: frozen windows reject binding changes
  pub fn ensure_not_frozen(&self) -> ShipResult<()> {
    if self.frozen {
      return Err(ShipError::State(StateError::Frozen {
        window: self.key.clone(),
      }));
    }
    Ok(())
  }

  fn invalid(&self, action: &str, current: WindowStatus) -> ShipError {
    ShipError::State(StateError::InvalidTransition {
      action: action.to_string(),
      window: self.key.clone(),
      current: current.to_string(),
    })
  }
}
