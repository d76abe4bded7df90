//! Error types for shipline with contextual messages and exit codes
//!
//! This module provides a unified error type that categorizes errors and
//! provides contextual help messages to users. Validation and state-conflict
//! errors abort the triggering command; gateway errors raised during run
//! execution are caught at the executor boundary and recorded on the task
//! instead of propagating here.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for shipline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing entities)
  User = 1,
  /// System error (git, network, I/O)
  System = 2,
  /// Validation failure (illegal lifecycle transition, frozen window)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for shipline
#[derive(Debug)]
pub enum ShipError {
  /// Configuration errors
  Config(ConfigError),

  /// Lifecycle state-conflict errors
  State(StateError),

  /// Referenced entity does not exist
  NotFound(NotFoundError),

  /// Version control gateway errors (transport/infrastructure)
  Vcs(VcsError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ShipError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ShipError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ShipError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ShipError::Message { message, context, help } => ShipError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ShipError::Config(_) => ExitCode::User,
      ShipError::State(_) => ExitCode::Validation,
      ShipError::NotFound(_) => ExitCode::User,
      ShipError::Vcs(_) => ExitCode::System,
      ShipError::Io(_) => ExitCode::System,
      ShipError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ShipError::Config(e) => e.help_message(),
      ShipError::State(e) => e.help_message(),
      ShipError::NotFound(e) => e.help_message(),
      ShipError::Vcs(e) => e.help_message(),
      ShipError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ShipError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ShipError::Config(e) => write!(f, "{}", e),
      ShipError::State(e) => write!(f, "{}", e),
      ShipError::NotFound(e) => write!(f, "{}", e),
      ShipError::Vcs(e) => write!(f, "{}", e),
      ShipError::Io(e) => write!(f, "I/O error: {}", e),
      ShipError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ShipError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ShipError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ShipError {
  fn from(err: io::Error) -> Self {
    ShipError::Io(err)
  }
}

impl From<String> for ShipError {
  fn from(msg: String) -> Self {
    ShipError::message(msg)
  }
}

impl From<&str> for ShipError {
  fn from(msg: &str) -> Self {
    ShipError::message(msg)
  }
}

impl From<toml_edit::TomlError> for ShipError {
  fn from(err: toml_edit::TomlError) -> Self {
    ShipError::message(format!("TOML parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for ShipError {
  fn from(err: toml_edit::de::Error) -> Self {
    ShipError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<toml_edit::ser::Error> for ShipError {
  fn from(err: toml_edit::ser::Error) -> Self {
    ShipError::message(format!("TOML serialization error: {}", err))
  }
}

impl From<serde_json::Error> for ShipError {
  fn from(err: serde_json::Error) -> Self {
    ShipError::message(format!("JSON error: {}", err))
  }
}

impl From<semver::Error> for ShipError {
  fn from(err: semver::Error) -> Self {
    ShipError::message(format!("Version parse error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for ShipError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ShipError::message(format!("UTF-8 conversion error: {}", err))
  }
}

/// Convert anyhow::Error to ShipError (for helpers that bail with anyhow)
impl From<anyhow::Error> for ShipError {
  fn from(err: anyhow::Error) -> Self {
    ShipError::message(err.to_string())
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// ship.toml not found
  NotFound { root: PathBuf },

  /// Missing required field
  MissingField { field: String },

  /// Repository not registered in configuration
  RepoNotConfigured { id: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => Some("Run `shipline init` to create a configuration file.".to_string()),
      ConfigError::RepoNotConfigured { id } => Some(format!(
        "Add a [[repos]] entry with id = \"{}\" to ship.toml, or check `shipline status` for registered repos.",
        id
      )),
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { root } => {
        write!(f, "No shipline configuration found.\nExpected file: {}/ship.toml", root.display())
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::RepoNotConfigured { id } => {
        write!(f, "Repository '{}' not found in configuration", id)
      }
    }
  }
}

/// Lifecycle state-conflict errors
///
/// Always name the current state so the caller can see why the transition
/// was rejected.
#[derive(Debug)]
pub enum StateError {
  /// Illegal window lifecycle transition
  InvalidTransition {
    action: String,
    window: String,
    current: String,
  },

  /// Window is frozen; attach/detach is blocked
  Frozen { window: String },

  /// Publish requires at least one attached iteration
  NoIterations { window: String },
}

impl StateError {
  fn help_message(&self) -> Option<String> {
    match self {
      StateError::InvalidTransition { action, current, .. } => Some(format!(
        "'{}' is not legal from status '{}'. Check `shipline window list` for the current lifecycle state.",
        action, current
      )),
      StateError::Frozen { window } => Some(format!("Unfreeze first: `shipline window unfreeze {}`", window)),
      StateError::NoIterations { window } => {
        Some(format!("Attach an iteration first: `shipline iteration attach {} <iteration>`", window))
      }
    }
  }
}

impl fmt::Display for StateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StateError::InvalidTransition { action, window, current } => {
        write!(f, "Cannot {} window '{}': current status is {}", action, window, current)
      }
      StateError::Frozen { window } => {
        write!(f, "Window '{}' is frozen", window)
      }
      StateError::NoIterations { window } => {
        write!(f, "Window '{}' has no attached iterations", window)
      }
    }
  }
}

/// Missing-entity errors
#[derive(Debug)]
pub enum NotFoundError {
  Window { key: String },
  Iteration { key: String },
  Binding { window: String, iteration: String },
  Repo { id: String },
  Run { id: String },
  Task { id: u64 },
}

impl NotFoundError {
  fn help_message(&self) -> Option<String> {
    match self {
      NotFoundError::Window { .. } => Some("List known windows with `shipline window list`.".to_string()),
      NotFoundError::Run { .. } => Some("List runs with `shipline status`.".to_string()),
      NotFoundError::Task { .. } => Some("List a run's tasks with `shipline run tasks <run-id>`.".to_string()),
      _ => None,
    }
  }
}

impl fmt::Display for NotFoundError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NotFoundError::Window { key } => write!(f, "Release window '{}' not found", key),
      NotFoundError::Iteration { key } => write!(f, "Iteration '{}' not found", key),
      NotFoundError::Binding { window, iteration } => {
        write!(f, "Iteration '{}' is not attached to window '{}'", iteration, window)
      }
      NotFoundError::Repo { id } => write!(f, "Repository '{}' not found", id),
      NotFoundError::Run { id } => write!(f, "Run '{}' not found", id),
      NotFoundError::Task { id } => write!(f, "Task #{} not found", id),
    }
  }
}

/// Version control gateway errors (transport level)
///
/// Refusals the VCS reports as part of its contract (branch already exists,
/// unmergeable state) are values, not errors; only infrastructure failures
/// land here.
#[derive(Debug)]
pub enum VcsError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found on disk
  RepoNotFound { path: PathBuf },

  /// Branch operation failed
  BranchError { message: String },
}

impl VcsError {
  fn help_message(&self) -> Option<String> {
    match self {
      VcsError::RepoNotFound { path } => Some(format!(
        "Initialize the repository first or fix the path in ship.toml: {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for VcsError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VcsError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      VcsError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      VcsError::BranchError { message } => {
        write!(f, "Branch operation failed: {}", message)
      }
    }
  }
}

/// Result type alias for shipline
pub type ShipResult<T> = Result<T, ShipError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ShipResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ShipResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ShipError>,
{
  fn context(self, ctx: impl Into<String>) -> ShipResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ShipResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ShipError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
