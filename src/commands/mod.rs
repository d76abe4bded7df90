//! CLI commands for shipline
//!
//! This module contains all user-facing command implementations:
//!
//! ## Setup & Inspection
//! - **init**: Initialize ship.toml configuration for a control workspace
//! - **status**: Show windows, attached iterations and recent runs
//!
//! ## Release Windows
//! - **window**: Lifecycle commands (create, publish, close, freeze, unfreeze, list)
//!
//! ## Iterations
//! - **iteration**: Create iterations, attach/detach them to windows
//!
//! ## Runs
//! - **run**: Create, execute, inspect and retry release runs
//!
//! ## Planning
//! - **plan**: Dry-run preview of a window's pipeline, no side effects

pub mod init;
pub mod iteration;
pub mod plan;
pub mod run;
pub mod status;
pub mod window;

pub use init::run_init;
pub use iteration::{run_iteration_attach, run_iteration_create, run_iteration_detach, run_iteration_list};
pub use plan::run_plan;
pub use run::{run_run_create, run_run_execute, run_run_retry, run_run_tasks};
pub use status::run_status;
pub use window::{run_window_close, run_window_create, run_window_freeze, run_window_list, run_window_publish, run_window_unfreeze};
