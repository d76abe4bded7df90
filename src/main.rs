mod commands;
mod core;
mod merge;
mod pipeline;
mod ui;
mod vcs;

use clap::{Parser, Subcommand};
use core::error::{print_error, ShipError};

/// Orchestrate release windows across many repositories
#[derive(Parser)]
#[command(name = "shipline")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct ShiplineCli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Setup & Inspection
  // ============================================================================
  /// Initialize shipline configuration for a control workspace
  Init {
    /// Overwrite an existing ship.toml
    #[arg(long)]
    force: bool,
  },

  /// Show windows, attached iterations and recent runs
  Status {
    /// Output status in JSON format
    #[arg(long)]
    json: bool,
  },

  // ============================================================================
  // Release Windows
  // ============================================================================
  /// Release window lifecycle (create, publish, close, freeze)
  #[command(subcommand)]
  Window(WindowCommands),

  // ============================================================================
  // Iterations
  // ============================================================================
  /// Iterations and their window bindings
  #[command(subcommand)]
  Iteration(IterationCommands),

  // ============================================================================
  // Runs
  // ============================================================================
  /// Release runs (create, execute, inspect, retry)
  #[command(subcommand)]
  Run(RunCommands),

  // ============================================================================
  // Planning
  // ============================================================================
  /// Preview a window's pipeline without side effects
  Plan {
    /// Window key to plan
    window: String,
    /// Output plan in JSON format (useful for CI/automation)
    #[arg(long)]
    json: bool,
  },
}

#[derive(Subcommand)]
enum WindowCommands {
  /// Create a release window (starts as draft)
  Create {
    /// Window key, e.g. 2026-R3
    key: String,
    /// Display name (defaults to the key)
    #[arg(long)]
    name: Option<String>,
    /// Planned release time, RFC 3339
    #[arg(long)]
    planned_at: Option<String>,
  },

  /// Publish a draft window and batch-merge its attached iterations
  Publish {
    /// Window key
    key: String,
  },

  /// Close a published window (idempotent)
  Close {
    /// Window key
    key: String,
  },

  /// Freeze a window: block iteration attach/detach
  Freeze {
    /// Window key
    key: String,
  },

  /// Unfreeze a window
  Unfreeze {
    /// Window key
    key: String,
  },

  /// List all release windows
  List {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },
}

#[derive(Subcommand)]
enum IterationCommands {
  /// Create an iteration spanning one or more repositories
  Create {
    /// Iteration key, e.g. sprint-42
    key: String,
    /// Display name (defaults to the key)
    #[arg(long)]
    name: Option<String>,
    /// Repository id the iteration touches (repeatable)
    #[arg(long = "repo")]
    repos: Vec<String>,
  },

  /// Attach an iteration to a window (creates and merges release branches)
  Attach {
    /// Window key
    window: String,
    /// Iteration key
    iteration: String,
  },

  /// Detach an iteration from a window (archives release branches)
  Detach {
    /// Window key
    window: String,
    /// Iteration key
    iteration: String,
  },

  /// List all iterations
  List {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },
}

#[derive(Subcommand)]
enum RunCommands {
  /// Create a release run for a published window
  Create {
    /// Window key
    window: String,
    /// Operator recorded on the run (defaults to $USER)
    #[arg(long)]
    operator: Option<String>,
  },

  /// Execute a run's pending tasks sequentially (fail-fast)
  Execute {
    /// Run id, e.g. release::1766480000000
    run_id: String,
  },

  /// List a run's tasks with status and retry counts
  Tasks {
    /// Run id
    run_id: String,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Retry a failed task under a fresh retry run
  Retry {
    /// Task id (see `run tasks`)
    task_id: u64,
    /// Operator recorded on the retry run (defaults to $USER)
    #[arg(long)]
    operator: Option<String>,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = ShiplineCli::parse();

  let result = match cli.command {
    Commands::Init { force } => commands::run_init(force),
    Commands::Status { json } => commands::run_status(json),

    Commands::Window(window_cmd) => match window_cmd {
      WindowCommands::Create { key, name, planned_at } => commands::run_window_create(key, name, planned_at),
      WindowCommands::Publish { key } => commands::run_window_publish(key),
      WindowCommands::Close { key } => commands::run_window_close(key),
      WindowCommands::Freeze { key } => commands::run_window_freeze(key),
      WindowCommands::Unfreeze { key } => commands::run_window_unfreeze(key),
      WindowCommands::List { json } => commands::run_window_list(json),
    },

    Commands::Iteration(iteration_cmd) => match iteration_cmd {
      IterationCommands::Create { key, name, repos } => commands::run_iteration_create(key, name, repos),
      IterationCommands::Attach { window, iteration } => commands::run_iteration_attach(window, iteration),
      IterationCommands::Detach { window, iteration } => commands::run_iteration_detach(window, iteration),
      IterationCommands::List { json } => commands::run_iteration_list(json),
    },

    Commands::Run(run_cmd) => match run_cmd {
      RunCommands::Create { window, operator } => commands::run_run_create(window, operator),
      RunCommands::Execute { run_id } => commands::run_run_execute(run_id),
      RunCommands::Tasks { run_id, json } => commands::run_run_tasks(run_id, json),
      RunCommands::Retry { task_id, operator } => commands::run_run_retry(task_id, operator),
    },

    Commands::Plan { window, json } => commands::run_plan(window, json),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: ShipError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
