//! Release pipeline: task generation, handlers and run orchestration

pub mod generator;
pub mod handlers;
pub mod orchestrator;
pub mod registry;

pub use generator::generate_tasks;
pub use orchestrator::{RunOrchestrator, RunSummary};
pub use registry::{ExecutorRegistry, HandlerContext, TaskHandler, TaskOutcome};
