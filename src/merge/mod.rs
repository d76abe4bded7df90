//! Cross-repository merge coordination

pub mod coordinator;

pub use coordinator::{BranchOutcome, MergeCoordinator, MergeUnit, DETACH_ARCHIVE_REASON};
