//! Dry-run plans: a reviewable, hashable preview of a window's pipeline
//!
//! A `Plan` is built from read-only gateway probes (branch existence, gate
//! summaries) and lists the operations a close run would perform, without
//! side effects. Plans are JSON-serializable for CI review and carry a
//! content-hash id, so the same window state always produces the same plan
//! id.

use crate::core::error::ShipResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Plan identifier (SHA256 hash of plan contents)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
  /// Create a plan ID from plan contents
  pub fn from_contents(contents: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let result = hasher.finalize();
    Self(format!("{:x}", result))
  }

  /// Get the short ID (first 12 characters)
  pub fn short(&self) -> &str {
    &self.0[..12.min(self.0.len())]
  }
}

impl fmt::Display for PlanId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.short())
  }
}

/// One previewed pipeline operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanOp {
  /// Close an iteration
  CloseIteration { iteration: String },

  /// Create the release branch from the repo default branch
  CreateReleaseBranch { repo: String, branch: String, source: String },

  /// Merge the iteration feature branch into the release branch
  MergeFeature { repo: String, source: String, target: String },

  /// Feature branch absent; merge will be skipped and counted as success
  SkipMerge { repo: String, missing_branch: String },

  /// Archive the feature branch after the merge lands
  ArchiveFeatureBranch { repo: String, branch: String },

  /// Strip the pre-release component from the manifest on the release branch
  BumpManifestVersion { repo: String, branch: String, manifest: String },

  /// Merge the release branch back to the default branch
  MergeReleaseToMaster { repo: String, source: String, target: String },

  /// Tag the default branch with the released version
  CreateTag { repo: String, r#ref: String },

  /// Trigger the CI pipeline on the default branch
  TriggerPipeline { repo: String, r#ref: String },
}

/// Branch-protection metadata consulted for planning, never enforced
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateSummary {
  pub approval_required: bool,
  pub pipeline_required: bool,
}

/// Per-repository gate information in a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoGate {
  pub repo: String,
  pub branch: String,
  pub gate: GateSummary,
}

/// A read-only preview of the pipeline a window close would run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
  /// Content hash of the operations
  pub id: PlanId,

  pub window_key: String,

  /// Operations in pipeline order
  pub operations: Vec<PlanOp>,

  /// Gate summaries for the touched repositories (informational)
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub gates: Vec<RepoGate>,

  /// Human-readable summary
  pub summary: String,
}

impl Plan {
  /// Create an empty plan for a window
  pub fn new(window_key: impl Into<String>) -> Self {
    Self {
      id: PlanId::from_contents(&[]),
      window_key: window_key.into(),
      operations: Vec::new(),
      gates: Vec::new(),
      summary: String::new(),
    }
  }

  /// Add an operation to the plan
  pub fn add_operation(&mut self, operation: PlanOp) {
    self.operations.push(operation);
    self.recompute_id();
  }

  /// Add multiple operations (batch)
  pub fn add_operations(&mut self, operations: Vec<PlanOp>) {
    self.operations.extend(operations);
    self.recompute_id();
  }

  /// Set the summary
  pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
    self.summary = summary.into();
    self
  }

  fn recompute_id(&mut self) {
    // Hash the operations only; gates are informational
    let json = serde_json::to_vec(&self.operations).unwrap_or_default();
    self.id = PlanId::from_contents(&json);
  }

  /// Serialize to JSON
  pub fn to_json(&self) -> ShipResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// Deserialize from JSON
  pub fn from_json(json: &str) -> ShipResult<Self> {
    Ok(serde_json::from_str(json)?)
  }

  /// Get human-readable representation
  pub fn to_human_readable(&self) -> String {
    let mut output = String::new();

    output.push_str(&format!("📋 Plan for window '{}' ({})\n", self.window_key, self.id));

    if !self.summary.is_empty() {
      output.push_str(&format!("\n{}\n", self.summary));
    }

    output.push_str(&format!("\n   Operations ({}):\n", self.operations.len()));

    for (i, op) in self.operations.iter().enumerate() {
      output.push_str(&format!("   {}. {}\n", i + 1, operation_to_string(op)));
    }

    if !self.gates.is_empty() {
      output.push_str("\n   Gates:\n");
      for gate in &self.gates {
        output.push_str(&format!(
          "   - {} {}: approval {}, pipeline {}\n",
          gate.repo,
          gate.branch,
          if gate.gate.approval_required { "required" } else { "not required" },
          if gate.gate.pipeline_required { "required" } else { "not required" },
        ));
      }
    }

    output
  }

  pub fn len(&self) -> usize {
    self.operations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.operations.is_empty()
  }
}

/// Convert operation to human-readable string
fn operation_to_string(op: &PlanOp) -> String {
  match op {
    PlanOp::CloseIteration { iteration } => format!("Close iteration '{}'", iteration),
    PlanOp::CreateReleaseBranch { repo, branch, source } => {
      format!("[{}] Create branch {} from {}", repo, branch, source)
    }
    PlanOp::MergeFeature { repo, source, target } => format!("[{}] Merge {} into {}", repo, source, target),
    PlanOp::SkipMerge { repo, missing_branch } => {
      format!("[{}] Skip merge: branch {} does not exist", repo, missing_branch)
    }
    PlanOp::ArchiveFeatureBranch { repo, branch } => format!("[{}] Archive branch {}", repo, branch),
    PlanOp::BumpManifestVersion { repo, branch, manifest } => {
      format!("[{}] Bump {} version on {}", repo, manifest, branch)
    }
    PlanOp::MergeReleaseToMaster { repo, source, target } => format!("[{}] Merge {} into {}", repo, source, target),
    PlanOp::CreateTag { repo, r#ref } => format!("[{}] Tag {}", repo, r#ref),
    PlanOp::TriggerPipeline { repo, r#ref } => format!("[{}] Trigger pipeline on {}", repo, r#ref),
  }
}
