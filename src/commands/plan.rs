//! Dry-run planning: preview a window's pipeline without side effects

use crate::core::config::ShipConfig;
use crate::core::error::ShipResult;
use crate::core::plan::{GateSummary, Plan, PlanOp, RepoGate};
use crate::core::store::StateStore;
use crate::core::window::WindowStatus;
use crate::ui::progress::MultiProgress;
use crate::vcs::{RepoRef, SystemGit, VcsGateway};
use rayon::prelude::*;
use std::collections::HashSet;
use std::env;

/// One (iteration, repository) pair to probe, mirroring task generation;
/// the feature branch is the iteration's
struct ProbeTarget {
  repo: RepoRef,
  feature_branch: String,
}

/// Read-only facts gathered from the gateway
struct ProbeResult {
  repo_id: String,
  release_exists: bool,
  feature_exists: bool,
  gate: Option<GateSummary>,
}

/// Run the plan command
pub fn run_plan(window_key: String, json: bool) -> ShipResult<()> {
  let root = env::current_dir()?;
  let config = ShipConfig::load(&root)?;
  let store = StateStore::open(&root)?;

  let window = store.window(&window_key)?;
  let release_branch = config.settings.release_branch(&window_key);

  // Attached iterations in attach order; one probe per (iteration, repo)
  // pair, exactly the shape of the generated task list
  let mut iterations = Vec::new();
  let mut targets: Vec<ProbeTarget> = Vec::new();
  for binding in store.window_bindings(&window_key) {
    let iteration = store.iteration(&binding.iteration_key)?.clone();
    for repo_id in &iteration.repos {
      targets.push(ProbeTarget {
        repo: RepoRef::from_config(config.repo(repo_id)?, &config.settings),
        feature_branch: iteration.feature_branch.clone(),
      });
    }
    iterations.push(iteration);
  }

  // Probes are read-only, so they can run in parallel across pairs
  let gateway = SystemGit;
  let progress = MultiProgress::new();
  let bar = if json || targets.is_empty() {
    None
  } else {
    Some(progress.add_bar(targets.len(), format!("probing {} repos", targets.len())))
  };

  let probes: Vec<ShipResult<ProbeResult>> = targets
    .par_iter()
    .map(|target| {
      let result = probe(&gateway, target, &release_branch);
      if let Some(bar) = &bar {
        progress.inc(bar);
      }
      result
    })
    .collect();
  let probes: Vec<ProbeResult> = probes.into_iter().collect::<ShipResult<_>>()?;

  let plan = assemble_plan(&window_key, window.status, &iterations, &targets, &probes, &release_branch);

  if json {
    println!("{}", plan.to_json()?);
  } else {
    println!("\n{}", plan.to_human_readable());
  }
  Ok(())
}

fn probe(gateway: &SystemGit, target: &ProbeTarget, release_branch: &str) -> ShipResult<ProbeResult> {
  Ok(ProbeResult {
    repo_id: target.repo.id.clone(),
    release_exists: gateway.branch_exists(&target.repo, release_branch)?,
    feature_exists: gateway.branch_exists(&target.repo, &target.feature_branch)?,
    gate: gateway.gate_summary(&target.repo, release_branch)?,
  })
}

fn assemble_plan(
  window_key: &str,
  status: WindowStatus,
  iterations: &[crate::core::iteration::Iteration],
  targets: &[ProbeTarget],
  probes: &[ProbeResult],
  release_branch: &str,
) -> Plan {
  let repo_count = targets.iter().map(|t| t.repo.id.as_str()).collect::<HashSet<_>>().len();
  let mut plan = Plan::new(window_key).with_summary(format!(
    "window is {}; {} iteration(s), {} repository(ies)",
    status,
    iterations.len(),
    repo_count
  ));

  let mut ops = Vec::new();
  for iteration in iterations {
    ops.push(PlanOp::CloseIteration {
      iteration: iteration.key.clone(),
    });
  }

  // `collect` on a parallel iterator preserves input order, so targets and
  // probes line up index for index. The release branch is only created once
  // per repository; the first pair to mention the repo previews it.
  let mut creating: HashSet<&str> = HashSet::new();
  for (target, probe) in targets.iter().zip(probes) {
    if !probe.release_exists && creating.insert(target.repo.id.as_str()) {
      ops.push(PlanOp::CreateReleaseBranch {
        repo: target.repo.id.clone(),
        branch: release_branch.to_string(),
        source: target.repo.default_branch.clone(),
      });
    }

    if probe.feature_exists {
      ops.push(PlanOp::MergeFeature {
        repo: target.repo.id.clone(),
        source: target.feature_branch.clone(),
        target: release_branch.to_string(),
      });
      ops.push(PlanOp::ArchiveFeatureBranch {
        repo: target.repo.id.clone(),
        branch: target.feature_branch.clone(),
      });
    } else {
      ops.push(PlanOp::SkipMerge {
        repo: target.repo.id.clone(),
        missing_branch: target.feature_branch.clone(),
      });
    }

    ops.push(PlanOp::BumpManifestVersion {
      repo: target.repo.id.clone(),
      branch: release_branch.to_string(),
      manifest: target.repo.manifest.clone(),
    });
    ops.push(PlanOp::MergeReleaseToMaster {
      repo: target.repo.id.clone(),
      source: release_branch.to_string(),
      target: target.repo.default_branch.clone(),
    });
    ops.push(PlanOp::CreateTag {
      repo: target.repo.id.clone(),
      r#ref: target.repo.default_branch.clone(),
    });
    ops.push(PlanOp::TriggerPipeline {
      repo: target.repo.id.clone(),
      r#ref: target.repo.default_branch.clone(),
    });
  }

  plan.add_operations(ops);

  let mut gated: HashSet<&str> = HashSet::new();
  plan.gates = probes
    .iter()
    .filter_map(|p| {
      if !gated.insert(p.repo_id.as_str()) {
        return None;
      }
      p.gate.as_ref().map(|gate| RepoGate {
        repo: p.repo_id.clone(),
        branch: release_branch.to_string(),
        gate: gate.clone(),
      })
    })
    .collect();

  plan
}
