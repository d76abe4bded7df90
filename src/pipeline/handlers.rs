//! Built-in handlers for the six pipeline task types
//!
//! Handlers return `Err` only for outcomes worth retrying; "already done"
//! and "nothing to do" are successes with a note. Merge conflicts inside the
//! pipeline are reported as errors so they consume the retry budget and
//! surface as a Failed task for manual resolution.

use crate::core::error::{ShipError, ShipResult};
use crate::core::iteration::IterationStatus;
use crate::core::run::RunTask;
use crate::pipeline::registry::{HandlerContext, TaskHandler};
use crate::vcs::{MergeStatus, RepoRef};
use semver::Version;
use toml_edit::DocumentMut;

/// Archive reason recorded when a merged feature branch is retired
const RELEASE_ARCHIVE_REASON: &str = "released";

fn repo_ref(ctx: &HandlerContext<'_>, repo_id: &str) -> ShipResult<RepoRef> {
  let repo = ctx.config.repo(repo_id)?;
  Ok(RepoRef::from_config(repo, &ctx.config.settings))
}

fn release_branch(ctx: &HandlerContext<'_>) -> String {
  ctx.config.settings.release_branch(&ctx.window_key)
}

/// Feature branch of the iteration a repo task belongs to
fn feature_branch(ctx: &HandlerContext<'_>, task: &RunTask) -> ShipResult<String> {
  let iteration_key = task
    .iteration_key
    .as_deref()
    .ok_or_else(|| ShipError::message(format!("task #{} has no iteration", task.id)))?;
  let store = ctx.store.lock().unwrap();
  Ok(store.iteration(iteration_key)?.feature_branch.clone())
}

/// Marks the target iteration closed
pub struct CloseIterationHandler;

impl TaskHandler for CloseIterationHandler {
  fn execute(&self, task: &RunTask, ctx: &HandlerContext<'_>) -> ShipResult<Option<String>> {
    let mut store = ctx.store.lock().unwrap();
    let iteration = store.iteration_mut(&task.target_id)?;
    iteration.status = IterationStatus::Closed;
    Ok(Some(format!("iteration '{}' closed", task.target_id)))
  }
}

/// Archives the merged feature branch; an already-absent branch is done
pub struct ArchiveFeatureBranchHandler;

impl TaskHandler for ArchiveFeatureBranchHandler {
  fn execute(&self, task: &RunTask, ctx: &HandlerContext<'_>) -> ShipResult<Option<String>> {
    let repo = repo_ref(ctx, &task.target_id)?;
    let branch = feature_branch(ctx, task)?;

    match ctx.gateway.archive_branch(&repo, &branch, RELEASE_ARCHIVE_REASON)? {
      true => Ok(Some(format!("archived '{}'", branch))),
      false => Err(ShipError::message(format!("archival of '{}' was refused", branch))),
    }
  }
}

/// Strips the pre-release/build component from the manifest version on the
/// release branch and commits the result
pub struct UpdateManifestVersionHandler;

impl TaskHandler for UpdateManifestVersionHandler {
  fn execute(&self, task: &RunTask, ctx: &HandlerContext<'_>) -> ShipResult<Option<String>> {
    let repo = repo_ref(ctx, &task.target_id)?;
    let branch = release_branch(ctx);

    let Some(content) = ctx.gateway.read_file(&repo, &branch, &repo.manifest)? else {
      return Ok(Some(format!("no {} on '{}', nothing to bump", repo.manifest, branch)));
    };

    // Lossless edit: only the version value changes, formatting survives
    let mut doc: DocumentMut = content.parse()?;
    let Some(current) = doc.get("package").and_then(|p| p.get("version")).and_then(|v| v.as_str()) else {
      return Ok(Some(format!("{} has no package.version, nothing to bump", repo.manifest)));
    };

    let version: Version = current.parse()?;
    if version.pre.is_empty() && version.build.is_empty() {
      return Ok(Some(format!("version {} is already a release version", version)));
    }

    let released = Version::new(version.major, version.minor, version.patch);
    doc["package"]["version"] = toml_edit::value(released.to_string());

    let message = format!("Set version to {}", released);
    if !ctx.gateway.commit_file(&repo, &branch, &repo.manifest, &doc.to_string(), &message)? {
      return Err(ShipError::message(format!("commit of {} on '{}' was refused", repo.manifest, branch)));
    }

    Ok(Some(format!("version {} -> {}", version, released)))
  }
}

/// Merges the release branch back into the repository default branch
///
/// A conflict here cannot be resolved automatically; it is raised as an
/// error so the task ends up Failed and addressable by a manual retry.
pub struct MergeReleaseToMasterHandler;

impl TaskHandler for MergeReleaseToMasterHandler {
  fn execute(&self, task: &RunTask, ctx: &HandlerContext<'_>) -> ShipResult<Option<String>> {
    let repo = repo_ref(ctx, &task.target_id)?;
    let source = release_branch(ctx);
    let target = &repo.default_branch;
    let message = format!("Merge {} into {}", source, target);

    let result = ctx.gateway.merge_branch(&repo, &source, target, &message)?;
    match result.status {
      MergeStatus::Success => Ok(Some(format!("merged '{}' into '{}'", source, target))),
      MergeStatus::Conflict => Err(ShipError::message(format!(
        "merge of '{}' into '{}' conflicts: {}",
        source,
        target,
        result.conflict_info.unwrap_or_default()
      ))),
      MergeStatus::Failed => Err(ShipError::message(format!(
        "merge of '{}' into '{}' failed: {}",
        source,
        target,
        result.conflict_info.unwrap_or_default()
      ))),
    }
  }
}

/// Tags the default branch with the released manifest version
pub struct CreateTagHandler;

impl TaskHandler for CreateTagHandler {
  fn execute(&self, task: &RunTask, ctx: &HandlerContext<'_>) -> ShipResult<Option<String>> {
    let repo = repo_ref(ctx, &task.target_id)?;
    let r#ref = repo.default_branch.clone();

    // Tag name comes from the manifest; the window key is the fallback when
    // the repository carries no readable version
    let tag = match manifest_version(ctx, &repo, &r#ref)? {
      Some(version) => format!("v{}", version),
      None => ctx.window_key.clone(),
    };

    let message = format!("Release window {}", ctx.window_key);
    match ctx.gateway.create_tag(&repo, &tag, &r#ref, &message)? {
      true => Ok(Some(format!("tagged '{}' as {}", r#ref, tag))),
      false => Err(ShipError::message(format!("tag '{}' was refused", tag))),
    }
  }
}

fn manifest_version(ctx: &HandlerContext<'_>, repo: &RepoRef, r#ref: &str) -> ShipResult<Option<Version>> {
  let Some(content) = ctx.gateway.read_file(repo, r#ref, &repo.manifest)? else {
    return Ok(None);
  };
  let doc: DocumentMut = content.parse()?;
  let Some(raw) = doc.get("package").and_then(|p| p.get("version")).and_then(|v| v.as_str()) else {
    return Ok(None);
  };
  Ok(Some(raw.parse()?))
}

/// Triggers the CI pipeline on the default branch; a backend with no
/// pipeline configured is a success
pub struct TriggerCiBuildHandler;

impl TaskHandler for TriggerCiBuildHandler {
  fn execute(&self, task: &RunTask, ctx: &HandlerContext<'_>) -> ShipResult<Option<String>> {
    let repo = repo_ref(ctx, &task.target_id)?;

    match ctx.gateway.trigger_pipeline(&repo, &repo.default_branch)? {
      Some(pipeline_id) => Ok(Some(format!("pipeline {} triggered", pipeline_id))),
      None => Ok(Some("no pipeline configured".to_string())),
    }
  }
}
