//! Tests for attaching and detaching iterations

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_attach_creates_release_branch_and_merges_feature() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;
  env.create_feature_branch("svc-a", "sprint-1")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;

  assert!(env.branch_exists("svc-a", "release/2026-R1")?);
  // the feature commit landed on the release branch
  let file = env.show("svc-a", "release/2026-R1", "sprint-1.txt")?;
  assert!(file.contains("work for sprint-1"));
  // main is untouched until the run merges back
  assert!(env.show("svc-a", "main", "sprint-1.txt").is_err());

  let state = env.state()?;
  assert_eq!(state["bindings"][0]["window_key"], "2026-R1");
  assert_eq!(state["bindings"][0]["iteration_key"], "sprint-1");
  assert_eq!(state["bindings"][0]["release_branch"], "release/2026-R1");

  Ok(())
}

#[test]
fn test_attach_without_feature_branch_is_skipped_success() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-b")?;
  // no feature branch for sprint-2

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-2", "--repo", "svc-b"])?;
  let output = run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-2"])?;

  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("merge skipped"), "stdout: {}", stdout);

  // the release branch is still cut from main
  assert!(env.branch_exists("svc-b", "release/2026-R1")?);

  Ok(())
}

#[test]
fn test_detach_archives_release_branch_and_removes_binding() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;
  env.create_feature_branch("svc-a", "sprint-1")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;
  run_shipline(&env.control, &["iteration", "detach", "2026-R1", "sprint-1"])?;

  assert!(!env.branch_exists("svc-a", "release/2026-R1")?);
  assert!(env.branch_exists("svc-a", "archive/unpublished/release/2026-R1")?);

  let state = env.state()?;
  assert_eq!(state["bindings"].as_array().map(|b| b.len()), Some(0));

  Ok(())
}

#[test]
fn test_detach_without_binding_is_not_found() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;

  let (code, stderr) = run_shipline_err(&env.control, &["iteration", "detach", "2026-R1", "sprint-1"])?;
  assert_eq!(code, 1);
  assert!(stderr.contains("not attached"), "stderr: {}", stderr);

  Ok(())
}

#[test]
fn test_iteration_requires_registered_repo() -> Result<()> {
  let env = TestEnv::new()?;

  let (code, stderr) = run_shipline_err(&env.control, &["iteration", "create", "sprint-1", "--repo", "ghost"])?;
  assert_eq!(code, 1);
  assert!(stderr.contains("ghost"), "stderr: {}", stderr);

  Ok(())
}

#[test]
fn test_publish_batch_merges_every_attached_iteration() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;
  env.add_repo("svc-b")?;
  env.create_feature_branch("svc-a", "sprint-1")?;
  env.create_feature_branch("svc-b", "sprint-2")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-2", "--repo", "svc-b"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-2"])?;

  // extra feature work after attach; publish picks it up
  let path = env.repo_path("svc-a");
  git(&path, &["checkout", "feature/sprint-1"])?;
  std::fs::write(path.join("late.txt"), "late work\n")?;
  git(&path, &["add", "."])?;
  git(&path, &["commit", "-m", "Late work"])?;
  git(&path, &["checkout", "main"])?;

  run_shipline(&env.control, &["window", "publish", "2026-R1"])?;

  let late = env.show("svc-a", "release/2026-R1", "late.txt")?;
  assert!(late.contains("late work"));
  let other = env.show("svc-b", "release/2026-R1", "sprint-2.txt")?;
  assert!(other.contains("work for sprint-2"));

  Ok(())
}
