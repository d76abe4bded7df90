//! Tests for the window lifecycle commands

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_window_create_starts_as_draft() -> Result<()> {
  let env = TestEnv::new()?;

  run_shipline(&env.control, &["window", "create", "2026-R1", "--name", "Q1 release"])?;

  let output = run_shipline(&env.control, &["window", "list", "--json"])?;
  let rows: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(rows[0]["key"], "2026-R1");
  assert_eq!(rows[0]["status"], "draft");
  assert_eq!(rows[0]["frozen"], false);

  Ok(())
}

#[test]
fn test_duplicate_window_key_rejected() -> Result<()> {
  let env = TestEnv::new()?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  let (_, stderr) = run_shipline_err(&env.control, &["window", "create", "2026-R1"])?;
  assert!(stderr.contains("already exists"), "stderr: {}", stderr);

  Ok(())
}

#[test]
fn test_publish_requires_an_attached_iteration() -> Result<()> {
  let env = TestEnv::new()?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  let (code, stderr) = run_shipline_err(&env.control, &["window", "publish", "2026-R1"])?;

  // state-conflict errors exit with the validation code
  assert_eq!(code, 3, "stderr: {}", stderr);
  assert!(stderr.contains("no attached iterations"), "stderr: {}", stderr);

  Ok(())
}

#[test]
fn test_close_requires_published_and_is_idempotent() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;
  env.create_feature_branch("svc-a", "sprint-1")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;

  // closing a draft window is an illegal transition
  let (code, stderr) = run_shipline_err(&env.control, &["window", "close", "2026-R1"])?;
  assert_eq!(code, 3);
  assert!(stderr.contains("draft"), "stderr: {}", stderr);

  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;
  run_shipline(&env.control, &["window", "publish", "2026-R1"])?;

  run_shipline(&env.control, &["window", "close", "2026-R1"])?;
  // second close is a no-op, not an error
  run_shipline(&env.control, &["window", "close", "2026-R1"])?;

  let output = run_shipline(&env.control, &["window", "list", "--json"])?;
  let rows: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(rows[0]["status"], "closed");

  Ok(())
}

#[test]
fn test_freeze_blocks_attach_and_detach() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;
  env.create_feature_branch("svc-a", "sprint-1")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["window", "freeze", "2026-R1"])?;

  let (code, stderr) = run_shipline_err(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;
  assert_eq!(code, 3);
  assert!(stderr.contains("frozen"), "stderr: {}", stderr);

  // unfreeze lifts the block
  run_shipline(&env.control, &["window", "unfreeze", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;

  run_shipline(&env.control, &["window", "freeze", "2026-R1"])?;
  let (code, _) = run_shipline_err(&env.control, &["iteration", "detach", "2026-R1", "sprint-1"])?;
  assert_eq!(code, 3);

  Ok(())
}

#[test]
fn test_invalid_window_key_rejected() -> Result<()> {
  let env = TestEnv::new()?;

  let (code, stderr) = run_shipline_err(&env.control, &["window", "create", "bad key"])?;
  assert_eq!(code, 1);
  assert!(stderr.contains("Invalid window key"), "stderr: {}", stderr);

  Ok(())
}
