//! Tests for dry-run planning

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_plan_previews_pipeline_without_side_effects() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;
  env.create_feature_branch("svc-a", "sprint-1")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;

  let output = run_shipline(&env.control, &["plan", "2026-R1", "--json"])?;
  let plan: serde_json::Value = serde_json::from_slice(&output.stdout)?;

  assert_eq!(plan["window_key"], "2026-R1");
  assert!(plan["id"].as_str().is_some());

  let ops = plan["operations"].as_array().unwrap();
  let types: Vec<&str> = ops.iter().map(|op| op["type"].as_str().unwrap()).collect();

  assert_eq!(types[0], "close_iteration");
  // the release branch exists (attach created it), so no create op
  assert!(!types.contains(&"create_release_branch"));
  // the feature branch was merged at attach but still exists, so the plan
  // previews a merge and a subsequent archive
  assert!(types.contains(&"merge_feature"));
  assert!(types.contains(&"archive_feature_branch"));
  assert!(types.contains(&"bump_manifest_version"));
  assert!(types.contains(&"merge_release_to_master"));
  assert!(types.contains(&"create_tag"));
  assert!(types.contains(&"trigger_pipeline"));

  // planning is read-only
  assert!(env.branch_exists("svc-a", "feature/sprint-1")?);
  let state = env.state()?;
  assert_eq!(state["runs"].as_array().map(|r| r.len()), Some(0));

  Ok(())
}

#[test]
fn test_plan_id_is_stable_for_same_state() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;

  let first = run_shipline(&env.control, &["plan", "2026-R1", "--json"])?;
  let second = run_shipline(&env.control, &["plan", "2026-R1", "--json"])?;

  let a: serde_json::Value = serde_json::from_slice(&first.stdout)?;
  let b: serde_json::Value = serde_json::from_slice(&second.stdout)?;
  assert_eq!(a["id"], b["id"]);

  Ok(())
}

#[test]
fn test_plan_marks_missing_feature_branch_as_skip() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;
  // no feature branch

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;

  let output = run_shipline(&env.control, &["plan", "2026-R1", "--json"])?;
  let plan: serde_json::Value = serde_json::from_slice(&output.stdout)?;

  let ops = plan["operations"].as_array().unwrap();
  let types: Vec<&str> = ops.iter().map(|op| op["type"].as_str().unwrap()).collect();

  assert!(types.contains(&"skip_merge"));
  assert!(!types.contains(&"merge_feature"));
  assert!(!types.contains(&"archive_feature_branch"));

  Ok(())
}

#[test]
fn test_plan_for_unknown_window_fails() -> Result<()> {
  let env = TestEnv::new()?;

  let (code, stderr) = run_shipline_err(&env.control, &["plan", "ghost"])?;
  assert_eq!(code, 1);
  assert!(stderr.contains("ghost"), "stderr: {}", stderr);

  Ok(())
}
