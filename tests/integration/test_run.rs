//! Tests for release runs end to end

use crate::helpers::*;
use anyhow::Result;

fn published_window(env: &TestEnv) -> Result<()> {
  env.add_repo("svc-a")?;
  env.create_feature_branch("svc-a", "sprint-1")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;
  run_shipline(&env.control, &["window", "publish", "2026-R1"])?;
  Ok(())
}

#[test]
fn test_full_release_run() -> Result<()> {
  let env = TestEnv::new()?;
  published_window(&env)?;

  let output = run_shipline(&env.control, &["run", "create", "2026-R1", "--operator", "alice"])?;
  let run_id = extract_run_id(&output.stdout)?;
  assert!(run_id.starts_with("release::"));

  run_shipline(&env.control, &["run", "execute", &run_id])?;

  // pre-release version was stripped on the release branch and merged back
  let manifest = env.show("svc-a", "main", "Cargo.toml")?;
  assert!(manifest.contains("version = \"0.1.0\""), "manifest: {}", manifest);
  // the feature work reached main through the release branch
  let file = env.show("svc-a", "main", "sprint-1.txt")?;
  assert!(file.contains("work for sprint-1"));

  // the released version tags the default branch
  assert!(env.tag_exists("svc-a", "v0.1.0")?);

  // the merged feature branch is archived
  assert!(!env.branch_exists("svc-a", "feature/sprint-1")?);
  assert!(env.branch_exists("svc-a", "archive/released/feature/sprint-1")?);

  // 1 close-iteration task + 5 repo tasks, all terminal and successful
  let output = run_shipline(&env.control, &["run", "tasks", &run_id, "--json"])?;
  let tasks: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  let tasks = tasks.as_array().unwrap();
  assert_eq!(tasks.len(), 6);
  assert!(tasks.iter().all(|t| t["status"] == "completed"));
  let orders: Vec<u64> = tasks.iter().map(|t| t["task_order"].as_u64().unwrap()).collect();
  assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);

  // the iteration was closed by the run
  let state = env.state()?;
  assert_eq!(state["iterations"][0]["status"], "closed");
  assert!(state["runs"][0]["finished_at"].is_string());

  // the run carries its audit trail: one item for the iteration close, one
  // for the repository pipeline with a step per action
  let items = state["runs"][0]["items"].as_array().unwrap();
  assert_eq!(items.len(), 2);
  assert_eq!(items[1]["steps"].as_array().map(|s| s.len()), Some(5));
  assert_eq!(items[1]["final_result"], "success");

  Ok(())
}

#[test]
fn test_shared_repo_archives_each_iterations_feature_branch() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;
  env.create_feature_branch("svc-a", "sprint-1")?;
  env.create_feature_branch("svc-a", "sprint-2")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-1", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "create", "sprint-2", "--repo", "svc-a"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-1"])?;
  run_shipline(&env.control, &["iteration", "attach", "2026-R1", "sprint-2"])?;
  run_shipline(&env.control, &["window", "publish", "2026-R1"])?;

  let output = run_shipline(&env.control, &["run", "create", "2026-R1"])?;
  let run_id = extract_run_id(&output.stdout)?;
  run_shipline(&env.control, &["run", "execute", &run_id])?;

  // 2 close tasks + one full pipeline per (iteration, repo) pair; the
  // second pipeline's repo-level steps are repeat-safe no-ops
  let output = run_shipline(&env.control, &["run", "tasks", &run_id, "--json"])?;
  let tasks: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  let tasks = tasks.as_array().unwrap();
  assert_eq!(tasks.len(), 12);
  assert!(tasks.iter().all(|t| t["status"] == "completed"));

  // both feature branches are archived, not just the first iteration's
  assert!(env.branch_exists("svc-a", "archive/released/feature/sprint-1")?);
  assert!(env.branch_exists("svc-a", "archive/released/feature/sprint-2")?);
  assert!(!env.branch_exists("svc-a", "feature/sprint-1")?);
  assert!(!env.branch_exists("svc-a", "feature/sprint-2")?);

  Ok(())
}

#[test]
fn test_run_requires_published_window() -> Result<()> {
  let env = TestEnv::new()?;
  env.add_repo("svc-a")?;

  run_shipline(&env.control, &["window", "create", "2026-R1"])?;

  let (code, stderr) = run_shipline_err(&env.control, &["run", "create", "2026-R1"])?;
  assert_eq!(code, 3);
  assert!(stderr.contains("draft"), "stderr: {}", stderr);

  Ok(())
}

#[test]
fn test_failed_task_stops_run_and_manual_retry_recovers() -> Result<()> {
  let env = TestEnv::new()?;
  published_window(&env)?;

  // sabotage: drop the release branch so merge-release-to-master fails
  let path = env.repo_path("svc-a");
  git(&path, &["branch", "-D", "release/2026-R1"])?;

  let output = run_shipline(&env.control, &["run", "create", "2026-R1"])?;
  let run_id = extract_run_id(&output.stdout)?;

  let (code, stderr) = run_shipline_err(&env.control, &["run", "execute", &run_id])?;
  assert_eq!(code, 1);
  assert!(stderr.contains("finished with failures"), "stderr: {}", stderr);

  let output = run_shipline(&env.control, &["run", "tasks", &run_id, "--json"])?;
  let tasks: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  let tasks = tasks.as_array().unwrap();

  let failed: Vec<&serde_json::Value> = tasks.iter().filter(|t| t["status"] == "failed").collect();
  assert_eq!(failed.len(), 1);
  assert_eq!(failed[0]["task_type"], "merge_release_to_master");
  // budget from ship.toml (max_retries = 2) is fully consumed
  assert_eq!(failed[0]["retry_count"], 2);

  // fail-fast: tasks after the failure never started
  let pending = tasks.iter().filter(|t| t["status"] == "pending").count();
  assert_eq!(pending, 2);

  // restore the branch, then retry just the failed task
  git(&path, &["branch", "release/2026-R1", "main"])?;
  let task_id = failed[0]["id"].to_string();
  run_shipline(&env.control, &["run", "retry", &task_id])?;

  // the retry ran under a fresh retry run; the failed row is kept
  let state = env.state()?;
  let runs = state["runs"].as_array().unwrap();
  assert_eq!(runs.len(), 2);
  assert_eq!(runs[1]["run_type"], "retry");

  let all_tasks = state["tasks"].as_array().unwrap();
  let retried: Vec<&serde_json::Value> = all_tasks
    .iter()
    .filter(|t| t["task_type"] == "merge_release_to_master")
    .collect();
  assert_eq!(retried.len(), 2);
  assert_eq!(retried[0]["status"], "failed");
  assert_eq!(retried[1]["status"], "completed");
  assert_eq!(retried[1]["retry_count"], 0);

  Ok(())
}

#[test]
fn test_retry_rejected_for_unknown_task() -> Result<()> {
  let env = TestEnv::new()?;

  let (code, stderr) = run_shipline_err(&env.control, &["run", "retry", "999"])?;
  assert_eq!(code, 1);
  assert!(stderr.contains("#999"), "stderr: {}", stderr);

  Ok(())
}
