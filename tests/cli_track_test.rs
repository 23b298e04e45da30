//! Integration tests for time tracking via CLI.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_track_status_when_idle() {
    let env = TestEnv::new();

    env.qix()
        .args(["track", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"active\":false"));
    env.qix()
        .args(["-H", "track", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not tracking."));
}

#[test]
fn test_track_start_and_stop() {
    let env = TestEnv::with_project("web");
    let a = env.create_task("web", "A");

    let started = env.json(&["track", "start", "web", &a]);
    assert_eq!(started["session"]["task_id"], a.as_str());
    assert_eq!(started["session"]["path"], "web");

    let status = env.json(&["track", "status"]);
    assert_eq!(status["active"], true);
    assert!(env.data_path().join("tracking.json").is_file());

    let stopped = env.json(&["track", "stop"]);
    assert_eq!(stopped["task_id"], a.as_str());
    assert_eq!(env.json(&["track", "status"])["active"], false);
}

#[test]
fn test_track_start_twice_requires_switch() {
    let env = TestEnv::with_project("web");
    let a = env.create_task("web", "A");
    let b = env.create_task("web", "B");

    env.qix().args(["track", "start", "web", &a]).assert().success();
    env.qix()
        .args(["track", "start", "web", &b])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Active session already exists"));

    let started = env.json(&["track", "start", "web", &b, "--switch"]);
    assert_eq!(started["stopped"]["task_id"], a.as_str());
    assert_eq!(started["session"]["task_id"], b.as_str());
}

#[test]
fn test_track_switch_when_idle_just_starts() {
    let env = TestEnv::with_project("web");
    let a = env.create_task("web", "A");

    let started = env.json(&["track", "switch", "web", &a]);
    assert!(started.get("stopped").is_none());
    assert_eq!(started["session"]["task_id"], a.as_str());
}

#[test]
fn test_track_start_in_module() {
    let env = TestEnv::with_project("web");
    env.qix().args(["module", "create", "web/api"]).assert().success();
    let a = env.create_task("web/api", "Endpoint");

    env.qix()
        .args(["track", "start", "web/api", &a])
        .assert()
        .success();
    env.qix().args(["track", "stop"]).assert().success();
}

#[test]
fn test_track_start_unknown_task_fails() {
    let env = TestEnv::with_project("web");

    env.qix()
        .args(["track", "start", "web", "deadbeef"])
        .assert()
        .failure();
    assert_eq!(env.json(&["track", "status"])["active"], false);
}

#[test]
fn test_track_stop_without_session_fails() {
    let env = TestEnv::new();

    env.qix()
        .args(["-H", "track", "stop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No active tracking session"));
}

#[test]
fn test_track_stop_discard_logs_nothing() {
    let env = TestEnv::with_project("web");
    let a = env.create_task("web", "A");
    env.qix().args(["track", "start", "web", &a]).assert().success();

    let stopped = env.json(&["track", "stop", "--discard"]);
    assert_eq!(stopped["logged"], false);

    let shown = env.json(&["task", "show", &a]);
    assert_eq!(shown["task"]["time_entries"].as_array().unwrap().len(), 0);
    assert_eq!(env.json(&["track", "list"])["count"], 0);
}

#[test]
fn test_track_log_includes_manual_entries() {
    let env = TestEnv::with_project("web");
    let a = env.create_task("web", "A");
    env.qix()
        .args(["task", "time", &a, "2", "--date", "2026-03-02"])
        .assert()
        .success();

    let log = env.json(&["track", "log", "--date", "2026-03-02"]);
    assert_eq!(log["entries"].as_array().unwrap().len(), 1);
    assert_eq!(log["entries"][0]["task_title"], "A");
    assert_eq!(log["total_hours"], 2.0);

    let other_day = env.json(&["track", "log", "--date", "2026-03-03"]);
    assert_eq!(other_day["total_hours"], 0.0);
}
