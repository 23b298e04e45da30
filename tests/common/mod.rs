//! Common test utilities for qix integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's `~/.qix` directory.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;
pub use tempfile::TempDir;

/// A test environment with an isolated data directory.
///
/// The `qix()` method returns a `Command` that sets `QIX_DIR` per
/// invocation, making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create an environment with one empty project.
    pub fn with_project(name: &str) -> Self {
        let env = Self::new();
        env.qix().args(["project", "create", name]).assert().success();
        env
    }

    /// Get a Command for the qix binary with an isolated data directory.
    pub fn qix(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_qix"));
        cmd.env("QIX_DIR", self.data_dir.path());
        cmd.env_remove("QIX_LOG_LEVEL");
        cmd.env_remove("QIX_LOG_FILE");
        cmd.env_remove("JIRA_BASE_URL");
        cmd
    }

    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    /// Run a command that must succeed and parse its JSON output.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.qix().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "qix {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("Failed to parse JSON output")
    }

    /// Create a task and return its ID.
    pub fn create_task(&self, path: &str, title: &str) -> String {
        let value = self.json(&["task", "create", path, title]);
        value["id"].as_str().expect("No id in output").to_string()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
