//! Common test utilities for orgi integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't read the
//! user's `~/.config/orgi/config.kdl` or inherit `ORGI_FILE`.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with an isolated project and config directory.
///
/// - `project_dir`: working directory of every command (sources, `issues.org`, `.orgi.kdl`)
/// - `config_dir`: stands in for `XDG_CONFIG_HOME`
pub struct TestEnv {
    pub project_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            project_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and run `orgi init`.
    pub fn init() -> Self {
        let env = Self::new();
        env.orgi().arg("init").assert().success();
        env
    }

    /// Get a Command for the orgi binary running inside the project directory.
    pub fn orgi(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_orgi"));
        cmd.current_dir(self.project_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.config_dir.path());
        cmd.env("HOME", self.config_dir.path());
        cmd.env_remove("ORGI_FILE");
        cmd.env_remove("ORGI_LOG");
        cmd
    }

    pub fn path(&self) -> &Path {
        self.project_dir.path()
    }

    /// Write a file below the project directory, creating parents.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).unwrap()
    }

    /// Run a command that must succeed and parse its stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.orgi().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "orgi {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
