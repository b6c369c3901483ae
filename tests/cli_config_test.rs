//! Integration tests for configuration resolution.
//!
//! These tests verify precedence through the CLI:
//! `--file` > `ORGI_FILE` > project `.orgi.kdl` > system `config.kdl` > defaults.

mod common;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_config_show_defaults() {
    let env = TestEnv::new();

    let config = env.json(&["config", "show"]);
    assert_eq!(config["org_file"]["value"], "issues.org");
    assert_eq!(config["org_file"]["source"], "default");
    assert_eq!(config["backup_retention"]["value"], 10);
    assert_eq!(config["output_format"]["value"], "json");
}

#[test]
fn test_project_config_is_used() {
    let env = TestEnv::new();
    env.write(".orgi.kdl", "org-file \"docs/todo.org\"\noutput-format \"human\"\n");

    env.orgi()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docs/todo.org (project)"))
        .stdout(predicate::str::contains("human (project)"));

    env.orgi().args(["add", "Routed"]).assert().success();
    assert!(env.read("docs/todo.org").contains("* TODO Routed"));
}

#[test]
fn test_system_config_is_used() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.config_dir.path().join("orgi")).unwrap();
    std::fs::write(
        env.config_dir.path().join("orgi").join("config.kdl"),
        "backup-retention 3\n",
    )
    .unwrap();

    let config = env.json(&["config", "show"]);
    assert_eq!(config["backup_retention"]["value"], 3);
    assert_eq!(config["backup_retention"]["source"], "system");
}

#[test]
fn test_env_and_flag_precedence() {
    let env = TestEnv::new();
    env.write(".orgi.kdl", "org-file \"project.org\"\n");

    let output = env
        .orgi()
        .env("ORGI_FILE", "env.org")
        .args(["config", "show"])
        .output()
        .unwrap();
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["org_file"]["value"], "env.org");
    assert_eq!(config["org_file"]["source"], "env:ORGI_FILE");

    let output = env
        .orgi()
        .env("ORGI_FILE", "env.org")
        .args(["--file", "flag.org", "config", "show"])
        .output()
        .unwrap();
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["org_file"]["value"], "flag.org");
    assert_eq!(config["org_file"]["source"], "cli");
}

#[test]
fn test_invalid_project_config_fails() {
    let env = TestEnv::new();
    env.write(".orgi.kdl", "backup-retention 0\n");

    env.orgi()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config error"));
}

#[test]
fn test_verbose_logs_to_stderr_only() {
    let env = TestEnv::init();

    env.orgi()
        .args(["-v", "list"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"))
        .stderr(predicate::str::contains("resolved configuration"));
}
