//! Integration tests for manual issue commands.
//!
//! These tests verify `orgi add/list/show/state` through the CLI:
//! - issues are appended to the org document with an ID and CREATED stamp
//! - filters by state and tag work
//! - JSON and human-readable output formats are correct

mod common;

use common::TestEnv;
use predicates::prelude::*;

// === Add Tests ===

#[test]
fn test_add_json() {
    let env = TestEnv::init();

    env.orgi()
        .args(["add", "My first issue"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\":\"orgi-"))
        .stdout(predicate::str::contains("\"title\":\"My first issue\""))
        .stdout(predicate::str::contains("\"state\":\"todo\""));

    let doc = env.read("issues.org");
    assert!(doc.starts_with("#+TITLE: Issues\n"));
    assert!(doc.contains("* TODO My first issue\n:PROPERTIES:\n:ID: orgi-"));
    assert!(doc.contains(":CREATED: ["));
}

#[test]
fn test_add_with_options_then_show() {
    let env = TestEnv::init();

    let created = env.json(&[
        "add",
        "Priority issue",
        "-p",
        "A",
        "-t",
        "backend",
        "-t",
        "investigation",
        "-d",
        "This issue needs investigation",
    ]);
    let id = created["issue"]["id"].as_str().unwrap().to_string();

    let shown = env.json(&["show", &id]);
    assert_eq!(shown["issue"]["priority"], "A");
    assert_eq!(
        shown["issue"]["tags"],
        serde_json::json!(["backend", "investigation"])
    );
    assert_eq!(
        shown["issue"]["description"],
        "This issue needs investigation"
    );
}

#[test]
fn test_add_human() {
    let env = TestEnv::init();

    env.orgi()
        .args(["-H", "add", "Readable", "-p", "b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created orgi-"))
        .stdout(predicate::str::contains("TODO [#B] Readable"));
}

#[test]
fn test_add_invalid_priority_fails() {
    let env = TestEnv::init();

    env.orgi()
        .args(["add", "Bad", "-p", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid priority"));
}

#[test]
fn test_add_creates_missing_document() {
    let env = TestEnv::new();

    env.orgi()
        .args(["--file", "notes/todo.org", "add", "Elsewhere"])
        .assert()
        .success();
    assert!(env.read("notes/todo.org").contains("* TODO Elsewhere"));
}

// === List / State Tests ===

#[test]
fn test_list_filters() {
    let env = TestEnv::init();
    let first = env.json(&["add", "One", "-t", "ui"]);
    env.json(&["add", "Two"]);
    let id = first["issue"]["id"].as_str().unwrap().to_string();

    assert_eq!(env.json(&["list"])["count"], 2);
    assert_eq!(env.json(&["list", "--tag", "ui"])["count"], 1);

    env.orgi().args(["state", &id, "done"]).assert().success();
    let done = env.json(&["list", "--state", "done"]);
    assert_eq!(done["count"], 1);
    assert_eq!(done["issues"][0]["id"], id.as_str());
    assert!(env.read("issues.org").contains("* DONE One"));
}

#[test]
fn test_list_empty_human() {
    let env = TestEnv::init();

    env.orgi()
        .args(["-H", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues."));
}

#[test]
fn test_state_unknown_value_fails() {
    let env = TestEnv::init();
    let created = env.json(&["add", "One"]);
    let id = created["issue"]["id"].as_str().unwrap().to_string();

    env.orgi()
        .args(["state", &id, "waiting"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown state"));
}

#[test]
fn test_show_unknown_id_fails() {
    let env = TestEnv::init();

    env.orgi()
        .args(["show", "orgi-ffff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("orgi-ffff"));
}

#[test]
fn test_list_malformed_document_fails() {
    let env = TestEnv::new();
    env.write("issues.org", "* TODO Broken\n:PROPERTIES:\n:ID: x\n");

    env.orgi()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}
