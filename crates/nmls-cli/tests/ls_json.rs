//! Integration tests for `nmls ls --json`.
//!
//! These tests create node_modules structures and verify the listing and
//! the exit status.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "nmls-cli", "--bin", "nmls", "--"]);
    for var in ["NMLS_DEPTH", "NMLS_GLOBAL", "NMLS_PREFIX", "NMLS_UNICODE"] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_json(dir: &Path, value: &serde_json::Value) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("package.json"),
        serde_json::to_string_pretty(value).unwrap(),
    )
    .unwrap();
}

/// `foo@1.0.0 -> bar@^1.0.0`, `bar@1.0.0`, `lorem@1.0.0` under the root.
fn create_project(root_manifest: Option<serde_json::Value>) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    if let Some(manifest) = root_manifest {
        write_json(dir.path(), &manifest);
    }

    let node_modules = dir.path().join("node_modules");
    write_json(
        &node_modules.join("foo"),
        &serde_json::json!({ "name": "foo", "version": "1.0.0", "dependencies": { "bar": "^1.0.0" } }),
    );
    write_json(
        &node_modules.join("bar"),
        &serde_json::json!({ "name": "bar", "version": "1.0.0" }),
    );
    write_json(
        &node_modules.join("lorem"),
        &serde_json::json!({ "name": "lorem", "version": "1.0.0" }),
    );
    dir
}

fn ls_json(project: &TempDir, extra: &[&str]) -> (Output, serde_json::Value) {
    let output = cargo_bin()
        .args(["--cwd", project.path().to_str().unwrap(), "ls", "--json"])
        .args(extra)
        .output()
        .expect("Failed to run ls");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Should be valid JSON");
    (output, json)
}

#[test]
fn test_ls_json_clean_tree() {
    let project = create_project(Some(serde_json::json!({
        "name": "test-npm-ls",
        "version": "1.0.0",
        "dependencies": { "foo": "^1.0.0", "lorem": "^1.0.0" }
    })));

    let (output, json) = ls_json(&project, &["--all"]);

    assert!(
        output.status.success(),
        "Should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        json,
        serde_json::json!({
            "name": "test-npm-ls",
            "version": "1.0.0",
            "dependencies": {
                "foo": { "version": "1.0.0", "dependencies": { "bar": { "version": "1.0.0" } } },
                "lorem": { "version": "1.0.0" }
            }
        })
    );
}

#[test]
fn test_ls_json_problems_exit_code() {
    let project = create_project(Some(serde_json::json!({
        "name": "test-npm-ls",
        "version": "1.0.0",
        "dependencies": { "foo": "^2.0.0", "ipsum": "^1.0.0" }
    })));

    let (output, json) = ls_json(&project, &[]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ELSPROBLEMS"), "stderr: {stderr}");

    let problems: Vec<&str> = json["problems"]
        .as_array()
        .expect("problems should be array")
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(problems.len(), 3);
    assert!(problems[0].starts_with("invalid: foo@1.0.0 "));
    assert_eq!(problems[1], "missing: ipsum@^1.0.0, required by test-npm-ls@1.0.0");
    assert!(problems[2].starts_with("extraneous: lorem@1.0.0 "));

    assert_eq!(json["dependencies"]["ipsum"]["missing"], serde_json::json!(true));
    assert_eq!(json["dependencies"]["foo"]["invalid"], serde_json::json!(true));
}

#[test]
fn test_ls_json_missing_root_manifest() {
    let project = create_project(None);

    let (output, json) = ls_json(&project, &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(json.get("name").is_none());
    assert_eq!(json["problems"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["dependencies"]["foo"]["extraneous"], serde_json::json!(true));
}

#[test]
fn test_ls_json_no_match() {
    let project = create_project(Some(serde_json::json!({
        "name": "test-npm-ls",
        "version": "1.0.0",
        "dependencies": { "foo": "^1.0.0", "lorem": "^1.0.0" }
    })));

    let (output, json) = ls_json(&project, &["notadep"]);

    assert_eq!(output.status.code(), Some(1), "no match exits with 1");
    assert_eq!(
        json,
        serde_json::json!({ "name": "test-npm-ls", "version": "1.0.0" })
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("ELSPROBLEMS"));
}

#[test]
fn test_ls_json_parse_error() {
    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("package.json"), "{broken json").unwrap();

    let (output, json) = ls_json(&project, &[]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(json["invalid"], serde_json::json!(true));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("EJSONPARSE"), "stderr: {stderr}");
}

#[test]
fn test_ls_json_empty_location() {
    let project = tempfile::tempdir().unwrap();

    let (output, json) = ls_json(&project, &[]);

    assert!(output.status.success());
    assert_eq!(json, serde_json::json!({}));
}

#[test]
fn test_ls_json_depth_bounds() {
    let project = create_project(Some(serde_json::json!({
        "name": "test-npm-ls",
        "version": "1.0.0",
        "dependencies": { "foo": "^1.0.0", "lorem": "^1.0.0" }
    })));

    let (_, json) = ls_json(&project, &[]);
    assert!(json["dependencies"]["foo"].get("dependencies").is_none());

    let (_, json) = ls_json(&project, &["--depth", "1"]);
    assert_eq!(
        json["dependencies"]["foo"]["dependencies"]["bar"]["version"],
        serde_json::json!("1.0.0")
    );

    // filter terms lift the default depth
    let (output, json) = ls_json(&project, &["bar"]);
    assert!(output.status.success());
    assert!(json["dependencies"].get("lorem").is_none());
    assert_eq!(
        json["dependencies"]["foo"]["dependencies"]["bar"]["version"],
        serde_json::json!("1.0.0")
    );
}

#[test]
fn test_ls_json_missing_optional_is_not_failure() {
    let project = create_project(Some(serde_json::json!({
        "name": "test-npm-ls",
        "version": "1.0.0",
        "dependencies": { "foo": "^1.0.0", "lorem": "^1.0.0" },
        "optionalDependencies": { "missing-optional-dep": "^1.0.0" }
    })));

    let (output, json) = ls_json(&project, &[]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        json["dependencies"]["missing-optional-dep"],
        serde_json::json!({})
    );
}
