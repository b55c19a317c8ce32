//! Integration tests for the human and parseable `nmls ls` output.

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

fn write_pkg(dir: &Path, json: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("package.json"), json).unwrap();
}

fn create_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_pkg(
        root,
        r#"{"name":"test-npm-ls","version":"1.0.0","dependencies":{"foo":"^1.0.0","lorem":"^1.0.0"}}"#,
    );
    write_pkg(
        &root.join("node_modules/foo"),
        r#"{"name":"foo","version":"1.0.0","description":"the foo","dependencies":{"bar":"^1.0.0"}}"#,
    );
    write_pkg(&root.join("node_modules/bar"), r#"{"name":"bar","version":"1.0.0"}"#);
    write_pkg(&root.join("node_modules/lorem"), r#"{"name":"lorem","version":"1.0.0"}"#);
    dir
}

fn ls(cwd: &Path, args: &[&str]) -> Output {
    cargo_bin()
        .args(["--cwd", cwd.to_str().unwrap(), "ls"])
        .args(args)
        .output()
        .expect("Failed to run ls")
}

#[test]
fn test_tree_output() {
    let project = create_project();
    let output = ls(project.path(), &["--all", "--unicode"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();

    assert!(lines[0].starts_with("test-npm-ls@1.0.0 "));
    assert_eq!(&lines[1..], ["├─┬ foo@1.0.0", "│ └── bar@1.0.0", "└── lorem@1.0.0"]);
}

#[test]
fn test_tree_output_ascii_depth_zero() {
    let project = create_project();
    let output = ls(project.path(), &[]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(&lines[1..], ["+-- foo@1.0.0", "`-- lorem@1.0.0"]);
}

#[test]
fn test_tree_output_empty_filter() {
    let project = create_project();
    let output = ls(project.path(), &["notadep"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.ends_with("`-- (empty)\n"), "stdout: {stdout}");
}

#[test]
fn test_tree_output_dot_filter_missing_dep() {
    let project = create_project();
    write_pkg(
        project.path(),
        r#"{"name":"test-npm-ls","version":"1.0.0","dependencies":{"foo":"^1.0.0","lorem":"^1.0.0","absent":"^1.0.0"}}"#,
    );
    let output = ls(project.path(), &["."]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("UNMET DEPENDENCY absent@^1.0.0"));
    assert!(!stdout.contains("bar@"));
}

#[test]
fn test_parseable_output() {
    let project = create_project();
    let output = ls(project.path(), &["--all", "--parseable"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], project.path().display().to_string());
    assert!(lines[2].ends_with("bar"));
}

#[test]
fn test_parseable_long_output() {
    let project = create_project();
    write_pkg(
        project.path(),
        r#"{"name":"test-npm-ls","version":"1.0.0","dependencies":{"foo":"^2.0.0"}}"#,
    );
    let output = ls(project.path(), &["--parseable", "--long"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|l| l.ends_with(":foo@1.0.0:INVALID")));
    assert!(stdout.lines().any(|l| l.ends_with(":lorem@1.0.0:EXTRANEOUS")));
}

#[test]
fn test_long_descriptions() {
    let project = create_project();
    let output = ls(project.path(), &["--long"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("the foo"));
}

#[test]
fn test_global_listing() {
    let prefix = tempfile::tempdir().unwrap();
    let global_dir = prefix.path().join("lib").join("node_modules");
    write_pkg(&global_dir.join("a"), r#"{"name":"a","version":"1.0.0"}"#);
    write_pkg(&global_dir.join("b"), r#"{"name":"b","version":"1.0.0"}"#);

    let output = ls(
        prefix.path(),
        &["--global", "--global-dir", global_dir.to_str().unwrap(), "--unicode"],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("├── a@1.0.0"));
    assert!(stdout.contains("└── b@1.0.0"));
    assert!(!stdout.contains("extraneous"));
}

#[cfg(unix)]
#[test]
fn test_workspaces_listed_as_links() {
    let project = tempfile::tempdir().unwrap();
    let root = project.path();
    write_pkg(
        root,
        r#"{"name":"workspaces-tree","version":"1.0.0","workspaces":["./a"]}"#,
    );
    write_pkg(&root.join("a"), r#"{"name":"a","version":"1.0.0"}"#);
    std::fs::create_dir_all(root.join("node_modules")).unwrap();
    std::os::unix::fs::symlink("../a", root.join("node_modules/a")).unwrap();

    let output = ls(root, &["--unicode"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("└── a@1.0.0 -> ./a"), "stdout: {stdout}");
}

#[test]
fn test_invalid_term_is_error() {
    let project = create_project();
    let output = ls(project.path(), &["@"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("EINVALIDTERM"), "stderr: {stderr}");
}
