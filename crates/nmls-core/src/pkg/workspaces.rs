//! Workspace discovery.
//!
//! Expands the root manifest's `workspaces` globs (`packages/*`, `apps/*`)
//! into packages. Each one becomes a `workspace` edge from the root whose
//! spec is the `file:` path of the workspace directory.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::resolved::relative_path;

/// A discovered workspace package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePackage {
    /// Package name from the workspace's package.json.
    pub name: String,
    pub path: PathBuf,
    /// `file:<path relative to the root>`.
    pub spec: String,
}

/// Expand `patterns` under `root` into workspace packages.
///
/// Directories without a named package.json are skipped. The result is
/// sorted by path and free of duplicates.
#[must_use]
pub fn discover_workspaces(root: &Path, patterns: &[String]) -> Vec<WorkspacePackage> {
    let mut packages: Vec<WorkspacePackage> = Vec::new();

    for pattern in patterns {
        let full_pattern = root.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        let Ok(entries) = glob::glob(&pattern_str) else {
            tracing::debug!(pattern = %pattern, "invalid workspace pattern");
            continue;
        };

        for entry in entries.flatten() {
            if packages.iter().any(|p| p.path == entry) {
                continue;
            }
            if let Some(pkg) = read_workspace_package(root, &entry) {
                packages.push(pkg);
            }
        }
    }

    packages.sort_by(|a, b| a.path.cmp(&b.path));
    packages
}

fn read_workspace_package(root: &Path, dir: &Path) -> Option<WorkspacePackage> {
    if !dir.is_dir() {
        return None;
    }

    let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let package: Value = serde_json::from_str(&content).ok()?;
    let name = package.get("name")?.as_str()?.to_string();

    let relative = relative_path(root, dir)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    Some(WorkspacePackage {
        name,
        path: dir.to_path_buf(),
        spec: format!("file:{relative}"),
    })
}
