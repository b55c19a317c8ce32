//! Tree loading from an installed `node_modules` layout.
//!
//! Loading happens in three passes:
//! 1. scan: walk `node_modules` directories breadth-first, reading sibling
//!    manifests in parallel and inserting them into the arena in name order
//! 2. edges: project each manifest's dependency blocks into edges
//! 3. resolve: point every edge at the node found by the nearest
//!    `node_modules` walk
//!
//! Symlinked packages keep the link location as `path` and load their
//! children from the target. Links never re-enter a directory that was
//! already expanded, which cuts symlink loops; a link whose target was
//! expanded elsewhere resolves its dependencies through that expansion.

use rayon::prelude::*;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::lockfile::{read_lockfile, Lockfile};
use super::manifest::{read_manifest, Manifest, ManifestCache, MemoryManifestCache};
use super::resolved::{self, relative_path};
use super::tree::{DepType, Edge, EdgeRef, NodeId, PackageNode, PackageTree};
use super::workspaces::{discover_workspaces, WorkspacePackage};
use crate::error::Error;

/// Options for [`load_tree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Load a global install: the root has no manifest and every
    /// top-level entry is a direct dependency.
    pub global: bool,
}

/// Result of a load. The tree is always present; `error` is set when the
/// root manifest or the root `node_modules` folder could not be read, in
/// which case only the root exists.
#[derive(Debug)]
pub struct LoadedTree {
    pub tree: PackageTree,
    pub error: Option<Error>,
}

/// Load the tree rooted at `root`.
///
/// In global mode `root` is the directory containing the global
/// `node_modules` folder.
#[must_use]
pub fn load_tree(root: &Path, options: LoadOptions) -> LoadedTree {
    load_tree_with_cache(root, options, &MemoryManifestCache::new())
}

/// [`load_tree`] with a manifest cache.
#[must_use]
pub fn load_tree_with_cache(
    root: &Path,
    options: LoadOptions,
    cache: &dyn ManifestCache,
) -> LoadedTree {
    let mut root_node = PackageNode::new(root.to_path_buf());
    root_node.realpath = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

    let mut root_manifest = None;
    if !options.global {
        match read_manifest(root, cache) {
            Ok(value) => {
                let manifest = Manifest::from_value(&value);
                root_node.package_name.clone_from(&manifest.name);
                root_node.name = manifest.name.clone().or_else(|| base_name(root));
                root_node.version.clone_from(&manifest.version);
                root_node.manifest = Some(value);
                root_manifest = Some(manifest);
            }
            Err(Error::ManifestNotFound { .. }) => {
                tracing::debug!(root = %root.display(), "no root package.json");
            }
            Err(err) => {
                tracing::debug!(root = %root.display(), error = %err, "root package.json unreadable");
                return failed_load(PackageTree::new(root_node), "Failed to parse root package.json", err);
            }
        }
    }

    let mut tree = PackageTree::new(root_node);
    tree.global = options.global;

    let lockfile = if options.global {
        None
    } else {
        read_lockfile(root)
    };
    tree.lockfile = lockfile.as_ref().is_some_and(Lockfile::is_authoritative);

    let shared = match scan(&mut tree, cache) {
        Ok(shared) => shared,
        Err(e) => {
            tracing::debug!(root = %root.display(), error = %e, "root node_modules unreadable");
            return failed_load(tree, "Failed to read node_modules", Error::Io(e));
        }
    };
    apply_origins(&mut tree, lockfile.as_ref());
    link_resolve_parents(&mut tree, &shared);

    let workspaces = root_manifest
        .as_ref()
        .map(|m| discover_workspaces(root, &m.workspaces))
        .unwrap_or_default();
    build_edges(&mut tree, &workspaces);
    resolve_edges(&mut tree, &shared);

    tracing::debug!(
        root = %root.display(),
        nodes = tree.len(),
        global = tree.global,
        lockfile = tree.lockfile,
        "loaded tree"
    );

    LoadedTree { tree, error: None }
}

/// Flag the root of a tree that could not be loaded past its root.
fn failed_load(mut tree: PackageTree, reason: &str, err: Error) -> LoadedTree {
    let root = tree.node_mut(NodeId::ROOT);
    root.flags.invalid = true;
    let problem = format!("error in {}: {reason}", root.path.display());
    root.problems.push(problem);
    tree.load_failed = true;
    LoadedTree {
        tree,
        error: Some(err),
    }
}

fn base_name(path: &Path) -> Option<String> {
    dunce::canonicalize(path)
        .ok()
        .as_deref()
        .unwrap_or(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// A `node_modules` entry read from disk, before insertion.
#[derive(Debug)]
struct ScannedEntry {
    name: String,
    path: PathBuf,
    realpath: PathBuf,
    is_link: bool,
    manifest: Option<Value>,
}

/// Walk every reachable `node_modules` folder.
///
/// Returns the nodes whose real directory was already expanded by another
/// node, mapped to that node. Only a failure to read the root's own
/// `node_modules` is an error.
fn scan(tree: &mut PackageTree, cache: &dyn ManifestCache) -> io::Result<HashMap<NodeId, NodeId>> {
    let mut expanded: HashMap<PathBuf, NodeId> = HashMap::new();
    let mut shared = HashMap::new();
    let mut queue = VecDeque::from([NodeId::ROOT]);

    while let Some(id) = queue.pop_front() {
        let node = tree.node(id);
        if let Some(&first) = expanded.get(&node.realpath) {
            tracing::trace!(path = %node.path.display(), "already expanded");
            shared.insert(id, first);
            continue;
        }
        expanded.insert(node.realpath.clone(), id);

        let dir = content_dir(node).join("node_modules");
        let listed = match list_node_modules(&dir) {
            Ok(listed) => listed,
            Err(e) if id == NodeId::ROOT => return Err(e),
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "unreadable node_modules");
                continue;
            }
        };
        if listed.is_empty() {
            continue;
        }
        tracing::debug!(dir = %dir.display(), entries = listed.len(), "scanning node_modules");

        let scanned: Vec<ScannedEntry> = listed
            .par_iter()
            .map(|(name, path)| scan_entry(name, path, cache))
            .collect();

        for entry in scanned {
            let location = child_location(tree, id, &entry.name);
            let child = tree.add_child(id, entry_node(entry, location));
            queue.push_back(child);
        }
    }

    Ok(shared)
}

/// Directory whose `node_modules` holds a node's children.
fn content_dir(node: &PackageNode) -> &Path {
    if node.is_link {
        &node.realpath
    } else {
        &node.path
    }
}

/// Package directories in `node_modules`, scoped ones as `@scope/name`, sorted by name.
///
/// `.bin` and dot-prefixed entries are skipped. A missing directory yields
/// no entries; any other read failure is returned.
fn list_node_modules(node_modules: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(node_modules) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if name.starts_with('.') || !path.is_dir() {
            continue;
        }

        if name.starts_with('@') {
            let Ok(scope_entries) = fs::read_dir(&path) else {
                continue;
            };
            for scope_entry in scope_entries.flatten() {
                let scope_path = scope_entry.path();
                let pkg = scope_entry.file_name().to_string_lossy().into_owned();
                if !pkg.starts_with('.') && scope_path.is_dir() {
                    found.push((format!("{name}/{pkg}"), scope_path));
                }
            }
        } else {
            found.push((name, path));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

fn scan_entry(name: &str, path: &Path, cache: &dyn ManifestCache) -> ScannedEntry {
    let is_link = fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink());
    let realpath = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    let manifest = match read_manifest(&realpath, cache) {
        Ok(manifest) => Some(manifest),
        Err(Error::ManifestNotFound { .. }) => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "unreadable package manifest");
            None
        }
    };

    ScannedEntry {
        name: name.to_string(),
        path: path.to_path_buf(),
        realpath,
        is_link,
        manifest,
    }
}

fn entry_node(entry: ScannedEntry, location: String) -> PackageNode {
    let mut node = PackageNode::new(entry.path);
    node.realpath = entry.realpath;
    node.is_link = entry.is_link;
    node.location = location;
    node.name = Some(entry.name);
    if let Some(value) = entry.manifest {
        node.package_name = value.get("name").and_then(Value::as_str).map(String::from);
        node.version = value.get("version").and_then(Value::as_str).map(String::from);
        node.manifest = Some(value);
    }
    node
}

/// Root-relative location of `name` installed under `parent`.
fn child_location(tree: &PackageTree, parent: NodeId, name: &str) -> String {
    let parent = tree.node(parent);
    let base = if parent.is_link {
        slash_path(&relative_path(&tree.root().realpath, &parent.realpath))
    } else {
        parent.location.clone()
    };

    if base.is_empty() || base == "." {
        format!("node_modules/{name}")
    } else {
        format!("{base}/node_modules/{name}")
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Fill `resolved`/`integrity` and lockfile membership.
fn apply_origins(tree: &mut PackageTree, lockfile: Option<&Lockfile>) {
    let authoritative = lockfile.is_some_and(Lockfile::is_authoritative);

    for id in tree.ids().skip(1).collect::<Vec<_>>() {
        let node = tree.node(id);
        let (lock_resolved, lock_integrity) = lockfile
            .map(|lock| lock.origin(&node.location))
            .unwrap_or_default();

        let manifest = node.manifest.as_ref().map(Manifest::from_value);
        let resolved = if node.is_link {
            Some(resolved::link_resolved(&node.path, &node.realpath))
        } else {
            lock_resolved
                .map(String::from)
                .or_else(|| manifest.as_ref().and_then(|m| m.resolved.clone()))
                .and_then(|r| resolved::normalize(&r))
        };
        let integrity = lock_integrity
            .map(String::from)
            .or_else(|| manifest.and_then(|m| m.integrity));
        let unlisted = authoritative && lockfile.is_some_and(|lock| !lock.contains(&node.location));

        let node = tree.node_mut(id);
        node.resolved = resolved;
        node.integrity = integrity;
        if unlisted {
            tracing::trace!(location = %node.location, "not in lockfile");
            node.unlisted = true;
        }
    }
}

/// Links resolve from the deepest loaded directory containing their target.
/// Nodes sharing an expanded directory resolve through the node that expanded it.
fn link_resolve_parents(tree: &mut PackageTree, shared: &HashMap<NodeId, NodeId>) {
    for id in tree.ids().collect::<Vec<_>>() {
        let scope = if let Some(&first) = shared.get(&id) {
            Some(first)
        } else if tree.node(id).is_link {
            tree.deepest_containing(&tree.node(id).realpath)
        } else {
            continue;
        };
        tree.node_mut(id).resolve_parent = scope;
    }
}

fn build_edges(tree: &mut PackageTree, workspaces: &[WorkspacePackage]) {
    if tree.global {
        let root = tree.node_mut(NodeId::ROOT);
        root.edges_out = root
            .children
            .keys()
            .map(|name| Edge::new(name.clone(), "*", DepType::Prod))
            .collect();
    }

    for id in tree.ids().collect::<Vec<_>>() {
        let is_root = id == NodeId::ROOT;
        if is_root && tree.global {
            continue;
        }

        let node = tree.node(id);
        let Some(manifest) = node.manifest.as_ref().map(Manifest::from_value) else {
            continue;
        };
        let mut edges = declared_edges(&manifest, is_root || node.is_link);

        if is_root {
            for ws in workspaces {
                if let Some(edge) = edges.iter_mut().find(|e| e.name == ws.name) {
                    edge.dep_type = DepType::Workspace;
                    edge.spec.clone_from(&ws.spec);
                } else {
                    edges.push(Edge::new(ws.name.clone(), ws.spec.clone(), DepType::Workspace));
                }
            }
        }

        tree.node_mut(id).edges_out = edges;
    }
}

/// Edges in declaration order.
///
/// `optionalDependencies` retype a same-named `dependencies` entry; peer and
/// dev entries for names that are already declared are ignored.
fn declared_edges(manifest: &Manifest, include_dev: bool) -> Vec<Edge> {
    let mut edges: Vec<Edge> = manifest
        .dependencies
        .iter()
        .map(|(name, spec)| Edge::new(name.clone(), spec.clone(), DepType::Prod))
        .collect();

    for (name, spec) in &manifest.optional_dependencies {
        if let Some(edge) = edges.iter_mut().find(|e| &e.name == name) {
            edge.spec.clone_from(spec);
            edge.dep_type = DepType::Optional;
        } else {
            edges.push(Edge::new(name.clone(), spec.clone(), DepType::Optional));
        }
    }

    for (name, spec) in &manifest.peer_dependencies {
        if edges.iter().any(|e| &e.name == name) {
            continue;
        }
        let dep_type = if manifest.peer_optional.contains(name) {
            DepType::PeerOptional
        } else {
            DepType::Peer
        };
        edges.push(Edge::new(name.clone(), spec.clone(), dep_type));
    }

    if include_dev {
        for (name, spec) in &manifest.dev_dependencies {
            if !edges.iter().any(|e| &e.name == name) {
                edges.push(Edge::new(name.clone(), spec.clone(), DepType::Dev));
            }
        }
    }

    edges
}

fn resolve_edges(tree: &mut PackageTree, shared: &HashMap<NodeId, NodeId>) {
    for id in tree.ids().collect::<Vec<_>>() {
        // Peers skip the package's own folder, which for a shared node is its first expansion.
        let content = shared.get(&id).copied().unwrap_or(id);
        for index in 0..tree.node(id).edges_out.len() {
            let edge = &tree.node(id).edges_out[index];
            let start = if edge.dep_type.is_peer() && id != NodeId::ROOT {
                tree.node(content).resolve_parent
            } else {
                Some(id)
            };
            let to = start.and_then(|scope| tree.resolve(scope, &edge.name));

            tracing::trace!(
                from = %tree.node(id).location,
                name = %edge.name,
                spec = %edge.spec,
                found = to.is_some(),
                "resolved edge"
            );

            tree.node_mut(id).edges_out[index].to = to;
            if let Some(target) = to {
                tree.node_mut(target).edges_in.push(EdgeRef { from: id, index });
            }
        }
    }
}
