//! Installed package tree.
//!
//! Packages are stored once per physical location in an arena and
//! addressed by [`NodeId`]. Dependency edges point into the arena, so a
//! package required from several places (or from inside a cycle) is a
//! single node referenced by several edges.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Index of a node in [`PackageTree::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root node is always inserted first.
    pub const ROOT: Self = Self(0);
}

/// Which manifest block declared an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DepType {
    Prod,
    Dev,
    Optional,
    Peer,
    PeerOptional,
    Workspace,
}

impl DepType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Dev => "dev",
            Self::Optional => "optional",
            Self::Peer => "peer",
            Self::PeerOptional => "peerOptional",
            Self::Workspace => "workspace",
        }
    }

    /// Missing targets of optional edges do not fail a listing.
    #[must_use]
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Optional | Self::PeerOptional)
    }

    #[must_use]
    pub fn is_peer(self) -> bool {
        matches!(self, Self::Peer | Self::PeerOptional)
    }
}

impl fmt::Display for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared dependency of one node.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Dependency name as declared (the alias for `npm:` aliases).
    pub name: String,
    /// Declared specifier, e.g. `^1.0.0`, `npm:b@1`, `github:a/b`.
    pub spec: String,
    pub dep_type: DepType,
    /// Node the edge resolves to; `None` when nothing is installed.
    pub to: Option<NodeId>,
    /// Problem string attached by the detector (`missing: ...`).
    pub problem: Option<String>,
}

impl Edge {
    #[must_use]
    pub fn new(name: impl Into<String>, spec: impl Into<String>, dep_type: DepType) -> Self {
        Self {
            name: name.into(),
            spec: spec.into(),
            dep_type,
            to: None,
            problem: None,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.to.is_none()
    }
}

/// Classification flags set by the loader and the problem detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags {
    pub extraneous: bool,
    pub invalid: bool,
    pub dev: bool,
    pub optional: bool,
    pub peer: bool,
}

/// Reference to an edge: the node declaring it and its index in `edges_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef {
    pub from: NodeId,
    pub index: usize,
}

/// One installed package occurrence.
#[derive(Debug, Clone)]
pub struct PackageNode {
    /// Folder name under the parent's `node_modules` (scoped names keep their scope).
    pub name: Option<String>,
    /// `name` field of the package's own manifest.
    pub package_name: Option<String>,
    pub version: Option<String>,
    /// Location on disk. For links this is the symlink itself.
    pub path: PathBuf,
    /// Canonical location; differs from `path` for links.
    pub realpath: PathBuf,
    /// Root-relative location, `""` for the root, `node_modules/a/node_modules/b` otherwise.
    pub location: String,
    pub resolved: Option<String>,
    pub integrity: Option<String>,
    pub is_link: bool,
    /// Missing from an authoritative lockfile.
    pub unlisted: bool,
    /// Directory the node lives in (the owner of the `node_modules` folder).
    pub parent: Option<NodeId>,
    /// Next scope searched when an edge is not satisfied by this node's own children.
    pub resolve_parent: Option<NodeId>,
    /// Installed children keyed by folder name.
    pub children: BTreeMap<String, NodeId>,
    /// Declared dependencies in manifest order.
    pub edges_out: Vec<Edge>,
    /// Edges from other nodes resolving to this one.
    pub edges_in: Vec<EdgeRef>,
    /// Type of the first edge reaching this node from the root.
    pub dep_type: Option<DepType>,
    pub flags: NodeFlags,
    /// Problems concerning this node only.
    pub problems: Vec<String>,
    /// Raw manifest, kept for generic field access in long output.
    pub manifest: Option<Value>,
}

impl PackageNode {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            name: None,
            package_name: None,
            version: None,
            realpath: path.clone(),
            path,
            location: String::new(),
            resolved: None,
            integrity: None,
            is_link: false,
            unlisted: false,
            parent: None,
            resolve_parent: None,
            children: BTreeMap::new(),
            edges_out: Vec::new(),
            edges_in: Vec::new(),
            dep_type: None,
            flags: NodeFlags::default(),
            problems: Vec::new(),
            manifest: None,
        }
    }

    /// Name used in labels: folder name, falling back to the manifest name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.package_name.as_deref())
            .unwrap_or("")
    }

    /// Version or the empty string.
    #[must_use]
    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or("")
    }

    /// `name@version`, as used in problem strings.
    #[must_use]
    pub fn pkgid(&self) -> String {
        format!("{}@{}", self.display_name(), self.version_str())
    }

    /// Free-form manifest field lookup.
    #[must_use]
    pub fn manifest_field(&self, key: &str) -> Option<&Value> {
        self.manifest.as_ref().and_then(|m| m.get(key))
    }
}

/// The loaded tree.
#[derive(Debug, Clone)]
pub struct PackageTree {
    pub nodes: Vec<PackageNode>,
    /// Root was synthesized for a global install directory.
    pub global: bool,
    /// Membership came from an authoritative lockfile.
    pub lockfile: bool,
    /// Root manifest or root `node_modules` could not be read; nothing below the root was loaded.
    pub load_failed: bool,
}

impl PackageTree {
    /// Create a tree containing only `root`.
    #[must_use]
    pub fn new(root: PackageNode) -> Self {
        Self {
            nodes: vec![root],
            global: false,
            lockfile: false,
            load_failed: false,
        }
    }

    #[must_use]
    pub fn root(&self) -> &PackageNode {
        &self.nodes[NodeId::ROOT.0]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &PackageNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut PackageNode {
        &mut self.nodes[id.0]
    }

    /// Insert `node` under `parent`'s `node_modules`.
    pub fn add_child(&mut self, parent: NodeId, mut node: PackageNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        if node.resolve_parent.is_none() {
            node.resolve_parent = Some(parent);
        }
        let key = node.display_name().to_string();
        self.nodes.push(node);
        self.nodes[parent.0].children.insert(key, id);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1 && self.root().edges_out.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    #[must_use]
    pub fn edge(&self, edge: EdgeRef) -> &Edge {
        &self.nodes[edge.from.0].edges_out[edge.index]
    }

    /// Find the node that provides `name` when required from `from`:
    /// `from`'s own children, then each resolve parent outward.
    #[must_use]
    pub fn resolve(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let mut scope = Some(from);
        while let Some(id) = scope {
            let node = self.node(id);
            if let Some(&child) = node.children.get(name) {
                return Some(child);
            }
            scope = node.resolve_parent;
        }
        None
    }

    /// Deepest node whose real directory contains `path`.
    #[must_use]
    pub fn deepest_containing(&self, path: &Path) -> Option<NodeId> {
        self.ids()
            .filter(|&id| {
                let node = self.node(id);
                !node.is_link && path.starts_with(&node.realpath)
            })
            .max_by_key(|&id| self.node(id).realpath.components().count())
    }

    /// Requirer description used in `invalid` labels.
    #[must_use]
    pub fn requirer_label(&self, id: NodeId) -> String {
        if id == NodeId::ROOT {
            "the root project".to_string()
        } else {
            self.node(id).location.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(path: &str, name: &str, version: &str) -> PackageNode {
        let mut node = PackageNode::new(PathBuf::from(path));
        node.name = Some(name.to_string());
        node.package_name = Some(name.to_string());
        node.version = Some(version.to_string());
        node
    }

    #[test]
    fn test_resolve_walks_outward() {
        let mut tree = PackageTree::new(named("/p", "root", "1.0.0"));
        let a = tree.add_child(NodeId::ROOT, named("/p/node_modules/a", "a", "1.0.0"));
        let b = tree.add_child(NodeId::ROOT, named("/p/node_modules/b", "b", "1.0.0"));
        let nested_b = tree.add_child(a, named("/p/node_modules/a/node_modules/b", "b", "2.0.0"));

        assert_eq!(tree.resolve(a, "b"), Some(nested_b));
        assert_eq!(tree.resolve(NodeId::ROOT, "b"), Some(b));
        assert_eq!(tree.resolve(b, "a"), Some(a));
        assert_eq!(tree.resolve(b, "c"), None);
    }

    #[test]
    fn test_pkgid_without_version() {
        let mut node = PackageNode::new(PathBuf::from("/p/node_modules/x"));
        node.name = Some("x".to_string());
        assert_eq!(node.pkgid(), "x@");
    }

    #[test]
    fn test_deepest_containing() {
        let mut tree = PackageTree::new(named("/p", "root", "1.0.0"));
        let a = tree.add_child(NodeId::ROOT, named("/p/node_modules/a", "a", "1.0.0"));

        assert_eq!(
            tree.deepest_containing(Path::new("/p/node_modules/a/lib")),
            Some(a)
        );
        assert_eq!(
            tree.deepest_containing(Path::new("/p/packages/w")),
            Some(NodeId::ROOT)
        );
        assert_eq!(tree.deepest_containing(Path::new("/elsewhere")), None);
    }

    #[test]
    fn test_dep_type_helpers() {
        assert!(DepType::Optional.is_optional());
        assert!(DepType::PeerOptional.is_optional());
        assert!(DepType::PeerOptional.is_peer());
        assert!(!DepType::Prod.is_optional());
        assert_eq!(DepType::PeerOptional.to_string(), "peerOptional");
    }
}
