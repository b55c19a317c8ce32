//! Installed dependency tree listing.
//!
//! Provides:
//! - Loading an installed `node_modules` layout (and lockfile) into a tree
//! - Classifying missing, invalid and extraneous packages
//! - Filtering the tree by name/range terms and depth
//! - Rendering the result as a tree, parseable lines or JSON
//! - `.npmrc` settings for listings

pub mod filter;
pub mod load;
pub mod lockfile;
pub mod ls;
pub mod manifest;
pub mod npmrc;
pub mod problems;
pub mod range;
pub mod render;
pub mod resolved;
pub mod spec;
pub mod tree;
pub mod workspaces;

pub use filter::{build_view, DepTypes, FilterOptions, TreeView, ViewKind, ViewNode};
pub use load::{load_tree, load_tree_with_cache, LoadOptions, LoadedTree};
pub use lockfile::{read_lockfile, LockEntry, Lockfile, LOCKFILE_CANDIDATES};
pub use ls::{run_ls, LsOutcome, LsStatus};
pub use manifest::{
    read_manifest, Manifest, ManifestCache, ManifestStamp, MemoryManifestCache,
};
pub use npmrc::{load_npmrc_files, parse_npmrc, NpmrcSettings};
pub use problems::{detect_problems, Problem, ProblemKind, ProblemReport};
pub use render::{render_json, render_parseable, render_tree, RenderOptions};
pub use spec::{DepSpec, FilterTerm};
pub use tree::{DepType, Edge, EdgeRef, NodeFlags, NodeId, PackageNode, PackageTree};
pub use workspaces::{discover_workspaces, WorkspacePackage};
