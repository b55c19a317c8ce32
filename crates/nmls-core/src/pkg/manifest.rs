//! `package.json` reading.
//!
//! Manifests are kept as generic [`Value`]s; [`Manifest`] projects the small
//! fixed set of fields the tree needs. Anything else (descriptions, custom
//! fields shown by long output) is read through [`PackageNode::manifest_field`].
//!
//! [`PackageNode::manifest_field`]: super::tree::PackageNode::manifest_field

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::Error;

/// File stamp used to invalidate cached manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestStamp {
    pub mtime_ms: Option<u64>,
    pub size: Option<u64>,
}

impl ManifestStamp {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let Ok(meta) = path.metadata() else {
            return Self::default();
        };
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| u64::try_from(d.as_millis()).ok());
        Self {
            mtime_ms,
            size: Some(meta.len()),
        }
    }

    /// Whether `path` still has this stamp.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.exists() && Self::from_path(path) == *self
    }
}

/// Cache of parsed manifests, shared across the parallel directory scan.
pub trait ManifestCache: Send + Sync + Debug {
    /// Cached value for `path`, or `None` on a miss or stale stamp.
    fn get(&self, path: &Path) -> Option<Value>;

    fn set(&self, path: &Path, value: Value);
}

/// In-memory cache validated by mtime and size.
#[derive(Debug, Default)]
pub struct MemoryManifestCache {
    entries: RwLock<HashMap<PathBuf, (ManifestStamp, Value)>>,
}

impl MemoryManifestCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |e| e.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ManifestCache for MemoryManifestCache {
    fn get(&self, path: &Path) -> Option<Value> {
        let entries = self.entries.read().ok()?;
        let (stamp, value) = entries.get(path)?;
        stamp.matches(path).then(|| value.clone())
    }

    fn set(&self, path: &Path, value: Value) {
        let stamp = ManifestStamp::from_path(path);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(path.to_path_buf(), (stamp, value));
        }
    }
}

/// Read `<dir>/package.json`.
///
/// # Errors
/// [`Error::ManifestNotFound`] when the file does not exist and
/// [`Error::ManifestParse`] when it is not valid JSON.
pub fn read_manifest(dir: &Path, cache: &dyn ManifestCache) -> Result<Value, Error> {
    let path = dir.join("package.json");
    if let Some(value) = cache.get(&path) {
        return Ok(value);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::ManifestNotFound { path: path.clone() },
        _ => Error::Io(e),
    })?;

    let value: Value = serde_json::from_str(&content)
        .map_err(|source| Error::ManifestParse { path: path.clone(), source })?;

    cache.set(&path, value.clone());
    Ok(value)
}

/// Typed projection of the fields the tree loader uses.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<(String, String)>,
    pub optional_dependencies: Vec<(String, String)>,
    pub peer_dependencies: Vec<(String, String)>,
    pub dev_dependencies: Vec<(String, String)>,
    /// Peer dependencies marked optional in `peerDependenciesMeta`.
    pub peer_optional: HashSet<String>,
    /// Workspace glob patterns.
    pub workspaces: Vec<String>,
    /// `_resolved` left by the installer.
    pub resolved: Option<String>,
    /// `_integrity` left by the installer.
    pub integrity: Option<String>,
}

impl Manifest {
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let string = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);

        let peer_optional = value
            .get("peerDependenciesMeta")
            .and_then(Value::as_object)
            .map(|meta| {
                meta.iter()
                    .filter(|(_, m)| m.get("optional").and_then(Value::as_bool) == Some(true))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: string("name"),
            version: string("version"),
            dependencies: dep_block(value, "dependencies"),
            optional_dependencies: dep_block(value, "optionalDependencies"),
            peer_dependencies: dep_block(value, "peerDependencies"),
            dev_dependencies: dep_block(value, "devDependencies"),
            peer_optional,
            workspaces: workspace_patterns(value),
            resolved: string("_resolved"),
            integrity: string("_integrity"),
        }
    }
}

/// Entries of a dependency block in declaration order.
///
/// Non-string specifiers are treated as `*`.
fn dep_block(value: &Value, key: &str) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = value.get(key) else {
        return Vec::new();
    };
    map.iter()
        .map(|(name, spec)| {
            let spec = spec.as_str().unwrap_or("*");
            let spec = if spec.is_empty() { "*" } else { spec };
            (name.clone(), spec.to_string())
        })
        .collect()
}

/// `workspaces` as an array, or yarn-style `{ "packages": [...] }`.
fn workspace_patterns(value: &Value) -> Vec<String> {
    let list = match value.get("workspaces") {
        Some(Value::Array(arr)) => Some(arr),
        Some(Value::Object(obj)) => obj.get("packages").and_then(Value::as_array),
        _ => None,
    };
    list.map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    })
    .unwrap_or_default()
}
