//! npm lockfile reading.
//!
//! Candidates, first found wins:
//! 1. `npm-shrinkwrap.json`
//! 2. `package-lock.json`
//! 3. `node_modules/.package-lock.json` (hidden lockfile)
//!
//! The `packages` map (lockfileVersion >= 2) is keyed by root-relative
//! location (`node_modules/a/node_modules/b`). When it lists installed
//! locations it is authoritative for tree membership. The legacy nested
//! `dependencies` map only contributes `resolved` and `integrity`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Lockfile names in lookup order, relative to the project root.
pub const LOCKFILE_CANDIDATES: [&str; 3] = [
    "npm-shrinkwrap.json",
    "package-lock.json",
    "node_modules/.package-lock.json",
];

/// One entry of the `packages` map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LockEntry {
    #[serde(default)]
    pub resolved: Option<String>,
    #[serde(default)]
    pub integrity: Option<String>,
}

/// Legacy (lockfileVersion 1) nested dependency entry.
#[derive(Debug, Clone, Default, Deserialize)]
struct LegacyEntry {
    #[serde(default)]
    resolved: Option<String>,
    #[serde(default)]
    integrity: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, LegacyEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLockfile {
    #[serde(default)]
    lockfile_version: u32,
    #[serde(default)]
    packages: BTreeMap<String, LockEntry>,
    #[serde(default)]
    dependencies: BTreeMap<String, LegacyEntry>,
}

/// A parsed lockfile.
#[derive(Debug, Clone, Default)]
pub struct Lockfile {
    pub path: PathBuf,
    pub lockfile_version: u32,
    /// Entries of the `packages` map, keyed by location (`""` is the root).
    pub packages: BTreeMap<String, LockEntry>,
    /// `resolved`/`integrity` from the legacy map, keyed by location.
    legacy: BTreeMap<String, LockEntry>,
}

impl Lockfile {
    /// Parse lockfile JSON.
    ///
    /// # Errors
    /// Returns the JSON error when the content is not a lockfile object.
    pub fn from_json(path: &Path, json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawLockfile = serde_json::from_str(json)?;

        let mut legacy = BTreeMap::new();
        flatten_legacy(&raw.dependencies, "", &mut legacy);

        let packages = if raw.lockfile_version >= 2 {
            raw.packages
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            lockfile_version: raw.lockfile_version,
            packages,
            legacy,
        })
    }

    /// Whether the `packages` map describes installed locations.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        self.packages.keys().any(|location| !location.is_empty())
    }

    #[must_use]
    pub fn contains(&self, location: &str) -> bool {
        self.packages.contains_key(location)
    }

    /// `resolved` and `integrity` recorded for `location`.
    #[must_use]
    pub fn origin(&self, location: &str) -> (Option<&str>, Option<&str>) {
        let pick = |field: fn(&LockEntry) -> Option<&str>| {
            self.packages
                .get(location)
                .and_then(field)
                .or_else(|| self.legacy.get(location).and_then(field))
        };
        (
            pick(|e| e.resolved.as_deref()),
            pick(|e| e.integrity.as_deref()),
        )
    }
}

fn flatten_legacy(
    deps: &BTreeMap<String, LegacyEntry>,
    prefix: &str,
    out: &mut BTreeMap<String, LockEntry>,
) {
    for (name, entry) in deps {
        let location = if prefix.is_empty() {
            format!("node_modules/{name}")
        } else {
            format!("{prefix}/node_modules/{name}")
        };
        out.insert(
            location.clone(),
            LockEntry {
                resolved: entry.resolved.clone(),
                integrity: entry.integrity.clone(),
            },
        );
        flatten_legacy(&entry.dependencies, &location, out);
    }
}

/// Read the first lockfile present under `root`.
///
/// Unparsable lockfiles are skipped with a warning.
#[must_use]
pub fn read_lockfile(root: &Path) -> Option<Lockfile> {
    for candidate in LOCKFILE_CANDIDATES {
        let path = root.join(candidate);
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };

        match Lockfile::from_json(&path, &content) {
            Ok(lockfile) => {
                tracing::debug!(
                    path = %path.display(),
                    version = lockfile.lockfile_version,
                    entries = lockfile.packages.len(),
                    "loaded lockfile"
                );
                return Some(lockfile);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable lockfile");
            }
        }
    }
    None
}
