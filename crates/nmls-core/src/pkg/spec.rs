//! Dependency specifier classification and `ls` filter terms.
//!
//! Declared specifiers look like:
//! - `^1.0.0`, `1.x`, `>=2 <3` (semver ranges)
//! - `latest`, `next` (dist-tags)
//! - `npm:real-name@^1.0.0` (aliases)
//! - `github:user/repo`, `git+https://host/repo.git`, `user/repo#ref` (git)
//! - `https://host/pkg.tgz` (remote tarballs)
//! - `file:../dir`, `./dir` (local directories and tarballs)
//! - `link:../dir`, `workspace:*`

use super::range;
use super::tree::PackageNode;
use crate::error::Error;

/// A classified dependency specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepSpec {
    Range(String),
    Tag(String),
    Alias { name: String, spec: Box<DepSpec> },
    Git(String),
    Remote(String),
    File(String),
    Link(String),
    Workspace(String),
}

impl DepSpec {
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();

        if let Some(rest) = spec.strip_prefix("npm:") {
            let (name, inner) = split_name_and_range(rest);
            return Self::Alias {
                name: name.to_string(),
                spec: Box::new(Self::parse(inner.unwrap_or("*"))),
            };
        }
        if let Some(rest) = spec.strip_prefix("workspace:") {
            return Self::Workspace(rest.to_string());
        }
        if spec.starts_with("link:") {
            return Self::Link(spec.to_string());
        }
        if spec.starts_with("file:") || is_local_path(spec) {
            return Self::File(spec.to_string());
        }
        if is_git(spec) {
            return Self::Git(spec.to_string());
        }
        if spec.starts_with("http://") || spec.starts_with("https://") {
            return Self::Remote(spec.to_string());
        }
        if range::is_range(spec) {
            return Self::Range(spec.to_string());
        }
        Self::Tag(spec.to_string())
    }

    /// Whether an installed node satisfies this specifier.
    ///
    /// Only ranges (and aliases of ranges) can be unsatisfied; other
    /// specifier kinds are accepted as whatever the installer put there.
    #[must_use]
    pub fn satisfied_by(&self, node: &PackageNode) -> bool {
        match self {
            Self::Range(range) => {
                let range = range.trim();
                if range.is_empty() || range == "*" {
                    return true;
                }
                node.version
                    .as_deref()
                    .is_some_and(|version| range::satisfies(version, range))
            }
            Self::Alias { name, spec } => {
                let name_matches = node
                    .package_name
                    .as_deref()
                    .map_or(true, |package_name| package_name == name);
                name_matches && spec.satisfied_by(node)
            }
            Self::Workspace(range) => {
                let range = range.trim();
                if matches!(range, "" | "*" | "^" | "~") {
                    return true;
                }
                node.version
                    .as_deref()
                    .is_some_and(|version| range::satisfies(version, range))
            }
            Self::Tag(_) | Self::Git(_) | Self::Remote(_) | Self::File(_) | Self::Link(_) => true,
        }
    }

    #[must_use]
    pub fn is_git(&self) -> bool {
        matches!(self, Self::Git(_))
    }
}

fn is_local_path(spec: &str) -> bool {
    spec.starts_with("./")
        || spec.starts_with("../")
        || spec.starts_with('/')
        || spec.starts_with("~/")
        || spec == "."
        || spec == ".."
}

fn is_git(spec: &str) -> bool {
    const PREFIXES: [&str; 8] = [
        "git+", "git://", "git@", "github:", "gitlab:", "bitbucket:", "gist:", "ssh://",
    ];
    if PREFIXES.iter().any(|p| spec.starts_with(p)) {
        return true;
    }
    if spec.starts_with("http://") || spec.starts_with("https://") {
        return spec.ends_with(".git") || spec.contains(".git#");
    }

    // `user/repo` and `user/repo#ref` shorthands
    let repo = spec.split('#').next().unwrap_or(spec);
    match repo.split_once('/') {
        Some((user, project)) => {
            !user.is_empty()
                && !project.is_empty()
                && !project.contains('/')
                && !user.starts_with('@')
                && !user.contains(':')
        }
        None => false,
    }
}

/// Split `name@range` (or `@scope/name@range`) at the version delimiter.
fn split_name_and_range(input: &str) -> (&str, Option<&str>) {
    let search_from = usize::from(input.starts_with('@'));
    match input[search_from..].find('@') {
        Some(pos) => {
            let at = pos + search_from;
            (&input[..at], Some(&input[at + 1..]))
        }
        None => (input, None),
    }
}

/// A positional argument to `ls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTerm {
    /// `.`, the root project's own direct dependencies.
    Root,
    Package { name: String, range: Option<String> },
}

impl FilterTerm {
    /// Parse `.`, `name`, `@scope/name`, `name@range` or `@scope/name@range`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTerm`] for empty names or scopes.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();

        if input == "." {
            return Ok(Self::Root);
        }
        if input.is_empty() {
            return Err(Error::invalid_term(input, "empty term"));
        }

        let (name, range) = split_name_and_range(input);

        if let Some(scoped) = name.strip_prefix('@') {
            match scoped.split_once('/') {
                Some((scope, pkg)) if !scope.is_empty() && !pkg.is_empty() => {}
                _ => return Err(Error::invalid_term(input, "scoped name needs @scope/name")),
            }
        }
        if name.is_empty() {
            return Err(Error::invalid_term(input, "empty package name"));
        }
        if range.is_some_and(str::is_empty) {
            return Err(Error::invalid_term(input, "empty version range"));
        }

        Ok(Self::Package {
            name: name.to_string(),
            range: range.map(String::from),
        })
    }

    /// Whether `node` matches by name and, when given, version range.
    ///
    /// Ranges that are not semver match the version string exactly.
    #[must_use]
    pub fn matches(&self, node: &PackageNode) -> bool {
        let Self::Package { name, range } = self else {
            return false;
        };

        let name_matches = node.name.as_deref() == Some(name.as_str())
            || node.package_name.as_deref() == Some(name.as_str());
        if !name_matches {
            return false;
        }

        let Some(range) = range else {
            return true;
        };
        let Some(version) = node.version.as_deref() else {
            return false;
        };
        if range::is_range(range) {
            range::satisfies(version, range)
        } else {
            version == range
        }
    }
}
