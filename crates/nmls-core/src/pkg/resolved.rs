//! Normalization of `resolved` origins.
//!
//! Hosted git URLs are rewritten to the `git+ssh://git@host/...` transport,
//! links become `file:<relative target>`, and values that do not parse as
//! URLs are dropped.

use std::path::{Component, Path, PathBuf};
use url::Url;

const GIT_HOSTS: [&str; 3] = ["github.com", "gitlab.com", "bitbucket.org"];

/// Normalize a recorded `resolved` value, or `None` if it is malformed.
#[must_use]
pub fn normalize(resolved: &str) -> Option<String> {
    let resolved = resolved.trim();
    if resolved.is_empty() {
        return None;
    }
    if resolved.starts_with("file:") {
        return Some(resolved.to_string());
    }

    let Ok(url) = Url::parse(resolved) else {
        // scp-style git remotes (`git+ssh://git@host:owner/repo`) are kept verbatim
        return resolved.starts_with("git+").then(|| resolved.to_string());
    };
    if url.cannot_be_a_base() && !url.scheme().starts_with("git") {
        return None;
    }

    match url.scheme() {
        "git" | "git+https" | "git+http" | "git+ssh" | "git+git" => {
            Some(hosted_ssh(&url).unwrap_or_else(|| resolved.to_string()))
        }
        _ => Some(resolved.to_string()),
    }
}

/// `git+ssh://git@<host>/<path>#<committish>` for known git hosts.
fn hosted_ssh(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !GIT_HOSTS.contains(&host) {
        return None;
    }

    let path = url.path().trim_start_matches('/');
    let mut out = format!("git+ssh://git@{host}/{path}");
    if let Some(fragment) = url.fragment() {
        out.push('#');
        out.push_str(fragment);
    }
    Some(out)
}

/// `resolved` for a symlink at `link` pointing at `target`.
///
/// The target is expressed relative to the directory containing the link,
/// e.g. `file:../linked-dep` for `node_modules/linked-dep -> ../linked-dep`.
#[must_use]
pub fn link_resolved(link: &Path, target: &Path) -> String {
    let base = link.parent().unwrap_or(link);
    let base = dunce::canonicalize(base).unwrap_or_else(|_| base.to_path_buf());
    let relative = relative_path(&base, target)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("file:{relative}")
}

/// Path of `to` relative to the directory `from`.
#[must_use]
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
