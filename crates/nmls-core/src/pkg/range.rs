//! npm-flavoured semver range matching on top of the `semver` crate.
//!
//! `semver::VersionReq` follows Cargo conventions, so npm syntax is
//! rewritten before parsing:
//! - OR ranges: `^1.0.0 || ^2.0.0`
//! - hyphen ranges: `1.0.0 - 2.0.0`
//! - x-ranges: `1.x`, `1.2.*`, `*`, `""`
//! - space-separated comparators: `>= 1.2.0 < 2`
//! - bare versions are exact (`1.2.3` means `=1.2.3`, not `^1.2.3`)
//! - a leading `v` is ignored

use semver::{Version, VersionReq};

/// Parse an npm range into its OR alternatives.
///
/// Returns `None` when any alternative is not a valid range.
#[must_use]
pub fn parse_range(range: &str) -> Option<Vec<VersionReq>> {
    range
        .split("||")
        .map(|alt| VersionReq::parse(&to_cargo_syntax(alt)?).ok())
        .collect()
}

/// Whether `range` is a semver range at all.
#[must_use]
pub fn is_range(range: &str) -> bool {
    parse_range(range).is_some()
}

/// Parse a version, tolerating a leading `v` or `=`.
#[must_use]
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    let version = version.strip_prefix('=').unwrap_or(version);
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);
    Version::parse(version).ok()
}

/// Whether `version` satisfies `range`.
///
/// Unparsable versions or ranges never satisfy.
#[must_use]
pub fn satisfies(version: &str, range: &str) -> bool {
    let Some(version) = parse_version(version) else {
        return false;
    };
    let Some(alternatives) = parse_range(range) else {
        return false;
    };
    alternatives.iter().any(|req| req.matches(&version))
}

/// Rewrite one OR alternative into `semver::VersionReq` syntax.
fn to_cargo_syntax(alt: &str) -> Option<String> {
    let tokens = comparator_tokens(alt);

    if tokens.is_empty() {
        return Some("*".to_string());
    }

    if tokens.len() == 3 && tokens[1] == "-" {
        let lower = normalize_partial(&tokens[0])?;
        let upper = normalize_partial(&tokens[2])?;
        let lower = if lower == "*" { "*".to_string() } else { format!(">={lower}") };
        if upper == "*" {
            return Some(lower);
        }
        return Some(format!("{lower}, <={upper}"));
    }

    let comparators = tokens
        .iter()
        .map(|token| normalize_comparator(token))
        .collect::<Option<Vec<_>>>()?;

    Some(comparators.join(", "))
}

/// Split on whitespace, reattaching bare operators to the following version.
fn comparator_tokens(alt: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op = String::new();

    for word in alt.split_whitespace() {
        if is_operator(word) {
            pending_op.push_str(word);
            continue;
        }
        tokens.push(format!("{pending_op}{word}"));
        pending_op.clear();
    }

    if !pending_op.is_empty() {
        tokens.push(pending_op);
    }
    tokens
}

fn is_operator(word: &str) -> bool {
    matches!(word, ">" | ">=" | "<" | "<=" | "=" | "~" | "~>" | "^")
}

/// `>=v1.2.x` -> `>=1.2`, `1.2.3` -> `=1.2.3`, `^1.x` -> `^1`.
fn normalize_comparator(token: &str) -> Option<String> {
    let (op, rest) = split_operator(token);
    let partial = normalize_partial(rest)?;

    if partial == "*" {
        return Some(match op {
            "<" => "<0.0.0-0".to_string(),
            _ => "*".to_string(),
        });
    }

    let op = match op {
        "" => "=",
        "~>" => "~",
        other => other,
    };
    Some(format!("{op}{partial}"))
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in [">=", "<=", "~>", ">", "<", "=", "~", "^"] {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", token)
}

/// Drop a leading `v` and any wildcard segments, keeping prerelease and build tails.
fn normalize_partial(version: &str) -> Option<String> {
    let version = version.trim();
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);

    let split_at = version.find(&['-', '+'][..]).unwrap_or(version.len());
    let (core, tail) = version.split_at(split_at);

    let mut segments = Vec::new();
    for segment in core.split('.') {
        if segment.is_empty() || matches!(segment, "x" | "X" | "*") {
            break;
        }
        if !segment.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Some("*".to_string());
    }
    if segments.len() > 3 {
        return None;
    }

    let mut normalized = segments.join(".");
    if segments.len() == 3 {
        normalized.push_str(tail);
    }
    Some(normalized)
}
