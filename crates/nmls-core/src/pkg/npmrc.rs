//! `.npmrc` parsing for listing settings.
//!
//! Recognized keys: `prefix`, `depth`, `all`, `long`, `unicode`, `global`.
//! Other keys (registries, auth) are ignored. Values support `${ENV_VAR}`
//! expansion.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::paths;

/// Settings read from `.npmrc` files. `None` means not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NpmrcSettings {
    pub prefix: Option<PathBuf>,
    /// `Infinity` is stored as `usize::MAX`.
    pub depth: Option<usize>,
    pub all: Option<bool>,
    pub long: Option<bool>,
    pub unicode: Option<bool>,
    pub global: Option<bool>,
}

/// Parse one `.npmrc` file's content. `path` is used in error messages.
///
/// Comments (`#`, `;`) and blank lines are skipped.
pub fn parse_npmrc(path: &Path, content: &str) -> Result<NpmrcSettings, Error> {
    let mut settings = NpmrcSettings::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = expand_env_vars(value.trim());
        let value = value.trim_matches('"');

        let invalid = || Error::ConfigParse {
            path: path.to_path_buf(),
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "prefix" => settings.prefix = Some(PathBuf::from(value)),
            "depth" => settings.depth = Some(parse_depth(value).ok_or_else(invalid)?),
            "all" => settings.all = Some(parse_bool(value).ok_or_else(invalid)?),
            "long" => settings.long = Some(parse_bool(value).ok_or_else(invalid)?),
            "unicode" => settings.unicode = Some(parse_bool(value).ok_or_else(invalid)?),
            "global" => settings.global = Some(parse_bool(value).ok_or_else(invalid)?),
            _ => {}
        }
    }

    Ok(settings)
}

/// Load the project `.npmrc`, then the user `~/.npmrc`. The first file
/// setting a key wins.
pub fn load_npmrc_files(project_dir: &Path) -> Result<NpmrcSettings, Error> {
    let mut merged = NpmrcSettings::default();

    let candidates = [Some(project_dir.join(".npmrc")), paths::user_npmrc()];
    for path in candidates.into_iter().flatten() {
        if !path.is_file() {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        let parsed = parse_npmrc(&path, &content)?;
        tracing::debug!(path = %path.display(), "loaded .npmrc");
        merge_settings(&mut merged, parsed);
    }

    Ok(merged)
}

/// Merge `source` into `target`, keeping values already set (first wins).
fn merge_settings(target: &mut NpmrcSettings, source: NpmrcSettings) {
    target.prefix = target.prefix.take().or(source.prefix);
    target.depth = target.depth.or(source.depth);
    target.all = target.all.or(source.all);
    target.long = target.long.or(source.long);
    target.unicode = target.unicode.or(source.unicode);
    target.global = target.global.or(source.global);
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" | "" => Some(false),
        _ => None,
    }
}

fn parse_depth(value: &str) -> Option<usize> {
    if value == "Infinity" {
        return Some(usize::MAX);
    }
    value.parse().ok()
}

/// Expand `${ENV_VAR}` patterns; unset variables expand to nothing.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
            if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            }
        } else {
            result.push(ch);
        }
    }

    result
}
