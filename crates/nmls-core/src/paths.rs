use std::path::{Path, PathBuf};

/// Find the project root by walking up from `cwd` looking for `package.json` or `node_modules`.
///
/// Returns the first directory containing either marker, or `None` if neither is found.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join("package.json").exists() || current.join("node_modules").is_dir() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Default global prefix when none is configured.
///
/// - Linux: `$XDG_DATA_HOME/nmls/global` or `~/.local/share/nmls/global`
/// - macOS: `~/Library/Application Support/nmls/global`
/// - Windows: `%APPDATA%\nmls\global`
#[must_use]
pub fn default_global_prefix() -> PathBuf {
    let base = dirs_next::data_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".nmls-data"),
                |p| p.join(".local").join("share").join("nmls"),
            )
        },
        |p| p.join("nmls"),
    );

    base.join("global")
}

/// Global `node_modules` directory for a prefix.
///
/// Unix layouts put global packages under `{prefix}/lib/node_modules`,
/// Windows directly under `{prefix}\node_modules`.
#[must_use]
pub fn global_dir(prefix: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        prefix.join("node_modules")
    }

    #[cfg(not(windows))]
    {
        prefix.join("lib").join("node_modules")
    }
}

/// Location of the per-user `.npmrc`.
#[must_use]
pub fn user_npmrc() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".npmrc"))
}
