use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths;
use crate::pkg::filter::DepTypes;
use crate::pkg::npmrc::NpmrcSettings;

/// Output format of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Tree,
    Json,
    Parseable,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Json => "json",
            Self::Parseable => "parseable",
        }
    }
}

/// Configuration of one `ls` run.
#[derive(Debug, Clone)]
pub struct LsConfig {
    /// Directory the command was started in.
    pub cwd: PathBuf,

    /// Positional filter terms, unparsed.
    pub terms: Vec<String>,

    /// Explicit depth bound; see [`LsConfig::effective_depth`].
    pub depth: Option<usize>,

    /// Show the whole tree when no depth is given.
    pub all: bool,

    /// List the global install directory instead of the project.
    pub global: bool,

    /// Global prefix; the global directory is derived from it.
    pub prefix: Option<PathBuf>,

    /// Explicit global `node_modules` directory, overrides `prefix`.
    pub global_dir: Option<PathBuf>,

    pub format: OutputFormat,
    pub long: bool,
    pub unicode: bool,
    pub dep_types: DepTypes,

    /// Only list symlinked top-level packages.
    pub link: bool,
}

impl Default for LsConfig {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            terms: Vec::new(),
            depth: None,
            all: false,
            global: false,
            prefix: None,
            global_dir: None,
            format: OutputFormat::default(),
            long: false,
            unicode: false,
            dep_types: DepTypes::all(),
            link: false,
        }
    }
}

impl LsConfig {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Apply `.npmrc` settings. Call before command-line overrides.
    #[must_use]
    pub fn with_npmrc(mut self, settings: &NpmrcSettings) -> Self {
        if let Some(prefix) = &settings.prefix {
            self.prefix = Some(prefix.clone());
        }
        if settings.depth.is_some() {
            self.depth = settings.depth;
        }
        self.all = settings.all.unwrap_or(self.all);
        self.long = settings.long.unwrap_or(self.long);
        self.unicode = settings.unicode.unwrap_or(self.unicode);
        self.global = settings.global.unwrap_or(self.global);
        self
    }

    #[must_use]
    pub fn with_terms(mut self, terms: Vec<String>) -> Self {
        self.terms = terms;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: Option<usize>) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn with_all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    #[must_use]
    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: PathBuf) -> Self {
        self.prefix = Some(prefix);
        self
    }

    #[must_use]
    pub fn with_global_dir(mut self, dir: PathBuf) -> Self {
        self.global_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_long(mut self, long: bool) -> Self {
        self.long = long;
        self
    }

    #[must_use]
    pub fn with_unicode(mut self, unicode: bool) -> Self {
        self.unicode = unicode;
        self
    }

    #[must_use]
    pub fn with_dep_types(mut self, dep_types: DepTypes) -> Self {
        self.dep_types = dep_types;
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: bool) -> Self {
        self.link = link;
        self
    }

    /// Depth bound actually applied: an explicit depth wins, `all` or
    /// filter terms lift the bound, otherwise only direct dependencies.
    #[must_use]
    pub fn effective_depth(&self) -> Option<usize> {
        match self.depth {
            Some(usize::MAX) => None,
            Some(depth) => Some(depth),
            None if self.all || !self.terms.is_empty() => None,
            None => Some(0),
        }
    }

    /// Global `node_modules` directory.
    #[must_use]
    pub fn global_modules_dir(&self) -> PathBuf {
        self.global_dir.clone().unwrap_or_else(|| {
            let prefix = self
                .prefix
                .clone()
                .unwrap_or_else(paths::default_global_prefix);
            paths::global_dir(&prefix)
        })
    }

    /// Directory the tree is loaded from: the project root, or the
    /// directory holding the global `node_modules` in global mode.
    #[must_use]
    pub fn load_root(&self) -> PathBuf {
        if self.global {
            let dir = self.global_modules_dir();
            return dir.parent().map_or(dir.clone(), Path::to_path_buf);
        }
        paths::project_root(&self.cwd).unwrap_or_else(|| self.cwd.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_depth() {
        let config = LsConfig::new(PathBuf::from("/p"));
        assert_eq!(config.effective_depth(), Some(0));
        assert_eq!(config.clone().with_all(true).effective_depth(), None);
        assert_eq!(
            config.clone().with_terms(vec!["foo".into()]).effective_depth(),
            None
        );
        assert_eq!(
            config
                .clone()
                .with_all(true)
                .with_depth(Some(1))
                .effective_depth(),
            Some(1)
        );
        assert_eq!(config.with_depth(Some(usize::MAX)).effective_depth(), None);
    }

    #[test]
    fn test_npmrc_then_overrides() {
        let settings = NpmrcSettings {
            depth: Some(3),
            long: Some(true),
            ..NpmrcSettings::default()
        };
        let config = LsConfig::new(PathBuf::from("/p"))
            .with_npmrc(&settings)
            .with_depth(Some(1));
        assert_eq!(config.depth, Some(1));
        assert!(config.long);
    }

    #[test]
    fn test_global_root() {
        let config = LsConfig::new(PathBuf::from("/p"))
            .with_global(true)
            .with_global_dir(PathBuf::from("/opt/node/lib/node_modules"));
        assert_eq!(config.load_root(), PathBuf::from("/opt/node/lib"));

        let config = LsConfig::new(PathBuf::from("/p"))
            .with_global(true)
            .with_prefix(PathBuf::from("/usr/local"));
        assert_eq!(config.global_modules_dir(), paths::global_dir(Path::new("/usr/local")));
    }

    #[test]
    fn test_output_format_serde() {
        assert_eq!(
            serde_json::to_string(&OutputFormat::Parseable).unwrap(),
            "\"parseable\""
        );
        assert_eq!(OutputFormat::default().as_str(), "tree");
    }
}
