//! `ls`: load, classify, filter, and decide the completion status.

use serde_json::Value;

use super::filter::{build_view, FilterOptions, TreeView};
use super::load::{load_tree, LoadOptions};
use super::problems::{detect_problems, ProblemReport};
use super::render::{render_json, render_parseable, render_tree, RenderOptions};
use super::spec::FilterTerm;
use super::tree::PackageTree;
use crate::config::{LsConfig, OutputFormat};
use crate::error::Error;

/// Overall completion status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsStatus {
    Ok,
    /// The tree has problems that fail the listing (`ELSPROBLEMS`).
    Problems,
    /// Filter terms were given and nothing matched.
    NoMatch,
}

impl LsStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Problems => "problems",
            Self::NoMatch => "no-match",
        }
    }
}

/// Everything a listing produced. Output is rendered from it regardless of
/// status; `error` carries the load failure, if any.
#[derive(Debug)]
pub struct LsOutcome {
    pub tree: PackageTree,
    pub report: ProblemReport,
    pub view: TreeView,
    pub status: LsStatus,
    pub error: Option<Error>,
}

impl LsOutcome {
    /// Render in the given format.
    #[must_use]
    pub fn render(&self, format: OutputFormat, options: RenderOptions) -> String {
        match format {
            OutputFormat::Json => {
                let value = self.to_json(options);
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
            OutputFormat::Parseable => render_parseable(&self.tree, &self.view, options),
            OutputFormat::Tree => render_tree(&self.tree, &self.view, options),
        }
    }

    #[must_use]
    pub fn to_json(&self, options: RenderOptions) -> Value {
        render_json(&self.tree, &self.view, &self.report, options)
    }

    /// Process exit code: 0 ok, 1 for problems, load failures and no match.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.error.is_some() || self.status != LsStatus::Ok {
            1
        } else {
            0
        }
    }

    /// The error to report, in precedence order: load failure, then
    /// `ELSPROBLEMS`. A no-match status is not an error.
    pub fn into_result(self) -> Result<LsStatus, Error> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.status == LsStatus::Problems {
            return Err(Error::Problems {
                message: self.report.to_message(),
            });
        }
        Ok(self.status)
    }
}

/// Run a listing for `config`.
///
/// # Errors
/// Returns [`Error::InvalidTerm`] when a filter term cannot be parsed.
/// Load failures and tree problems are reported through the outcome.
pub fn run_ls(config: &LsConfig) -> Result<LsOutcome, Error> {
    let terms = config
        .terms
        .iter()
        .map(|t| FilterTerm::parse(t))
        .collect::<Result<Vec<_>, _>>()?;

    let root = config.load_root();
    let _span = tracing::debug_span!("ls", root = %root.display(), global = config.global).entered();

    let loaded = load_tree(
        &root,
        LoadOptions {
            global: config.global,
        },
    );
    let mut tree = loaded.tree;
    let report = detect_problems(&mut tree);

    let view = build_view(
        &tree,
        &FilterOptions {
            terms,
            depth: config.effective_depth(),
            dep_types: config.dep_types,
            link: config.link,
        },
    );

    let status = if loaded.error.is_none() && report.is_failure() {
        LsStatus::Problems
    } else if view.filtered && view.is_empty() {
        LsStatus::NoMatch
    } else {
        LsStatus::Ok
    };

    tracing::debug!(
        nodes = tree.len(),
        problems = report.len(),
        status = status.as_str(),
        "listing complete"
    );

    Ok(LsOutcome {
        tree,
        report,
        view,
        status,
        error: loaded.error,
    })
}
