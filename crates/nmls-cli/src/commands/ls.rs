//! `nmls ls` command implementation.
//!
//! Prints the listing to stdout in every case, then reports the outcome:
//! load failures and tree problems as errors, a filter that matched
//! nothing as exit code 1 without an error.

use clap::Args;
use miette::{miette, Result};
use nmls_core::paths;
use nmls_core::pkg::{load_npmrc_files, DepTypes};
use nmls_core::{run_ls, LsConfig, LsStatus, OutputFormat, RenderOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone, Default)]
pub struct LsArgs {
    /// Packages to show, as `name`, `@scope/name`, `name@range` or `.`
    pub terms: Vec<String>,

    /// Maximum depth below the project (0 = direct dependencies)
    #[arg(long, env = "NMLS_DEPTH", value_name = "N")]
    pub depth: Option<usize>,

    /// Show the whole tree, not only direct dependencies
    #[arg(short, long)]
    pub all: bool,

    /// List globally installed packages
    #[arg(short, long, env = "NMLS_GLOBAL")]
    pub global: bool,

    /// Global install prefix
    #[arg(long, env = "NMLS_PREFIX", value_name = "PATH")]
    pub prefix: Option<PathBuf>,

    /// Global node_modules directory (overrides --prefix)
    #[arg(long, value_name = "PATH")]
    pub global_dir: Option<PathBuf>,

    /// Emit the listing as JSON
    #[arg(long, conflicts_with = "parseable")]
    pub json: bool,

    /// Emit one path per line
    #[arg(short, long)]
    pub parseable: bool,

    /// Show extended information
    #[arg(short, long)]
    pub long: bool,

    /// Draw the tree with unicode characters
    #[arg(long, env = "NMLS_UNICODE")]
    pub unicode: bool,

    /// Only development dependencies
    #[arg(long, conflicts_with = "prod")]
    pub dev: bool,

    /// Only production dependencies
    #[arg(long, alias = "production")]
    pub prod: bool,

    /// Restrict to development or production dependencies
    #[arg(long, value_name = "TYPE", value_parser = ["dev", "development", "prod", "production"])]
    pub only: Option<String>,

    /// Only symlinked packages
    #[arg(long)]
    pub link: bool,
}

impl LsArgs {
    fn dep_types(&self) -> DepTypes {
        match self.only.as_deref() {
            _ if self.dev => DepTypes::only_dev(),
            _ if self.prod => DepTypes::only_prod(),
            Some("dev" | "development") => DepTypes::only_dev(),
            Some("prod" | "production") => DepTypes::only_prod(),
            _ => DepTypes::all(),
        }
    }

    fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.parseable {
            OutputFormat::Parseable
        } else {
            OutputFormat::Tree
        }
    }
}

/// Build the run configuration: defaults, then `.npmrc`, then flags.
pub fn config(cwd: &Path, args: &LsArgs) -> Result<LsConfig> {
    let project = paths::project_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
    let npmrc = load_npmrc_files(&project).map_err(|e| miette!(code = e.code(), "{e}"))?;

    let mut config = LsConfig::new(cwd.to_path_buf())
        .with_npmrc(&npmrc)
        .with_terms(args.terms.clone())
        .with_format(args.format())
        .with_dep_types(args.dep_types())
        .with_link(args.link);

    if args.depth.is_some() {
        config = config.with_depth(args.depth);
    }
    if args.all {
        config = config.with_all(true);
    }
    if args.global {
        config = config.with_global(true);
    }
    if let Some(prefix) = &args.prefix {
        config = config.with_prefix(prefix.clone());
    }
    if let Some(dir) = &args.global_dir {
        config = config.with_global_dir(dir.clone());
    }
    if args.long {
        config = config.with_long(true);
    }
    if args.unicode {
        config = config.with_unicode(true);
    }

    Ok(config)
}

/// Run the ls command.
pub fn run(cwd: &Path, args: &LsArgs) -> Result<()> {
    let config = config(cwd, args)?;
    let outcome = run_ls(&config).map_err(|e| miette!(code = e.code(), "{e}"))?;

    let rendered = outcome.render(
        config.format,
        RenderOptions {
            long: config.long,
            unicode: config.unicode,
        },
    );
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "{rendered}");
    if !rendered.ends_with('\n') {
        let _ = writeln!(stdout);
    }
    let _ = stdout.flush();
    drop(stdout);

    match outcome.into_result() {
        Ok(LsStatus::NoMatch) => {
            tracing::debug!("no package matched the given terms");
            std::process::exit(1);
        }
        Ok(_) => Ok(()),
        Err(e) => Err(miette!(code = e.code(), "{e}")),
    }
}
