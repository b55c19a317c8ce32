use std::path::PathBuf;
use thiserror::Error;

/// Stable error codes reported alongside errors.
pub mod codes {
    pub const EJSONPARSE: &str = "EJSONPARSE";
    pub const ELSPROBLEMS: &str = "ELSPROBLEMS";
    pub const ENOENT: &str = "ENOENT";
    pub const EINVALIDTERM: &str = "EINVALIDTERM";
    pub const ECONFIG: &str = "ECONFIG";
    pub const EIO: &str = "EIO";
}

/// Core error type for nmls operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse package.json at {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No package.json found at {}", path.display())]
    ManifestNotFound { path: PathBuf },

    /// Tree-integrity problems; the message is the newline-joined problem list.
    #[error("{message}")]
    Problems { message: String },

    #[error("Invalid filter term '{term}': {reason}")]
    InvalidTerm { term: String, reason: String },

    #[error("Invalid config value for '{key}' in {}: {value}", path.display())]
    ConfigParse {
        path: PathBuf,
        key: String,
        value: String,
    },
}

impl Error {
    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => codes::EIO,
            Self::ManifestParse { .. } => codes::EJSONPARSE,
            Self::ManifestNotFound { .. } => codes::ENOENT,
            Self::Problems { .. } => codes::ELSPROBLEMS,
            Self::InvalidTerm { .. } => codes::EINVALIDTERM,
            Self::ConfigParse { .. } => codes::ECONFIG,
        }
    }

    #[must_use]
    pub fn invalid_term(term: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTerm {
            term: term.into(),
            reason: reason.into(),
        }
    }
}
