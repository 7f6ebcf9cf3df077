//! Error types for the graph updater.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort or degrade an ingestion run.
///
/// Only `Config` and `Writer` are fatal to a run; everything else is
/// logged, counted in the [`crate::RunReport`] and worked around.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// Bad configuration (missing path, conflicting flags). Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A subtree could not be read during discovery.
    #[error("Discovery error under {}: {message}", path.display())]
    Discovery { path: PathBuf, message: String },

    /// The grammar failed outright for a file.
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// A specialized analyzer could not make sense of a construct.
    #[error("Analyzer error in {path}: {message}")]
    Analyzer { path: String, message: String },

    /// Graph client failure that survived the retry budget. Fatal.
    #[error("Writer error: {0}")]
    Writer(String),

    /// The run was cancelled cooperatively.
    #[error("Run cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UpdaterError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// True when the error must surface as a non-zero exit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Writer(_))
    }
}

impl From<std::io::Error> for UpdaterError {
    fn from(err: std::io::Error) -> Self {
        UpdaterError::Io { path: PathBuf::new(), source: err }
    }
}
