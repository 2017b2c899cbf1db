use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watch session.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch root {path} does not exist")]
    RootNotFound { path: PathBuf },

    #[error("--hot-reload requires --service-type")]
    MissingServiceType,

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("ctrl-c handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
