//! Error types for podplay-reload.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use podplay_core::CoreError;
use podplay_validator::ValidationError;
use podplay_zone::ZoneError;

/// All errors that can arise while carrying out a reload.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The changed artifact failed its structural check.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A DKIM record file without a `p=` payload.
    #[error("no DKIM public key found in {path}")]
    NoPublicKey { path: PathBuf },

    /// Neither the path nor the session names a domain.
    #[error("cannot determine the domain for {path}")]
    NoDomain { path: PathBuf },

    /// The program could not be started at all.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    Subprocess {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The zone checker rejected the patched zone; the previous file is back.
    #[error("zone check for {domain} failed, previous zone restored: {source}")]
    ZoneRejected {
        domain: String,
        #[source]
        source: Box<ReloadError>,
    },

    #[error("zone error: {0}")]
    Zone(#[from] ZoneError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`ReloadError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ReloadError {
    ReloadError::Io {
        path: path.into(),
        source,
    }
}
