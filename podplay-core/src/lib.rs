//! PodPlay core library — domain types, settings, user configuration, errors.
//!
//! Public API surface:
//! - [`types`] — artifacts, change events, service kinds, reload outcomes
//! - [`settings`] — filesystem layout, external commands, health probes
//! - [`users`] — the YAML user configuration and its derived mail accounts
//! - [`password`] — SHA-512 crypt hashing for the credential database
//! - [`error`] — [`CoreError`]

pub mod error;
pub mod password;
pub mod settings;
pub mod types;
pub mod users;

pub use error::CoreError;
pub use settings::{CommandSpec, Settings};
pub use types::{
    ArtifactKind, ChangeEvent, ChangeKind, OutcomeStatus, ReloadKey, ReloadOutcome, ReloadState,
    ServiceKind, WatchedArtifact,
};
pub use users::{Account, UserConfig, UserService};
