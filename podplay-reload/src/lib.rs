//! # podplay-reload
//!
//! Service reloads triggered by changed artifacts.
//!
//! Build a [`ReloadPipeline`] for a [`ServiceKind`](podplay_core::ServiceKind)
//! and call [`ReloadPipeline::run`] per debounced change. The pipeline drives
//! the service's [`ReloadStrategy`] through validation, backups, execution and
//! the health check, and reports a [`ReloadOutcome`](podplay_core::ReloadOutcome).

pub mod backup;
pub mod command;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod strategy;
pub mod writer;

pub use backup::{Backup, BackupManager};
pub use command::{CommandOutput, ExternalCommand};
pub use error::ReloadError;
pub use pipeline::ReloadPipeline;
pub use strategy::{for_service, ExecuteContext, ExecuteReport, ReloadStrategy};
pub use writer::{atomic_write, WriteResult};
