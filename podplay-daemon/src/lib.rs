//! # podplay-daemon
//!
//! The watch session: filesystem notifications, per-key debouncing and the
//! hand-off to [`podplay_reload::ReloadPipeline`].

pub mod error;
pub mod runtime;
pub mod scan;
pub mod scheduler;
pub mod watcher;

pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_until, start_blocking, LogFormat, WatchOptions};
pub use scan::{find_certificates, scan, ScanSummary};
pub use scheduler::Debouncer;
pub use watcher::{recognizer_for, translate, EventFilter, FileWatcher};
