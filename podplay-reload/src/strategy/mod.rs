//! Service-specific reload sequences.
//!
//! One [`ReloadStrategy`] exists per watch session and is shared by every
//! event it handles. The pipeline drives it through
//! validate → back up → execute → health check.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use podplay_core::types::{ServiceKind, WatchedArtifact};
use podplay_core::Settings;

use crate::backup::{Backup, BackupManager};
use crate::error::ReloadError;

pub mod dkim;
pub mod mail;
pub mod users;
pub mod web;

pub use dkim::DkimStrategy;
pub use mail::MailStrategy;
pub use users::UsersStrategy;
pub use web::WebStrategy;

/// What [`ReloadStrategy::execute`] gets to work with.
pub struct ExecuteContext<'a> {
    pub artifact: &'a WatchedArtifact,
    /// Backups taken during this reload, in `backup_targets` order.
    pub backups: &'a [Backup],
    pub backup_manager: &'a BackupManager,
}

impl ExecuteContext<'_> {
    pub fn backup_of(&self, original: &Path) -> Option<&Backup> {
        self.backups.iter().find(|b| b.original == original)
    }
}

/// What happened during execute, beyond plain success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteReport {
    /// Best-effort steps that did not complete.
    pub degraded: Vec<String>,
    /// Exit status of a reload command whose failure is not terminal.
    pub reload_confirmed: Option<bool>,
}

impl ExecuteReport {
    pub fn degrade(&mut self, note: impl Into<String>) {
        let note = note.into();
        tracing::warn!(note = %note, "degraded step");
        self.degraded.push(note);
    }
}

#[async_trait]
pub trait ReloadStrategy: Send + Sync {
    fn service(&self) -> ServiceKind;

    /// Check the artifact before anything on disk is touched.
    async fn validate(&self, artifact: &WatchedArtifact) -> Result<(), ReloadError>;

    /// Files to copy aside before [`execute`](Self::execute) modifies anything.
    /// Paths that do not exist are skipped.
    fn backup_targets(&self, artifact: &WatchedArtifact) -> Vec<PathBuf>;

    async fn execute(&self, ctx: ExecuteContext<'_>) -> Result<ExecuteReport, ReloadError>;

    async fn health_check(&self, report: &ExecuteReport) -> bool;
}

/// Build the strategy for `kind`.
pub fn for_service(
    kind: ServiceKind,
    settings: Arc<Settings>,
    domain: Option<String>,
) -> Arc<dyn ReloadStrategy> {
    match kind {
        ServiceKind::Web => Arc::new(WebStrategy::new(settings)),
        ServiceKind::Mail => Arc::new(MailStrategy::new(settings)),
        ServiceKind::Dkim => Arc::new(DkimStrategy::new(settings, domain)),
        ServiceKind::Users => Arc::new(UsersStrategy::new(settings)),
    }
}

/// Domain for `artifact`: the segment under the watched root, else the
/// session's `--domain`, else the name of the artifact's directory.
pub(crate) fn resolve_domain(
    artifact: &WatchedArtifact,
    fallback: Option<&str>,
) -> Result<String, ReloadError> {
    artifact
        .domain
        .clone()
        .or_else(|| fallback.map(str::to_string))
        .or_else(|| {
            artifact
                .dir()
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ReloadError::NoDomain {
            path: artifact.path.clone(),
        })
}
