//! DKIM: publish a domain's generated public key in its BIND zone.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;

use podplay_core::types::{ServiceKind, WatchedArtifact, DKIM_PRIVATE_FILE, DKIM_RECORD_FILE};
use podplay_core::Settings;
use podplay_validator::require_present;
use podplay_zone::{extract_public_key, patch_zone};

use super::{resolve_domain, ExecuteContext, ExecuteReport, ReloadStrategy};
use crate::command::run_spec;
use crate::error::{io_err, ReloadError};
use crate::writer::atomic_write;

pub struct DkimStrategy {
    settings: Arc<Settings>,
    domain: Option<String>,
}

impl DkimStrategy {
    pub fn new(settings: Arc<Settings>, domain: Option<String>) -> Self {
        Self { settings, domain }
    }

    fn domain_for(&self, artifact: &WatchedArtifact) -> Result<String, ReloadError> {
        resolve_domain(artifact, self.domain.as_deref())
    }

    fn zone_file(&self, artifact: &WatchedArtifact) -> Result<PathBuf, ReloadError> {
        Ok(self.settings.paths.zone_file(&self.domain_for(artifact)?))
    }

    /// Put the zone back after the checker rejected the patched text.
    fn restore_zone(&self, ctx: &ExecuteContext<'_>, zone_path: &Path, original: &str) {
        let restored = match ctx.backup_of(zone_path) {
            Some(backup) => ctx.backup_manager.restore(&backup.copy, zone_path),
            None => fs::write(zone_path, original).map_err(|e| io_err(zone_path, e)),
        };
        if let Err(err) = restored {
            tracing::error!(zone = %zone_path.display(), error = %err, "failed to restore zone");
        }
    }
}

/// Read `default.txt` and pull out its `p=` payload.
pub fn read_public_key(record_path: &Path) -> Result<String, ReloadError> {
    let text = fs::read_to_string(record_path).map_err(|e| io_err(record_path, e))?;
    extract_public_key(&text).ok_or_else(|| ReloadError::NoPublicKey {
        path: record_path.to_path_buf(),
    })
}

#[async_trait]
impl ReloadStrategy for DkimStrategy {
    fn service(&self) -> ServiceKind {
        ServiceKind::Dkim
    }

    async fn validate(&self, artifact: &WatchedArtifact) -> Result<(), ReloadError> {
        let dir = artifact.dir();
        let record = dir.join(DKIM_RECORD_FILE);
        let private = dir.join(DKIM_PRIVATE_FILE);
        require_present(&[record.as_path(), private.as_path()])?;
        read_public_key(&record)?;
        self.domain_for(artifact)?;
        Ok(())
    }

    fn backup_targets(&self, artifact: &WatchedArtifact) -> Vec<PathBuf> {
        self.zone_file(artifact).into_iter().collect()
    }

    async fn execute(&self, ctx: ExecuteContext<'_>) -> Result<ExecuteReport, ReloadError> {
        let domain = self.domain_for(ctx.artifact)?;
        let key = read_public_key(&ctx.artifact.dir().join(DKIM_RECORD_FILE))?;
        let zone_path = self.settings.paths.zone_file(&domain);

        let original = fs::read_to_string(&zone_path).map_err(|e| io_err(&zone_path, e))?;
        let patch = patch_zone(&original, &key, Local::now().date_naive())?;
        atomic_write(&zone_path, &patch.text)?;
        tracing::info!(
            domain = %domain,
            old_serial = %patch.old_serial,
            new_serial = %patch.new_serial,
            edit = ?patch.edit,
            "zone patched",
        );

        let zone_file = zone_path.to_string_lossy().to_string();
        let vars = [("domain", domain.as_str()), ("zone_file", zone_file.as_str())];
        let commands = &self.settings.commands;

        if let Err(err) = run_spec(&commands.zone_check, &vars).await {
            self.restore_zone(&ctx, &zone_path, &original);
            return Err(ReloadError::ZoneRejected {
                domain,
                source: Box::new(err),
            });
        }

        // The patched zone stays in place; the next successful reload picks it up.
        run_spec(&commands.zone_reload, &vars).await?;
        tracing::info!(domain = %domain, "zone reloaded");

        Ok(ExecuteReport {
            reload_confirmed: Some(true),
            ..ExecuteReport::default()
        })
    }

    async fn health_check(&self, report: &ExecuteReport) -> bool {
        report.reload_confirmed.unwrap_or(false)
    }
}
