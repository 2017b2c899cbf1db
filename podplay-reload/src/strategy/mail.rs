//! Mail: install a domain's certificate pair for the MTA and mailbox agent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use podplay_core::types::{ServiceKind, WatchedArtifact, CERT_FILE, KEY_FILE};
use podplay_core::Settings;
use podplay_validator::{require_present, validate_pem};

use super::{ExecuteContext, ExecuteReport, ReloadStrategy};
use crate::command::run_spec;
use crate::error::ReloadError;
use crate::health::probe_ports;
use crate::writer::{atomic_copy, chown_group, set_mode};

const CERT_MODE: u32 = 0o644;
const KEY_MODE: u32 = 0o640;

pub struct MailStrategy {
    settings: Arc<Settings>,
}

impl MailStrategy {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// `fullchain.pem` and `privkey.pem` beside the changed file.
    fn pair(artifact: &WatchedArtifact) -> (PathBuf, PathBuf) {
        let dir = artifact.dir();
        (dir.join(CERT_FILE), dir.join(KEY_FILE))
    }

    fn install(
        &self,
        source: &Path,
        dest: &Path,
        mode: u32,
        group: Option<&str>,
        report: &mut ExecuteReport,
    ) -> Result<(), ReloadError> {
        atomic_copy(source, dest)?;
        set_mode(dest, mode)?;
        if let Some(group) = group {
            if let Err(reason) = chown_group(dest, group) {
                report.degrade(reason);
            }
        }
        tracing::debug!(source = %source.display(), dest = %dest.display(), "installed");
        Ok(())
    }
}

#[async_trait]
impl ReloadStrategy for MailStrategy {
    fn service(&self) -> ServiceKind {
        ServiceKind::Mail
    }

    async fn validate(&self, artifact: &WatchedArtifact) -> Result<(), ReloadError> {
        let (cert, key) = Self::pair(artifact);
        require_present(&[cert.as_path(), key.as_path()])?;
        validate_pem(&cert)?;
        validate_pem(&key)?;
        Ok(())
    }

    fn backup_targets(&self, _artifact: &WatchedArtifact) -> Vec<PathBuf> {
        let paths = &self.settings.paths;
        vec![
            paths.postfix_cert.clone(),
            paths.postfix_key.clone(),
            paths.dovecot_cert.clone(),
            paths.dovecot_key.clone(),
        ]
    }

    async fn execute(&self, ctx: ExecuteContext<'_>) -> Result<ExecuteReport, ReloadError> {
        let (cert, key) = Self::pair(ctx.artifact);
        let paths = &self.settings.paths;
        let mut report = ExecuteReport::default();

        self.install(&cert, &paths.postfix_cert, CERT_MODE, None, &mut report)?;
        self.install(
            &key,
            &paths.postfix_key,
            KEY_MODE,
            Some(&self.settings.mail_group),
            &mut report,
        )?;
        self.install(&cert, &paths.dovecot_cert, CERT_MODE, None, &mut report)?;
        self.install(
            &key,
            &paths.dovecot_key,
            KEY_MODE,
            Some(&self.settings.auth_group),
            &mut report,
        )?;

        let commands = &self.settings.commands;
        run_spec(&commands.postfix_reload, &[]).await?;
        run_spec(&commands.dovecot_reload, &[]).await?;
        tracing::info!(dir = %ctx.artifact.dir().display(), "mail certificates installed and services reloaded");
        Ok(report)
    }

    async fn health_check(&self, _report: &ExecuteReport) -> bool {
        let health = &self.settings.health;
        probe_ports(&health.host, &health.mail_ports, health.connect_timeout()).await
    }
}
