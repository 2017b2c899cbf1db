//! Web server: config test, graceful reload, HTTP/HTTPS probes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use podplay_core::types::{ServiceKind, WatchedArtifact};
use podplay_core::Settings;
use podplay_validator::validate_artifact;

use super::{ExecuteContext, ExecuteReport, ReloadStrategy};
use crate::command::run_spec;
use crate::error::ReloadError;
use crate::health::probe_ports;

pub struct WebStrategy {
    settings: Arc<Settings>,
}

impl WebStrategy {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ReloadStrategy for WebStrategy {
    fn service(&self) -> ServiceKind {
        ServiceKind::Web
    }

    async fn validate(&self, artifact: &WatchedArtifact) -> Result<(), ReloadError> {
        validate_artifact(artifact)?;
        Ok(())
    }

    /// Certificates are served in place; the previous copy is already gone.
    fn backup_targets(&self, _artifact: &WatchedArtifact) -> Vec<PathBuf> {
        Vec::new()
    }

    async fn execute(&self, _ctx: ExecuteContext<'_>) -> Result<ExecuteReport, ReloadError> {
        let commands = &self.settings.commands;
        run_spec(&commands.web_config_test, &[]).await?;
        run_spec(&commands.web_reload, &[]).await?;
        tracing::info!("web server reloaded");
        Ok(ExecuteReport::default())
    }

    async fn health_check(&self, _report: &ExecuteReport) -> bool {
        let health = &self.settings.health;
        probe_ports(&health.host, &health.web_ports, health.connect_timeout()).await
    }
}
