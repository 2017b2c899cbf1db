//! The reload state machine shared by every service.
//!
//! ```text
//! Validating ──fail──────────────────────────────────────▶ Failed
//!     │
//! BackingUp  (failures logged, never block)
//!     │
//! Executing ──fail───────────────────────────────────────▶ Failed
//!     │
//! HealthChecking ──fail──▶ Failed (reported as partial success)
//!     │
//! Completed
//! ```
//!
//! Nothing is restored automatically after a failed health check; the
//! backups stay in place for manual recovery.

use std::sync::Arc;

use tracing::Instrument;

use podplay_core::types::{
    OutcomeStatus, ReloadOutcome, ReloadState, ServiceKind, WatchedArtifact,
};
use podplay_core::Settings;

use crate::backup::{Backup, BackupManager};
use crate::strategy::{self, ExecuteContext, ReloadStrategy};

pub struct ReloadPipeline {
    strategy: Arc<dyn ReloadStrategy>,
    backups: BackupManager,
}

impl ReloadPipeline {
    pub fn new(strategy: Arc<dyn ReloadStrategy>, backups: BackupManager) -> Self {
        Self { strategy, backups }
    }

    /// Pipeline for `kind` with the strategy and backup directory from `settings`.
    pub fn for_service(kind: ServiceKind, settings: Arc<Settings>, domain: Option<String>) -> Self {
        let backups = BackupManager::new(settings.paths.backup_dir.clone());
        Self::new(strategy::for_service(kind, settings, domain), backups)
    }

    pub fn service(&self) -> ServiceKind {
        self.strategy.service()
    }

    /// Carry out one reload for `artifact` inside a `reload` span.
    ///
    /// Never fails: every error ends up in the returned outcome.
    pub async fn run(&self, key: &str, artifact: &WatchedArtifact) -> ReloadOutcome {
        let span = tracing::info_span!("reload", component = %self.service(), key = %key);
        let outcome = self.run_states(key, artifact).instrument(span.clone()).await;
        span.in_scope(|| log_outcome(&outcome));
        outcome
    }

    async fn run_states(&self, key: &str, artifact: &WatchedArtifact) -> ReloadOutcome {
        let mut outcome = ReloadOutcome::new(self.service(), key);
        tracing::info!(path = %artifact.path.display(), kind = %artifact.kind, "reload started");

        enter(&mut outcome, ReloadState::Validating);
        if let Err(err) = self.strategy.validate(artifact).await {
            return fail(outcome, err.to_string());
        }
        outcome.validated = true;

        enter(&mut outcome, ReloadState::BackingUp);
        let backups = self.back_up(artifact, &mut outcome);

        enter(&mut outcome, ReloadState::Executing);
        let ctx = ExecuteContext {
            artifact,
            backups: &backups,
            backup_manager: &self.backups,
        };
        let report = match self.strategy.execute(ctx).await {
            Ok(report) => report,
            Err(err) => return fail(outcome, err.to_string()),
        };
        outcome.service_reload_success = true;
        outcome.degraded = report.degraded.clone();

        enter(&mut outcome, ReloadState::HealthChecking);
        if self.strategy.health_check(&report).await {
            outcome.health_check_passed = true;
            outcome.success = true;
            enter(&mut outcome, ReloadState::Completed);
        } else {
            outcome.error = Some("health check failed".to_string());
            enter(&mut outcome, ReloadState::Failed);
        }
        outcome
    }

    fn back_up(&self, artifact: &WatchedArtifact, outcome: &mut ReloadOutcome) -> Vec<Backup> {
        let mut taken = Vec::new();
        let mut all_ok = true;
        for target in self.strategy.backup_targets(artifact) {
            if !target.exists() {
                tracing::debug!(path = %target.display(), "nothing to back up");
                continue;
            }
            match self.backups.backup(&target) {
                Ok(backup) => taken.push(backup),
                Err(err) => {
                    all_ok = false;
                    tracing::warn!(path = %target.display(), error = %err, "backup failed; continuing");
                }
            }
        }
        outcome.backed_up = all_ok;
        taken
    }
}

fn enter(outcome: &mut ReloadOutcome, state: ReloadState) {
    tracing::debug!(state = %state, "state");
    outcome.final_state = state;
}

fn fail(mut outcome: ReloadOutcome, error: String) -> ReloadOutcome {
    tracing::debug!(state = %outcome.final_state, error = %error, "state failed");
    outcome.error = Some(error);
    outcome.final_state = ReloadState::Failed;
    outcome
}

fn log_outcome(outcome: &ReloadOutcome) {
    let error = outcome.error.as_deref().unwrap_or("");
    match outcome.status() {
        OutcomeStatus::Completed => tracing::info!(
            degraded = ?outcome.degraded,
            "reload completed",
        ),
        OutcomeStatus::PartialSuccess => tracing::warn!(
            degraded = ?outcome.degraded,
            error,
            "partial success: service reloaded but health check failed",
        ),
        OutcomeStatus::Failed => tracing::error!(
            validated = outcome.validated,
            backed_up = outcome.backed_up,
            error,
            "reload failed",
        ),
    }
}
