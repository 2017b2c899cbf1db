use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use podplay_core::types::{ChangeEvent, ReloadKey, ServiceKind, WatchedArtifact};
use podplay_core::Settings;
use podplay_reload::ReloadPipeline;

use crate::error::{io_err, DaemonError};
use crate::scan;
use crate::scheduler::Debouncer;
use crate::watcher::{recognizer_for, FileWatcher};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// One watch session.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub root: PathBuf,
    pub recursive: bool,
    pub hot_reload: bool,
    pub service: Option<ServiceKind>,
    /// Domain used when the changed path does not name one.
    pub domain: Option<String>,
    pub settings: Settings,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Install tracing and block the current thread on a watch session until
/// ctrl-c.
pub fn start_blocking(options: WatchOptions, format: LogFormat) -> Result<(), DaemonError> {
    init_tracing(format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options))
}

/// Run a watch session until ctrl-c.
pub async fn run(options: WatchOptions) -> Result<(), DaemonError> {
    run_until(options, async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| DaemonError::Signal(e.to_string()))?;
        tracing::info!("received ctrl-c, stopping watch session");
        Ok(())
    })
    .await
}

/// Run a watch session until `shutdown` resolves.
///
/// Pending reloads are cancelled on the way out; a reload already executing
/// is not interrupted.
pub async fn run_until<S>(options: WatchOptions, shutdown: S) -> Result<(), DaemonError>
where
    S: Future<Output = Result<(), DaemonError>>,
{
    let session = Session::new(&options)?;
    let mut watcher = FileWatcher::start(
        &options.root,
        options.recursive,
        recognizer_for(options.service),
    )?;
    let root = watcher.root().to_path_buf();

    let summary = scan::scan(&root, options.recursive)?;
    scan::log_summary(&root, &summary);

    match session.pipeline {
        Some(ref pipeline) => tracing::info!(
            service = %pipeline.service(),
            debounce_ms = session.delay.as_millis() as u64,
            "hot reload enabled",
        ),
        None => tracing::info!("watch-only session, changes are logged"),
    }

    tokio::pin!(shutdown);
    let result = loop {
        tokio::select! {
            signal = &mut shutdown => break signal,
            event = watcher.next() => {
                let Some(event) = event else {
                    tracing::warn!("watcher channel closed");
                    break Ok(());
                };
                session.handle(&root, event);
            }
        }
    };

    let cancelled = session.debouncer.cancel_all();
    if cancelled > 0 {
        tracing::info!(cancelled, "dropped pending reloads");
    }
    tracing::info!("watch session stopped");
    result
}

pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("PODPLAY_LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Session {
    pipeline: Option<Arc<ReloadPipeline>>,
    debouncer: Debouncer,
    delay: Duration,
    domain: Option<String>,
    /// File name that triggers a users reload.
    user_config_name: Option<OsString>,
}

impl Session {
    fn new(options: &WatchOptions) -> Result<Session, DaemonError> {
        let pipeline = if options.hot_reload {
            let service = options.service.ok_or(DaemonError::MissingServiceType)?;
            Some(Arc::new(ReloadPipeline::for_service(
                service,
                Arc::new(options.settings.clone()),
                options.domain.clone(),
            )))
        } else {
            None
        };
        Ok(Session {
            pipeline,
            debouncer: Debouncer::new(),
            delay: options.settings.debounce(),
            domain: options.domain.clone(),
            user_config_name: options
                .settings
                .paths
                .user_config
                .file_name()
                .map(|n| n.to_os_string()),
        })
    }

    fn handle(&self, root: &Path, event: ChangeEvent) {
        match &event.source {
            Some(source) => tracing::info!(
                kind = %event.kind,
                from = %source.display(),
                path = %event.path.display(),
                "change detected",
            ),
            None => tracing::info!(kind = %event.kind, path = %event.path.display(), "change detected"),
        }

        if !event.triggers_reload() {
            tracing::info!(path = %event.path.display(), "deletion observed, nothing to reload");
            return;
        }
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        let service = pipeline.service();

        if service == ServiceKind::Users
            && event.path.file_name() != self.user_config_name.as_deref()
        {
            tracing::info!(path = %event.path.display(), "not the user configuration, ignored");
            return;
        }
        let Some(artifact) = WatchedArtifact::from_path(root, &event.path) else {
            tracing::debug!(path = %event.path.display(), "unrecognised artifact");
            return;
        };

        let key = self.reload_key(service, &artifact);
        let pipeline = pipeline.clone();
        let reload_key = ReloadKey::new(service, key.clone());
        let scheduled = self.debouncer.schedule(reload_key.clone(), self.delay, move || async move {
            pipeline.run(&key, &artifact).await;
        });
        if scheduled {
            tracing::info!(
                key = %reload_key,
                delay_ms = self.delay.as_millis() as u64,
                "reload scheduled",
            );
        }
    }

    /// Users reloads key on the config path; everything else on the domain,
    /// falling back to the artifact's directory.
    fn reload_key(&self, service: ServiceKind, artifact: &WatchedArtifact) -> String {
        if service == ServiceKind::Users {
            return artifact.path.display().to_string();
        }
        artifact
            .domain
            .clone()
            .or_else(|| self.domain.clone())
            .unwrap_or_else(|| artifact.dir().display().to_string())
    }
}
