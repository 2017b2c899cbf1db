//! Domain types for the hot-reload subsystem.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Certificate chain file name inside a domain's certificate directory.
pub const CERT_FILE: &str = "fullchain.pem";
/// Private key file name inside a domain's certificate directory.
pub const KEY_FILE: &str = "privkey.pem";
/// Public TXT record emitted by the DKIM key generator.
pub const DKIM_RECORD_FILE: &str = "default.txt";
/// Private signing key emitted by the DKIM key generator.
pub const DKIM_PRIVATE_FILE: &str = "default.private";

// ---------------------------------------------------------------------------
// Service kinds
// ---------------------------------------------------------------------------

/// The service a watch session reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Apache web server (TLS certificates).
    Web,
    /// Postfix + Dovecot (TLS certificates).
    Mail,
    /// BIND zone publishing DKIM keys.
    Dkim,
    /// Mail account provisioning from the user configuration.
    Users,
}

impl ServiceKind {
    pub fn all() -> &'static [ServiceKind] {
        &[
            ServiceKind::Web,
            ServiceKind::Mail,
            ServiceKind::Dkim,
            ServiceKind::Users,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Web => "web",
            ServiceKind::Mail => "mail",
            ServiceKind::Dkim => "dkim",
            ServiceKind::Users => "users",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web" | "apache" => Ok(ServiceKind::Web),
            "mail" => Ok(ServiceKind::Mail),
            "dkim" | "dns" => Ok(ServiceKind::Dkim),
            "users" | "user" => Ok(ServiceKind::Users),
            other => Err(format!(
                "unknown service type '{other}'; expected: web, mail, dkim, users"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// What a watched file is, judged from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Certificate,
    PrivateKey,
    DkimRecord,
    UserConfig,
}

impl ArtifactKind {
    /// Classify `path` by file name and extension.
    ///
    /// DKIM file names win over extensions; `.pem` files are private keys when
    /// their stem mentions `key` (e.g. `privkey.pem`).
    pub fn classify(path: &Path) -> Option<ArtifactKind> {
        let name = path.file_name()?.to_str()?;
        if name == DKIM_RECORD_FILE {
            return Some(ArtifactKind::DkimRecord);
        }
        if name == DKIM_PRIVATE_FILE {
            return Some(ArtifactKind::PrivateKey);
        }

        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "key" => Some(ArtifactKind::PrivateKey),
            "pem" | "crt" | "cer" => {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if stem.contains("key") {
                    Some(ArtifactKind::PrivateKey)
                } else {
                    Some(ArtifactKind::Certificate)
                }
            }
            "yaml" | "yml" | "json" => Some(ArtifactKind::UserConfig),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Certificate => write!(f, "certificate"),
            ArtifactKind::PrivateKey => write!(f, "private-key"),
            ArtifactKind::DkimRecord => write!(f, "dkim-record"),
            ArtifactKind::UserConfig => write!(f, "user-config"),
        }
    }
}

/// A file under observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Domain taken from the first path segment below the watched root.
    pub domain: Option<String>,
}

impl WatchedArtifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind, domain: Option<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            domain,
        }
    }

    /// Build an artifact for `path` observed under `root`, or `None` if the
    /// file name is not a recognised artifact.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let kind = ArtifactKind::classify(path)?;
        Some(Self::new(path, kind, domain_under(root, path)))
    }

    /// Directory holding the artifact (the per-domain directory for certs and DKIM keys).
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }
}

/// `<root>/<domain>/<...>/file` → `Some(domain)`.
///
/// Files directly inside `root` have no domain.
pub fn domain_under(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    if parts.len() < 2 {
        return None;
    }
    Some(parts[0].to_string())
}

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Moved => write!(f, "moved"),
        }
    }
}

/// A single filesystem change reported by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    /// Original location for [`ChangeKind::Moved`].
    pub source: Option<PathBuf>,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            source: None,
            observed_at: Utc::now(),
        }
    }

    pub fn moved(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            path: dest.into(),
            kind: ChangeKind::Moved,
            source: Some(source.into()),
            observed_at: Utc::now(),
        }
    }

    /// Deletions are reported but never reload anything.
    pub fn triggers_reload(&self) -> bool {
        self.kind != ChangeKind::Deleted
    }
}

// ---------------------------------------------------------------------------
// Reload bookkeeping
// ---------------------------------------------------------------------------

/// Debounce key: one pending reload per (service, artifact key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReloadKey {
    pub service: ServiceKind,
    pub key: String,
}

impl ReloadKey {
    pub fn new(service: ServiceKind, key: impl Into<String>) -> Self {
        Self {
            service,
            key: key.into(),
        }
    }
}

impl fmt::Display for ReloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.key)
    }
}

/// States of a single reload, entered strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Validating,
    BackingUp,
    Executing,
    HealthChecking,
    Completed,
    Failed,
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadState::Validating => write!(f, "validating"),
            ReloadState::BackingUp => write!(f, "backing-up"),
            ReloadState::Executing => write!(f, "executing"),
            ReloadState::HealthChecking => write!(f, "health-checking"),
            ReloadState::Completed => write!(f, "completed"),
            ReloadState::Failed => write!(f, "failed"),
        }
    }
}

/// How an operator should read a finished reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Reload commands and health check succeeded.
    Completed,
    /// Reload commands succeeded but the service did not pass its health check;
    /// the new configuration may not be live.
    PartialSuccess,
    /// Validation or reload execution failed.
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Completed => write!(f, "completed"),
            OutcomeStatus::PartialSuccess => write!(f, "partial-success"),
            OutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one fired reload. Only ever written to logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub service: ServiceKind,
    pub key: String,
    pub success: bool,
    pub validated: bool,
    pub backed_up: bool,
    pub service_reload_success: bool,
    pub health_check_passed: bool,
    /// Last state entered.
    pub final_state: ReloadState,
    /// Best-effort steps that failed without aborting the reload.
    pub degraded: Vec<String>,
    pub error: Option<String>,
}

impl ReloadOutcome {
    pub fn new(service: ServiceKind, key: impl Into<String>) -> Self {
        Self {
            service,
            key: key.into(),
            success: false,
            validated: false,
            backed_up: false,
            service_reload_success: false,
            health_check_passed: false,
            final_state: ReloadState::Validating,
            degraded: Vec::new(),
            error: None,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        if self.success {
            OutcomeStatus::Completed
        } else if self.service_reload_success {
            OutcomeStatus::PartialSuccess
        } else {
            OutcomeStatus::Failed
        }
    }
}
