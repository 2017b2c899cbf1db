//! Users: provision mail accounts from the user configuration.
//!
//! On every accepted change:
//!
//! 1. create each enabled user's directory tree under `<user-data>/users/<email>`
//!    and hand it to the mailbox owner;
//! 2. regenerate the virtual mailbox map, virtual alias map and the
//!    mailbox agent's passwd-file;
//! 3. rebuild the binary maps with `postmap`;
//! 4. point the mailbox agent's auth include at the passwd-file;
//! 5. reload the MTA and the mailbox agent.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use podplay_core::password::ensure_hashed;
use podplay_core::types::{ServiceKind, WatchedArtifact};
use podplay_core::users::{self, Account};
use podplay_core::{Settings, UserService};
use podplay_validator::validate_user_config;

use super::{ExecuteContext, ExecuteReport, ReloadStrategy};
use crate::command::run_spec;
use crate::error::{io_err, ReloadError};
use crate::health::probe_ports;
use crate::writer::{atomic_write, chown_group, chown_tree, set_mode};

const PASSWD_MODE: u32 = 0o640;
const SYSTEM_AUTH_INCLUDE: &str = "!include auth-system.conf.ext";
const PASSWDFILE_AUTH_INCLUDE: &str = "!include auth-passwdfile.conf.ext";

pub struct UsersStrategy {
    settings: Arc<Settings>,
}

impl UsersStrategy {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

// ---------------------------------------------------------------------------
// Directory trees
// ---------------------------------------------------------------------------

/// Directories a user gets for each recognised service, relative to their home.
fn service_dirs(service: UserService) -> &'static [&'static str] {
    match service {
        UserService::Mail => &[
            "mail/Maildir/cur",
            "mail/Maildir/new",
            "mail/Maildir/tmp",
            "mail/sieve",
        ],
        UserService::Files => &["files/Documents", "files/Pictures", "files/Shared"],
        UserService::Git => &["git"],
        UserService::Www => &["www/public_html", "www/private"],
    }
}

pub fn create_user_tree(users_dir: &Path, account: &Account) -> Result<PathBuf, ReloadError> {
    let home = users_dir.join(&account.email);
    let dirs = account
        .user_services()
        .into_iter()
        .flat_map(|s| service_dirs(s).iter())
        .chain(std::iter::once(&".profile"));
    for dir in dirs {
        let path = home.join(dir);
        fs::create_dir_all(&path).map_err(|e| io_err(&path, e))?;
    }
    Ok(home)
}

// ---------------------------------------------------------------------------
// Generated files
// ---------------------------------------------------------------------------

/// `email users/<email>/mail/Maildir/` per mail-enabled account.
pub fn render_vmailbox(accounts: &[Account]) -> String {
    lines(
        accounts
            .iter()
            .filter(|a| a.has_service(UserService::Mail))
            .map(|a| format!("{} users/{}/mail/Maildir/", a.email, a.email)),
    )
}

/// `alias@domain target` per alias.
pub fn render_valias(accounts: &[Account]) -> String {
    lines(accounts.iter().flat_map(|a| {
        a.alias_addresses()
            .into_iter()
            .map(move |alias| format!("{alias} {}", a.email))
    }))
}

/// `email:hash:vmail:vmail::<home>/mail::` per mail-enabled account.
pub fn render_passwd(accounts: &[Account], users_dir: &Path) -> Result<String, ReloadError> {
    let mut out = Vec::new();
    for account in accounts.iter().filter(|a| a.has_service(UserService::Mail)) {
        let hash = ensure_hashed(&account.password)?;
        let home = users_dir.join(&account.email).join("mail");
        out.push(format!(
            "{}:{}:vmail:vmail::{}::",
            account.email,
            hash,
            home.display()
        ));
    }
    Ok(lines(out))
}

fn lines(items: impl IntoIterator<Item = String>) -> String {
    let mut out = items.into_iter().collect::<Vec<_>>().join("\n");
    out.push('\n');
    out
}

/// Comment out the system auth include and enable the passwd-file include.
///
/// Returns `None` when the text already has exactly that shape.
pub fn switch_auth_include(conf: &str) -> Option<String> {
    let mut out = Vec::new();
    let mut passwdfile_enabled = false;
    for line in conf.lines() {
        match line.trim() {
            SYSTEM_AUTH_INCLUDE => out.push(format!("#{SYSTEM_AUTH_INCLUDE}")),
            l if l == PASSWDFILE_AUTH_INCLUDE || l == format!("#{PASSWDFILE_AUTH_INCLUDE}") => {
                if !passwdfile_enabled {
                    out.push(PASSWDFILE_AUTH_INCLUDE.to_string());
                    passwdfile_enabled = true;
                }
            }
            _ => out.push(line.to_string()),
        }
    }
    if !passwdfile_enabled {
        out.push(PASSWDFILE_AUTH_INCLUDE.to_string());
    }
    let mut updated = out.join("\n");
    updated.push('\n');
    (updated != conf).then_some(updated)
}

impl UsersStrategy {
    fn configure_auth(&self, report: &mut ExecuteReport) -> Result<(), ReloadError> {
        let path = &self.settings.paths.dovecot_auth_conf;
        let conf = match fs::read_to_string(path) {
            Ok(conf) => conf,
            Err(err) => {
                report.degrade(format!("cannot read {}: {err}", path.display()));
                return Ok(());
            }
        };
        if let Some(updated) = switch_auth_include(&conf) {
            atomic_write(path, &updated)?;
            tracing::info!(path = %path.display(), "auth switched to passwd-file");
        }
        Ok(())
    }
}

#[async_trait]
impl ReloadStrategy for UsersStrategy {
    fn service(&self) -> ServiceKind {
        ServiceKind::Users
    }

    async fn validate(&self, artifact: &WatchedArtifact) -> Result<(), ReloadError> {
        validate_user_config(&artifact.path)?;
        Ok(())
    }

    fn backup_targets(&self, _artifact: &WatchedArtifact) -> Vec<PathBuf> {
        let paths = &self.settings.paths;
        vec![
            paths.vmailbox_map.clone(),
            paths.valias_map.clone(),
            paths.dovecot_passwd.clone(),
            paths.dovecot_auth_conf.clone(),
        ]
    }

    async fn execute(&self, ctx: ExecuteContext<'_>) -> Result<ExecuteReport, ReloadError> {
        let config = users::load_at(&ctx.artifact.path)?;
        let set = config.enabled_accounts();
        for email in &set.duplicates {
            tracing::warn!(email = %email, "duplicate account ignored; first declaration wins");
        }

        let paths = &self.settings.paths;
        let users_dir = paths.users_dir();
        let mut report = ExecuteReport::default();

        for account in &set.accounts {
            let home = create_user_tree(&users_dir, account)?;
            if let Err(reason) = chown_tree(&home, &self.settings.mailbox_owner) {
                tracing::warn!(email = %account.email, reason = %reason, "mailbox tree left unowned");
                report.degrade(reason);
            }
        }

        atomic_write(&paths.vmailbox_map, &render_vmailbox(&set.accounts))?;
        atomic_write(&paths.valias_map, &render_valias(&set.accounts))?;
        atomic_write(&paths.dovecot_passwd, &render_passwd(&set.accounts, &users_dir)?)?;
        set_mode(&paths.dovecot_passwd, PASSWD_MODE)?;
        if let Err(reason) = chown_group(&paths.dovecot_passwd, &self.settings.auth_group) {
            report.degrade(reason);
        }

        let commands = &self.settings.commands;
        for map in [&paths.vmailbox_map, &paths.valias_map] {
            let map = map.to_string_lossy().to_string();
            run_spec(&commands.postmap, &[("map", map.as_str())]).await?;
        }

        self.configure_auth(&mut report)?;

        run_spec(&commands.postfix_reload, &[]).await?;
        run_spec(&commands.dovecot_reload, &[]).await?;
        tracing::info!(accounts = set.accounts.len(), "mail accounts provisioned");
        Ok(report)
    }

    async fn health_check(&self, _report: &ExecuteReport) -> bool {
        let health = &self.settings.health;
        probe_ports(&health.host, &health.mail_ports, health.connect_timeout()).await
    }
}
