//! Runtime settings: filesystem layout, external commands, health probes.
//!
//! # Storage layout (defaults)
//!
//! ```text
//! /data/user-data/
//!   certificates/<domain>/{fullchain.pem,privkey.pem}
//!   dkim/<domain>/{default.txt,default.private}
//!   config/users.yaml
//!   users/<email>/...
//! /etc/bind/zones/db.<domain>
//! /etc/postfix/{vmailbox,valias,ssl/}
//! /etc/dovecot/{passwd,ssl/,conf.d/10-auth.conf}
//! ```
//!
//! Every field has a default, so a settings file only needs to name what it
//! overrides. Tests relocate the whole tree with [`Settings::rooted_at`].

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

/// Settings file consulted when no `--config` is given.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/podplay/hot-reload.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub commands: CommandSettings,
    pub health: HealthSettings,
    /// Delay between the first event for a key and its reload.
    pub debounce_ms: u64,
    /// Group granted read access to copied TLS material.
    pub mail_group: String,
    /// Group owning the credential database.
    pub auth_group: String,
    /// User and group that own mailbox trees.
    pub mailbox_owner: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: PathSettings::default(),
            commands: CommandSettings::default(),
            health: HealthSettings::default(),
            debounce_ms: 2_000,
            mail_group: "mail".to_string(),
            auth_group: "dovecot".to_string(),
            mailbox_owner: "vmail".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn load_at(path: &Path) -> Result<Settings, CoreError> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_yaml::from_str(&contents).map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given, else [`DEFAULT_SETTINGS_PATH`] when present,
    /// else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Settings, CoreError> {
        if let Some(path) = explicit {
            return Self::load_at(path);
        }
        let default_path = Path::new(DEFAULT_SETTINGS_PATH);
        if default_path.exists() {
            return Self::load_at(default_path);
        }
        Ok(Settings::default())
    }

    /// Defaults with every path moved below `root`.
    pub fn rooted_at(root: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.paths = settings.paths.rebased(root);
        settings
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub certificates_root: PathBuf,
    pub dkim_root: PathBuf,
    pub user_config: PathBuf,
    pub user_data_root: PathBuf,
    pub zones_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub postfix_cert: PathBuf,
    pub postfix_key: PathBuf,
    pub dovecot_cert: PathBuf,
    pub dovecot_key: PathBuf,
    pub vmailbox_map: PathBuf,
    pub valias_map: PathBuf,
    pub dovecot_passwd: PathBuf,
    pub dovecot_auth_conf: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            certificates_root: PathBuf::from("/data/user-data/certificates"),
            dkim_root: PathBuf::from("/data/user-data/dkim"),
            user_config: PathBuf::from("/data/user-data/config/users.yaml"),
            user_data_root: PathBuf::from("/data/user-data"),
            zones_dir: PathBuf::from("/etc/bind/zones"),
            backup_dir: PathBuf::from("/var/backups/podplay"),
            postfix_cert: PathBuf::from("/etc/postfix/ssl/cert.pem"),
            postfix_key: PathBuf::from("/etc/postfix/ssl/key.pem"),
            dovecot_cert: PathBuf::from("/etc/dovecot/ssl/cert.pem"),
            dovecot_key: PathBuf::from("/etc/dovecot/ssl/key.pem"),
            vmailbox_map: PathBuf::from("/etc/postfix/vmailbox"),
            valias_map: PathBuf::from("/etc/postfix/valias"),
            dovecot_passwd: PathBuf::from("/etc/dovecot/passwd"),
            dovecot_auth_conf: PathBuf::from("/etc/dovecot/conf.d/10-auth.conf"),
        }
    }
}

impl PathSettings {
    /// `<zones_dir>/db.<domain>`
    pub fn zone_file(&self, domain: &str) -> PathBuf {
        self.zones_dir.join(format!("db.{domain}"))
    }

    /// `<dkim_root>/<domain>/`
    pub fn dkim_dir(&self, domain: &str) -> PathBuf {
        self.dkim_root.join(domain)
    }

    /// `<user_data_root>/users/`
    pub fn users_dir(&self) -> PathBuf {
        self.user_data_root.join("users")
    }

    fn rebased(&self, root: &Path) -> PathSettings {
        PathSettings {
            certificates_root: rebase(root, &self.certificates_root),
            dkim_root: rebase(root, &self.dkim_root),
            user_config: rebase(root, &self.user_config),
            user_data_root: rebase(root, &self.user_data_root),
            zones_dir: rebase(root, &self.zones_dir),
            backup_dir: rebase(root, &self.backup_dir),
            postfix_cert: rebase(root, &self.postfix_cert),
            postfix_key: rebase(root, &self.postfix_key),
            dovecot_cert: rebase(root, &self.dovecot_cert),
            dovecot_key: rebase(root, &self.dovecot_key),
            vmailbox_map: rebase(root, &self.vmailbox_map),
            valias_map: rebase(root, &self.valias_map),
            dovecot_passwd: rebase(root, &self.dovecot_passwd),
            dovecot_auth_conf: rebase(root, &self.dovecot_auth_conf),
        }
    }
}

fn rebase(root: &Path, path: &Path) -> PathBuf {
    let relative: PathBuf = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    root.join(relative)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// An external program invocation with a bounded run time.
///
/// Arguments may contain `{name}` placeholders filled by
/// [`CommandSpec::rendered_args`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str], timeout_secs: u64) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Arguments with every `{key}` replaced by its value from `vars`.
    pub fn rendered_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (key, value)| {
                    acc.replace(&format!("{{{key}}}"), value)
                })
            })
            .collect()
    }

    /// `program arg1 arg2` — for logs.
    pub fn display_with(&self, vars: &[(&str, &str)]) -> String {
        std::iter::once(self.program.clone())
            .chain(self.rendered_args(vars))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    pub web_config_test: CommandSpec,
    pub web_reload: CommandSpec,
    pub postmap: CommandSpec,
    pub postfix_reload: CommandSpec,
    pub dovecot_reload: CommandSpec,
    pub zone_check: CommandSpec,
    pub zone_reload: CommandSpec,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            web_config_test: CommandSpec::new("apachectl", &["configtest"], 10),
            web_reload: CommandSpec::new("apachectl", &["graceful"], 10),
            postmap: CommandSpec::new("postmap", &["{map}"], 30),
            postfix_reload: CommandSpec::new("postfix", &["reload"], 30),
            dovecot_reload: CommandSpec::new("doveadm", &["reload"], 30),
            zone_check: CommandSpec::new("named-checkzone", &["{domain}", "{zone_file}"], 10),
            zone_reload: CommandSpec::new("rndc", &["reload", "{domain}"], 10),
        }
    }
}

// ---------------------------------------------------------------------------
// Health probes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub host: String,
    /// Plaintext and TLS listeners of the web server.
    pub web_ports: Vec<u16>,
    /// Submission and mailbox-access listeners.
    pub mail_ports: Vec<u16>,
    pub connect_timeout_secs: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            web_ports: vec![80, 443],
            mail_ports: vec![587, 993],
            connect_timeout_secs: 5,
        }
    }
}

impl HealthSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rooted_at_moves_every_path_below_root() {
        let root = Path::new("/tmp/podplay-test");
        let settings = Settings::rooted_at(root);
        assert_eq!(
            settings.paths.zone_file("example.org"),
            root.join("etc/bind/zones/db.example.org")
        );
        assert!(settings.paths.dovecot_passwd.starts_with(root));
        assert!(settings.paths.user_config.starts_with(root));
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_unnamed_fields() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("hot-reload.yaml");
        std::fs::write(
            &path,
            "debounce_ms: 250\npaths:\n  zones_dir: /srv/zones\ncommands:\n  zone_reload:\n    program: rndc\n    args: [reload, \"{domain}\", IN, external]\n",
        )
        .expect("write");

        let settings = Settings::load_at(&path).expect("load");
        assert_eq!(settings.debounce(), Duration::from_millis(250));
        assert_eq!(settings.paths.zones_dir, PathBuf::from("/srv/zones"));
        assert_eq!(
            settings.paths.dkim_root,
            PathBuf::from("/data/user-data/dkim")
        );
        assert_eq!(settings.commands.zone_reload.timeout_secs, 10);
        assert_eq!(settings.health.mail_ports, vec![587, 993]);
    }

    #[test]
    fn missing_settings_file_is_reported_with_path() {
        let err = Settings::load_at(Path::new("/nonexistent/podplay.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { .. }), "got: {err}");
        assert!(err.to_string().contains("/nonexistent/podplay.yaml"));
    }

    #[test]
    fn placeholders_are_rendered_into_arguments() {
        let spec = CommandSpec::new("named-checkzone", &["{domain}", "{zone_file}"], 10);
        assert_eq!(
            spec.rendered_args(&[("domain", "a.org"), ("zone_file", "/z/db.a.org")]),
            vec!["a.org".to_string(), "/z/db.a.org".to_string()]
        );
        assert_eq!(
            spec.display_with(&[("domain", "a.org"), ("zone_file", "/z/db.a.org")]),
            "named-checkzone a.org /z/db.a.org"
        );
    }
}
