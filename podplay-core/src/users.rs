//! The YAML user configuration.
//!
//! # Document shape
//!
//! ```yaml
//! version: "1.0"
//! domains:
//!   - name: example.org
//!     users:
//!       - username: alice
//!         password: "$6$..."      # or plaintext; hashed on provisioning
//!         quota: 1G
//!         enabled: true
//!         services: [mail, files]
//!         aliases: [postmaster]
//! test_users:
//!   - username: bob
//!     domain: example.org
//!     password: "$6$..."
//! ```
//!
//! # API pattern
//!
//! Loading and saving take an explicit path (`load_at` / `save_at`); callers
//! resolve the path from [`crate::Settings`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

// ---------------------------------------------------------------------------
// 1. Document types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
    #[serde(default)]
    pub test_users: Vec<TestUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_services")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub email_confirmed: bool,
}

/// A user declared outside any domain block; carries its own domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestUser {
    pub username: String,
    pub password: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_services")]
    pub services: Vec<String>,
    #[serde(default)]
    pub email_confirmed: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_services() -> Vec<String> {
    vec![UserService::Mail.as_str().to_string()]
}

/// Services a user can be provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserService {
    Mail,
    Files,
    Git,
    Www,
}

impl UserService {
    pub fn parse(name: &str) -> Option<UserService> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mail" => Some(UserService::Mail),
            "files" => Some(UserService::Files),
            "git" => Some(UserService::Git),
            "www" | "web" => Some(UserService::Www),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserService::Mail => "mail",
            UserService::Files => "files",
            UserService::Git => "git",
            UserService::Www => "www",
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Flattened account view
// ---------------------------------------------------------------------------

/// Where an [`Account`] was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSource {
    Domain,
    TestUsers,
}

/// One user with its email resolved against its domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub email: String,
    pub domain: String,
    pub password: String,
    pub quota: Option<String>,
    pub enabled: bool,
    pub services: Vec<String>,
    pub aliases: Vec<String>,
    pub email_confirmed: bool,
    pub source: AccountSource,
}

impl Account {
    pub fn has_service(&self, service: UserService) -> bool {
        self.services
            .iter()
            .any(|s| UserService::parse(s) == Some(service))
    }

    /// Recognised services, unknown names dropped.
    pub fn user_services(&self) -> Vec<UserService> {
        self.services
            .iter()
            .filter_map(|s| UserService::parse(s))
            .collect()
    }

    /// `alias@domain` addresses routed to this account.
    pub fn alias_addresses(&self) -> Vec<String> {
        self.aliases
            .iter()
            .map(|alias| format!("{alias}@{}", self.domain))
            .collect()
    }
}

/// Enabled accounts with duplicate addresses removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountSet {
    pub accounts: Vec<Account>,
    /// Addresses that appeared more than once; only the first was kept.
    pub duplicates: Vec<String>,
}

/// `alice` + `example.org` → `alice@example.org`; full addresses pass through.
pub fn email_for(username: &str, domain: &str) -> String {
    if username.contains('@') {
        username.to_string()
    } else {
        format!("{username}@{domain}")
    }
}

impl UserConfig {
    /// Every declared user in document order: domain users first, then test users.
    pub fn accounts(&self) -> Vec<Account> {
        let domain_users = self.domains.iter().flat_map(|domain| {
            domain.users.iter().map(move |user| Account {
                email: email_for(&user.username, &domain.name),
                domain: domain.name.clone(),
                password: user.password.clone(),
                quota: user.quota.clone(),
                enabled: user.enabled,
                services: user.services.clone(),
                aliases: user.aliases.clone(),
                email_confirmed: user.email_confirmed,
                source: AccountSource::Domain,
            })
        });
        let test_users = self.test_users.iter().map(|user| Account {
            email: email_for(&user.username, &user.domain),
            domain: user.domain.clone(),
            password: user.password.clone(),
            quota: user.quota.clone(),
            enabled: user.enabled,
            services: user.services.clone(),
            aliases: Vec::new(),
            email_confirmed: user.email_confirmed,
            source: AccountSource::TestUsers,
        });
        domain_users.chain(test_users).collect()
    }

    /// Enabled accounts, unique by email (first declaration wins).
    pub fn enabled_accounts(&self) -> AccountSet {
        let mut seen = HashSet::new();
        let mut set = AccountSet::default();
        for account in self.accounts().into_iter().filter(|a| a.enabled) {
            if seen.insert(account.email.to_ascii_lowercase()) {
                set.accounts.push(account);
            } else {
                set.duplicates.push(account.email);
            }
        }
        set
    }

    /// Insert or replace a test user, keyed by resolved email.
    pub fn upsert_test_user(&mut self, user: TestUser) {
        let email = email_for(&user.username, &user.domain);
        self.test_users
            .retain(|existing| email_for(&existing.username, &existing.domain) != email);
        self.test_users.push(user);
    }

    /// Remove `username` of `domain` from test users and the domain block.
    ///
    /// Returns the number of records removed.
    pub fn remove_user(&mut self, username: &str, domain: &str) -> usize {
        let email = email_for(username, domain);
        let before = self.user_count();

        self.test_users
            .retain(|u| email_for(&u.username, &u.domain) != email);
        for block in self.domains.iter_mut().filter(|d| d.name == domain) {
            block
                .users
                .retain(|u| u.username != username && email_for(&u.username, domain) != email);
        }

        before - self.user_count()
    }

    fn user_count(&self) -> usize {
        self.test_users.len() + self.domains.iter().map(|d| d.users.len()).sum::<usize>()
    }
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// Load the user configuration at `path`.
///
/// Returns `CoreError::ConfigNotFound` if absent, `CoreError::Parse` (with path
/// and line context) if malformed. An empty document is an empty config.
pub fn load_at(path: &Path) -> Result<UserConfig, CoreError> {
    if !path.exists() {
        return Err(CoreError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(UserConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| CoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`load_at`], but a missing file yields a fresh `version: "1.0"` document.
pub fn load_or_default_at(path: &Path) -> Result<UserConfig, CoreError> {
    match load_at(path) {
        Err(CoreError::ConfigNotFound { .. }) => Ok(UserConfig {
            version: Some("1.0".to_string()),
            ..UserConfig::default()
        }),
        other => other,
    }
}

/// Write `config` to `path` via a sibling temp file and rename.
pub fn save_at(path: &Path, config: &UserConfig) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = PathBuf::from(format!("{}.podplay.tmp", path.display()));
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Quotas
// ---------------------------------------------------------------------------

const QUOTA_UNITS: [(char, u64); 4] = [
    ('T', 1024 * 1024 * 1024 * 1024),
    ('G', 1024 * 1024 * 1024),
    ('M', 1024 * 1024),
    ('K', 1024),
];

/// `"100M"` → bytes. Unparseable or empty input is `0` (unlimited).
pub fn parse_quota(quota: &str) -> u64 {
    let quota = quota.trim().to_ascii_uppercase();
    if quota.is_empty() {
        return 0;
    }
    for (suffix, multiplier) in QUOTA_UNITS {
        if let Some(number) = quota.strip_suffix(suffix) {
            return number
                .trim()
                .parse::<f64>()
                .map(|n| (n * multiplier as f64) as u64)
                .unwrap_or(0);
        }
    }
    quota.parse().unwrap_or(0)
}

/// Bytes → `"1G"`, `"1.5G"`, or the raw byte count below 1 KiB.
pub fn format_quota(bytes: u64) -> String {
    if bytes == 0 {
        return "0".to_string();
    }
    for (unit, divisor) in QUOTA_UNITS {
        if bytes >= divisor {
            if bytes % divisor == 0 {
                return format!("{}{unit}", bytes / divisor);
            }
            return format!("{:.1}{unit}", bytes as f64 / divisor as f64);
        }
    }
    bytes.to_string()
}
