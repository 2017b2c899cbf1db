//! `podplay users add|remove|list`

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use podplay_core::password::hash_password;
use podplay_core::users::{self, email_for, format_quota, parse_quota, TestUser};
use podplay_core::{Account, UserConfig};

use super::load_settings;
use crate::Global;

#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    /// Add or replace a user in the test_users section.
    Add(AddArgs),
    /// Remove a user from test_users and its domain block.
    Remove(RemoveArgs),
    /// List configured users.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// User name, or a full address.
    pub username: String,

    #[arg(long)]
    pub domain: String,

    /// Plain-text password; stored as a SHA512-CRYPT hash.
    #[arg(long)]
    pub password: String,

    #[arg(long, default_value = "100M")]
    pub quota: String,

    /// Comma-separated services: mail, files, git, www (or web).
    #[arg(long, value_delimiter = ',', default_value = "mail")]
    pub services: Vec<String>,

    /// Mark the address as confirmed.
    #[arg(long)]
    pub confirm_email: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub username: String,

    #[arg(long)]
    pub domain: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only users of this domain.
    #[arg(long)]
    pub domain: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(command: UsersCommand, global: &Global) -> Result<()> {
    let settings = load_settings(global)?;
    let path = settings.paths.user_config;
    match command {
        UsersCommand::Add(args) => {
            let mut config = users::load_or_default_at(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let email = email_for(&args.username, &args.domain);
            let password = hash_password(&args.password).context("failed to hash password")?;
            config.upsert_test_user(TestUser {
                username: args.username,
                password,
                domain: args.domain,
                quota: Some(args.quota.clone()),
                enabled: true,
                services: args.services,
                email_confirmed: args.confirm_email,
            });
            users::save_at(&path, &config)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} Added user {} with quota {}", "✓".green(), email, args.quota);
        }
        UsersCommand::Remove(args) => {
            let mut config = users::load_at(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let email = email_for(&args.username, &args.domain);
            if config.remove_user(&args.username, &args.domain) == 0 {
                bail!("no user {email} in {}", path.display());
            }
            users::save_at(&path, &config)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} Removed user {}", "✓".green(), email);
        }
        UsersCommand::List(args) => {
            let config = users::load_at(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            list(&config, &args)?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct UserJson {
    email: String,
    domain: String,
    quota: Option<String>,
    quota_bytes: Option<u64>,
    services: Vec<String>,
    enabled: bool,
    email_confirmed: bool,
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "email")]
    email: String,
    #[tabled(rename = "quota")]
    quota: String,
    #[tabled(rename = "services")]
    services: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "address")]
    confirmed: String,
}

fn list(config: &UserConfig, args: &ListArgs) -> Result<()> {
    let accounts: Vec<Account> = config
        .accounts()
        .into_iter()
        .filter(|a| args.domain.as_deref().map_or(true, |d| a.domain == d))
        .collect();

    if args.json {
        let payload: Vec<UserJson> = accounts
            .into_iter()
            .map(|a| UserJson {
                quota_bytes: a.quota.as_deref().map(parse_quota),
                email: a.email,
                domain: a.domain,
                quota: a.quota,
                services: a.services,
                enabled: a.enabled,
                email_confirmed: a.email_confirmed,
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("failed to serialize users")?
        );
        return Ok(());
    }

    if accounts.is_empty() {
        println!("No users configured.");
        return Ok(());
    }

    let rows: Vec<UserRow> = accounts
        .into_iter()
        .map(|a| UserRow {
            quota: a
                .quota
                .as_deref()
                .map(|q| format_quota(parse_quota(q)))
                .unwrap_or_else(|| "N/A".to_string()),
            services: a.services.join(", "),
            status: if a.enabled {
                "enabled".green().to_string()
            } else {
                "disabled".red().to_string()
            },
            confirmed: if a.email_confirmed {
                "confirmed".to_string()
            } else {
                "unconfirmed".yellow().to_string()
            },
            email: a.email,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
