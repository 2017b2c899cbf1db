//! Podplay — certificate, DKIM and mail-account hot reload.
//!
//! # Usage
//!
//! ```text
//! podplay watch <PATH> [--hot-reload --service-type web|mail|dkim|users] [--domain <D>] [--no-recursive]
//! podplay certs <PATH>
//! podplay users add <USER> --domain <D> --password <P> [--quota 100M] [--services mail,files]
//! podplay users remove <USER> --domain <D>
//! podplay users list [--domain <D>] [--json]
//! podplay dkim show <DOMAIN> [--record]
//! ```
//!
//! Global flags: `--config <FILE>` (settings YAML) and `--log-format text|json`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    certs::CertsArgs, dkim::DkimCommand, users::UsersCommand, watch::WatchArgs,
};
use podplay_daemon::LogFormat;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "podplay",
    version,
    about = "Watch TLS certificates, DKIM keys and mail accounts and reload services on change",
    long_about = None,
)]
struct Cli {
    /// Settings file (defaults to /etc/podplay/hot-reload.yaml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log output format: text | json.
    #[arg(long, global = true, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a directory or file, optionally reloading a service on change.
    Watch(WatchArgs),

    /// List certificate and key files under a path.
    Certs(CertsArgs),

    /// Manage the mail user configuration.
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },

    /// Inspect DKIM keys.
    Dkim {
        #[command(subcommand)]
        command: DkimCommand,
    },
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Global {
    pub config: Option<PathBuf>,
    pub log_format: LogFormat,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let global = Global {
        config: cli.config,
        log_format: cli.log_format,
    };
    match cli.command {
        Commands::Watch(args) => args.run(&global),
        Commands::Certs(args) => args.run(),
        Commands::Users { command } => commands::users::run(command, &global),
        Commands::Dkim { command } => commands::dkim::run(command, &global),
    }
}
