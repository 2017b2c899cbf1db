//! `podplay dkim show <DOMAIN>`

use std::fs;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};

use podplay_core::types::DKIM_RECORD_FILE;
use podplay_zone::{extract_public_key, render_record};

use super::load_settings;
use crate::Global;

#[derive(Subcommand, Debug)]
pub enum DkimCommand {
    /// Print the public key published for a domain.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub domain: String,

    /// Print the zone record instead of the bare key.
    #[arg(long)]
    pub record: bool,
}

pub fn run(command: DkimCommand, global: &Global) -> Result<()> {
    match command {
        DkimCommand::Show(args) => show(args, global),
    }
}

fn show(args: ShowArgs, global: &Global) -> Result<()> {
    let settings = load_settings(global)?;
    let path = settings.paths.dkim_dir(&args.domain).join(DKIM_RECORD_FILE);
    let text = fs::read_to_string(&path)
        .with_context(|| format!("no DKIM record for {} at {}", args.domain, path.display()))?;
    let key = extract_public_key(&text)
        .ok_or_else(|| anyhow!("{} holds no p= public key", path.display()))?;

    if args.record {
        for line in render_record(&key) {
            println!("{line}");
        }
    } else {
        println!("{key}");
    }
    Ok(())
}
