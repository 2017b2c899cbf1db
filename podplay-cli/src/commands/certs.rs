//! `podplay certs <PATH>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use podplay_daemon::find_certificates;

#[derive(Args, Debug)]
pub struct CertsArgs {
    /// Directory to search recursively.
    pub path: PathBuf,
}

impl CertsArgs {
    pub fn run(self) -> Result<()> {
        let found = find_certificates(&self.path)
            .with_context(|| format!("failed to list certificates under {}", self.path.display()))?;
        if found.is_empty() {
            println!("No certificates found under {}", self.path.display());
            return Ok(());
        }
        for path in found {
            println!("{}", path.display());
        }
        Ok(())
    }
}
