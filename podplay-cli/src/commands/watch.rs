//! `podplay watch` — foreground watch session.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use podplay_core::ServiceKind;
use podplay_daemon::{start_blocking, WatchOptions};

use super::load_settings;
use crate::Global;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory or single file to watch.
    pub path: PathBuf,

    /// Reload the service when a watched artifact changes.
    #[arg(long, requires = "service_type")]
    pub hot_reload: bool,

    /// Service to reload: web | mail | dkim | users.
    #[arg(long = "service-type", value_name = "SERVICE")]
    pub service_type: Option<ServiceKind>,

    /// Domain to use when the changed path does not name one.
    #[arg(long)]
    pub domain: Option<String>,

    /// Watch only the top level of PATH.
    #[arg(long)]
    pub no_recursive: bool,
}

impl WatchArgs {
    pub fn run(self, global: &Global) -> Result<()> {
        if !self.path.exists() {
            bail!("watch path {} does not exist", self.path.display());
        }
        let settings = load_settings(global)?;
        let options = WatchOptions {
            root: self.path,
            recursive: !self.no_recursive,
            hot_reload: self.hot_reload,
            service: self.service_type,
            domain: self.domain,
            settings,
        };
        start_blocking(options, global.log_format).context("watch session exited with error")
    }
}
