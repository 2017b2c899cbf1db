pub mod certs;
pub mod dkim;
pub mod users;
pub mod watch;

use anyhow::{Context, Result};

use podplay_core::Settings;

use crate::Global;

pub(crate) fn load_settings(global: &Global) -> Result<Settings> {
    Settings::load(global.config.as_deref()).with_context(|| match &global.config {
        Some(path) => format!("failed to load settings from {}", path.display()),
        None => "failed to load settings".to_string(),
    })
}
