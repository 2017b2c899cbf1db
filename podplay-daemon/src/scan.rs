//! Inventory of artifacts already present under a watch root.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use podplay_core::types::{DKIM_PRIVATE_FILE, DKIM_RECORD_FILE};

use crate::error::{io_err, DaemonError};
use crate::watcher::{is_certificate_file, is_user_config_file};

/// What the initial scan found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub certificates: Vec<PathBuf>,
    /// Directory names holding both `default.txt` and `default.private`.
    pub dkim_domains: Vec<String>,
    pub user_configs: Vec<PathBuf>,
}

impl ScanSummary {
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty() && self.dkim_domains.is_empty() && self.user_configs.is_empty()
    }
}

/// Walk `root` and classify every artifact found. A file root is classified
/// on its own.
pub fn scan(root: &Path, recursive: bool) -> Result<ScanSummary, DaemonError> {
    let mut summary = ScanSummary::default();
    if root.is_file() {
        classify_file(root, &mut summary);
        return Ok(summary);
    }

    let dirs = if recursive {
        collect_dirs(root)?
    } else {
        vec![root.to_path_buf()]
    };
    for dir in dirs {
        let mut has_record = false;
        let mut has_private = false;
        for file in files_in(&dir) {
            match file.file_name().and_then(|n| n.to_str()) {
                Some(DKIM_RECORD_FILE) => has_record = true,
                Some(DKIM_PRIVATE_FILE) => has_private = true,
                _ => classify_file(&file, &mut summary),
            }
        }
        if has_record && has_private {
            if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
                summary.dkim_domains.push(name.to_string());
            }
        }
    }
    summary.certificates.sort();
    summary.dkim_domains.sort();
    summary.user_configs.sort();
    Ok(summary)
}

/// Every certificate or key file under `root`, sorted.
pub fn find_certificates(root: &Path) -> Result<Vec<PathBuf>, DaemonError> {
    if !root.exists() {
        return Err(DaemonError::RootNotFound {
            path: root.to_path_buf(),
        });
    }
    Ok(scan(root, true)?.certificates)
}

/// Log the scan result the way a session starts.
pub fn log_summary(root: &Path, summary: &ScanSummary) {
    if summary.is_empty() {
        tracing::info!(root = %root.display(), "initial scan found no artifacts");
        return;
    }
    for cert in &summary.certificates {
        tracing::info!(path = %cert.display(), "found certificate");
    }
    for domain in &summary.dkim_domains {
        tracing::info!(domain = %domain, "found DKIM key pair");
    }
    for config in &summary.user_configs {
        tracing::info!(path = %config.display(), "found user configuration");
    }
    tracing::info!(
        certificates = summary.certificates.len(),
        dkim_domains = summary.dkim_domains.len(),
        user_configs = summary.user_configs.len(),
        "initial scan complete",
    );
}

fn classify_file(path: &Path, summary: &mut ScanSummary) {
    if is_certificate_file(path) {
        summary.certificates.push(path.to_path_buf());
    } else if is_user_config_file(path) {
        summary.user_configs.push(path.to_path_buf());
    }
}

/// Regular files directly inside `dir`. Unreadable directories and entries
/// are skipped with a warning.
fn files_in(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            tracing::warn!(path = %dir.display(), error = %err, "skipping unreadable directory");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| skip_unreadable(dir, entry))
        .filter(|(_, ty)| ty.is_file())
        .map(|(path, _)| path)
        .collect();
    files.sort();
    files
}

/// `root` and every directory below it, breadth first. Only `root` itself
/// must be readable; unreadable subdirectories are skipped with a warning.
fn collect_dirs(root: &Path) -> Result<Vec<PathBuf>, DaemonError> {
    let mut dirs = vec![root.to_path_buf()];
    let mut cursor = 0;
    while cursor < dirs.len() {
        let current = dirs[cursor].clone();
        cursor += 1;
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) if cursor == 1 => return Err(io_err(&current, err)),
            Err(err) => {
                tracing::warn!(path = %current.display(), error = %err, "skipping unreadable directory");
                continue;
            }
        };
        dirs.extend(
            entries
                .filter_map(|entry| skip_unreadable(&current, entry))
                .filter(|(_, ty)| ty.is_dir())
                .map(|(path, _)| path),
        );
    }
    dirs.sort();
    Ok(dirs)
}

fn skip_unreadable(
    dir: &Path,
    entry: std::io::Result<fs::DirEntry>,
) -> Option<(PathBuf, fs::FileType)> {
    let entry = match entry {
        Ok(entry) => entry,
        Err(err) => {
            tracing::warn!(path = %dir.display(), error = %err, "skipping unreadable entry");
            return None;
        }
    };
    match entry.file_type() {
        Ok(ty) => Some((entry.path(), ty)),
        Err(err) => {
            tracing::warn!(path = %entry.path().display(), error = %err, "skipping unreadable entry");
            None
        }
    }
}
