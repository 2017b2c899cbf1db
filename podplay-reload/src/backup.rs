//! Timestamped copies of files about to be replaced.
//!
//! A backup of `/etc/bind/zones/db.example.org` taken at 2026-10-16 14:03:07
//! lands at `<backup-dir>/db.example.org.20261016-140307`. A second backup in
//! the same second gets `-1`, then `-2`, and so on. Backups are never pruned.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::error::{io_err, ReloadError};

/// A completed backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub original: PathBuf,
    pub copy: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `path` into the backup directory, stamped with the local time.
    pub fn backup(&self, path: &Path) -> Result<Backup, ReloadError> {
        self.backup_at(path, Local::now().naive_local())
    }

    pub fn backup_at(&self, path: &Path, now: NaiveDateTime) -> Result<Backup, ReloadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                io_err(
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?;

        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;

        let stamp = now.format("%Y%m%d-%H%M%S");
        let mut copy = self.dir.join(format!("{name}.{stamp}"));
        let mut n = 1;
        while copy.exists() {
            copy = self.dir.join(format!("{name}.{stamp}-{n}"));
            n += 1;
        }

        fs::copy(path, &copy).map_err(|e| io_err(path, e))?;
        tracing::debug!(original = %path.display(), backup = %copy.display(), "backed up");
        Ok(Backup {
            original: path.to_path_buf(),
            copy,
        })
    }

    /// Copy `backup` back over `target`.
    pub fn restore(&self, backup: &Path, target: &Path) -> Result<(), ReloadError> {
        fs::copy(backup, target).map_err(|e| io_err(target, e))?;
        tracing::info!(backup = %backup.display(), target = %target.display(), "restored from backup");
        Ok(())
    }
}
