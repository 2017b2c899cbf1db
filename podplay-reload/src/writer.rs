//! Hash-gated atomic writes and file permissions.
//!
//! ## `atomic_write`
//!
//! 1. SHA-256 hash the new content.
//! 2. Hash the current file, if any → skip if identical.
//! 3. Write to `<path>.podplay.tmp`.
//! 4. Rename to final path (atomic on POSIX).
//!
//! Skipping identical content keeps mtimes stable, so a regenerated map that
//! did not change does not look like a change to the services reading it.

use std::fs;
use std::path::{Path, PathBuf};

use nix::unistd::{chown, Group, User};
use sha2::{Digest, Sha256};

use crate::error::{io_err, ReloadError};

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped — content matches what is already on disk.
    Unchanged { path: PathBuf },
}

// ---------------------------------------------------------------------------
// atomic_write
// ---------------------------------------------------------------------------

pub fn atomic_write(path: &Path, content: &str) -> Result<WriteResult, ReloadError> {
    atomic_write_bytes(path, content.as_bytes())
}

pub fn atomic_write_bytes(path: &Path, content: &[u8]) -> Result<WriteResult, ReloadError> {
    let tmp = PathBuf::from(format!("{}.podplay.tmp", path.display()));
    atomic_write_with_tmp(path, content, &tmp)
}

/// Copy `source` to `dest` through [`atomic_write_bytes`].
pub fn atomic_copy(source: &Path, dest: &Path) -> Result<WriteResult, ReloadError> {
    let content = fs::read(source).map_err(|e| io_err(source, e))?;
    atomic_write_bytes(dest, &content)
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &[u8],
    tmp: &Path,
) -> Result<WriteResult, ReloadError> {
    let digest = sha256_hex(content);
    if let Ok(existing) = fs::read(path) {
        if sha256_hex(&existing) == digest {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = fs::rename(tmp, path) {
        let _ = fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::debug!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

fn sha256_hex(content: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(content);
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

pub fn set_mode(path: &Path, mode: u32) -> Result<(), ReloadError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| io_err(path, e))
}

/// Hand `path` to `group`, leaving the owner alone.
///
/// Returns a human-readable reason on failure; callers record it as a
/// degraded step rather than failing the reload.
pub fn chown_group(path: &Path, group: &str) -> Result<(), String> {
    let gid = match Group::from_name(group) {
        Ok(Some(g)) => g.gid,
        Ok(None) => return Err(format!("group '{group}' does not exist")),
        Err(err) => return Err(format!("group '{group}' lookup failed: {err}")),
    };
    chown(path, None, Some(gid))
        .map_err(|err| format!("chown {} to group '{group}': {err}", path.display()))
}

/// Hand `root` and everything below it to `owner`, both as user and group.
///
/// Stops at the first failure and returns a human-readable reason.
pub fn chown_tree(root: &Path, owner: &str) -> Result<(), String> {
    let uid = match User::from_name(owner) {
        Ok(Some(u)) => u.uid,
        Ok(None) => return Err(format!("user '{owner}' does not exist")),
        Err(err) => return Err(format!("user '{owner}' lookup failed: {err}")),
    };
    let gid = match Group::from_name(owner) {
        Ok(Some(g)) => g.gid,
        Ok(None) => return Err(format!("group '{owner}' does not exist")),
        Err(err) => return Err(format!("group '{owner}' lookup failed: {err}")),
    };

    let mut queue = vec![root.to_path_buf()];
    while let Some(path) = queue.pop() {
        chown(&path, Some(uid), Some(gid))
            .map_err(|err| format!("chown {} to '{owner}': {err}", path.display()))?;
        if path.is_dir() && !path.is_symlink() {
            let entries =
                fs::read_dir(&path).map_err(|err| format!("read {}: {err}", path.display()))?;
            queue.extend(entries.filter_map(|e| e.ok()).map(|e| e.path()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vmailbox");
        let result = atomic_write(&path, "a@x.org users/a@x.org/mail/Maildir/\n").unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert!(path.exists());
    }

    #[test]
    fn same_content_is_unchanged_and_keeps_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("valias");
        atomic_write(&path, "same").unwrap();
        let mtime_1 = fs::metadata(&path).unwrap().modified().unwrap();

        sleep(Duration::from_millis(1100));
        let result = atomic_write(&path, "same").unwrap();
        assert!(matches!(result, WriteResult::Unchanged { .. }));
        let mtime_2 = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime_1, mtime_2, "file was rewritten");
    }

    #[test]
    fn changed_content_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("passwd");
        atomic_write(&path, "v1").unwrap();
        let result = atomic_write(&path, "v2").unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
    }

    #[test]
    fn tmp_file_removed_after_write_and_parents_created() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("etc").join("postfix").join("ssl").join("cert.pem");
        atomic_write(&path, "data").unwrap();
        let tmp_path = PathBuf::from(format!("{}.podplay.tmp", path.display()));
        assert!(path.exists());
        assert!(!tmp_path.exists(), ".podplay.tmp must be cleaned up");
    }

    #[test]
    fn copy_preserves_bytes() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("fullchain.pem");
        fs::write(&source, b"line1\r\nline2\r\n").unwrap();
        let dest = tmp.path().join("out").join("cert.pem");
        atomic_copy(&source, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"line1\r\nline2\r\n");
    }

    #[test]
    fn set_mode_applies_permission_bits() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("key.pem");
        fs::write(&path, "k").unwrap();
        set_mode(&path, 0o640).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn unknown_group_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("key.pem");
        fs::write(&path, "k").unwrap();
        let reason = chown_group(&path, "podplay-no-such-group").unwrap_err();
        assert!(reason.contains("podplay-no-such-group"), "{reason}");
    }

    #[test]
    fn chown_tree_reports_unknown_owner() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("mail/Maildir")).unwrap();
        let reason = chown_tree(tmp.path(), "podplay-no-such-user").unwrap_err();
        assert!(reason.contains("podplay-no-such-user"), "{reason}");
    }

    #[test]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();

        let path = readonly_dir.join("db.example.org");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("db.example.org.podplay.tmp");

        let result = atomic_write_with_tmp(&path, b"new content", &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Root ignores directory permissions; only assert when the rename failed.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists(), ".podplay.tmp should be cleaned up");
        }
    }
}
