//! Filesystem notifications translated into typed [`ChangeEvent`]s.

use std::fs;
use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use podplay_core::types::{ChangeEvent, ChangeKind, ServiceKind, DKIM_PRIVATE_FILE, DKIM_RECORD_FILE};

use crate::error::{io_err, DaemonError};

// ---------------------------------------------------------------------------
// Recognizers
// ---------------------------------------------------------------------------

/// Predicate deciding which file paths a session cares about.
pub type Recognizer = fn(&Path) -> bool;

fn has_extension(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| wanted.iter().any(|w| ext.eq_ignore_ascii_case(w)))
        .unwrap_or(false)
}

pub fn is_certificate_file(path: &Path) -> bool {
    has_extension(path, &["pem", "crt", "cer", "key"])
}

pub fn is_dkim_file(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(DKIM_RECORD_FILE | DKIM_PRIVATE_FILE)
    )
}

pub fn is_user_config_file(path: &Path) -> bool {
    has_extension(path, &["yaml", "yml", "json"])
}

fn is_any_artifact(path: &Path) -> bool {
    is_certificate_file(path) || is_dkim_file(path) || is_user_config_file(path)
}

/// Recognizer for `service`; a watch-only session sees every artifact type.
pub fn recognizer_for(service: Option<ServiceKind>) -> Recognizer {
    match service {
        Some(ServiceKind::Web | ServiceKind::Mail) => is_certificate_file,
        Some(ServiceKind::Dkim) => is_dkim_file,
        Some(ServiceKind::Users) => is_user_config_file,
        None => is_any_artifact,
    }
}

// ---------------------------------------------------------------------------
// Event translation
// ---------------------------------------------------------------------------

/// Which paths pass through to the session.
#[derive(Clone)]
pub struct EventFilter {
    recognize: Recognizer,
    /// Set when the watch root is a single file.
    only_file: Option<PathBuf>,
}

impl EventFilter {
    pub fn new(recognize: Recognizer) -> Self {
        Self {
            recognize,
            only_file: None,
        }
    }

    pub fn single_file(path: impl Into<PathBuf>) -> Self {
        Self {
            recognize: |_| true,
            only_file: Some(path.into()),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        match &self.only_file {
            Some(only) => path == only,
            None => (self.recognize)(path),
        }
    }
}

/// Turn one raw notification into zero or more change events.
///
/// Directory events are dropped. A rename with both ends known becomes a
/// `Deleted` for the source (if it matches) and a `Moved` for the destination
/// (if it matches).
pub fn translate(event: &Event, filter: &EventFilter) -> Vec<ChangeEvent> {
    let mut out = Vec::new();
    let emit = |out: &mut Vec<ChangeEvent>, path: &Path, kind: ChangeKind| {
        if filter.matches(path) {
            out.push(ChangeEvent::new(path, kind));
        }
    };

    match &event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {}
        EventKind::Create(_) => {
            for path in files_only(&event.paths) {
                emit(&mut out, path, ChangeKind::Created);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let (from, to) = (&event.paths[0], &event.paths[1]);
            if to.is_dir() {
                return out;
            }
            emit(&mut out, from, ChangeKind::Deleted);
            if filter.matches(to) {
                out.push(ChangeEvent::moved(from, to));
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in &event.paths {
                emit(&mut out, path, ChangeKind::Deleted);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in files_only(&event.paths) {
                emit(&mut out, path, ChangeKind::Created);
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            for path in &event.paths {
                if path.is_file() {
                    emit(&mut out, path, ChangeKind::Created);
                } else if !path.exists() {
                    emit(&mut out, path, ChangeKind::Deleted);
                }
            }
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => {}
        EventKind::Modify(_) => {
            for path in files_only(&event.paths) {
                emit(&mut out, path, ChangeKind::Modified);
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                emit(&mut out, path, ChangeKind::Deleted);
            }
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }
    out
}

fn files_only(paths: &[PathBuf]) -> impl Iterator<Item = &PathBuf> {
    paths.iter().filter(|p| !p.is_dir())
}

// ---------------------------------------------------------------------------
// FileWatcher
// ---------------------------------------------------------------------------

/// A live subscription on one root.
pub struct FileWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl FileWatcher {
    /// Start watching `root`.
    ///
    /// A directory is watched with `recursive`; a single file is watched
    /// through its parent directory, non-recursively, and only its own events
    /// pass. A missing root fails immediately.
    pub fn start(
        root: &Path,
        recursive: bool,
        recognize: Recognizer,
    ) -> Result<FileWatcher, DaemonError> {
        if !root.exists() {
            return Err(DaemonError::RootNotFound {
                path: root.to_path_buf(),
            });
        }
        // inotify/FSEvents report resolved paths; the single-file filter
        // compares against them.
        let root = fs::canonicalize(root).map_err(|e| io_err(root, e))?;

        let (watch_path, mode, filter) = if root.is_file() {
            let parent = root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("/"));
            (parent, RecursiveMode::NonRecursive, EventFilter::single_file(&root))
        } else if recursive {
            (root.clone(), RecursiveMode::Recursive, EventFilter::new(recognize))
        } else {
            (root.clone(), RecursiveMode::NonRecursive, EventFilter::new(recognize))
        };

        let (tx, events) = mpsc::unbounded_channel::<ChangeEvent>();
        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| match event {
            Ok(event) => {
                for change in translate(&event, &filter) {
                    let _ = tx.send(change);
                }
            }
            Err(err) => tracing::warn!(error = %err, "watcher event error"),
        })?;
        watcher.watch(&watch_path, mode)?;
        tracing::info!(
            root = %root.display(),
            recursive = matches!(mode, RecursiveMode::Recursive),
            "watching",
        );

        Ok(FileWatcher {
            root,
            _watcher: watcher,
            events,
        })
    }

    /// Canonical watch root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        Event {
            kind,
            paths: paths.iter().map(|p| p.to_path_buf()).collect(),
            attrs: Default::default(),
        }
    }

    #[test]
    fn recognizers_follow_service_type() {
        let web = recognizer_for(Some(ServiceKind::Web));
        assert!(web(Path::new("/c/a.org/fullchain.pem")));
        assert!(web(Path::new("/c/a.org/server.KEY")));
        assert!(web(Path::new("/c/a.org/cert.Crt")));
        assert!(!web(Path::new("/c/a.org/default.txt")));

        let dkim = recognizer_for(Some(ServiceKind::Dkim));
        assert!(dkim(Path::new("/d/a.org/default.txt")));
        assert!(dkim(Path::new("/d/a.org/default.private")));
        assert!(!dkim(Path::new("/d/a.org/other.txt")));

        let users = recognizer_for(Some(ServiceKind::Users));
        assert!(users(Path::new("/cfg/users.yaml")));
        assert!(users(Path::new("/cfg/users.JSON")));
        assert!(!users(Path::new("/cfg/users.yaml.swp")));
    }

    #[test]
    fn creates_and_modifies_of_matching_files_pass() {
        let tmp = TempDir::new().unwrap();
        let pem = tmp.path().join("fullchain.pem");
        fs::write(&pem, "x").unwrap();
        let filter = EventFilter::new(is_certificate_file);

        let created = translate(&event(EventKind::Create(CreateKind::File), &[&pem]), &filter);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, ChangeKind::Created);

        let modified = translate(
            &event(
                EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
                &[&pem],
            ),
            &filter,
        );
        assert_eq!(modified[0].kind, ChangeKind::Modified);

        let txt = tmp.path().join("notes.txt");
        assert!(translate(&event(EventKind::Create(CreateKind::File), &[&txt]), &filter).is_empty());
    }

    #[test]
    fn directory_events_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("new.pem");
        fs::create_dir(&dir).unwrap();
        let filter = EventFilter::new(is_certificate_file);
        assert!(translate(&event(EventKind::Create(CreateKind::Any), &[&dir]), &filter).is_empty());
        assert!(translate(&event(EventKind::Create(CreateKind::Folder), &[&dir]), &filter).is_empty());
    }

    #[test]
    fn rename_is_split_into_delete_and_move() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("cert.pem.tmp");
        let to = tmp.path().join("cert.pem");
        fs::write(&to, "x").unwrap();
        let filter = EventFilter::new(is_certificate_file);

        // Only the destination matches: an editor's atomic save.
        let events = translate(
            &event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &[&from, &to]),
            &filter,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Moved);
        assert_eq!(events[0].path, to);
        assert_eq!(events[0].source.as_deref(), Some(from.as_path()));
        assert!(events[0].triggers_reload());

        // Both ends match.
        let old = tmp.path().join("old.pem");
        let events = translate(
            &event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &[&old, &to]),
            &filter,
        );
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Deleted, ChangeKind::Moved]);
    }

    #[test]
    fn removals_become_deletes_that_do_not_reload() {
        let filter = EventFilter::new(is_dkim_file);
        let gone = Path::new("/nonexistent/a.org/default.txt");
        let events = translate(&event(EventKind::Remove(RemoveKind::File), &[gone]), &filter);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Deleted);
        assert!(!events[0].triggers_reload());
    }

    #[test]
    fn single_file_filter_ignores_siblings() {
        let filter = EventFilter::single_file("/cfg/users.yaml");
        assert!(filter.matches(Path::new("/cfg/users.yaml")));
        assert!(!filter.matches(Path::new("/cfg/other.yaml")));
    }

    #[test]
    fn missing_root_fails_fast() {
        let err = FileWatcher::start(Path::new("/nonexistent/podplay-root"), true, is_any_artifact)
            .err()
            .expect("missing root must fail");
        assert!(matches!(err, DaemonError::RootNotFound { .. }), "got: {err}");
    }
}
