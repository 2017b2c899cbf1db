//! Per-key debounce of reload requests.
//!
//! The first request for a key opens a window; requests arriving while the
//! window is open are absorbed. When the window closes the action runs under a
//! per-key lock, so two reloads of the same key never overlap.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use podplay_core::types::ReloadKey;

struct Pending {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    pending: Mutex<HashMap<ReloadKey, Pending>>,
    locks: Mutex<HashMap<ReloadKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// Debounces actions keyed by [`ReloadKey`].
#[derive(Clone, Default)]
pub struct Debouncer {
    inner: Arc<Inner>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run once `delay` has elapsed.
    ///
    /// Returns `false` when a window for `key` is already open; the request is
    /// then absorbed into it.
    pub fn schedule<F, Fut>(&self, key: ReloadKey, delay: Duration, action: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.lock_pending();
        if pending.contains_key(&key) {
            tracing::debug!(key = %key, "reload already pending, absorbed");
            return false;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = {
            let inner = self.inner.clone();
            let cancelled = cancelled.clone();
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                {
                    let mut pending = inner
                        .pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if cancelled.load(Ordering::SeqCst) {
                        return;
                    }
                    pending.remove(&key);
                }
                let lock = key_lock(&inner, &key);
                let _guard = lock.lock().await;
                action().await;
            })
        };
        pending.insert(key, Pending { cancelled, handle });
        true
    }

    /// Drop the pending window for `key`, if any. A running action is left alone.
    pub fn cancel(&self, key: &ReloadKey) -> bool {
        match self.lock_pending().remove(key) {
            Some(entry) => {
                entry.cancelled.store(true, Ordering::SeqCst);
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Drop every pending window. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Pending> = self.lock_pending().drain().map(|(_, p)| p).collect();
        for entry in &drained {
            entry.cancelled.store(true, Ordering::SeqCst);
            entry.handle.abort();
        }
        drained.len()
    }

    pub fn is_pending(&self, key: &ReloadKey) -> bool {
        self.lock_pending().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<ReloadKey, Pending>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn key_lock(inner: &Inner, key: &ReloadKey) -> Arc<tokio::sync::Mutex<()>> {
    inner
        .locks
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key.clone())
        .or_default()
        .clone()
}
