//! Handle → source bindings and their cleanup scopes
//!
//! Each `DataTableServer` owns one registry. Handles are UUID v4 strings, so
//! independent registries never collide and a disposed handle is never reissued.

use super::source::{RowIdentity, TableSource};
use crate::datatable::error::{DataTableError, Result};
use crate::datatable::SourceHandle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cleanup run once when a handle's scope ends
pub type Disposer = Box<dyn FnOnce() + Send>;

struct Entry {
    source: Arc<dyn TableSource>,
    identity: Option<RowIdentity>,
    disposers: Vec<Disposer>,
    last_access: Instant,
}

/// What a handle resolves to
#[derive(Clone)]
pub struct ResolvedSource {
    pub source: Arc<dyn TableSource>,
    pub identity: Option<RowIdentity>,
}

/// Shared registry; clones see the same bindings
#[derive(Clone, Default)]
pub struct SourceRegistry {
    entries: Arc<Mutex<HashMap<SourceHandle, Entry>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SourceHandle, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind a source to a fresh handle
    pub fn register(
        &self,
        source: Arc<dyn TableSource>,
        identity: Option<RowIdentity>,
    ) -> SourceHandle {
        let handle = SourceHandle::generate();
        let entry = Entry {
            source,
            identity,
            disposers: Vec::new(),
            last_access: Instant::now(),
        };
        let count = {
            let mut entries = self.lock();
            entries.insert(handle.clone(), entry);
            entries.len()
        };
        info!(handle = %handle, live = count, "source registered");
        handle
    }

    pub fn resolve(&self, handle: &SourceHandle) -> Result<ResolvedSource> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(handle)
            .ok_or_else(|| DataTableError::ConnectionNotFound(handle.to_string()))?;
        entry.last_access = Instant::now();
        Ok(ResolvedSource {
            source: Arc::clone(&entry.source),
            identity: entry.identity.clone(),
        })
    }

    pub fn contains(&self, handle: &SourceHandle) -> bool {
        self.lock().contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach a disposer to the handle's scope
    ///
    /// Disposers run in the order they were added. If the handle is unknown or
    /// already disposed the disposer runs immediately and `false` is returned.
    pub fn add_cleanup<F>(&self, handle: &SourceHandle, disposer: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let rejected = {
            let mut entries = self.lock();
            match entries.get_mut(handle) {
                Some(entry) => {
                    entry.disposers.push(Box::new(disposer));
                    None
                }
                None => Some(disposer),
            }
        };
        match rejected {
            Some(disposer) => {
                debug!(handle = %handle, "cleanup added to unknown handle, running now");
                disposer();
                false
            }
            None => true,
        }
    }

    /// End the handle's scope; `false` if it was already gone
    pub fn dispose(&self, handle: &SourceHandle) -> bool {
        let entry = self.lock().remove(handle);
        match entry {
            Some(entry) => {
                run_disposers(handle, entry);
                info!(handle = %handle, "source disposed");
                true
            }
            None => false,
        }
    }

    /// Evict handles not resolved within `idle_timeout` of `now`
    pub fn evict_idle(&self, now: Instant, idle_timeout: Duration) -> Vec<SourceHandle> {
        let evicted: Vec<(SourceHandle, Entry)> = {
            let mut entries = self.lock();
            let stale: Vec<SourceHandle> = entries
                .iter()
                .filter(|(_, e)| now.saturating_duration_since(e.last_access) >= idle_timeout)
                .map(|(h, _)| h.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|h| entries.remove(&h).map(|e| (h, e)))
                .collect()
        };
        finish_eviction(evicted, "idle")
    }

    /// Evict least-recently-used handles until at most `max_sources` remain
    pub fn enforce_capacity(&self, max_sources: usize) -> Vec<SourceHandle> {
        let evicted: Vec<(SourceHandle, Entry)> = {
            let mut entries = self.lock();
            if entries.len() <= max_sources {
                return Vec::new();
            }
            let mut by_age: Vec<(Instant, SourceHandle)> = entries
                .iter()
                .map(|(h, e)| (e.last_access, h.clone()))
                .collect();
            by_age.sort();
            let excess = entries.len() - max_sources;
            by_age
                .into_iter()
                .take(excess)
                .filter_map(|(_, h)| entries.remove(&h).map(|e| (h, e)))
                .collect()
        };
        finish_eviction(evicted, "capacity")
    }

    /// RAII scope for a handle registered elsewhere
    pub fn scope(&self, handle: SourceHandle) -> SourceScope {
        SourceScope {
            handle,
            registry: self.clone(),
            disposed: false,
        }
    }
}

fn run_disposers(handle: &SourceHandle, entry: Entry) {
    let count = entry.disposers.len();
    for disposer in entry.disposers {
        disposer();
    }
    if count > 0 {
        debug!(handle = %handle, disposers = count, "disposers ran");
    }
}

fn finish_eviction(evicted: Vec<(SourceHandle, Entry)>, reason: &str) -> Vec<SourceHandle> {
    let mut handles = Vec::with_capacity(evicted.len());
    for (handle, entry) in evicted {
        run_disposers(&handle, entry);
        info!(handle = %handle, reason, "source evicted");
        handles.push(handle);
    }
    handles
}

/// Owner of a handle's lifetime on the view side
///
/// Dropping the scope (or calling [`SourceScope::dispose`]) ends the handle.
pub struct SourceScope {
    handle: SourceHandle,
    registry: SourceRegistry,
    disposed: bool,
}

impl SourceScope {
    pub fn handle(&self) -> &SourceHandle {
        &self.handle
    }

    pub fn add_cleanup<F>(&self, disposer: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.registry.add_cleanup(&self.handle, disposer)
    }

    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.registry.dispose(&self.handle)
    }
}

impl Drop for SourceScope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceScope")
            .field("handle", &self.handle)
            .field("disposed", &self.disposed)
            .finish()
    }
}
