//! Read-through table cache.
//!
//! Entries are keyed by source identifier and expire after an optional TTL.
//! Each key has its own fetch gate, so at most one load per key runs at a
//! time. Staleness rules:
//!
//! - a fresh entry is returned as is;
//! - an expired entry is refreshed by the first reader; readers arriving while
//!   that refresh runs get the expired table instead of waiting;
//! - if the refresh fails, the expired table is served and the error logged;
//! - with no entry at all, readers wait for the single in-flight load.
//!
//! `invalidate` and `clear` drop entries so the next reader loads again. The
//! per-key gate survives invalidation, so a reader arriving while a load is
//! still running waits for it instead of starting a second fetch. A load that
//! started before the invalidation is not stored.

use crate::error::SourceError;
use crate::table::Table;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Entry {
    table: Arc<Table>,
    loaded_at: Instant,
}

#[derive(Debug, Default)]
struct Slot {
    entry: RwLock<Option<Entry>>,
    gate: Mutex<()>,
    /// Bumped on every invalidation.
    generation: AtomicU64,
}

impl Slot {
    fn current(&self) -> Option<Entry> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn has_entry(&self) -> bool {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Store a loaded table unless the slot was reset since `generation`.
    fn store(&self, table: Arc<Table>, generation: u64) -> Arc<Table> {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation() == generation {
            *entry = Some(Entry {
                table: Arc::clone(&table),
                loaded_at: Instant::now(),
            });
        }
        table
    }

    fn reset(&self) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        *entry = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Tables keyed by source identifier.
#[derive(Debug, Default)]
pub struct TableCache {
    ttl: Option<Duration>,
    slots: DashMap<String, Arc<Slot>>,
}

impl TableCache {
    /// Creates a cache. `None` keeps entries until invalidated.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, key: &str) -> Arc<Slot> {
        Arc::clone(self.slots.entry(key.to_string()).or_default().value())
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        match self.ttl {
            Some(ttl) => entry.loaded_at.elapsed() < ttl,
            None => true,
        }
    }

    /// Return the cached table for `key`, calling `load` when needed.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<Arc<Table>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<Table>, SourceError>>,
    {
        let slot = self.slot(key);

        if let Some(entry) = slot.current() {
            if self.is_fresh(&entry) {
                return Ok(entry.table);
            }

            let Ok(_gate) = slot.gate.try_lock() else {
                debug!("Serving stale '{}' while it refreshes", key);
                return Ok(entry.table);
            };

            debug!("Refreshing expired '{}'", key);
            let generation = slot.generation();
            return match load().await {
                Ok(table) => Ok(slot.store(table, generation)),
                Err(e) => {
                    warn!("Refresh of '{}' failed, serving stale data: {}", key, e);
                    Ok(entry.table)
                }
            };
        }

        let _gate = slot.gate.lock().await;

        // Another reader may have finished the load while we waited.
        if let Some(entry) = slot.current() {
            return Ok(entry.table);
        }

        debug!("Loading '{}'", key);
        let generation = slot.generation();
        let table = load().await?;
        Ok(slot.store(table, generation))
    }

    /// Drop one entry. Returns whether a table was cached for `key`.
    pub fn invalidate(&self, key: &str) -> bool {
        let Some(slot) = self.slots.get(key) else {
            return false;
        };
        let cached = slot.has_entry();
        slot.reset();
        debug!("Invalidated '{}'", key);
        cached
    }

    /// Drop every entry. Returns the number of tables dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        for slot in self.slots.iter() {
            if slot.has_entry() {
                dropped += 1;
            }
            slot.reset();
        }
        dropped
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.has_entry()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
