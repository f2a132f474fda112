//! Per-hub snapshots of the flat category list.
//!
//! The categories page reads the whole flat list on every request to rebuild
//! the tree. Snapshots are dropped whenever a category of the hub changes.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::domain::category::Category;

/// Default lifetime of a cached snapshot.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Store of flat category lists keyed by hub.
///
/// Every hub carries a generation that [`invalidate`](Self::invalidate)
/// advances. A list read from storage is stored only if the generation taken
/// before the read is still current, so a read racing a write never puts the
/// older list back.
pub trait CategoryCache {
    /// Snapshot for the hub, if present and still fresh.
    fn get(&self, hub_id: i32) -> Option<Vec<Category>>;
    /// Current generation of the hub.
    fn generation(&self, hub_id: i32) -> u64;
    /// Store the snapshot for the hub unless it was invalidated after
    /// `generation` was taken.
    fn put(&self, hub_id: i32, generation: u64, categories: Vec<Category>);
    /// Drop the snapshot for the hub and advance its generation.
    fn invalidate(&self, hub_id: i32);
}

struct Snapshot {
    categories: Vec<Category>,
    stored_at: Instant,
}

#[derive(Default)]
struct HubEntry {
    generation: u64,
    snapshot: Option<Snapshot>,
}

/// Process-local [`CategoryCache`] with a time-to-live.
///
/// A zero TTL disables caching. A poisoned lock is treated as a miss.
pub struct InMemoryCategoryCache {
    entries: RwLock<HashMap<i32, HubEntry>>,
    ttl: Duration,
}

impl Default for InMemoryCategoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl InMemoryCategoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

impl CategoryCache for InMemoryCategoryCache {
    fn get(&self, hub_id: i32) -> Option<Vec<Category>> {
        if self.ttl.is_zero() {
            return None;
        }

        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(err) => {
                log::error!("Category cache lock poisoned on read: {err}");
                return None;
            }
        };

        entries
            .get(&hub_id)
            .and_then(|entry| entry.snapshot.as_ref())
            .filter(|snapshot| snapshot.stored_at.elapsed() < self.ttl)
            .map(|snapshot| snapshot.categories.clone())
    }

    fn generation(&self, hub_id: i32) -> u64 {
        match self.entries.read() {
            Ok(entries) => entries.get(&hub_id).map_or(0, |entry| entry.generation),
            Err(err) => {
                log::error!("Category cache lock poisoned on read: {err}");
                0
            }
        }
    }

    fn put(&self, hub_id: i32, generation: u64, categories: Vec<Category>) {
        if self.ttl.is_zero() {
            return;
        }

        match self.entries.write() {
            Ok(mut entries) => {
                let entry = entries.entry(hub_id).or_default();
                if entry.generation != generation {
                    log::debug!("Skipping stale category snapshot for hub {hub_id}");
                    return;
                }
                entry.snapshot = Some(Snapshot {
                    categories,
                    stored_at: Instant::now(),
                });
            }
            Err(err) => log::error!("Category cache lock poisoned on write: {err}"),
        }
    }

    fn invalidate(&self, hub_id: i32) {
        match self.entries.write() {
            Ok(mut entries) => {
                let entry = entries.entry(hub_id).or_default();
                entry.generation = entry.generation.wrapping_add(1);
                entry.snapshot = None;
            }
            Err(err) => log::error!("Category cache lock poisoned on invalidate: {err}"),
        }
    }
}
