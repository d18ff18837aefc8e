use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::SelectorError;
use crate::selector::Selector;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Maps selector text to its compiled form so each subscription's selector is
/// parsed once rather than once per message.
///
/// Safe to share between threads. Two threads compiling the same text at the
/// same time may both do the work; the later insert wins, and both results
/// are equivalent.
#[derive(Debug)]
pub struct SelectorCache {
    entries: DashMap<String, Arc<Selector>>,
    capacity: usize,
    occupied: AtomicUsize, // slots taken, never above `capacity`
}

impl SelectorCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Once `capacity` selectors are cached, further compilations are handed
    /// out but not retained.
    pub fn with_capacity(capacity: usize) -> Self {
        SelectorCache { entries: DashMap::new(), capacity, occupied: AtomicUsize::new(0) }
    }

    /// Returns the cached selector for `source`, compiling it on a miss.
    /// Rejected selectors are not cached.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<Selector>, SelectorError> {
        if let Some(entry) = self.entries.get(source) {
            log::trace!("selector cache hit for {:?}", source);
            return Ok(Arc::clone(entry.value()));
        }

        // Compile outside of any shard lock.
        let selector = match Selector::compile(source) {
            Ok(selector) => Arc::new(selector),
            Err(e) => {
                log::debug!("rejected selector {:?}: {}", source, e);
                return Err(e);
            }
        };

        match self.entries.entry(source.to_string()) {
            // compiled concurrently by another caller, replace it
            Entry::Occupied(mut entry) => {
                entry.insert(Arc::clone(&selector));
            }
            // the shard stays locked while the slot is reserved
            Entry::Vacant(entry) => {
                if self.reserve_slot() {
                    entry.insert(Arc::clone(&selector));
                    log::debug!("cached selector {:?}", source);
                } else {
                    log::warn!("selector cache full ({} entries), not caching {:?}", self.capacity, source);
                }
            }
        }
        Ok(selector)
    }

    fn reserve_slot(&self) -> bool {
        self.occupied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.capacity).then_some(n + 1))
            .is_ok()
    }

    pub fn get(&self, source: &str) -> Option<Arc<Selector>> {
        self.entries.get(source).map(|entry| Arc::clone(entry.value()))
    }

    /// Drops the entry for `source`, e.g. when its last subscription goes away.
    pub fn remove(&self, source: &str) -> Option<Arc<Selector>> {
        let (_, selector) = self.entries.remove(source)?;
        self.occupied.fetch_sub(1, Ordering::AcqRel);
        Some(selector)
    }

    pub fn clear(&self) {
        self.entries.retain(|_, _| {
            self.occupied.fetch_sub(1, Ordering::AcqRel);
            false
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SelectorCache {
    fn default() -> Self {
        Self::new()
    }
}
