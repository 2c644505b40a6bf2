//! ControlStateStore - lock-free latest-value slots, one per mapping
//!
//! Ingestion calls [`ControlStateStore::observe`] as samples arrive and the
//! dispatch loop drains them with [`ControlStateStore::take_if_dirty`].
//! Values written between two takes coalesce: only the latest survives.

use super::types::{ControlState, ControlTracking};
use crossbeam::utils::CachePadded;
use std::sync::atomic::Ordering;
use tracing::trace;

/// Fixed-size store of per-control state, index-aligned with a mapping vector
#[derive(Debug)]
pub struct ControlStateStore {
    entries: Box<[CachePadded<ControlState>]>,
}

impl ControlStateStore {
    /// Create a store with `count` zeroed entries
    pub fn new(count: usize) -> Self {
        Self {
            entries: (0..count).map(|_| ControlState::padded()).collect(),
        }
    }

    /// Replace every entry with `count` fresh ones, invalidating old indices
    pub fn reinitialize(&mut self, count: usize) {
        *self = Self::new(count);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, index: usize) -> &ControlState {
        debug_assert!(
            index < self.entries.len(),
            "control index {} outside store of {}",
            index,
            self.entries.len()
        );
        &self.entries[index]
    }

    /// Record a raw sample; marks the entry dirty only when the value changed
    pub fn observe(&self, index: usize, raw: i32) {
        let entry = self.entry(index);
        if entry.current.load(Ordering::Acquire) != raw {
            entry.current.store(raw, Ordering::Release);
            entry.dirty.store(true, Ordering::Release);
            trace!("control[{}] <- {}", index, raw);
        }
    }

    /// Consume the latest value if it changed since the previous take.
    ///
    /// The dirty flag is exchanged to false before the value is read, so a
    /// write racing with this call is either returned now or re-flagged for
    /// the next take; it is never lost.
    pub fn take_if_dirty(&self, index: usize) -> Option<i32> {
        let entry = self.entry(index);
        if entry.dirty.swap(false, Ordering::AcqRel) {
            Some(entry.current.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Latest raw value without touching the dirty flag
    pub fn peek(&self, index: usize) -> i32 {
        self.entry(index).current.load(Ordering::Acquire)
    }

    /// Whether a value is waiting to be taken
    pub fn is_dirty(&self, index: usize) -> bool {
        self.entry(index).dirty.load(Ordering::Acquire)
    }

    /// Dispatch bookkeeping for an entry
    pub fn tracking(&self, index: usize) -> ControlTracking {
        self.entry(index).tracking()
    }

    /// Store dispatch bookkeeping for an entry
    pub fn commit(&self, index: usize, tracking: ControlTracking) {
        self.entry(index).commit(tracking);
    }
}
