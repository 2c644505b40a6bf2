//! Per-control state type definitions

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Sentinel stored in `last_sent` before anything was transmitted
const NOTHING_SENT: i32 = -1;

/// Live state of one mapped control.
///
/// `current` and `dirty` are written by ingestion and consumed by dispatch.
/// `previous` and `last_sent` are only ever written by dispatch.
#[derive(Debug)]
pub struct ControlState {
    pub(super) current: AtomicI32,
    pub(super) dirty: AtomicBool,
    pub(super) previous: AtomicI32,
    pub(super) last_sent: AtomicI32,
}

impl ControlState {
    pub(super) fn new() -> Self {
        Self {
            current: AtomicI32::new(0),
            dirty: AtomicBool::new(false),
            previous: AtomicI32::new(0),
            last_sent: AtomicI32::new(NOTHING_SENT),
        }
    }

    pub(super) fn padded() -> CachePadded<Self> {
        CachePadded::new(Self::new())
    }

    pub(super) fn tracking(&self) -> ControlTracking {
        let last_sent = self.last_sent.load(Ordering::Relaxed);
        ControlTracking {
            previous: self.previous.load(Ordering::Relaxed),
            last_sent: u8::try_from(last_sent).ok(),
        }
    }

    pub(super) fn commit(&self, tracking: ControlTracking) {
        self.previous.store(tracking.previous, Ordering::Relaxed);
        self.last_sent.store(
            tracking.last_sent.map_or(NOTHING_SENT, i32::from),
            Ordering::Relaxed,
        );
    }
}

/// Dispatch-side bookkeeping for one control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTracking {
    /// Last raw value acted upon (button edge detection)
    pub previous: i32,
    /// Last 7-bit value transmitted (axis dedup)
    pub last_sent: Option<u8>,
}

impl Default for ControlTracking {
    fn default() -> Self {
        Self {
            previous: 0,
            last_sent: None,
        }
    }
}
