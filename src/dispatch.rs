//! Dispatch loop - drains dirty controls and sends MIDI
//!
//! Runs at a fixed cadence (the mapping set's `sendIntervalMs`). Each tick
//! walks every mapping index once:
//!
//! 1. take the latest value if the control is dirty, otherwise skip it
//! 2. translate it and hand any resulting message to the transport
//! 3. remember the value as `previous`, whether or not a message went out
//!
//! Values written between two ticks coalesce; only the latest is seen.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::session::{Layout, LayoutCache, Session};
use crate::transport::Transport;
use crate::translate::{translate, Translation};

/// Counters kept by a [`Dispatcher`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub ticks: u64,
    pub sent: u64,
    pub send_failures: u64,
}

/// Owns the transport and turns state transitions into messages
pub struct Dispatcher {
    session: Arc<Session>,
    transport: Box<dyn Transport>,
    interval: Duration,
    cache: LayoutCache,
    /// Degenerate calibrations already reported for the cached layout
    degenerate_reported: Vec<bool>,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher ticking at the session's configured interval
    pub fn new(session: Arc<Session>, transport: Box<dyn Transport>) -> Self {
        let mut cache = LayoutCache::new(&session);
        let (layout, _) = cache.refresh(&session);
        let interval_ms = layout.config().send_interval_ms.max(1);
        let degenerate_reported = vec![false; layout.len()];

        Self {
            degenerate_reported,
            session,
            transport,
            interval: Duration::from_millis(interval_ms),
            cache,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Run one pass over every mapping; returns the number of messages sent.
    ///
    /// Does nothing once the session is stopped or while dispatch is
    /// suspended. Suspended updates stay dirty and are picked up later.
    pub fn tick(&mut self) -> usize {
        if self.session.is_stopped() || self.session.is_dispatch_suspended() {
            return 0;
        }

        let (layout, reloaded) = self.cache.refresh(&self.session);
        let layout = Arc::clone(layout);
        if reloaded {
            debug!("Dispatch picked up new layout ({} mapping(s))", layout.len());
            self.degenerate_reported = vec![false; layout.len()];
        }

        self.stats.ticks += 1;
        let default_channel = layout.config().default_channel;
        let store = layout.store();
        let mut sent = 0;

        for (index, rule) in layout.mappings().iter().enumerate() {
            let Some(value) = store.take_if_dirty(index) else {
                continue;
            };

            let mut tracking = store.tracking(index);
            let last_sent = tracking.last_sent;

            match translate(rule, default_channel, value, &mut tracking) {
                Translation::Send(message) => match self.transport.send(&message.encode()) {
                    Ok(()) => {
                        trace!("{} -> {}", rule.control.name, message);
                        self.stats.sent += 1;
                        sent += 1;
                    }
                    Err(e) => {
                        // Not sent, so not a dedup reference either
                        tracking.last_sent = last_sent;
                        self.stats.send_failures += 1;
                        warn!("Dropped {} for {}: {}", message, rule.control.name, e);
                    }
                },
                Translation::Degenerate => {
                    if !self.degenerate_reported[index] {
                        self.degenerate_reported[index] = true;
                        warn!(
                            "{} has an empty calibration range ({}..{}), recalibrate to enable it",
                            rule.control.name, rule.cal_min, rule.cal_max
                        );
                    }
                }
                Translation::Unchanged | Translation::Uncalibrated => {}
            }

            tracking.previous = value;
            store.commit(index, tracking);
        }

        sent
    }

    /// Tick until the session stops
    pub fn run(&mut self) -> DispatchStats {
        self.run_with_display(Duration::MAX, |_| {})
    }

    /// Tick until the session stops, calling `on_frame` at most once per
    /// `frame_interval` with the current layout.
    ///
    /// The display callback only reads the store and never consumes dirty
    /// flags.
    pub fn run_with_display<F>(&mut self, frame_interval: Duration, mut on_frame: F) -> DispatchStats
    where
        F: FnMut(&Layout),
    {
        info!("Dispatching every {:?}", self.interval);
        let mut last_frame: Option<Instant> = None;

        while !self.session.is_stopped() {
            self.tick();

            let due = last_frame.map_or(true, |at| at.elapsed() >= frame_interval);
            if due && !self.session.is_dispatch_suspended() {
                on_frame(&self.session.layout());
                last_frame = Some(Instant::now());
            }

            thread::sleep(self.interval);
        }

        info!(
            "Dispatch stopped after {} tick(s): {} sent, {} failed",
            self.stats.ticks, self.stats.sent, self.stats.send_failures
        );
        self.stats
    }
}

#[cfg(test)]
mod tests;
