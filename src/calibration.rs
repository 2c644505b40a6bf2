//! Interactive axis calibration
//!
//! Learns the usable travel of an axis by watching its live value:
//!
//! ```text
//! Idle -> CountdownMin -> CapturingMin -> CountdownMax -> CapturingMax -> Done
//! ```
//!
//! Countdowns only give the operator time to move the control. Capture
//! windows poll the control state store and keep the running extreme. The
//! procedure blocks the caller for its whole duration but only ever reads
//! the store, so ingestion keeps running underneath it.

use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::session::Session;
use crate::state::ControlStateStore;

/// Calibration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("no mapping at index {0}")]
    NoSuchMapping(usize),

    #[error("calibration interrupted by shutdown")]
    Interrupted,
}

/// Step of the calibration procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    CountdownMin,
    CapturingMin,
    CountdownMax,
    CapturingMax,
    Done,
}

/// Durations of the procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTiming {
    pub countdown: Duration,
    pub capture: Duration,
    pub poll: Duration,
}

impl Default for CalibrationTiming {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(5),
            capture: Duration::from_secs(5),
            poll: Duration::from_millis(50),
        }
    }
}

/// Learned raw range of an axis; `min <= max` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRange {
    pub min: i32,
    pub max: i32,
}

impl CalibrationRange {
    /// Build a range from the captured extremes.
    ///
    /// Controls whose physical travel runs against their logical range
    /// capture `min > max`; the two are swapped.
    pub fn from_capture(captured_min: i32, captured_max: i32) -> Self {
        if captured_min > captured_max {
            debug!(
                "Captured min {} above max {}, swapping",
                captured_min, captured_max
            );
            Self { min: captured_max, max: captured_min }
        } else {
            Self { min: captured_min, max: captured_max }
        }
    }

    /// Zero-width range; axis output stays disabled
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// What a calibration request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    /// Buttons are never calibrated
    Skipped,
    Calibrated(CalibrationRange),
}

/// Progress callbacks for whoever presents the procedure
pub trait CalibrationObserver {
    fn phase_changed(&mut self, _phase: CalibrationPhase) {}

    /// Called at least once per second of countdown
    fn countdown(&mut self, _phase: CalibrationPhase, _remaining: Duration) {}

    /// Called after every capture poll
    fn sample(
        &mut self,
        _phase: CalibrationPhase,
        _current: i32,
        _extreme: i32,
        _remaining: Duration,
    ) {
    }
}

/// Observer that ignores every callback
impl CalibrationObserver for () {}

#[derive(Debug, Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

/// Runs the timed capture procedure against one store entry
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    timing: CalibrationTiming,
}

impl Calibrator {
    pub fn new(timing: CalibrationTiming) -> Self {
        Self { timing }
    }

    /// Capture both extremes of `index`, returning the ordered range
    pub fn capture_range(
        &self,
        store: &ControlStateStore,
        index: usize,
        session: &Session,
        observer: &mut dyn CalibrationObserver,
    ) -> Result<CalibrationRange, CalibrationError> {
        self.countdown(CalibrationPhase::CountdownMin, session, observer)?;
        let min = self.capture(store, index, Extreme::Min, session, observer)?;

        self.countdown(CalibrationPhase::CountdownMax, session, observer)?;
        let max = self.capture(store, index, Extreme::Max, session, observer)?;

        Ok(CalibrationRange::from_capture(min, max))
    }

    fn countdown(
        &self,
        phase: CalibrationPhase,
        session: &Session,
        observer: &mut dyn CalibrationObserver,
    ) -> Result<(), CalibrationError> {
        observer.phase_changed(phase);
        let deadline = Instant::now() + self.timing.countdown;

        loop {
            if session.is_stopped() {
                return Err(CalibrationError::Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let remaining = deadline - now;
            observer.countdown(phase, remaining);
            thread::sleep(remaining.min(Duration::from_secs(1)));
        }
    }

    fn capture(
        &self,
        store: &ControlStateStore,
        index: usize,
        extreme: Extreme,
        session: &Session,
        observer: &mut dyn CalibrationObserver,
    ) -> Result<i32, CalibrationError> {
        let (phase, mut seen) = match extreme {
            Extreme::Min => (CalibrationPhase::CapturingMin, i32::MAX),
            Extreme::Max => (CalibrationPhase::CapturingMax, i32::MIN),
        };
        observer.phase_changed(phase);
        let deadline = Instant::now() + self.timing.capture;

        // Always takes at least one sample, even with a zero-length window
        loop {
            if session.is_stopped() {
                return Err(CalibrationError::Interrupted);
            }

            let current = store.peek(index);
            seen = match extreme {
                Extreme::Min => seen.min(current),
                Extreme::Max => seen.max(current),
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            observer.sample(phase, current, seen, remaining);
            if remaining.is_zero() {
                return Ok(seen);
            }
            thread::sleep(self.timing.poll.min(remaining));
        }
    }
}

impl Session {
    /// Calibrate the axis bound to mapping `index`.
    ///
    /// Blocks for the countdown and capture windows. Dispatch is suspended
    /// for the duration; ingestion is not. On success the range is written
    /// to the mapping and it is marked calibrated, overwriting any earlier
    /// calibration. Buttons return [`CalibrationOutcome::Skipped`].
    pub fn begin_calibration(
        &self,
        index: usize,
        calibrator: &Calibrator,
        observer: &mut dyn CalibrationObserver,
    ) -> Result<CalibrationOutcome, CalibrationError> {
        let layout = self.layout();
        let rule = layout
            .mappings()
            .get(index)
            .ok_or(CalibrationError::NoSuchMapping(index))?;

        if rule.control.is_button {
            debug!("Skipping calibration for button {}", rule.control.name);
            return Ok(CalibrationOutcome::Skipped);
        }

        let _suspended = self.suspend_dispatch();
        info!("Calibrating axis: {}", rule.control.name);
        observer.phase_changed(CalibrationPhase::Idle);

        let range = calibrator.capture_range(layout.store(), index, self, observer)?;

        self.update_mapping(index, |rule| {
            rule.cal_min = range.min;
            rule.cal_max = range.max;
            rule.calibrated = true;
        })
        .ok_or(CalibrationError::NoSuchMapping(index))?;

        observer.phase_changed(CalibrationPhase::Done);
        info!(
            "Calibration complete for {}: {}..{}",
            rule.control.name, range.min, range.max
        );
        Ok(CalibrationOutcome::Calibrated(range))
    }
}
