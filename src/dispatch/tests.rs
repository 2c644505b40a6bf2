//! Tests for the dispatch loop

use super::*;
use crate::config::{MappingRule, MappingSet, MessageKind};
use crate::control::{ControlAddress, ControlDescriptor};
use crate::transport::TransportError;
use parking_lot::Mutex;
use std::time::Instant;

/// Records every sent message
#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingTransport {
    fn messages(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().push(bytes.to_vec());
        Ok(())
    }
}

/// Fails the first `failures` sends, then records like [`RecordingTransport`]
struct FlakyTransport {
    failures: usize,
    inner: RecordingTransport,
}

impl Transport for FlakyTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(TransportError::PortNotFound("gone".to_string()));
        }
        self.inner.send(bytes)
    }
}

fn address(code: u32) -> ControlAddress {
    ControlAddress::Native { code }
}

fn calibrated_axis(code: u32, cc: u8, cal_min: i32, cal_max: i32) -> MappingRule {
    let mut rule = MappingRule::new(ControlDescriptor::axis(address(code), format!("Axis{code}")));
    rule.number = cc;
    rule.cal_min = cal_min;
    rule.cal_max = cal_max;
    rule.calibrated = true;
    rule
}

fn note_button(code: u32, channel: Option<u8>, note: u8, velocity: u8) -> MappingRule {
    let mut rule = MappingRule::new(ControlDescriptor::button(address(code), format!("Btn{code}")));
    rule.kind = MessageKind::NoteToggle;
    rule.channel = channel;
    rule.number = note;
    rule.note_velocity = velocity;
    rule
}

fn setup(mappings: Vec<MappingRule>) -> (Arc<Session>, Dispatcher, RecordingTransport) {
    let session = Arc::new(Session::new(MappingSet {
        mappings,
        ..MappingSet::default()
    }));
    let transport = RecordingTransport::default();
    let dispatcher = Dispatcher::new(session.clone(), Box::new(transport.clone()));
    (session, dispatcher, transport)
}

#[test]
fn test_writes_between_ticks_coalesce() {
    let (session, mut dispatcher, transport) = setup(vec![calibrated_axis(1, 7, 0, 1000)]);
    let layout = session.layout();

    layout.observe(&address(1), 100);
    layout.observe(&address(1), 1000);

    assert_eq!(dispatcher.tick(), 1);
    assert_eq!(transport.messages(), vec![vec![0xB0, 7, 127]]);

    assert_eq!(dispatcher.tick(), 0);
}

#[test]
fn test_same_output_value_sent_once() {
    let (session, mut dispatcher, transport) = setup(vec![calibrated_axis(1, 7, 0, 1000)]);
    let layout = session.layout();

    layout.observe(&address(1), 500);
    dispatcher.tick();
    layout.observe(&address(1), 501);
    dispatcher.tick();

    assert_eq!(transport.messages(), vec![vec![0xB0, 7, 64]]);
    assert_eq!(dispatcher.stats().sent, 1);
}

#[test]
fn test_reversed_axis_midpoint() {
    let mut rule = calibrated_axis(1, 7, 0, 1000);
    rule.reverse = true;
    let (session, mut dispatcher, transport) = setup(vec![rule]);

    session.layout().observe(&address(1), 500);
    dispatcher.tick();

    assert_eq!(transport.messages(), vec![vec![0xB0, 7, 63]]);
}

#[test]
fn test_button_sequence_yields_one_on_one_off() {
    let (session, mut dispatcher, transport) = setup(vec![note_button(3, Some(2), 60, 100)]);
    let layout = session.layout();

    for value in [0, 0, 1, 1, 0] {
        layout.observe(&address(3), value);
        dispatcher.tick();
    }

    assert_eq!(
        transport.messages(),
        vec![vec![0x92, 60, 100], vec![0x82, 60, 0]]
    );
}

#[test]
fn test_degenerate_calibration_never_sends() {
    let (session, mut dispatcher, transport) = setup(vec![calibrated_axis(1, 7, 400, 400)]);
    let layout = session.layout();

    for value in [-32767, 0, 399, 400, 401, 32767] {
        layout.observe(&address(1), value);
        dispatcher.tick();
    }

    assert!(transport.messages().is_empty());
}

#[test]
fn test_degenerate_flags_sized_from_cached_layout() {
    let session = Arc::new(Session::new(MappingSet::default()));
    session.replace_mappings(MappingSet {
        mappings: vec![
            calibrated_axis(1, 7, 0, 1000),
            calibrated_axis(2, 8, 0, 1000),
            calibrated_axis(3, 9, 50, 50),
        ],
        ..MappingSet::default()
    });

    let transport = RecordingTransport::default();
    let mut dispatcher = Dispatcher::new(session.clone(), Box::new(transport.clone()));
    let cached = dispatcher.cache.refresh(&session).0.len();
    assert_eq!(dispatcher.degenerate_reported.len(), cached);

    session.layout().observe(&address(3), 10);
    assert_eq!(dispatcher.tick(), 0);
    assert!(dispatcher.degenerate_reported[2]);
    assert!(transport.messages().is_empty());
}

#[test]
fn test_uncalibrated_axis_still_tracks_previous() {
    let mut rule = calibrated_axis(1, 7, 0, 1000);
    rule.calibrated = false;
    let (session, mut dispatcher, transport) = setup(vec![rule]);
    let layout = session.layout();

    layout.observe(&address(1), 250);
    dispatcher.tick();

    assert!(transport.messages().is_empty());
    assert_eq!(layout.store().tracking(0).previous, 250);
}

#[test]
fn test_one_control_drives_every_bound_mapping() {
    let mut cc = note_button(4, None, 20, 0);
    cc.kind = MessageKind::ContinuousController;
    cc.cc_on = 127;
    let (session, mut dispatcher, transport) = setup(vec![note_button(4, None, 36, 90), cc]);

    session.layout().observe(&address(4), 1);
    assert_eq!(dispatcher.tick(), 2);
    assert_eq!(
        transport.messages(),
        vec![vec![0x90, 36, 90], vec![0xB0, 20, 127]]
    );
}

#[test]
fn test_suspension_defers_until_resumed() {
    let (session, mut dispatcher, transport) = setup(vec![calibrated_axis(1, 7, 0, 1000)]);
    let layout = session.layout();

    {
        let _paused = session.suspend_dispatch();
        layout.observe(&address(1), 0);
        layout.observe(&address(1), 1000);
        assert_eq!(dispatcher.tick(), 0);
        assert!(layout.store().is_dirty(0));
    }

    assert_eq!(dispatcher.tick(), 1);
    assert_eq!(transport.messages(), vec![vec![0xB0, 7, 127]]);
}

#[test]
fn test_default_channel_change_applies_to_inheriting_mappings() {
    let (session, mut dispatcher, transport) =
        setup(vec![note_button(3, None, 60, 100), note_button(5, Some(9), 61, 100)]);

    session.layout().observe(&address(3), 1);
    dispatcher.tick();

    session.set_default_channel(5);
    let layout = session.layout();
    layout.observe(&address(3), 0);
    layout.observe(&address(5), 1);
    dispatcher.tick();

    assert_eq!(
        transport.messages(),
        vec![vec![0x90, 60, 100], vec![0x85, 60, 0], vec![0x99, 61, 100]]
    );
}

#[test]
fn test_recalibration_keeps_live_state() {
    let (session, mut dispatcher, transport) = setup(vec![calibrated_axis(1, 7, 0, 1000)]);

    session.layout().observe(&address(1), 500);
    dispatcher.tick();

    session.update_mapping(0, |rule| rule.cal_max = 500);
    session.layout().observe(&address(1), 499);
    dispatcher.tick();

    assert_eq!(
        transport.messages(),
        vec![vec![0xB0, 7, 64], vec![0xB0, 7, 127]]
    );
}

#[test]
fn test_replaced_mappings_start_from_fresh_state() {
    let (session, mut dispatcher, transport) = setup(vec![calibrated_axis(1, 7, 0, 1000)]);
    session.layout().observe(&address(1), 1000);
    dispatcher.tick();

    session.replace_mappings(MappingSet {
        mappings: vec![note_button(2, Some(0), 48, 127), calibrated_axis(1, 8, 0, 1000)],
        ..MappingSet::default()
    });
    let layout = session.layout();
    layout.observe(&address(2), 1);
    layout.observe(&address(1), 1000);
    assert_eq!(dispatcher.tick(), 2);

    assert_eq!(
        transport.messages(),
        vec![vec![0xB0, 7, 127], vec![0x90, 48, 127], vec![0xB0, 8, 127]]
    );
}

#[test]
fn test_failed_send_is_not_a_dedup_reference() {
    let session = Arc::new(Session::new(MappingSet {
        mappings: vec![calibrated_axis(1, 7, 0, 1000)],
        ..MappingSet::default()
    }));
    let recorder = RecordingTransport::default();
    let transport = FlakyTransport { failures: 1, inner: recorder.clone() };
    let mut dispatcher = Dispatcher::new(session.clone(), Box::new(transport));

    let layout = session.layout();
    layout.observe(&address(1), 500);
    assert_eq!(dispatcher.tick(), 0);
    layout.observe(&address(1), 501);
    assert_eq!(dispatcher.tick(), 1);

    assert_eq!(recorder.messages(), vec![vec![0xB0, 7, 64]]);
    assert_eq!(dispatcher.stats().send_failures, 1);
}

#[test]
fn test_no_ticks_after_stop() {
    let (session, mut dispatcher, transport) = setup(vec![note_button(3, Some(0), 60, 100)]);

    session.stop();
    session.layout().observe(&address(3), 1);

    assert_eq!(dispatcher.tick(), 0);
    assert!(transport.messages().is_empty());
}

#[test]
fn test_run_loop_sends_until_stopped() {
    let (session, mut dispatcher, transport) = setup(vec![note_button(3, Some(1), 40, 100)]);

    let handle = thread::spawn(move || {
        let mut frames = 0;
        let stats = dispatcher.run_with_display(Duration::from_millis(5), |_| frames += 1);
        (stats, frames)
    });

    session.layout().observe(&address(3), 1);
    let deadline = Instant::now() + Duration::from_secs(5);
    while transport.messages().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    session.stop();
    let (stats, frames) = handle.join().unwrap();

    assert_eq!(transport.messages(), vec![vec![0x91, 40, 100]]);
    assert_eq!(stats.sent, 1);
    assert!(frames >= 1);
}
