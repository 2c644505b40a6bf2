//! gilrs device provider
//!
//! Enumerates connected controllers and feeds the control state store from
//! a dedicated ingestion thread. `Gilrs` is not `Send`, so every instance
//! lives and dies on the thread that created it.

use gilrs::{ev::Code, Event, EventType, Gamepad, GamepadId, Gilrs};
use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::axis::{axis_name, scale_axis, STANDARD_AXES};
use super::buttons::{button_name, STANDARD_BUTTONS};
use crate::control::{ControlAddress, ControlDescriptor};
use crate::input::{DeviceError, DeviceInfo};
use crate::session::{LayoutCache, Session};

/// Bounded wait on the event queue so the stop flag stays responsive
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Time given to wireless controllers to announce themselves
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(1500);

fn init_gilrs() -> Result<Gilrs, DeviceError> {
    Gilrs::new().map_err(|e| DeviceError::Init(e.to_string()))
}

/// Stable identifier of a controller (its UUID in hex)
pub fn device_id(gamepad: &Gamepad<'_>) -> String {
    hex::encode(gamepad.uuid())
}

fn address_of(code: Code) -> ControlAddress {
    ControlAddress::from_native(code.into_u32())
}

/// Controls the backend reports codes for
fn enumerate_controls(gamepad: &Gamepad<'_>) -> Vec<ControlDescriptor> {
    let mut controls: Vec<ControlDescriptor> = Vec::new();

    for &button in STANDARD_BUTTONS {
        if let Some(code) = gamepad.button_code(button) {
            controls.push(ControlDescriptor::button(address_of(code), button_name(button)));
        }
    }
    for &axis in STANDARD_AXES {
        if let Some(code) = gamepad.axis_code(axis) {
            controls.push(ControlDescriptor::axis(address_of(code), axis_name(axis)));
        }
    }

    // Some backends alias two logical controls onto one code
    let mut seen = Vec::with_capacity(controls.len());
    controls.retain(|c| {
        let fresh = !seen.contains(&c.address);
        seen.push(c.address);
        fresh
    });
    controls
}

fn describe(gamepad: &Gamepad<'_>) -> DeviceInfo {
    DeviceInfo {
        id: device_id(gamepad),
        name: gamepad.name().to_string(),
        controls: enumerate_controls(gamepad),
    }
}

/// Pump events for `settle` so hot-plugged devices get registered
fn settle(gilrs: &mut Gilrs, settle: Duration) {
    let deadline = Instant::now() + settle;
    while Instant::now() < deadline {
        while let Some(Event { id, event, .. }) = gilrs.next_event() {
            if event == EventType::Connected {
                debug!("Controller connected during scan: {:?}", id);
            }
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Scan for connected controllers
pub fn list_devices(settle_for: Duration) -> Result<Vec<DeviceInfo>, DeviceError> {
    let mut gilrs = init_gilrs()?;
    settle(&mut gilrs, settle_for);

    let devices: Vec<DeviceInfo> = gilrs
        .gamepads()
        .filter(|(_, gamepad)| gamepad.is_connected())
        .map(|(_, gamepad)| describe(&gamepad))
        .collect();

    debug!("Found {} connected controller(s)", devices.len());
    Ok(devices)
}

/// Look up one connected controller by id
pub fn find_device(id: &str, settle_for: Duration) -> Result<DeviceInfo, DeviceError> {
    list_devices(settle_for)?
        .into_iter()
        .find(|device| device.id == id)
        .ok_or_else(|| DeviceError::NotFound(id.to_string()))
}

/// Raw sample carried by a backend event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sample {
    Value(ControlAddress, i32),
    Connected,
    Disconnected,
    Ignored,
}

fn sample_of(event: &EventType) -> Sample {
    match *event {
        EventType::ButtonPressed(_, code) => Sample::Value(address_of(code), 1),
        EventType::ButtonReleased(_, code) => Sample::Value(address_of(code), 0),
        EventType::AxisChanged(_, value, code) => Sample::Value(address_of(code), scale_axis(value)),
        EventType::Connected => Sample::Connected,
        EventType::Disconnected => Sample::Disconnected,
        _ => Sample::Ignored,
    }
}

/// Start the ingestion thread for controller `device_id`.
///
/// Returns once the backend is initialized. The thread routes every sample
/// of the selected controller into the session's current layout, stops when
/// the session stops, and raises the stop flag itself when the controller
/// disconnects.
pub fn spawn_ingestion(
    device_id: String,
    session: Arc<Session>,
) -> Result<JoinHandle<()>, DeviceError> {
    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), DeviceError>>(1);

    let handle = thread::Builder::new()
        .name("hidmidi-ingest".to_string())
        .spawn(move || {
            let mut gilrs = match init_gilrs() {
                Ok(gilrs) => {
                    let _ = ready_tx.send(Ok(()));
                    gilrs
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            ingest(&mut gilrs, &device_id, &session);
        })
        .map_err(|e| DeviceError::Init(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(DeviceError::Init("ingestion thread exited early".to_string())),
    }
}

fn ingest(gilrs: &mut Gilrs, device_id: &str, session: &Session) {
    let mut selected: HashMap<GamepadId, bool> = gilrs
        .gamepads()
        .map(|(id, gamepad)| (id, self::device_id(&gamepad) == device_id))
        .collect();

    if selected.values().any(|&is_selected| is_selected) {
        info!("Reading controller {}", device_id);
    } else {
        warn!("Controller {} not connected yet, waiting for it", device_id);
    }

    let mut cache = LayoutCache::new(session);

    while !session.is_stopped() {
        let Some(Event { id, event, .. }) = gilrs.next_event_blocking(Some(POLL_TIMEOUT)) else {
            continue;
        };

        let sample = sample_of(&event);
        if sample == Sample::Connected {
            let is_selected = self::device_id(&gilrs.gamepad(id)) == device_id;
            if is_selected {
                info!("Controller {} connected", device_id);
            }
            selected.insert(id, is_selected);
            continue;
        }

        let is_selected = *selected
            .entry(id)
            .or_insert_with(|| self::device_id(&gilrs.gamepad(id)) == device_id);
        if !is_selected {
            continue;
        }

        match sample {
            Sample::Value(address, raw) => {
                let (layout, _) = cache.refresh(session);
                if !layout.observe(&address, raw) {
                    trace!("Unmapped control {} = {}", address, raw);
                }
            }
            Sample::Disconnected => {
                warn!("Controller {} disconnected, stopping", device_id);
                session.stop();
                break;
            }
            Sample::Connected | Sample::Ignored => {}
        }
    }

    debug!("Ingestion thread exiting");
}
