//! Interactive terminal menus
//!
//! Walks the operator through choosing a controller, an output port and the
//! control mappings, or through loading and editing a saved mapping file.
//! Every prompt blocks, so [`Menu::run`] must be called off the async
//! runtime (for example from `spawn_blocking`); file I/O is driven through
//! the runtime handle.

use anyhow::{bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::calibration::{CalibrationObserver, CalibrationOutcome, CalibrationPhase, Calibrator};
use crate::config::{self, MappingRule, MappingSet, MessageKind};
use crate::control::ControlDescriptor;
use crate::input::{self, DeviceError, DeviceInfo};
use crate::paths::AppPaths;
use crate::session::Session;
use crate::transport::{self, MidiOutTransport};

/// The operator quit from a prompt (Ctrl+C, Ctrl+D or "Exit")
#[derive(Debug, Error)]
#[error("cancelled by user")]
pub struct Cancelled;

/// Rejected menu input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Invalid input. Please enter a number.")]
    NotANumber,

    #[error("Invalid input. Please enter a whole number between {min} and {max}.")]
    OutOfRange { min: usize, max: usize },
}

/// Parse a menu answer in `min..=max`
pub fn parse_selection(input: &str, min: usize, max: usize) -> Result<usize, SelectionError> {
    let value: usize = input.trim().parse().map_err(|_| SelectionError::NotANumber)?;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(SelectionError::OutOfRange { min, max })
    }
}

/// Whole seconds left, rounded up
fn ceil_secs(remaining: Duration) -> u64 {
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}

/// Everything the run phase needs once the menus are done
pub struct Prepared {
    pub session: Arc<Session>,
    pub ingestion: JoinHandle<()>,
    pub transport: MidiOutTransport,
}

/// Print the mapping list as `N. Name -> Ch1 CC 7`
pub fn print_mappings(config: &MappingSet, first_number: usize) {
    for (i, rule) in config.mappings.iter().enumerate() {
        println!("  {}. {}", i + first_number, rule.summary(config.default_channel));
    }
}

/// `--list-ports`
pub fn print_output_ports() -> Result<()> {
    println!("\n{}", "=== MIDI Output Ports ===".bold().cyan());
    let ports = transport::list_output_ports()?;
    if ports.is_empty() {
        println!("  {}", "No output ports found".dimmed());
    }
    for (i, port) in ports.iter().enumerate() {
        println!("  [{}] {}", i, port);
    }
    println!();
    Ok(())
}

/// Progress output for an interactive calibration
#[derive(Default)]
struct ConsoleCalibration {
    extreme: Option<i32>,
}

impl ConsoleCalibration {
    fn report_extreme(&mut self, label: &str) {
        if let Some(value) = self.extreme.take() {
            println!();
            println!("   {} value captured: {}\n", label, value);
        }
    }
}

impl CalibrationObserver for ConsoleCalibration {
    fn phase_changed(&mut self, phase: CalibrationPhase) {
        match phase {
            CalibrationPhase::CountdownMin => {
                println!("1. Move the control to its desired MINIMUM position.\n   Get ready!");
            }
            CalibrationPhase::CountdownMax => {
                self.report_extreme("Minimum");
                println!("2. Move the control to its desired MAXIMUM position.\n   Get ready!");
            }
            CalibrationPhase::CapturingMin | CalibrationPhase::CapturingMax => {
                print!("\r{}\r", " ".repeat(50));
            }
            CalibrationPhase::Done => self.report_extreme("Maximum"),
            CalibrationPhase::Idle => {}
        }
        let _ = io::stdout().flush();
    }

    fn countdown(&mut self, phase: CalibrationPhase, remaining: Duration) {
        let stage = if phase == CalibrationPhase::CountdownMin { "MIN" } else { "MAX" };
        print!("\rStarting {} capture in {} second(s)... ", stage, ceil_secs(remaining));
        let _ = io::stdout().flush();
    }

    fn sample(&mut self, phase: CalibrationPhase, current: i32, extreme: i32, remaining: Duration) {
        self.extreme = Some(extreme);
        let label = if phase == CalibrationPhase::CapturingMin { "Min" } else { "Max" };
        print!(
            "\rCapturing... HOLD! ({}s) Current: {} {}: {}      ",
            ceil_secs(remaining).max(1),
            current,
            label,
            extreme
        );
        let _ = io::stdout().flush();
    }
}

/// Interactive setup driver
pub struct Menu {
    editor: DefaultEditor,
    paths: AppPaths,
    calibrator: Calibrator,
    runtime: Handle,
    preselected: Option<PathBuf>,
}

impl Menu {
    pub fn new(paths: AppPaths, calibrator: Calibrator, runtime: Handle) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            paths,
            calibrator,
            runtime,
            preselected: None,
        })
    }

    /// Open `path` directly instead of offering the file picker
    pub fn with_config(mut self, path: PathBuf) -> Self {
        self.preselected = Some(path);
        self
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(line.trim().to_string()),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Err(Cancelled.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ask until the answer is a number in `min..=max`
    fn select(&mut self, prompt: &str, min: usize, max: usize) -> Result<usize> {
        loop {
            let line = self.read_line(prompt)?;
            match parse_selection(&line, min, max) {
                Ok(value) => return Ok(value),
                Err(e) => println!("{}", e.to_string().yellow()),
            }
        }
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        println!("{} [0] No  [1] Yes", question);
        Ok(self.select("> ", 0, 1)? == 1)
    }

    fn pause(&mut self) -> Result<()> {
        self.read_line("Press Enter to continue...")?;
        Ok(())
    }

    /// Load or build a configuration and start ingestion
    pub fn run(mut self) -> Result<Prepared> {
        println!("{}\n", "--- HID to MIDI Mapper ---".bold().cyan());

        if let Some(path) = self.preselected.take() {
            let set = self.runtime.block_on(MappingSet::load(&path))?;
            return self.run_loaded(set, path);
        }

        let files = self
            .runtime
            .block_on(config::list_configurations(&self.paths.config_dir))
            .unwrap_or_else(|e| {
                warn!("Could not list configurations: {}", e);
                Vec::new()
            });

        if !files.is_empty() {
            println!("Found existing configurations:");
            for (i, file) in files.iter().enumerate() {
                let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                println!("[{}] {}", i, name);
            }
            println!("[{}] Create New Configuration", files.len());

            let choice = self.select("> ", 0, files.len())?;
            if let Some(path) = files.get(choice) {
                match self.runtime.block_on(MappingSet::load(path)) {
                    Ok(set) => {
                        println!(
                            "Configuration loaded successfully with {} mapping(s).",
                            set.mappings.len()
                        );
                        return self.run_loaded(set, path.clone());
                    }
                    Err(e) => println!(
                        "{} {}\nStarting new setup.",
                        "Failed to load configuration:".red(),
                        e
                    ),
                }
            }
        }

        self.run_new()
    }

    fn run_new(&mut self) -> Result<Prepared> {
        println!("\n{}", "--- Step 1: Select Controller ---".bold());
        let mut devices = input::list_devices(input::DEFAULT_SETTLE)?;
        if devices.is_empty() {
            bail!("No controllers found");
        }
        println!("Available Controllers:");
        for (i, device) in devices.iter().enumerate() {
            println!("[{}] {} ({})", i, device.name, device.id.dimmed());
        }
        let choice = self.select("> ", 0, devices.len() - 1)?;
        let device = devices.swap_remove(choice);
        if device.controls.is_empty() {
            bail!("No usable controls found on this device");
        }

        println!("\n{}", "--- Step 2: Select MIDI Output ---".bold());
        let ports = transport::list_output_ports()?;
        if ports.is_empty() {
            bail!("No MIDI output ports available");
        }
        for (i, port) in ports.iter().enumerate() {
            println!("  [{}]: {}", i, port);
        }
        let output_name = ports[self.select("> ", 0, ports.len() - 1)?].clone();
        let transport = MidiOutTransport::open(&output_name)?;

        println!("\n{}", "--- Step 3: Set Default MIDI Channel ---".bold());
        let default_channel = (self.select("Default MIDI channel (1-16): ", 1, 16)? - 1) as u8;

        let session = Arc::new(Session::new(MappingSet {
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            output_name,
            default_channel,
            ..MappingSet::default()
        }));
        let ingestion = input::spawn_ingestion(device.id.clone(), session.clone())?;

        stop_on_error(&session, self.add_mappings(&session, &device))?;

        if session.layout().is_empty() {
            session.stop();
            bail!("No controls mapped");
        }

        println!("\n{}", "--- Step 4: Save Configuration ---".bold());
        println!("Configured {} control mapping(s).", session.layout().len());
        let config = session.config();
        stop_on_error(&session, self.save_prompt(&config, None))?;

        Ok(Prepared {
            session,
            ingestion,
            transport,
        })
    }

    fn add_mappings(&mut self, session: &Session, device: &DeviceInfo) -> Result<()> {
        loop {
            println!("\n{}", "--- Add Control Mapping ---".bold());
            println!("Current mappings: {}\n", session.layout().len());

            let prompt = format!(
                "Select control to map (or {} to finish adding): ",
                device.controls.len()
            );
            let Some(index) = self.pick_control(device, &session.config(), &prompt)? else {
                return Ok(());
            };
            self.add_mapping(session, device.controls[index].clone())?;

            if !self.confirm("\nAdd another control?")? {
                return Ok(());
            }
        }
    }

    fn run_loaded(&mut self, set: MappingSet, path: PathBuf) -> Result<Prepared> {
        let device = loop {
            match input::find_device(&set.device_id, input::DEFAULT_SETTLE) {
                Ok(device) => break device,
                Err(DeviceError::NotFound(_)) => {
                    println!("\n{}", "--- Device Not Connected ---".bold().yellow());
                    println!("The configured device was not found:");
                    println!("  {}\n  ({})\n", set.device_name, set.device_id);
                    println!("Please connect the device and try again.\n");
                    println!("[0] Retry\n[1] Exit");
                    if self.select("> ", 0, 1)? == 1 {
                        return Err(Cancelled.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        println!("\nOptions:\n[0] Run with current configuration\n[1] Edit configuration");
        let edit = self.select("> ", 0, 1)? == 1;

        let session = Arc::new(Session::new(set));
        let ingestion = input::spawn_ingestion(device.id.clone(), session.clone())?;

        if edit {
            let modified = stop_on_error(&session, self.edit_configuration(&session, &device))?;

            if session.layout().is_empty() {
                session.stop();
                bail!("No controls mapped");
            }

            if modified {
                let save = stop_on_error(
                    &session,
                    self.confirm("\nConfiguration was modified. Save changes?"),
                )?;
                if save {
                    let config = session.config();
                    stop_on_error(&session, self.save_prompt(&config, Some(&path)))?;
                }
            }
        }

        let output_name = session.config().output_name;
        let transport = stop_on_error(
            &session,
            MidiOutTransport::open(&output_name)
                .with_context(|| format!("Configured MIDI port '{}' not found", output_name)),
        )?;

        Ok(Prepared {
            session,
            ingestion,
            transport,
        })
    }

    /// List the device's controls; `None` when the trailing entry is chosen
    fn pick_control(
        &mut self,
        device: &DeviceInfo,
        config: &MappingSet,
        prompt: &str,
    ) -> Result<Option<usize>> {
        println!("Available Controls:");
        for (i, control) in device.controls.iter().enumerate() {
            let marker = if config.is_mapped(&control.address) {
                " [MAPPED]".dimmed().to_string()
            } else {
                String::new()
            };
            println!("[{:>2}] {}{}", i, control.summary(), marker);
        }
        println!("[{:>2}] Cancel", device.controls.len());

        let choice = self.select(prompt, 0, device.controls.len())?;
        Ok((choice < device.controls.len()).then_some(choice))
    }

    /// List the mappings; `None` when the trailing entry is chosen
    fn pick_mapping(&mut self, config: &MappingSet, prompt: &str) -> Result<Option<usize>> {
        for (i, rule) in config.mappings.iter().enumerate() {
            println!("[{}] {}", i, rule.summary(config.default_channel));
        }
        println!("[{}] Cancel", config.mappings.len());

        let choice = self.select(prompt, 0, config.mappings.len())?;
        Ok((choice < config.mappings.len()).then_some(choice))
    }

    fn add_mapping(&mut self, session: &Session, control: ControlDescriptor) -> Result<()> {
        let mut config = session.config();
        let mut rule = MappingRule::new(control);
        self.configure_rule(&mut rule, config.default_channel)?;

        let wants_calibration = rule.wants_calibration();
        config.mappings.push(rule);
        let index = config.mappings.len() - 1;
        session.replace_mappings(config);

        if wants_calibration {
            self.calibrate(session, index)?;
        }
        Ok(())
    }

    /// Ask for message kind, channel, number and the per-kind values
    fn configure_rule(&mut self, rule: &mut MappingRule, default_channel: u8) -> Result<()> {
        println!("\nConfiguring MIDI for: {}", rule.control.name.bold());

        println!("Select MIDI message type:\n[0] Note On/Off\n[1] CC");
        rule.kind = if self.select("> ", 0, 1)? == 0 {
            MessageKind::NoteToggle
        } else {
            MessageKind::ContinuousController
        };

        println!(
            "Use default channel ({})? [0] Yes  [1] Custom channel",
            default_channel + 1
        );
        rule.channel = if self.select("> ", 0, 1)? == 1 {
            Some((self.select("MIDI channel (1-16): ", 1, 16)? - 1) as u8)
        } else {
            None
        };

        rule.number = self.select("MIDI Note/CC number (0-127): ", 0, 127)? as u8;

        match rule.kind {
            MessageKind::NoteToggle => {
                rule.note_velocity = self.select("Note On velocity (1-127): ", 1, 127)? as u8;
            }
            MessageKind::ContinuousController if rule.control.is_button => {
                rule.cc_on = self.select("CC value when pressed (0-127): ", 0, 127)? as u8;
                rule.cc_off = self.select("CC value when released (0-127): ", 0, 127)? as u8;
            }
            MessageKind::ContinuousController => {
                rule.reverse = self.confirm("Reverse MIDI output?")?;
            }
        }

        debug!("Configured {:?}", rule);
        Ok(())
    }

    fn calibrate(&mut self, session: &Session, index: usize) -> Result<()> {
        let name = session
            .layout()
            .mappings()
            .get(index)
            .map(|rule| rule.control.name.clone())
            .unwrap_or_default();
        println!("\n{}\n", format!("--- Calibrating Axis: {} ---", name).bold());

        let mut observer = ConsoleCalibration::default();
        if let CalibrationOutcome::Calibrated(range) =
            session.begin_calibration(index, &self.calibrator, &mut observer)?
        {
            println!("Calibration complete: {}..{}", range.min, range.max);
            if range.is_degenerate() {
                println!(
                    "{}",
                    "The captured range is empty; this axis stays silent until recalibrated."
                        .yellow()
                );
            }
        }
        self.pause()
    }

    /// Edit loop for a loaded configuration; returns whether anything changed
    fn edit_configuration(&mut self, session: &Session, device: &DeviceInfo) -> Result<bool> {
        let _paused = session.suspend_dispatch();
        let mut modified = false;

        loop {
            let config = session.config();
            println!("\n{}", "--- Edit Configuration ---".bold());
            println!("Device: {}", config.device_name);
            println!("Default MIDI Channel: {}", config.default_channel + 1);
            println!("Current mappings: {}\n", config.mappings.len());
            if !config.mappings.is_empty() {
                println!("Mapped Controls:");
                print_mappings(&config, 1);
                println!();
            }

            println!("Options:");
            println!("[0] Continue with current configuration");
            println!("[1] Add new control mapping");
            if !config.mappings.is_empty() {
                println!("[2] Remove a control mapping");
                println!("[3] Edit a control mapping");
            }
            println!("[4] Change default MIDI channel");
            println!("[5] Save configuration");

            match self.select("> ", 0, 5)? {
                0 => return Ok(modified),
                1 => {
                    if let Some(index) =
                        self.pick_control(device, &config, "Select control to add: ")?
                    {
                        self.add_mapping(session, device.controls[index].clone())?;
                        modified = true;
                    }
                }
                2 if !config.mappings.is_empty() => {
                    if let Some(index) = self.pick_mapping(&config, "Select mapping to remove: ")? {
                        let name = &config.mappings[index].control.name;
                        if self.confirm(&format!("Remove '{}'?", name))? {
                            let mut edited = config.clone();
                            edited.mappings.remove(index);
                            session.replace_mappings(edited);
                            modified = true;
                            println!("Mapping removed.");
                        }
                    }
                }
                3 if !config.mappings.is_empty() => {
                    if let Some(index) = self.pick_mapping(&config, "Select mapping to edit: ")? {
                        modified |= self.edit_mapping(session, index)?;
                    }
                }
                4 => {
                    println!("Current default channel: {}", config.default_channel + 1);
                    let channel = self.select("New default MIDI channel (1-16): ", 1, 16)? - 1;
                    session.set_default_channel(channel as u8);
                    modified = true;
                    println!("Default channel updated to {}", channel + 1);
                }
                5 => {
                    if self.save_prompt(&session.config(), None)? {
                        modified = false;
                    }
                }
                _ => println!("{}", "No mappings yet.".yellow()),
            }
        }
    }

    fn edit_mapping(&mut self, session: &Session, index: usize) -> Result<bool> {
        let layout = session.layout();
        let Some(rule) = layout.mappings().get(index).cloned() else {
            return Ok(false);
        };
        let default_channel = layout.config().default_channel;

        println!("\n{}", format!("--- Edit: {} ---", rule.control.name).bold());
        println!("[0] Cancel");
        println!("[1] MIDI settings (type, channel, note/CC number)");
        let axis_cc = rule.wants_calibration();
        if axis_cc {
            println!("[2] Recalibrate axis");
            println!(
                "[3] Toggle reverse axis (currently: {})",
                if rule.reverse { "Yes" } else { "No" }
            );
        }

        match self.select("> ", 0, if axis_cc { 3 } else { 1 })? {
            1 => {
                let mut edited = rule;
                self.configure_rule(&mut edited, default_channel)?;
                session.update_mapping(index, move |rule| *rule = edited);
                Ok(true)
            }
            2 => {
                self.calibrate(session, index)?;
                Ok(true)
            }
            3 => {
                if let Some(updated) = session.update_mapping(index, |rule| rule.reverse = !rule.reverse) {
                    println!("Reverse axis: {}", if updated.reverse { "Yes" } else { "No" });
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Ask for a filename and save; returns whether a file was written
    fn save_prompt(&mut self, config: &MappingSet, current: Option<&Path>) -> Result<bool> {
        let prompt = match current {
            Some(path) => format!("Filename to save (blank keeps {}): ", path.display()),
            None => "Filename to save (e.g. my_joystick), blank to skip: ".to_string(),
        };

        let name = self.read_line(&prompt)?;
        let path = match (name.is_empty(), current) {
            (false, _) => self.paths.config_file(&name),
            (true, Some(path)) => path.to_path_buf(),
            (true, None) => return Ok(false),
        };

        match self.runtime.block_on(config.save(&path)) {
            Ok(()) => {
                println!("Configuration saved to {}", path.display().to_string().green());
                Ok(true)
            }
            Err(e) => {
                println!("{} {}", "Save failed:".red(), e);
                Ok(false)
            }
        }
    }
}

/// Raise the stop flag when an interactive step fails, ending ingestion
fn stop_on_error<T>(session: &Session, result: Result<T>) -> Result<T> {
    if result.is_err() {
        session.stop();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_range() {
        assert_eq!(parse_selection(" 3 ", 0, 5), Ok(3));
        assert_eq!(parse_selection("0", 0, 0), Ok(0));
        assert_eq!(
            parse_selection("17", 1, 16),
            Err(SelectionError::OutOfRange { min: 1, max: 16 })
        );
    }

    #[test]
    fn test_parse_selection_rejects_non_numbers() {
        assert_eq!(parse_selection("", 0, 5), Err(SelectionError::NotANumber));
        assert_eq!(parse_selection("2x", 0, 5), Err(SelectionError::NotANumber));
        assert_eq!(parse_selection("-1", 0, 5), Err(SelectionError::NotANumber));
    }

    #[test]
    fn test_selection_error_message() {
        let err = SelectionError::OutOfRange { min: 0, max: 127 };
        assert_eq!(
            err.to_string(),
            "Invalid input. Please enter a whole number between 0 and 127."
        );
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(4999)), 5);
        assert_eq!(ceil_secs(Duration::from_secs(2)), 2);
        assert_eq!(ceil_secs(Duration::ZERO), 0);
    }
}
