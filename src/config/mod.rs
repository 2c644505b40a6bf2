//! Mapping set configuration
//!
//! Handles loading, validating and saving `*.hidmidi.json` mapping files.
//! A file is either applied completely or rejected; a corrupt mapping is
//! never partially applied.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::control::{ControlAddress, ControlDescriptor};
use crate::midi::{CHANNEL_COUNT, DATA_MAX};

/// Suffix shared by every mapping file
pub const CONFIG_EXTENSION: &str = ".hidmidi.json";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize mapping set: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid field `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

/// Kind of MIDI message a mapping produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// Note On while pressed, Note Off on release
    NoteToggle,
    /// Control Change
    ContinuousController,
}

impl MessageKind {
    pub fn short_name(&self) -> &'static str {
        match self {
            MessageKind::NoteToggle => "Note",
            MessageKind::ContinuousController => "CC",
        }
    }
}

/// Binding of one physical control to a MIDI target
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub control: ControlDescriptor,
    pub kind: MessageKind,
    /// Explicit channel (0-15); `None` inherits the set's default channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    /// Note or CC number
    pub number: u8,
    #[serde(default = "default_note_velocity")]
    pub note_velocity: u8,
    #[serde(default = "default_cc_on")]
    pub cc_on: u8,
    #[serde(default)]
    pub cc_off: u8,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub cal_min: i32,
    #[serde(default)]
    pub cal_max: i32,
    #[serde(default)]
    pub calibrated: bool,
}

impl MappingRule {
    /// New uncalibrated mapping with the usual defaults for the control type
    pub fn new(control: ControlDescriptor) -> Self {
        let kind = if control.is_button {
            MessageKind::NoteToggle
        } else {
            MessageKind::ContinuousController
        };

        Self {
            control,
            kind,
            channel: None,
            number: 0,
            note_velocity: default_note_velocity(),
            cc_on: default_cc_on(),
            cc_off: 0,
            reverse: false,
            cal_min: 0,
            cal_max: 0,
            calibrated: false,
        }
    }

    /// Resolve the channel this mapping sends on.
    ///
    /// Resolved per message, so changing the default channel affects every
    /// mapping without an explicit channel.
    pub fn effective_channel(&self, default_channel: u8) -> u8 {
        self.channel.unwrap_or(default_channel)
    }

    /// Whether this mapping goes through calibration (axis bound to CC)
    pub fn wants_calibration(&self) -> bool {
        !self.control.is_button && self.kind == MessageKind::ContinuousController
    }

    /// `Throttle -> Ch1 CC 7`
    pub fn summary(&self, default_channel: u8) -> String {
        format!(
            "{} -> Ch{} {} {}",
            self.control.name,
            self.effective_channel(default_channel) + 1,
            self.kind.short_name(),
            self.number
        )
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let field = |name: &str| format!("mappings[{}].{}", index, name);

        if let Some(channel) = self.channel {
            check_channel(&field("channel"), channel)?;
        }
        check_data(&field("number"), self.number)?;
        check_data(&field("noteVelocity"), self.note_velocity)?;
        check_data(&field("ccOn"), self.cc_on)?;
        check_data(&field("ccOff"), self.cc_off)?;

        if self.calibrated && self.cal_min > self.cal_max {
            return Err(ConfigError::Invalid {
                field: field("calMin"),
                reason: format!(
                    "calibrated range is inverted ({} > {})",
                    self.cal_min, self.cal_max
                ),
            });
        }

        Ok(())
    }
}

/// A complete device-to-MIDI configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSet {
    pub device_id: String,
    pub device_name: String,
    pub output_name: String,
    #[serde(default)]
    pub default_channel: u8,
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    pub mappings: Vec<MappingRule>,
}

impl Default for MappingSet {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            device_name: String::new(),
            output_name: String::new(),
            default_channel: 0,
            send_interval_ms: default_send_interval_ms(),
            mappings: Vec::new(),
        }
    }
}

impl MappingSet {
    /// Check every field; the first violation rejects the whole set
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_channel("defaultChannel", self.default_channel)?;

        if self.send_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "sendIntervalMs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        for (index, rule) in self.mappings.iter().enumerate() {
            rule.validate(index)?;
        }

        Ok(())
    }

    /// Whether some mapping already binds this control
    pub fn is_mapped(&self, address: &ControlAddress) -> bool {
        self.mappings.iter().any(|m| &m.control.address == address)
    }

    /// Parse and validate a mapping set from JSON text
    pub fn from_json(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let set: MappingSet =
            serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        set.validate()?;
        Ok(set)
    }

    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let set = Self::from_json(path, &contents)?;
        debug!(
            "Loaded {} mapping(s) from {}",
            set.mappings.len(),
            path.display()
        );
        Ok(set)
    }

    /// Save configuration to file (pretty-printed JSON)
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let mut json = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        json.push('\n');

        fs::write(path, json)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Saved {} mapping(s) to {}", self.mappings.len(), path.display());
        Ok(())
    }
}

/// List mapping files in `dir`, sorted by path
pub async fn list_configurations(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ConfigError> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir).await.map_err(|source| ConfigError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|source| ConfigError::Read {
        path: dir.to_path_buf(),
        source,
    })? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(CONFIG_EXTENSION));
        if is_file && matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Append the mapping file suffix unless the name already carries it
pub fn with_config_extension(name: &str) -> String {
    if name.ends_with(CONFIG_EXTENSION) {
        name.to_string()
    } else {
        format!("{}{}", name, CONFIG_EXTENSION)
    }
}

fn check_channel(field: &str, channel: u8) -> Result<(), ConfigError> {
    if channel >= CHANNEL_COUNT {
        return Err(ConfigError::Invalid {
            field: field.to_string(),
            reason: format!("channel {} out of range 0-15", channel),
        });
    }
    Ok(())
}

fn check_data(field: &str, value: u8) -> Result<(), ConfigError> {
    if value > DATA_MAX {
        return Err(ConfigError::Invalid {
            field: field.to_string(),
            reason: format!("value {} out of range 0-127", value),
        });
    }
    Ok(())
}

// Default value functions
fn default_note_velocity() -> u8 { 64 }
fn default_cc_on() -> u8 { 127 }
fn default_send_interval_ms() -> u64 { 1 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn axis_rule() -> MappingRule {
        let control = ControlDescriptor::axis(
            ControlAddress::Evdev { event_type: 3, event_code: 0 },
            "X Axis",
        );
        let mut rule = MappingRule::new(control);
        rule.number = 7;
        rule
    }

    fn sample_set() -> MappingSet {
        MappingSet {
            device_id: "030000005e0400008e02000010010000".to_string(),
            device_name: "Test Stick".to_string(),
            output_name: "Loopback".to_string(),
            default_channel: 3,
            send_interval_ms: 1,
            mappings: vec![axis_rule()],
        }
    }

    #[test]
    fn test_effective_channel_inherits_default() {
        let mut rule = axis_rule();
        assert_eq!(rule.effective_channel(3), 3);
        assert_eq!(rule.effective_channel(9), 9);

        rule.channel = Some(1);
        assert_eq!(rule.effective_channel(9), 1);
    }

    #[test]
    fn test_missing_optional_fields_take_defaults() {
        let json = r#"{
            "deviceId": "abc",
            "deviceName": "Stick",
            "outputName": "Out",
            "mappings": [{
                "control": {
                    "address": { "kind": "native", "code": 5 },
                    "name": "Trigger",
                    "isButton": true,
                    "logicalMin": 0,
                    "logicalMax": 1
                },
                "kind": "noteToggle",
                "number": 60
            }]
        }"#;

        let set = MappingSet::from_json(Path::new("inline"), json).unwrap();
        assert_eq!(set.default_channel, 0);
        assert_eq!(set.send_interval_ms, 1);

        let rule = &set.mappings[0];
        assert_eq!(rule.channel, None);
        assert_eq!(rule.note_velocity, 64);
        assert_eq!(rule.cc_on, 127);
        assert_eq!(rule.cc_off, 0);
        assert!(!rule.calibrated);
        assert!(!rule.reverse);
    }

    #[test]
    fn test_missing_required_field_is_parse_error() {
        let json = r#"{ "deviceId": "abc", "deviceName": "Stick", "outputName": "Out" }"#;
        let err = MappingSet::from_json(Path::new("inline"), json).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_out_of_range_values_reject_whole_set() {
        let mut set = sample_set();
        set.mappings.push(axis_rule());
        set.mappings[1].number = 200;

        let err = set.validate().unwrap_err();
        match err {
            ConfigError::Invalid { field, .. } => assert_eq!(field, "mappings[1].number"),
            other => panic!("unexpected error: {other}"),
        }

        let mut set = sample_set();
        set.default_channel = 16;
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_inverted_calibration_rejected() {
        let mut set = sample_set();
        set.mappings[0].calibrated = true;
        set.mappings[0].cal_min = 80;
        set.mappings[0].cal_max = 20;
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_summary_uses_one_based_channel() {
        let rule = axis_rule();
        assert_eq!(rule.summary(0), "X Axis -> Ch1 CC 7");
    }

    #[test]
    fn test_with_config_extension() {
        assert_eq!(with_config_extension("stick"), "stick.hidmidi.json");
        assert_eq!(with_config_extension("stick.hidmidi.json"), "stick.hidmidi.json");
    }

    #[tokio::test]
    async fn test_save_then_list_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(with_config_extension("stick"));
        tokio::fs::write(dir.path().join("notes.txt"), "ignored").await.unwrap();

        let set = sample_set();
        set.save(&path).await.unwrap();

        let found = list_configurations(dir.path()).await.unwrap();
        assert_eq!(found, vec![path.clone()]);

        let loaded = MappingSet::load(&path).await.unwrap();
        assert_eq!(loaded, set);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.hidmidi.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = MappingSet::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
