//! Device model and its read-only projection.
//!
//! # Invariants
//! - `device_name` is globally unique across all families.
//! - `created_by` and `created_time` are set once at creation.

use crate::model::family::FamilyId;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum device name length in characters.
pub const DEVICE_NAME_MAX_CHARS: usize = 64;

static DEVICE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _.:-]*$").expect("valid device name regex")
});

/// Power state of a controllable device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    #[default]
    Off,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }

    /// Parses `on|off` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

/// Persisted household device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_name: String,
    /// `None` models a device whose owning family reference is unresolved.
    pub family_id: Option<FamilyId>,
    /// Email of the creating principal.
    pub created_by: String,
    pub created_time: DateTime<Utc>,
    pub warranty_expiration: Option<NaiveDate>,
    pub power_state: PowerState,
}

impl Device {
    /// Builds a new device from a validated descriptor.
    pub fn from_descriptor(
        descriptor: &DeviceDescriptor,
        family_id: FamilyId,
        created_by: impl Into<String>,
        created_time: DateTime<Utc>,
    ) -> Self {
        Self {
            device_name: descriptor.device_name.trim().to_string(),
            family_id: Some(family_id),
            created_by: created_by.into(),
            created_time,
            warranty_expiration: descriptor.warranty_expiration,
            power_state: descriptor.initial_power_state,
        }
    }

    pub fn view(&self) -> DeviceView {
        DeviceView::from(self)
    }
}

/// Read-only projection handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceView {
    pub device_name: String,
    pub created_by: String,
    pub created_time: DateTime<Utc>,
    pub warranty_expiration: Option<NaiveDate>,
    pub power_state: PowerState,
}

impl From<&Device> for DeviceView {
    fn from(device: &Device) -> Self {
        Self {
            device_name: device.device_name.clone(),
            created_by: device.created_by.clone(),
            created_time: device.created_time,
            warranty_expiration: device.warranty_expiration,
            power_state: device.power_state,
        }
    }
}

/// Caller-supplied payload for device creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub device_name: String,
    #[serde(default)]
    pub warranty_expiration: Option<NaiveDate>,
    #[serde(default)]
    pub initial_power_state: PowerState,
}

impl DeviceDescriptor {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            warranty_expiration: None,
            initial_power_state: PowerState::Off,
        }
    }

    pub fn with_warranty(mut self, warranty_expiration: NaiveDate) -> Self {
        self.warranty_expiration = Some(warranty_expiration);
        self
    }

    /// Validates the descriptor before any write happens.
    pub fn validate(&self) -> Result<(), DeviceValidationError> {
        validate_device_name(&self.device_name)
    }
}

/// Caller-supplied detail changes for an existing device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDetailsUpdate {
    /// Replaces the stored warranty date; `None` clears it.
    pub warranty_expiration: Option<NaiveDate>,
}

/// Device payload validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceValidationError {
    BlankName,
    NameTooLong(usize),
    InvalidNameCharacters(String),
}

impl Display for DeviceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "device name must not be blank"),
            Self::NameTooLong(len) => write!(
                f,
                "device name is {len} characters; maximum is {DEVICE_NAME_MAX_CHARS}"
            ),
            Self::InvalidNameCharacters(name) => {
                write!(f, "device name contains unsupported characters: `{name}`")
            }
        }
    }
}

impl Error for DeviceValidationError {}

/// Checks a device name after trimming.
pub fn validate_device_name(value: &str) -> Result<(), DeviceValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DeviceValidationError::BlankName);
    }
    let len = trimmed.chars().count();
    if len > DEVICE_NAME_MAX_CHARS {
        return Err(DeviceValidationError::NameTooLong(len));
    }
    if !DEVICE_NAME_RE.is_match(trimmed) {
        return Err(DeviceValidationError::InvalidNameCharacters(
            trimmed.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_device_name, DeviceDescriptor, DeviceValidationError, PowerState};

    #[test]
    fn power_state_parses_case_insensitively() {
        assert_eq!(PowerState::parse(" ON "), Some(PowerState::On));
        assert_eq!(PowerState::parse("off"), Some(PowerState::Off));
        assert_eq!(PowerState::parse("dim"), None);
    }

    #[test]
    fn descriptor_defaults_to_powered_off() {
        let descriptor: DeviceDescriptor =
            serde_json::from_str(r#"{"device_name":"lamp-1"}"#).expect("descriptor json");
        assert_eq!(descriptor.initial_power_state, PowerState::Off);
        assert_eq!(descriptor.warranty_expiration, None);
    }

    #[test]
    fn device_name_validation_rejects_blank_long_and_odd_names() {
        assert_eq!(
            validate_device_name("   "),
            Err(DeviceValidationError::BlankName)
        );
        assert_eq!(
            validate_device_name(&"x".repeat(65)),
            Err(DeviceValidationError::NameTooLong(65))
        );
        assert!(matches!(
            validate_device_name("lamp/1"),
            Err(DeviceValidationError::InvalidNameCharacters(_))
        ));
        validate_device_name(" thermostat-1 ").expect("trimmed name is valid");
    }
}
