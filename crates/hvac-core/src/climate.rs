//! Climate domain vocabulary
//!
//! HVAC modes and actions, the `supported_features` bit set, the
//! `climate.set_temperature` payload, and attribute / service names as they
//! appear in entity states and service data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;
use thiserror::Error;

/// The climate domain
pub const DOMAIN: &str = "climate";

/// Default unit reported when the upstream does not name one
pub const DEFAULT_TEMPERATURE_UNIT: &str = "°C";

/// Lower setpoint bound used when the upstream does not report `min_temp`
pub const DEFAULT_MIN_TEMP: f64 = 7.0;

/// Upper setpoint bound used when the upstream does not report `max_temp`
pub const DEFAULT_MAX_TEMP: f64 = 35.0;

/// Climate state attribute names
pub mod attr {
    pub const CURRENT_TEMPERATURE: &str = "current_temperature";
    pub const TEMPERATURE: &str = "temperature";
    pub const TARGET_TEMP_LOW: &str = "target_temp_low";
    pub const TARGET_TEMP_HIGH: &str = "target_temp_high";
    pub const UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
    pub const SUPPORTED_FEATURES: &str = "supported_features";
    pub const HVAC_MODES: &str = "hvac_modes";
    pub const HVAC_MODE: &str = "hvac_mode";
    pub const HVAC_ACTION: &str = "hvac_action";
    /// Non-standard spelling some integrations use instead of `hvac_action`
    pub const ACTION: &str = "action";
    pub const FAN_MODE: &str = "fan_mode";
    pub const FAN_MODES: &str = "fan_modes";
    pub const SWING_MODE: &str = "swing_mode";
    pub const SWING_MODES: &str = "swing_modes";
    pub const PRESET_MODE: &str = "preset_mode";
    pub const PRESET_MODES: &str = "preset_modes";
    pub const MIN_TEMP: &str = "min_temp";
    pub const MAX_TEMP: &str = "max_temp";
    pub const FRIENDLY_NAME: &str = "friendly_name";
    pub const ENTITY_ID: &str = "entity_id";
}

/// Climate service names
pub mod services {
    pub const SET_HVAC_MODE: &str = "set_hvac_mode";
    pub const SET_TEMPERATURE: &str = "set_temperature";
    pub const SET_FAN_MODE: &str = "set_fan_mode";
    pub const SET_SWING_MODE: &str = "set_swing_mode";
    pub const SET_PRESET_MODE: &str = "set_preset_mode";

    pub const ALL: &[&str] = &[
        SET_HVAC_MODE,
        SET_TEMPERATURE,
        SET_FAN_MODE,
        SET_SWING_MODE,
        SET_PRESET_MODE,
    ];
}

/// A string that is not a member of the enumeration it was parsed as
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized {kind} '{value}'")]
pub struct UnrecognizedValue {
    pub kind: &'static str,
    pub value: String,
}

/// HVAC operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    Auto,
    Dry,
    FanOnly,
}

impl HvacMode {
    pub const ALL: [HvacMode; 7] = [
        HvacMode::Off,
        HvacMode::Heat,
        HvacMode::Cool,
        HvacMode::HeatCool,
        HvacMode::Auto,
        HvacMode::Dry,
        HvacMode::FanOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
            HvacMode::HeatCool => "heat_cool",
            HvacMode::Auto => "auto",
            HvacMode::Dry => "dry",
            HvacMode::FanOnly => "fan_only",
        }
    }

    /// Modes that regulate between a low and a high setpoint
    pub fn is_dual_setpoint(&self) -> bool {
        matches!(self, HvacMode::HeatCool | HvacMode::Auto)
    }
}

impl FromStr for HvacMode {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HvacMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnrecognizedValue {
                kind: "hvac_mode",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the HVAC equipment is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacAction {
    Off,
    Preheating,
    Defrosting,
    Heating,
    Cooling,
    Drying,
    Idle,
    Fan,
}

impl HvacAction {
    pub const ALL: [HvacAction; 8] = [
        HvacAction::Off,
        HvacAction::Preheating,
        HvacAction::Defrosting,
        HvacAction::Heating,
        HvacAction::Cooling,
        HvacAction::Drying,
        HvacAction::Idle,
        HvacAction::Fan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HvacAction::Off => "off",
            HvacAction::Preheating => "preheating",
            HvacAction::Defrosting => "defrosting",
            HvacAction::Heating => "heating",
            HvacAction::Cooling => "cooling",
            HvacAction::Drying => "drying",
            HvacAction::Idle => "idle",
            HvacAction::Fan => "fan",
        }
    }
}

impl FromStr for HvacAction {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HvacAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnrecognizedValue {
                kind: "hvac_action",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for HvacAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `supported_features` bit set of a climate entity
///
/// Unknown bits are carried through untouched so a proxy never strips a
/// capability it does not understand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClimateEntityFeature(u32);

impl ClimateEntityFeature {
    pub const TARGET_TEMPERATURE: Self = Self(1);
    pub const TARGET_TEMPERATURE_RANGE: Self = Self(2);
    pub const TARGET_HUMIDITY: Self = Self(4);
    pub const FAN_MODE: Self = Self(8);
    pub const PRESET_MODE: Self = Self(16);
    pub const SWING_MODE: Self = Self(32);
    pub const TURN_OFF: Self = Self(128);
    pub const TURN_ON: Self = Self(256);
    pub const SWING_HORIZONTAL_MODE: Self = Self(512);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for ClimateEntityFeature {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClimateEntityFeature {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ClimateEntityFeature {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Service data of `climate.set_temperature`, minus the entity target
///
/// The same shape is used for what a caller asks a proxy for and for the
/// command vector the proxy sends upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_temp_low: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_temp_high: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hvac_mode: Option<HvacMode>,
}

impl TemperatureRequest {
    pub fn single(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
            ..Self::default()
        }
    }

    pub fn range(low: f64, high: f64) -> Self {
        Self {
            target_temp_low: Some(low),
            target_temp_high: Some(high),
            ..Self::default()
        }
    }

    pub fn with_hvac_mode(mut self, mode: HvacMode) -> Self {
        self.hvac_mode = Some(mode);
        self
    }

    /// Whether either side of a range is given
    pub fn has_range(&self) -> bool {
        self.target_temp_low.is_some() || self.target_temp_high.is_some()
    }
}
