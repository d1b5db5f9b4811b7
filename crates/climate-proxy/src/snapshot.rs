//! Typed copy of an upstream climate state

use hvac_core::climate::{attr, DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP};
use hvac_core::{ClimateEntityFeature, EntityId, HvacAction, HvacMode, State};
use tracing::{debug, trace};

/// The last upstream state a proxy received, decoded once
///
/// Built wholesale from a [`State`] and never modified afterwards. Every
/// attribute is optional; an attribute carrying the wrong JSON type reads as
/// absent rather than failing the whole snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot {
    pub entity_id: EntityId,
    /// The upstream state value: an HVAC mode, or "unavailable" / "unknown"
    pub state_code: String,
    pub current_temperature: Option<f64>,
    pub temperature: Option<f64>,
    pub target_temp_low: Option<f64>,
    pub target_temp_high: Option<f64>,
    pub unit_of_measurement: Option<String>,
    pub supported_features: ClimateEntityFeature,
    /// Mode names exactly as reported, including ones this crate cannot parse
    pub hvac_modes: Vec<String>,
    pub hvac_action: Option<String>,
    pub fan_mode: Option<String>,
    pub fan_modes: Option<Vec<String>>,
    pub swing_mode: Option<String>,
    pub swing_modes: Option<Vec<String>>,
    pub preset_mode: Option<String>,
    pub preset_modes: Option<Vec<String>>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
}

impl SourceSnapshot {
    pub fn from_state(state: &State) -> Self {
        let hvac_modes = state
            .attribute::<Vec<serde_json::Value>>(attr::HVAC_MODES)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        Self {
            entity_id: state.entity_id.clone(),
            state_code: state.state.clone(),
            current_temperature: state.attribute(attr::CURRENT_TEMPERATURE),
            temperature: state.attribute(attr::TEMPERATURE),
            target_temp_low: state.attribute(attr::TARGET_TEMP_LOW),
            target_temp_high: state.attribute(attr::TARGET_TEMP_HIGH),
            unit_of_measurement: state.attribute(attr::UNIT_OF_MEASUREMENT),
            supported_features: state
                .attribute::<u32>(attr::SUPPORTED_FEATURES)
                .map(ClimateEntityFeature::from_bits)
                .unwrap_or_default(),
            hvac_modes,
            hvac_action: state
                .attribute(attr::HVAC_ACTION)
                .or_else(|| state.attribute(attr::ACTION)),
            fan_mode: state.attribute(attr::FAN_MODE),
            fan_modes: state.attribute(attr::FAN_MODES),
            swing_mode: state.attribute(attr::SWING_MODE),
            swing_modes: state.attribute(attr::SWING_MODES),
            preset_mode: state.attribute(attr::PRESET_MODE),
            preset_modes: state.attribute(attr::PRESET_MODES),
            min_temp: state.attribute(attr::MIN_TEMP),
            max_temp: state.attribute(attr::MAX_TEMP),
        }
    }

    /// Current HVAC mode; anything unparsable (including the unavailable
    /// and unknown sentinels) resolves to off
    pub fn hvac_mode(&self) -> HvacMode {
        self.state_code.parse().unwrap_or_else(|_| {
            trace!(source = %self.entity_id, state = %self.state_code, "State is not an HVAC mode");
            HvacMode::Off
        })
    }

    /// The upstream mode list with unparsable entries dropped
    pub fn supported_hvac_modes(&self) -> Vec<HvacMode> {
        self.hvac_modes
            .iter()
            .filter_map(|raw| match raw.parse::<HvacMode>() {
                Ok(mode) => Some(mode),
                Err(_) => {
                    debug!(source = %self.entity_id, mode = %raw, "Unsupported hvac_mode from source");
                    None
                }
            })
            .collect()
    }

    pub fn parsed_hvac_action(&self) -> Option<HvacAction> {
        let raw = self.hvac_action.as_deref()?;
        match raw.parse::<HvacAction>() {
            Ok(action) => Some(action),
            Err(_) => {
                debug!(source = %self.entity_id, action = %raw, "Unsupported hvac_action from source");
                None
            }
        }
    }

    /// Whether the upstream itself accepts a low/high range
    pub fn supports_range(&self) -> bool {
        self.supported_features
            .contains(ClimateEntityFeature::TARGET_TEMPERATURE_RANGE)
    }

    pub fn min_temp_or_default(&self) -> f64 {
        self.min_temp.unwrap_or(DEFAULT_MIN_TEMP)
    }

    pub fn max_temp_or_default(&self) -> f64 {
        self.max_temp.unwrap_or(DEFAULT_MAX_TEMP)
    }
}

impl From<&State> for SourceSnapshot {
    fn from(state: &State) -> Self {
        Self::from_state(state)
    }
}
