//! Simulated upstream thermostats
//!
//! A dual-setpoint thermostat keeps a low/high pair and advertises range
//! support; a single-setpoint one keeps one target temperature. Both apply
//! commands instantly and ask the platform to re-render them afterwards.

use async_trait::async_trait;
use hvac_core::climate::{attr, DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP, DEFAULT_TEMPERATURE_UNIT};
use hvac_core::{ClimateEntityFeature, Context, EntityId, HvacAction, HvacMode, TemperatureRequest};
use hvac_hub::{ClimateEntity, RenderedState, ServiceError};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::config::DemoThermostatConfig;

#[derive(Debug, Clone)]
struct Setpoints {
    hvac_mode: HvacMode,
    temperature: Option<f64>,
    target_temp_low: Option<f64>,
    target_temp_high: Option<f64>,
    current_temperature: Option<f64>,
    fan_mode: Option<String>,
}

pub struct DemoThermostat {
    entity_id: EntityId,
    name: String,
    hvac_modes: Vec<HvacMode>,
    dual_setpoint: bool,
    min_temp: f64,
    max_temp: f64,
    fan_modes: Vec<String>,
    setpoints: Mutex<Setpoints>,
}

impl DemoThermostat {
    pub fn new(config: &DemoThermostatConfig) -> Self {
        let hvac_mode = config
            .hvac_mode
            .or_else(|| config.hvac_modes.first().copied())
            .unwrap_or(HvacMode::Off);

        Self {
            entity_id: config.entity_id.clone(),
            name: config
                .name
                .clone()
                .unwrap_or_else(|| config.entity_id.object_id().replace('_', " ")),
            hvac_modes: config.hvac_modes.clone(),
            dual_setpoint: config.dual_setpoint,
            min_temp: config.min_temp.unwrap_or(DEFAULT_MIN_TEMP),
            max_temp: config.max_temp.unwrap_or(DEFAULT_MAX_TEMP),
            fan_modes: config.fan_modes.clone(),
            setpoints: Mutex::new(Setpoints {
                hvac_mode,
                temperature: config.temperature,
                target_temp_low: config.target_temp_low,
                target_temp_high: config.target_temp_high,
                current_temperature: config.current_temperature,
                fan_mode: config.fan_modes.first().cloned(),
            }),
        }
    }

    fn supported_features(&self) -> ClimateEntityFeature {
        let mut features = ClimateEntityFeature::TARGET_TEMPERATURE;
        if self.dual_setpoint {
            features.insert(ClimateEntityFeature::TARGET_TEMPERATURE_RANGE);
        }
        if !self.fan_modes.is_empty() {
            features.insert(ClimateEntityFeature::FAN_MODE);
        }
        features
    }

    fn check_mode(&self, mode: HvacMode) -> Result<(), ServiceError> {
        if self.hvac_modes.contains(&mode) {
            Ok(())
        } else {
            Err(ServiceError::InvalidData(format!(
                "{} does not support hvac mode {}",
                self.entity_id, mode
            )))
        }
    }

    fn check_range(&self, value: f64) -> Result<f64, ServiceError> {
        if (self.min_temp..=self.max_temp).contains(&value) {
            Ok(value)
        } else {
            Err(ServiceError::InvalidData(format!(
                "{} is outside {}..={}",
                value, self.min_temp, self.max_temp
            )))
        }
    }

    /// What the thermostat would be doing right now
    fn hvac_action(setpoints: &Setpoints) -> HvacAction {
        let current = setpoints.current_temperature;
        let below = |target: Option<f64>| matches!((current, target), (Some(c), Some(t)) if c < t);
        let above = |target: Option<f64>| matches!((current, target), (Some(c), Some(t)) if c > t);
        let low = setpoints.target_temp_low.or(setpoints.temperature);
        let high = setpoints.target_temp_high.or(setpoints.temperature);

        match setpoints.hvac_mode {
            HvacMode::Off => HvacAction::Off,
            HvacMode::FanOnly => HvacAction::Fan,
            HvacMode::Dry => HvacAction::Drying,
            HvacMode::Heat if below(low) => HvacAction::Heating,
            HvacMode::Cool if above(high) => HvacAction::Cooling,
            HvacMode::HeatCool | HvacMode::Auto if below(low) => HvacAction::Heating,
            HvacMode::HeatCool | HvacMode::Auto if above(high) => HvacAction::Cooling,
            _ => HvacAction::Idle,
        }
    }
}

#[async_trait]
impl ClimateEntity for DemoThermostat {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn render(&self) -> RenderedState {
        let setpoints = self.setpoints.lock().clone();
        let mut attributes = HashMap::from([
            (attr::FRIENDLY_NAME.to_string(), json!(self.name)),
            (attr::SUPPORTED_FEATURES.to_string(), json!(self.supported_features().bits())),
            (attr::HVAC_MODES.to_string(), json!(self.hvac_modes)),
            (attr::MIN_TEMP.to_string(), json!(self.min_temp)),
            (attr::MAX_TEMP.to_string(), json!(self.max_temp)),
            (attr::CURRENT_TEMPERATURE.to_string(), json!(setpoints.current_temperature)),
            (attr::TEMPERATURE.to_string(), json!(setpoints.temperature)),
            (attr::HVAC_ACTION.to_string(), json!(Self::hvac_action(&setpoints))),
            (attr::UNIT_OF_MEASUREMENT.to_string(), json!(DEFAULT_TEMPERATURE_UNIT)),
        ]);
        if self.dual_setpoint {
            attributes.insert(attr::TARGET_TEMP_LOW.to_string(), json!(setpoints.target_temp_low));
            attributes.insert(attr::TARGET_TEMP_HIGH.to_string(), json!(setpoints.target_temp_high));
        }
        if !self.fan_modes.is_empty() {
            attributes.insert(attr::FAN_MODES.to_string(), json!(self.fan_modes));
            attributes.insert(attr::FAN_MODE.to_string(), json!(setpoints.fan_mode));
        }

        RenderedState {
            state: setpoints.hvac_mode.to_string(),
            attributes,
        }
    }

    fn render_after_command(&self) -> bool {
        true
    }

    async fn set_hvac_mode(&self, mode: HvacMode, _context: &Context) -> Result<(), ServiceError> {
        self.check_mode(mode)?;
        self.setpoints.lock().hvac_mode = mode;
        debug!(entity_id = %self.entity_id, %mode, "Demo thermostat mode set");
        Ok(())
    }

    #[instrument(skip(self, _context), fields(entity_id = %self.entity_id))]
    async fn set_temperature(
        &self,
        request: TemperatureRequest,
        _context: &Context,
    ) -> Result<(), ServiceError> {
        if let Some(mode) = request.hvac_mode {
            self.check_mode(mode)?;
        }
        if request.has_range() && !self.dual_setpoint {
            return Err(ServiceError::InvalidData(format!(
                "{} has a single setpoint",
                self.entity_id
            )));
        }
        let temperature = request.temperature.map(|t| self.check_range(t)).transpose()?;
        let low = request.target_temp_low.map(|t| self.check_range(t)).transpose()?;
        let high = request.target_temp_high.map(|t| self.check_range(t)).transpose()?;

        let mut setpoints = self.setpoints.lock();
        if let Some(mode) = request.hvac_mode {
            setpoints.hvac_mode = mode;
        }
        if temperature.is_some() {
            setpoints.temperature = temperature;
        }
        if low.is_some() {
            setpoints.target_temp_low = low;
        }
        if high.is_some() {
            setpoints.target_temp_high = high;
        }
        debug!(setpoints = ?*setpoints, "Demo thermostat setpoints set");
        Ok(())
    }

    async fn set_fan_mode(&self, fan_mode: String, _context: &Context) -> Result<(), ServiceError> {
        if !self.fan_modes.contains(&fan_mode) {
            return Err(ServiceError::InvalidData(format!(
                "{} does not support fan mode {}",
                self.entity_id, fan_mode
            )));
        }
        self.setpoints.lock().fan_mode = Some(fan_mode);
        Ok(())
    }

    async fn set_swing_mode(&self, _swing_mode: String, _context: &Context) -> Result<(), ServiceError> {
        Err(ServiceError::InvalidData(format!(
            "{} does not support swing modes",
            self.entity_id
        )))
    }

    async fn set_preset_mode(
        &self,
        _preset_mode: String,
        _context: &Context,
    ) -> Result<(), ServiceError> {
        Err(ServiceError::InvalidData(format!(
            "{} does not support presets",
            self.entity_id
        )))
    }
}
