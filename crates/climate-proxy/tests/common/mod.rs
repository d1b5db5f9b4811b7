//! Shared fixtures for proxy integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hvac_core::climate::attr;
use hvac_core::events::StateChangedData;
use hvac_core::{Context, EntityId, HvacMode, State, TemperatureRequest};
use hvac_hub::{ClimateEntity, Hub, RenderedState, ServiceError, TypedEventReceiver};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An upstream thermostat that applies what it is told and records it
pub struct MockThermostat {
    entity_id: EntityId,
    mode: Mutex<HvacMode>,
    attributes: Mutex<HashMap<String, Value>>,
    pub temperature_requests: Mutex<Vec<TemperatureRequest>>,
    pub fail_commands: Mutex<bool>,
}

impl MockThermostat {
    /// A range-capable heat pump in heat_cool at 18-22
    pub fn heat_pump() -> Arc<Self> {
        Self::new(
            "climate.heat_pump",
            HvacMode::HeatCool,
            json!({
                "current_temperature": 20.0,
                "target_temp_low": 18.0,
                "target_temp_high": 22.0,
                "supported_features": 1 | 2 | 8,
                "hvac_modes": ["off", "heat", "cool", "heat_cool"],
                "fan_mode": "auto",
                "fan_modes": ["auto", "quiet"],
                "hvac_action": "idle",
            }),
        )
    }

    pub fn new(entity_id: &str, mode: HvacMode, attributes: Value) -> Arc<Self> {
        Arc::new(Self {
            entity_id: entity_id.parse().unwrap(),
            mode: Mutex::new(mode),
            attributes: Mutex::new(serde_json::from_value(attributes).unwrap()),
            temperature_requests: Mutex::new(Vec::new()),
            fail_commands: Mutex::new(false),
        })
    }

    pub fn set_attribute(&self, key: &str, value: Value) {
        self.attributes.lock().unwrap().insert(key.to_string(), value);
    }

    fn check(&self) -> Result<(), ServiceError> {
        if *self.fail_commands.lock().unwrap() {
            return Err(ServiceError::CallFailed("device offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClimateEntity for MockThermostat {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn render(&self) -> RenderedState {
        RenderedState {
            state: self.mode.lock().unwrap().to_string(),
            attributes: self.attributes.lock().unwrap().clone(),
        }
    }

    fn render_after_command(&self) -> bool {
        true
    }

    async fn set_hvac_mode(&self, mode: HvacMode, _context: &Context) -> Result<(), ServiceError> {
        self.check()?;
        *self.mode.lock().unwrap() = mode;
        Ok(())
    }

    async fn set_temperature(
        &self,
        request: TemperatureRequest,
        _context: &Context,
    ) -> Result<(), ServiceError> {
        self.check()?;
        let mut attributes = self.attributes.lock().unwrap();
        if let Some(t) = request.temperature {
            attributes.insert(attr::TEMPERATURE.to_string(), json!(t));
        }
        if let Some(low) = request.target_temp_low {
            attributes.insert(attr::TARGET_TEMP_LOW.to_string(), json!(low));
        }
        if let Some(high) = request.target_temp_high {
            attributes.insert(attr::TARGET_TEMP_HIGH.to_string(), json!(high));
        }
        drop(attributes);
        if let Some(mode) = request.hvac_mode {
            *self.mode.lock().unwrap() = mode;
        }
        self.temperature_requests.lock().unwrap().push(request);
        Ok(())
    }

    async fn set_fan_mode(&self, fan_mode: String, _context: &Context) -> Result<(), ServiceError> {
        self.check()?;
        self.set_attribute(attr::FAN_MODE, json!(fan_mode));
        Ok(())
    }

    async fn set_swing_mode(
        &self,
        swing_mode: String,
        _context: &Context,
    ) -> Result<(), ServiceError> {
        self.check()?;
        self.set_attribute(attr::SWING_MODE, json!(swing_mode));
        Ok(())
    }

    async fn set_preset_mode(
        &self,
        preset_mode: String,
        _context: &Context,
    ) -> Result<(), ServiceError> {
        self.check()?;
        self.set_attribute(attr::PRESET_MODE, json!(preset_mode));
        Ok(())
    }
}

/// Receives state changes of one entity
pub struct StateWatcher {
    entity_id: EntityId,
    rx: TypedEventReceiver<StateChangedData>,
}

impl StateWatcher {
    pub fn new(hub: &Hub, entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.parse().unwrap(),
            rx: hub.bus.subscribe_typed(),
        }
    }

    /// Next change of the watched entity; `None` on timeout
    pub async fn next(&mut self) -> Option<Option<State>> {
        let wait = async {
            loop {
                let event = self.rx.recv().await.ok()?;
                if event.data.entity_id == self.entity_id {
                    return Some(event.data.new_state);
                }
            }
        };
        tokio::time::timeout(Duration::from_millis(500), wait)
            .await
            .ok()
            .flatten()
    }

    /// Assert that the watched entity does not change for a short while
    pub async fn assert_quiet(&mut self) {
        let wait = async {
            loop {
                if let Ok(event) = self.rx.recv().await {
                    if event.data.entity_id == self.entity_id {
                        return event.data.new_state;
                    }
                }
            }
        };
        if let Ok(state) = tokio::time::timeout(Duration::from_millis(100), wait).await {
            panic!("unexpected change of {}: {:?}", self.entity_id, state);
        }
    }
}
