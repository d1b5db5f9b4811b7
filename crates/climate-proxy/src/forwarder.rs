//! Forwarding commands to the upstream entity

use async_trait::async_trait;
use hvac_core::climate::{attr, services};
use hvac_core::{Context, EntityId, HvacMode, State, TemperatureRequest};
use hvac_hub::ServiceError;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{ProxyError, ProxyResult};

/// What a proxy needs from whoever hosts the upstream entity
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Current state of an entity, if it exists
    fn get_state(&self, entity_id: &EntityId) -> Option<State>;

    /// Call a `climate.*` service and wait for it to finish
    async fn call_climate_service(
        &self,
        service: &'static str,
        data: Value,
        context: Context,
    ) -> Result<(), ServiceError>;
}

/// Sends commands to one upstream entity
///
/// Every call is awaited; nothing is validated or retried here.
#[derive(Clone)]
pub struct CommandForwarder {
    source: EntityId,
    provider: Arc<dyn SourceProvider>,
}

impl CommandForwarder {
    pub fn new(source: EntityId, provider: Arc<dyn SourceProvider>) -> Self {
        Self { source, provider }
    }

    pub fn source(&self) -> &EntityId {
        &self.source
    }

    /// Current upstream state, read through the provider
    pub fn source_state(&self) -> Option<State> {
        self.provider.get_state(&self.source)
    }

    pub async fn set_hvac_mode(&self, mode: HvacMode, context: Context) -> ProxyResult<()> {
        self.forward(services::SET_HVAC_MODE, attr::HVAC_MODE, mode.as_str().into(), context)
            .await
    }

    pub async fn set_fan_mode(&self, fan_mode: &str, context: Context) -> ProxyResult<()> {
        self.forward(services::SET_FAN_MODE, attr::FAN_MODE, fan_mode.into(), context)
            .await
    }

    pub async fn set_swing_mode(&self, swing_mode: &str, context: Context) -> ProxyResult<()> {
        self.forward(services::SET_SWING_MODE, attr::SWING_MODE, swing_mode.into(), context)
            .await
    }

    pub async fn set_preset_mode(&self, preset_mode: &str, context: Context) -> ProxyResult<()> {
        self.forward(services::SET_PRESET_MODE, attr::PRESET_MODE, preset_mode.into(), context)
            .await
    }

    /// Send an already translated `set_temperature` command
    pub async fn set_temperature(
        &self,
        command: &TemperatureRequest,
        context: Context,
    ) -> ProxyResult<()> {
        let mut data = self.target();
        let setpoints = [
            (attr::TEMPERATURE, command.temperature),
            (attr::TARGET_TEMP_LOW, command.target_temp_low),
            (attr::TARGET_TEMP_HIGH, command.target_temp_high),
        ];
        for (key, value) in setpoints {
            if let Some(value) = value {
                data.insert(key.to_string(), value.into());
            }
        }
        if let Some(mode) = command.hvac_mode {
            data.insert(attr::HVAC_MODE.to_string(), mode.as_str().into());
        }
        self.call(services::SET_TEMPERATURE, Value::Object(data), context)
            .await
    }

    async fn forward(
        &self,
        service: &'static str,
        key: &str,
        value: Value,
        context: Context,
    ) -> ProxyResult<()> {
        let mut data = self.target();
        data.insert(key.to_string(), value);
        self.call(service, Value::Object(data), context).await
    }

    fn target(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert(attr::ENTITY_ID.to_string(), Value::String(self.source.to_string()));
        data
    }

    #[instrument(skip(self, data, context), fields(source = %self.source))]
    async fn call(&self, service: &'static str, data: Value, context: Context) -> ProxyResult<()> {
        debug!(%data, "Forwarding climate.{}", service);
        self.provider
            .call_climate_service(service, data, context)
            .await
            .map_err(|error| {
                warn!(%error, "Upstream rejected climate.{}", service);
                ProxyError::Upstream {
                    source_entity: self.source.to_string(),
                    service,
                    error,
                }
            })
    }
}
