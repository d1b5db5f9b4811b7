//! Climate entity platform
//!
//! Owns the climate entities living in the hub, dispatches the `climate.*`
//! services to the entity each call targets, and writes rendered entity
//! state into the [`StateStore`].

use async_trait::async_trait;
use dashmap::DashMap;
use hvac_core::climate::{attr, services, DOMAIN};
use hvac_core::{Context, EntityId, HvacMode, ServiceCall, State, TemperatureRequest};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{ServiceDescription, ServiceError, ServiceRegistry, StateStore};

/// What an entity wants written to the state store
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedState {
    pub state: String,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// A climate entity the platform can render and command
#[async_trait]
pub trait ClimateEntity: Send + Sync {
    fn entity_id(&self) -> &EntityId;

    /// Current state to publish
    fn render(&self) -> RenderedState;

    /// Whether the platform should re-render after a successful command
    ///
    /// Entities that learn about their own changes some other way (a proxy
    /// waits for its upstream to report back) leave this off.
    fn render_after_command(&self) -> bool {
        false
    }

    async fn set_hvac_mode(&self, mode: HvacMode, context: &Context) -> Result<(), ServiceError>;

    async fn set_temperature(
        &self,
        request: TemperatureRequest,
        context: &Context,
    ) -> Result<(), ServiceError>;

    async fn set_fan_mode(&self, fan_mode: String, context: &Context) -> Result<(), ServiceError>;

    async fn set_swing_mode(&self, swing_mode: String, context: &Context)
        -> Result<(), ServiceError>;

    async fn set_preset_mode(
        &self,
        preset_mode: String,
        context: &Context,
    ) -> Result<(), ServiceError>;
}

/// A parsed climate command, decoded once per service call
#[derive(Debug, Clone)]
enum ClimateCommand {
    HvacMode(HvacMode),
    Temperature(TemperatureRequest),
    FanMode(String),
    SwingMode(String),
    PresetMode(String),
}

impl ClimateCommand {
    fn parse(call: &ServiceCall) -> Result<Self, ServiceError> {
        let required = |key: &str| -> Result<String, ServiceError> {
            call.get::<String>(key)
                .ok_or_else(|| ServiceError::InvalidData(format!("'{}' is required", key)))
        };

        match call.service.as_str() {
            services::SET_HVAC_MODE => {
                let raw = required(attr::HVAC_MODE)?;
                raw.parse()
                    .map(ClimateCommand::HvacMode)
                    .map_err(|e| ServiceError::InvalidData(e.to_string()))
            }
            services::SET_TEMPERATURE => {
                let request: TemperatureRequest = serde_json::from_value(call.payload())
                    .map_err(|e| ServiceError::InvalidData(e.to_string()))?;
                if request.temperature.is_none() && !request.has_range() {
                    return Err(ServiceError::InvalidData(
                        "one of temperature, target_temp_low, target_temp_high is required"
                            .to_string(),
                    ));
                }
                Ok(ClimateCommand::Temperature(request))
            }
            services::SET_FAN_MODE => required(attr::FAN_MODE).map(ClimateCommand::FanMode),
            services::SET_SWING_MODE => required(attr::SWING_MODE).map(ClimateCommand::SwingMode),
            services::SET_PRESET_MODE => {
                required(attr::PRESET_MODE).map(ClimateCommand::PresetMode)
            }
            other => Err(ServiceError::NotFound {
                domain: DOMAIN.to_string(),
                service: other.to_string(),
            }),
        }
    }
}

/// The entity framework for climate entities
pub struct ClimatePlatform {
    entities: DashMap<String, Arc<dyn ClimateEntity>>,
    states: Arc<StateStore>,
}

impl ClimatePlatform {
    pub fn new(states: Arc<StateStore>) -> Self {
        Self {
            entities: DashMap::new(),
            states,
        }
    }

    /// Register every `climate.*` service, routed through this platform
    pub fn register_services(self: &Arc<Self>, registry: &ServiceRegistry) {
        for service in services::ALL {
            let platform = Arc::clone(self);
            registry.register(ServiceDescription::new(DOMAIN, *service), move |call| {
                let platform = platform.clone();
                async move { platform.handle_call(call).await }
            });
        }
        info!("Climate services registered");
    }

    /// Add an entity and publish its first state
    pub fn add_entity(&self, entity: Arc<dyn ClimateEntity>) -> State {
        let entity_id = entity.entity_id().clone();
        if self
            .entities
            .insert(entity_id.to_string(), entity.clone())
            .is_some()
        {
            warn!(entity_id = %entity_id, "Replacing existing climate entity");
        }
        debug!(entity_id = %entity_id, "Added climate entity");
        self.publish(entity.as_ref(), Context::new())
    }

    /// Drop an entity and its state
    pub fn remove_entity(&self, entity_id: &EntityId) -> bool {
        let removed = self.entities.remove(&entity_id.to_string()).is_some();
        if removed {
            self.states.remove(entity_id, Context::new());
            debug!(entity_id = %entity_id, "Removed climate entity");
        }
        removed
    }

    /// Re-render one entity into the state store
    pub fn write_state(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let entity = self.entities.get(&entity_id.to_string())?.clone();
        Some(self.publish(entity.as_ref(), context))
    }

    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn publish(&self, entity: &dyn ClimateEntity, context: Context) -> State {
        let rendered = entity.render();
        self.states.set(
            entity.entity_id().clone(),
            rendered.state,
            rendered.attributes,
            context,
        )
    }

    #[instrument(skip(self, call), fields(service = %call.service))]
    async fn handle_call(&self, call: ServiceCall) -> Result<(), ServiceError> {
        let command = ClimateCommand::parse(&call)?;

        let targets: Vec<Arc<dyn ClimateEntity>> = call
            .entity_ids()
            .into_iter()
            .filter(|id| id.is_domain(DOMAIN))
            .filter_map(|id| self.entities.get(&id.to_string()).map(|e| e.clone()))
            .collect();

        if targets.is_empty() {
            let requested = call
                .service_data
                .get(attr::ENTITY_ID)
                .map(|v| v.to_string())
                .unwrap_or_default();
            warn!(entity_id = %requested, "No climate entity matches service target");
            return Err(ServiceError::EntityNotFound(requested));
        }

        for entity in targets {
            debug!(entity_id = %entity.entity_id(), ?command, "Dispatching climate command");
            let context = &call.context;
            match command.clone() {
                ClimateCommand::HvacMode(mode) => entity.set_hvac_mode(mode, context).await?,
                ClimateCommand::Temperature(request) => {
                    entity.set_temperature(request, context).await?
                }
                ClimateCommand::FanMode(mode) => entity.set_fan_mode(mode, context).await?,
                ClimateCommand::SwingMode(mode) => entity.set_swing_mode(mode, context).await?,
                ClimateCommand::PresetMode(mode) => entity.set_preset_mode(mode, context).await?,
            }
            if entity.render_after_command() {
                self.publish(entity.as_ref(), call.context.clone());
            }
        }

        Ok(())
    }
}
