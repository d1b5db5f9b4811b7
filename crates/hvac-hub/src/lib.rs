//! In-process host for climate entities
//!
//! The hub plays the part of the home-automation core around a climate
//! proxy: it stores entity states and fires `state_changed` events, routes
//! `climate.*` service calls to the entity they target, and re-renders
//! entities into the state store when they ask for it.

mod event_bus;
mod platform;
mod service_registry;
mod state_store;

pub use event_bus::{EventBus, RecvError, TypedEventReceiver};
pub use platform::{ClimateEntity, ClimatePlatform, RenderedState};
pub use service_registry::{ServiceDescription, ServiceError, ServiceRegistry, ServiceResult};
pub use state_store::StateStore;

use std::sync::Arc;

/// Everything a climate entity needs from its host
pub struct Hub {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateStore>,
    pub services: Arc<ServiceRegistry>,
    pub climate: Arc<ClimatePlatform>,
}

impl Hub {
    /// Create a hub with the climate services already registered
    pub fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));
        let services = Arc::new(ServiceRegistry::new());
        let climate = Arc::new(ClimatePlatform::new(states.clone()));
        climate.register_services(&services);

        Self {
            bus,
            states,
            services,
            climate,
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
