//! Core types for the climate proxy workspace
//!
//! This crate provides the value types shared by the hub and the proxy:
//! EntityId, State, Event, Context, ServiceCall, and the climate domain
//! vocabulary (HVAC modes and actions, feature flags, set_temperature data).

pub mod climate;
mod context;
mod entity_id;
mod event;
mod service_call;
mod state;

pub use climate::{
    ClimateEntityFeature, HvacAction, HvacMode, TemperatureRequest, UnrecognizedValue,
};
pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use service_call::ServiceCall;
pub use state::State;

/// State value of an entity whose integration cannot reach it
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value of an entity that has not reported yet
pub const STATE_UNKNOWN: &str = "unknown";

/// Standard event types
pub mod events {
    use super::*;

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Data for STATE_CHANGED events
    ///
    /// `new_state` is `None` when the entity was removed, `old_state` is
    /// `None` when it was added.
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
