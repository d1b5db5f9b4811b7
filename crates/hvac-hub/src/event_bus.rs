//! Typed pub/sub over tokio broadcast channels

use dashmap::DashMap;
use hvac_core::{Context, Event, EventData, EventType};
use std::marker::PhantomData;
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub use tokio::sync::broadcast::error::RecvError;

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Broadcasts events to every subscriber of their event type
///
/// A subscriber that falls more than `capacity` events behind receives
/// [`RecvError::Lagged`] and is expected to resynchronise from the state
/// store.
pub struct EventBus {
    channels: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    fn sender(&self, event_type: EventType) -> broadcast::Sender<Event<serde_json::Value>> {
        self.channels
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to every event of one type
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");
        self.sender(event_type).subscribe()
    }

    /// Subscribe to events whose payload decodes as `T`
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver {
            rx: self.subscribe(T::event_type()),
            _phantom: PhantomData,
        }
    }

    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "Firing event");
        if let Some(sender) = self.channels.get(&event.event_type) {
            // A send error only means nobody is listening
            let _ = sender.send(event);
        }
    }

    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        let event = Event::typed(data, context).map(|data| {
            serde_json::to_value(&data).unwrap_or_default()
        });
        self.fire(event);
    }

    /// Number of event types that have ever had a subscriber
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that decodes event payloads into `T`
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _phantom: PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    /// Next event whose payload decodes; undecodable payloads are skipped
    pub async fn recv(&mut self) -> Result<Event<T>, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            match T::deserialize(&event.data) {
                Ok(data) => return Ok(event.map(|_| data)),
                Err(e) => trace!(event_type = %event.event_type, error = %e, "Skipping undecodable event"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hvac_core::events::StateChangedData;
    use hvac_core::{EntityId, State};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("test_event");

        bus.fire(Event::new("test_event", json!({"key": "value"}), Context::new()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "test_event");
        assert_eq!(received.data["key"], "value");
    }

    #[tokio::test]
    async fn test_typed_state_changed() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<StateChangedData>();

        let entity_id: EntityId = "climate.heat_pump".parse().unwrap();
        let new_state = State::new(entity_id.clone(), "heat", HashMap::new(), Context::new());
        bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state: None,
                new_state: Some(new_state),
            },
            Context::new(),
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data.entity_id.to_string(), "climate.heat_pump");
        assert_eq!(received.data.new_state.unwrap().state, "heat");
    }

    #[tokio::test]
    async fn test_fire_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.fire(Event::new("nobody_listens", json!({}), Context::new()));
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_sees_lagged() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe("burst");
        for n in 0..5 {
            bus.fire(Event::new("burst", json!({"n": n}), Context::new()));
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_typed_receiver_waits_for_a_decodable_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<StateChangedData>();
        let mut recv = tokio_test::task::spawn(rx.recv());
        tokio_test::assert_pending!(recv.poll());

        // Not a StateChangedData payload
        bus.fire(Event::new("state_changed", json!({"bogus": true}), Context::new()));
        tokio_test::assert_pending!(recv.poll());

        bus.fire_typed(
            StateChangedData {
                entity_id: "climate.attic".parse().unwrap(),
                old_state: None,
                new_state: None,
            },
            Context::new(),
        );
        assert!(recv.is_woken());
        let event = tokio_test::assert_ready_ok!(recv.poll());
        assert_eq!(event.data.entity_id.to_string(), "climate.attic");
    }
}
