//! Entity state storage that announces every write on the event bus

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hvac_core::events::StateChangedData;
use hvac_core::{Context, EntityId, State};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::EventBus;

/// Current state of every entity, keyed by entity id
///
/// Each `set` and `remove` fires exactly one `state_changed` event carrying
/// the complete old and new states. The entity's slot stays locked until the
/// event is on the bus, so events for one entity arrive in write order.
pub struct StateStore {
    states: DashMap<String, State>,
    event_bus: Arc<EventBus>,
}

impl StateStore {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            event_bus,
        }
    }

    /// Write the state of an entity, replacing whatever was there
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let entry = self.states.entry(entity_id.to_string());
        let old_state = match &entry {
            Entry::Occupied(existing) => Some(existing.get().clone()),
            Entry::Vacant(_) => None,
        };

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id.clone(), state, attributes, context.clone()),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map_or(true, |s| s.state != new_state.state),
            "Setting entity state"
        );

        let slot = entry.insert(new_state.clone());
        self.event_bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            },
            context,
        );
        drop(slot);

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// Ids of all entities in `domain`, sorted
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .states
            .iter()
            .filter(|s| s.entity_id.is_domain(domain))
            .map(|s| s.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Remove an entity; fires `state_changed` with no new state
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let Entry::Occupied(entry) = self.states.entry(entity_id.to_string()) else {
            return None;
        };

        trace!("Removing entity state");
        self.event_bus.fire_typed(
            StateChangedData {
                entity_id: entity_id.clone(),
                old_state: Some(entry.get().clone()),
                new_state: None,
            },
            context,
        );
        Some(entry.remove())
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_store() -> (Arc<EventBus>, StateStore) {
        let bus = Arc::new(EventBus::new());
        let store = StateStore::new(bus.clone());
        (bus, store)
    }

    #[test]
    fn test_set_and_get() {
        let (_, store) = make_store();
        let attrs = HashMap::from([("temperature".to_string(), json!(21))]);
        store.set("climate.den".parse().unwrap(), "heat", attrs.clone(), Context::new());

        let state = store.get("climate.den").unwrap();
        assert_eq!(state.state, "heat");
        assert_eq!(state.attributes, attrs);
        assert_eq!(store.get_state("climate.den").as_deref(), Some("heat"));
        assert!(store.get("climate.attic").is_none());
    }

    #[test]
    fn test_entity_ids_by_domain() {
        let (_, store) = make_store();
        store.set("climate.b".parse().unwrap(), "off", HashMap::new(), Context::new());
        store.set("climate.a".parse().unwrap(), "off", HashMap::new(), Context::new());
        store.set("sensor.a".parse().unwrap(), "20", HashMap::new(), Context::new());

        assert_eq!(store.entity_ids("climate"), vec!["climate.a", "climate.b"]);
        assert_eq!(store.entity_ids("sensor"), vec!["sensor.a"]);
        assert_eq!(store.entity_count(), 3);
    }

    #[tokio::test]
    async fn test_set_and_remove_fire_state_changed() {
        let (bus, store) = make_store();
        let mut rx = bus.subscribe_typed::<StateChangedData>();
        let entity_id: EntityId = "climate.den".parse().unwrap();

        store.set(entity_id.clone(), "cool", HashMap::new(), Context::new());
        let added = rx.recv().await.unwrap();
        assert!(added.data.old_state.is_none());
        assert_eq!(added.data.new_state.unwrap().state, "cool");

        let removed = store.remove(&entity_id, Context::new());
        assert_eq!(removed.unwrap().state, "cool");
        let event = rx.recv().await.unwrap();
        assert_eq!(event.data.old_state.unwrap().state, "cool");
        assert!(event.data.new_state.is_none());

        assert!(store.remove(&entity_id, Context::new()).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writes_fire_in_store_order() {
        let (bus, store) = make_store();
        let mut rx = bus.subscribe_typed::<StateChangedData>();

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for n in 0..50 {
                        let attrs = HashMap::from([("n".to_string(), json!(writer * 100 + n))]);
                        store.set("climate.den".parse().unwrap(), "heat", attrs, Context::new());
                    }
                });
            }
        });

        let mut previous: Option<State> = None;
        for _ in 0..200 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.data.old_state, previous);
            previous = event.data.new_state;
        }
        assert_eq!(previous, store.get("climate.den"));
    }
}
