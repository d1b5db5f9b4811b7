//! Entity state as stored by the hub and observed by proxies

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// The state of an entity at one point in time
///
/// A `State` is never edited after creation; a change produces a new value
/// through [`State::with_update`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// The entity this state belongs to
    pub entity_id: EntityId,

    /// The state value (for climate entities, the HVAC mode or "unavailable")
    pub state: String,

    /// Attributes reported alongside the state value
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state or its attributes were last written
    pub last_updated: DateTime<Utc>,

    /// Context of the write that produced this state
    pub context: Context,
}

impl State {
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Successor of this state; `last_changed` only moves when the value does
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == STATE_UNAVAILABLE
    }

    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    /// Typed attribute lookup
    ///
    /// A missing attribute, a JSON `null`, or a value of the wrong type all
    /// read as `None`.
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .filter(|v| !v.is_null())
            .and_then(|v| T::deserialize(v).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are bookkeeping, not identity
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn thermostat(state: &str) -> State {
        State::new(
            "climate.heat_pump".parse().unwrap(),
            state,
            HashMap::from([
                ("temperature".to_string(), json!(21.5)),
                ("hvac_modes".to_string(), json!(["off", "heat"])),
                ("fan_mode".to_string(), json!(null)),
                ("min_temp".to_string(), json!("cold")),
            ]),
            Context::new(),
        )
    }

    #[test]
    fn test_typed_attributes() {
        let state = thermostat("heat");
        assert_eq!(state.attribute::<f64>("temperature"), Some(21.5));
        assert_eq!(
            state.attribute::<Vec<String>>("hvac_modes"),
            Some(vec!["off".to_string(), "heat".to_string()])
        );
        assert_eq!(state.attribute::<String>("fan_mode"), None);
        assert_eq!(state.attribute::<f64>("min_temp"), None);
        assert_eq!(state.attribute::<f64>("missing"), None);
    }

    #[test]
    fn test_sentinels() {
        assert!(thermostat("unavailable").is_unavailable());
        assert!(thermostat("unknown").is_unknown());
        assert!(!thermostat("cool").is_unavailable());
    }

    #[test]
    fn test_update_keeps_last_changed_for_same_value() {
        let first = thermostat("heat");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let same = first.with_update("heat", HashMap::new(), Context::new());
        assert_eq!(same.last_changed, first.last_changed);
        assert!(same.last_updated > first.last_updated);

        let changed = same.with_update("cool", HashMap::new(), Context::new());
        assert!(changed.last_changed > same.last_changed);
    }
}
