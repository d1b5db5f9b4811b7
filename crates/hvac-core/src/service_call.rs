//! Service call type for invoking services on the hub

use crate::{Context, EntityId};
use serde::{Deserialize, Serialize};

/// A call to a service such as `climate.set_temperature`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub service_data: serde_json::Value,
    pub context: Context,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
        context: Context,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
            context,
        }
    }

    /// `domain.service`
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.service_data
            .get(key)
            .and_then(|v| T::deserialize(v).ok())
    }

    /// Target entities, accepting either a single id or a list
    ///
    /// Ids that do not parse are skipped.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let raw: Vec<&str> = match self.service_data.get("entity_id") {
            Some(serde_json::Value::String(s)) => vec![s.as_str()],
            Some(serde_json::Value::Array(arr)) => arr.iter().filter_map(|v| v.as_str()).collect(),
            _ => Vec::new(),
        };
        raw.into_iter().filter_map(|s| s.parse().ok()).collect()
    }

    /// Service data without the `entity_id` targeting key
    pub fn payload(&self) -> serde_json::Value {
        let mut data = self.service_data.clone();
        if let Some(map) = data.as_object_mut() {
            map.remove("entity_id");
        }
        data
    }
}
