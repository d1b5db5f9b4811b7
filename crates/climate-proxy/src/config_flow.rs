//! Config flow for creating proxies interactively
//!
//! There is a single user step. Shown without input it renders a form
//! listing every climate entity the hub knows; submitted, it creates a
//! config entry keyed by the chosen source.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hvac_core::climate::DOMAIN as CLIMATE_DOMAIN;
use hvac_hub::StateStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use ulid::Ulid;

use crate::config::{default_unique_id, ProxyConfig, ProxyVariant, CONF_NAME, CONF_SOURCE};
use crate::error::{ProxyError, ProxyResult};

pub const STEP_USER: &str = "user";

pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Choices for select fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Outcome of one flow step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    Form {
        step_id: String,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    },
    CreateEntry {
        title: String,
        entry: ConfigEntry,
    },
    Abort {
        reason: String,
    },
}

/// A stored proxy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain, one per proxy variant
    pub domain: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl ConfigEntry {
    /// The proxy configuration this entry describes
    pub fn proxy_config(&self) -> ProxyResult<ProxyConfig> {
        let variant: ProxyVariant = self.domain.parse()?;
        ProxyConfig::from_entry_data(variant, &self.data, self.unique_id.as_deref())
    }
}

/// In-memory config entries, indexed by id and by `(domain, unique_id)`
#[derive(Default)]
pub struct ConfigEntries {
    entries: DashMap<String, ConfigEntry>,
    by_unique_id: DashMap<(String, String), String>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .and_then(|entry_id| self.get(&entry_id))
    }

    /// Entries of one domain, ordered by creation
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let mut entries: Vec<ConfigEntry> = self
            .entries
            .iter()
            .filter(|r| r.domain == domain)
            .map(|r| r.value().clone())
            .collect();
        entries.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
        entries
    }

    /// Add an entry; fails if its unique id is already taken in its domain
    pub fn add(&self, entry: ConfigEntry) -> ProxyResult<ConfigEntry> {
        if let Some(unique_id) = &entry.unique_id {
            match self.by_unique_id.entry((entry.domain.clone(), unique_id.clone())) {
                Entry::Occupied(_) => {
                    return Err(ProxyError::Config(format!(
                        "{} entry with unique id {} already exists",
                        entry.domain, unique_id
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.entry_id.clone());
                }
            }
        }
        self.entries.insert(entry.entry_id.clone(), entry.clone());
        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    pub fn remove(&self, entry_id: &str) -> Option<ConfigEntry> {
        let (_, entry) = self.entries.remove(entry_id)?;
        if let Some(unique_id) = &entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }
        Some(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The user-facing flow of one proxy variant
pub struct ProxyConfigFlow {
    variant: ProxyVariant,
    states: Arc<StateStore>,
    entries: Arc<ConfigEntries>,
}

impl ProxyConfigFlow {
    pub fn new(variant: ProxyVariant, states: Arc<StateStore>, entries: Arc<ConfigEntries>) -> Self {
        Self {
            variant,
            states,
            entries,
        }
    }

    /// Run the user step
    ///
    /// Without input the form is returned. With input the entry is created
    /// and stored, unless one for the same source already exists.
    pub fn step_user(
        &self,
        user_input: Option<HashMap<String, serde_json::Value>>,
    ) -> ProxyResult<FlowResult> {
        let Some(input) = user_input else {
            return Ok(self.show_form(HashMap::new()));
        };

        let Some(source) = input.get(CONF_SOURCE).and_then(|v| v.as_str()) else {
            let errors = HashMap::from([(CONF_SOURCE.to_string(), "required".to_string())]);
            return Ok(self.show_form(errors));
        };
        let source_entity = match source.parse() {
            Ok(entity_id) => entity_id,
            Err(_) => {
                let errors = HashMap::from([(CONF_SOURCE.to_string(), "invalid_entity_id".to_string())]);
                return Ok(self.show_form(errors));
            }
        };

        let unique_id = default_unique_id(&source_entity);
        let domain = self.variant.domain();
        if self.entries.get_by_unique_id(domain, &unique_id).is_some() {
            debug!(%unique_id, "Proxy already configured");
            return Ok(FlowResult::Abort {
                reason: ABORT_ALREADY_CONFIGURED.to_string(),
            });
        }

        let title = input
            .get(CONF_NAME)
            .and_then(|v| v.as_str())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(source)
            .to_string();

        let entry = self.entries.add(ConfigEntry {
            entry_id: Ulid::new().to_string(),
            domain: domain.to_string(),
            title: title.clone(),
            unique_id: Some(unique_id),
            data: input,
        })?;

        Ok(FlowResult::CreateEntry { title, entry })
    }

    fn show_form(&self, errors: HashMap<String, String>) -> FlowResult {
        FlowResult::Form {
            step_id: STEP_USER.to_string(),
            data_schema: vec![
                FormField {
                    name: CONF_SOURCE.to_string(),
                    field_type: "select".to_string(),
                    required: Some(true),
                    options: Some(self.states.entity_ids(CLIMATE_DOMAIN)),
                },
                FormField {
                    name: CONF_NAME.to_string(),
                    field_type: "string".to_string(),
                    required: Some(false),
                    options: None,
                },
            ],
            errors,
        }
    }
}
