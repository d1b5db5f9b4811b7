//! Proxy configuration
//!
//! A proxy is configured either from a YAML platform entry:
//!
//! ```yaml
//! climate:
//!   - platform: mitsubishi_climate_proxy
//!     source_entity: climate.heat_pump
//!     name: Heat Pump
//! ```
//!
//! or from the data of a config entry created by the config flow.

use hvac_core::{slugify, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProxyError, ProxyResult};

/// Config key holding the source entity in YAML
pub const CONF_SOURCE_ENTITY: &str = "source_entity";

/// Config key holding the source entity in config entries
pub const CONF_SOURCE: &str = "source";

pub const CONF_NAME: &str = "name";

pub const CONF_UNIQUE_ID: &str = "unique_id";

/// Suffix of the default unique id
const UNIQUE_ID_SUFFIX: &str = "_hybrid";

/// Which of the two proxy behaviours to apply
///
/// | | `ClimateProxy` | `Hybrid` |
/// |---|---|---|
/// | write path checks the upstream range flag | yes | no |
/// | heat/cool writes send both setpoints | always | only when one is pushed |
/// | range widget while off (if heat_cool exists) | yes | no |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyVariant {
    #[default]
    #[serde(rename = "mitsubishi_climate_proxy")]
    ClimateProxy,
    #[serde(rename = "mitsubishi_hybrid")]
    Hybrid,
}

impl ProxyVariant {
    /// Integration domain this variant is configured under
    pub fn domain(&self) -> &'static str {
        match self {
            ProxyVariant::ClimateProxy => "mitsubishi_climate_proxy",
            ProxyVariant::Hybrid => "mitsubishi_hybrid",
        }
    }

    /// Forward a single temperature unchanged when the upstream has no
    /// range support, instead of always branching on the mode
    pub fn checks_source_range(&self) -> bool {
        matches!(self, ProxyVariant::ClimateProxy)
    }

    /// Send the untouched side of the range along with the requested one
    pub fn sends_complete_pair(&self) -> bool {
        matches!(self, ProxyVariant::ClimateProxy)
    }

    /// Advertise the range while off when the upstream supports heat_cool
    pub fn range_when_off(&self) -> bool {
        matches!(self, ProxyVariant::ClimateProxy)
    }
}

impl FromStr for ProxyVariant {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [ProxyVariant::ClimateProxy, ProxyVariant::Hybrid]
            .into_iter()
            .find(|v| v.domain() == s)
            .ok_or_else(|| ProxyError::Config(format!("unknown proxy platform '{}'", s)))
    }
}

impl fmt::Display for ProxyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.domain())
    }
}

/// Everything needed to build one proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(rename = "platform", default)]
    pub variant: ProxyVariant,

    /// The upstream climate entity; fixed for the proxy's lifetime
    pub source_entity: EntityId,

    /// Display name; defaults to the source entity id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Defaults to `<source_entity>_hybrid`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

impl ProxyConfig {
    pub fn new(variant: ProxyVariant, source_entity: EntityId) -> Self {
        Self {
            variant,
            source_entity,
            name: None,
            unique_id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Build a config from config entry data
    ///
    /// Entries created by the config flow store the source under `source`;
    /// entries imported from YAML use `source_entity`. Either is accepted.
    pub fn from_entry_data(
        variant: ProxyVariant,
        data: &HashMap<String, serde_json::Value>,
        entry_unique_id: Option<&str>,
    ) -> ProxyResult<Self> {
        let source = data
            .get(CONF_SOURCE)
            .or_else(|| data.get(CONF_SOURCE_ENTITY))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProxyError::Config("config entry has no source entity".to_string()))?;

        let name = data
            .get(CONF_NAME)
            .and_then(|v| v.as_str())
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string);

        Ok(Self {
            variant,
            source_entity: source.parse()?,
            name,
            unique_id: entry_unique_id.map(str::to_string),
        })
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.source_entity.to_string())
    }

    pub fn unique_id(&self) -> String {
        self.unique_id
            .clone()
            .unwrap_or_else(|| default_unique_id(&self.source_entity))
    }

    /// Entity id the proxy is published under
    ///
    /// Derived from the configured name, or from the source's object id when
    /// there is none. Never equal to the source entity id.
    pub fn proxy_entity_id(&self) -> ProxyResult<EntityId> {
        let source_object = self.source_entity.object_id();
        let object_id = self
            .name
            .as_deref()
            .and_then(slugify)
            .filter(|slug| slug != source_object)
            .unwrap_or_else(|| format!("{}_proxy", source_object));
        Ok(EntityId::new(hvac_core::climate::DOMAIN, object_id)?)
    }
}

/// `<source_entity>_hybrid`
pub fn default_unique_id(source: &EntityId) -> String {
    format!("{}{}", source, UNIQUE_ID_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heat_pump() -> EntityId {
        "climate.heat_pump".parse().unwrap()
    }

    #[test]
    fn test_yaml_platform_entry() {
        let yaml = r#"
            platform: mitsubishi_hybrid
            source_entity: climate.heat_pump
            name: Living Room
        "#;
        let config: ProxyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.variant, ProxyVariant::Hybrid);
        assert_eq!(config.source_entity, heat_pump());
        assert_eq!(config.display_name(), "Living Room");
        assert_eq!(config.unique_id(), "climate.heat_pump_hybrid");
    }

    #[test]
    fn test_yaml_rejects_bad_entries() {
        let bad_source = "platform: mitsubishi_hybrid\nsource_entity: heat pump\n";
        assert!(serde_yaml::from_str::<ProxyConfig>(bad_source).is_err());

        let bad_platform = "platform: generic_thermostat\nsource_entity: climate.a\n";
        assert!(serde_yaml::from_str::<ProxyConfig>(bad_platform).is_err());

        let missing_source = "platform: mitsubishi_hybrid\nname: x\n";
        assert!(serde_yaml::from_str::<ProxyConfig>(missing_source).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::new(ProxyVariant::default(), heat_pump());
        assert_eq!(config.variant, ProxyVariant::ClimateProxy);
        assert_eq!(config.display_name(), "climate.heat_pump");
        assert_eq!(config.unique_id(), "climate.heat_pump_hybrid");
        assert_eq!(
            config.proxy_entity_id().unwrap().to_string(),
            "climate.heat_pump_proxy"
        );

        let overridden = config.with_unique_id("my_proxy");
        assert_eq!(overridden.unique_id(), "my_proxy");
    }

    #[test]
    fn test_proxy_entity_id_never_shadows_source() {
        let named = ProxyConfig::new(ProxyVariant::Hybrid, heat_pump()).with_name("Upstairs Hybrid");
        assert_eq!(named.proxy_entity_id().unwrap().to_string(), "climate.upstairs_hybrid");

        let same_as_source = ProxyConfig::new(ProxyVariant::Hybrid, heat_pump()).with_name("Heat Pump");
        assert_eq!(
            same_as_source.proxy_entity_id().unwrap().to_string(),
            "climate.heat_pump_proxy"
        );
    }

    #[test]
    fn test_entry_data_accepts_both_source_keys() {
        let flow_data = HashMap::from([
            (CONF_SOURCE.to_string(), json!("climate.heat_pump")),
            (CONF_NAME.to_string(), json!("Den")),
        ]);
        let config =
            ProxyConfig::from_entry_data(ProxyVariant::Hybrid, &flow_data, Some("climate.heat_pump_hybrid"))
                .unwrap();
        assert_eq!(config.source_entity, heat_pump());
        assert_eq!(config.name.as_deref(), Some("Den"));
        assert_eq!(config.unique_id(), "climate.heat_pump_hybrid");

        let yaml_data = HashMap::from([(CONF_SOURCE_ENTITY.to_string(), json!("climate.heat_pump"))]);
        let config = ProxyConfig::from_entry_data(ProxyVariant::ClimateProxy, &yaml_data, None).unwrap();
        assert_eq!(config.source_entity, heat_pump());
        assert_eq!(config.name, None);

        let empty = HashMap::new();
        assert!(matches!(
            ProxyConfig::from_entry_data(ProxyVariant::Hybrid, &empty, None),
            Err(ProxyError::Config(_))
        ));
    }

    #[test]
    fn test_variant_parse_and_flags() {
        assert_eq!("mitsubishi_hybrid".parse::<ProxyVariant>().unwrap(), ProxyVariant::Hybrid);
        assert!("demo".parse::<ProxyVariant>().is_err());

        let a = ProxyVariant::ClimateProxy;
        assert!(a.checks_source_range() && a.sends_complete_pair() && a.range_when_off());
        let b = ProxyVariant::Hybrid;
        assert!(!b.checks_source_range() && !b.sends_complete_pair() && !b.range_when_off());
    }
}
