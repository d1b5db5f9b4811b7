//! Server configuration
//!
//! ```yaml
//! logging:
//!   level: info
//!
//! demo:
//!   - entity_id: climate.heat_pump
//!     name: Heat Pump
//!     hvac_mode: heat_cool
//!     target_temp_low: 18
//!     target_temp_high: 24
//!
//! climate:
//!   - platform: mitsubishi_climate_proxy
//!     source_entity: climate.heat_pump
//! ```

use climate_proxy::{ProxyConfig, ProxyVariant};
use hvac_core::climate::DOMAIN as CLIMATE_DOMAIN;
use hvac_core::{EntityId, HvacMode};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{config_dir, YamlLoader};

/// Default log filter when neither the config nor `RUST_LOG` sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Climate platform entries; entries of other platforms are skipped
    #[serde(default)]
    pub climate: Vec<serde_yaml::Value>,

    /// Simulated upstream thermostats
    #[serde(default)]
    pub demo: Vec<DemoThermostatConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

/// A simulated thermostat to act as a proxy source
#[derive(Debug, Clone, Deserialize)]
pub struct DemoThermostatConfig {
    pub entity_id: EntityId,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_hvac_modes")]
    pub hvac_modes: Vec<HvacMode>,

    #[serde(default)]
    pub hvac_mode: Option<HvacMode>,

    /// Whether the thermostat keeps a low/high pair rather than one setpoint
    #[serde(default = "default_dual_setpoint")]
    pub dual_setpoint: bool,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub target_temp_low: Option<f64>,

    #[serde(default)]
    pub target_temp_high: Option<f64>,

    #[serde(default)]
    pub current_temperature: Option<f64>,

    #[serde(default)]
    pub min_temp: Option<f64>,

    #[serde(default)]
    pub max_temp: Option<f64>,

    #[serde(default)]
    pub fan_modes: Vec<String>,
}

fn default_hvac_modes() -> Vec<HvacMode> {
    vec![HvacMode::Off, HvacMode::Heat, HvacMode::Cool, HvacMode::HeatCool]
}

fn default_dual_setpoint() -> bool {
    true
}

impl ServerConfig {
    /// Proxy entries of the `climate` list
    pub fn proxies(&self) -> ConfigResult<Vec<ProxyConfig>> {
        let mut proxies = Vec::new();
        for entry in &self.climate {
            let platform = entry
                .get("platform")
                .and_then(serde_yaml::Value::as_str)
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "climate".to_string(),
                    reason: "every entry needs a platform".to_string(),
                })?;
            if platform.parse::<ProxyVariant>().is_err() {
                debug!(platform, "Skipping climate entry of another platform");
                continue;
            }

            let proxy: ProxyConfig =
                serde_yaml::from_value(entry.clone()).map_err(|e| ConfigError::InvalidValue {
                    key: format!("climate ({})", platform),
                    reason: e.to_string(),
                })?;
            proxies.push(proxy);
        }
        Ok(proxies)
    }

    /// Reject configurations that would clash at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        let mut demo_ids = HashSet::new();
        for demo in &self.demo {
            if !demo.entity_id.is_domain(CLIMATE_DOMAIN) {
                return Err(ConfigError::ValidationFailed {
                    message: format!("demo entity {} is not a climate entity", demo.entity_id),
                });
            }
            if !demo_ids.insert(demo.entity_id.clone()) {
                return Err(ConfigError::ValidationFailed {
                    message: format!("demo entity {} is defined twice", demo.entity_id),
                });
            }
        }

        let mut unique_ids = HashSet::new();
        let mut proxy_ids = HashSet::new();
        for proxy in self.proxies()? {
            let unique_id = proxy.unique_id();
            if !unique_ids.insert((proxy.variant, unique_id.clone())) {
                return Err(ConfigError::ValidationFailed {
                    message: format!("proxy unique id {} is used twice", unique_id),
                });
            }

            let entity_id = proxy
                .proxy_entity_id()
                .map_err(|e| ConfigError::ValidationFailed {
                    message: e.to_string(),
                })?;
            if demo_ids.contains(&entity_id) || !proxy_ids.insert(entity_id.clone()) {
                return Err(ConfigError::ValidationFailed {
                    message: format!("entity id {} is already taken", entity_id),
                });
            }
        }
        Ok(())
    }
}

/// Load, substitute and validate the configuration file at `path`
pub fn load_config(path: &Path) -> ConfigResult<ServerConfig> {
    let loader = YamlLoader::new(&config_dir(path))?;
    let value = loader.load_file(path)?;

    // An empty file is a valid, empty configuration
    let config: ServerConfig = if value.is_null() {
        ServerConfig::default()
    } else {
        serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })?
    };

    config.validate()?;
    info!(
        path = %path.display(),
        demo = config.demo.len(),
        climate = config.climate.len(),
        "Configuration loaded"
    );
    Ok(config)
}
