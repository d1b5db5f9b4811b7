//! The proxy climate entity

use async_trait::async_trait;
use hvac_core::climate::{attr, DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP, DEFAULT_TEMPERATURE_UNIT};
use hvac_core::{
    ClimateEntityFeature, Context, EntityId, HvacAction, HvacMode, State, TemperatureRequest,
    STATE_UNAVAILABLE,
};
use hvac_hub::{ClimateEntity, RenderedState, ServiceError};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::availability::is_available;
use crate::config::{ProxyConfig, ProxyVariant};
use crate::error::ProxyResult;
use crate::features::project_features;
use crate::forwarder::{CommandForwarder, SourceProvider};
use crate::mirror::{Lifecycle, MirrorUpdate, StateMirror};
use crate::snapshot::SourceSnapshot;
use crate::translator::{presented_temperature, translate};

/// A climate entity that re-presents one upstream climate entity
///
/// Every property is computed from the latest upstream snapshot when it is
/// read. The snapshot lock is never held across an await.
pub struct ProxyClimate {
    entity_id: EntityId,
    name: String,
    unique_id: String,
    variant: ProxyVariant,
    mirror: RwLock<StateMirror>,
    forwarder: CommandForwarder,
}

impl ProxyClimate {
    pub fn new(config: &ProxyConfig, provider: Arc<dyn SourceProvider>) -> ProxyResult<Self> {
        Ok(Self {
            entity_id: config.proxy_entity_id()?,
            name: config.display_name(),
            unique_id: config.unique_id(),
            variant: config.variant,
            mirror: RwLock::new(StateMirror::new(config.source_entity.clone())),
            forwarder: CommandForwarder::new(config.source_entity.clone(), provider),
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn source_entity(&self) -> &EntityId {
        self.forwarder.source()
    }

    pub fn variant(&self) -> ProxyVariant {
        self.variant
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.mirror.read().lifecycle()
    }

    // Lifecycle hooks

    /// Seed the snapshot from the upstream's current state
    pub fn on_attached(&self) -> ProxyResult<()> {
        let initial = self.forwarder.source_state();
        self.mirror.write().attach(initial.as_ref())?;
        info!(
            entity_id = %self.entity_id,
            source = %self.source_entity(),
            variant = %self.variant,
            "Proxy attached"
        );
        Ok(())
    }

    /// Deliver an upstream state change; `None` means the upstream is gone
    pub fn on_upstream_changed(&self, new_state: Option<&State>) -> MirrorUpdate {
        self.mirror.write().on_upstream_changed(new_state)
    }

    pub fn on_detached(&self) {
        if self.mirror.write().detach() {
            info!(entity_id = %self.entity_id, "Proxy detached");
        }
    }

    // Properties

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn snapshot(&self) -> Option<Arc<SourceSnapshot>> {
        self.mirror.read().snapshot()
    }

    pub fn available(&self) -> bool {
        is_available(self.snapshot().as_deref())
    }

    pub fn supported_features(&self) -> ClimateEntityFeature {
        project_features(self.snapshot().as_deref(), self.variant)
    }

    pub fn temperature_unit(&self) -> String {
        self.snapshot()
            .and_then(|s| s.unit_of_measurement.clone())
            .unwrap_or_else(|| DEFAULT_TEMPERATURE_UNIT.to_string())
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.snapshot()?.current_temperature
    }

    pub fn target_temperature(&self) -> Option<f64> {
        presented_temperature(self.snapshot()?.as_ref())
    }

    pub fn target_temperature_low(&self) -> Option<f64> {
        self.snapshot()?.target_temp_low
    }

    pub fn target_temperature_high(&self) -> Option<f64> {
        self.snapshot()?.target_temp_high
    }

    pub fn hvac_mode(&self) -> HvacMode {
        self.snapshot().map_or(HvacMode::Off, |s| s.hvac_mode())
    }

    pub fn hvac_modes(&self) -> Vec<HvacMode> {
        self.snapshot()
            .map(|s| s.supported_hvac_modes())
            .unwrap_or_default()
    }

    pub fn hvac_action(&self) -> Option<HvacAction> {
        self.snapshot()?.parsed_hvac_action()
    }

    pub fn fan_mode(&self) -> Option<String> {
        self.snapshot()?.fan_mode.clone()
    }

    pub fn fan_modes(&self) -> Option<Vec<String>> {
        self.snapshot()?.fan_modes.clone()
    }

    pub fn swing_mode(&self) -> Option<String> {
        self.snapshot()?.swing_mode.clone()
    }

    pub fn swing_modes(&self) -> Option<Vec<String>> {
        self.snapshot()?.swing_modes.clone()
    }

    pub fn preset_mode(&self) -> Option<String> {
        self.snapshot()?.preset_mode.clone()
    }

    pub fn preset_modes(&self) -> Option<Vec<String>> {
        self.snapshot()?.preset_modes.clone()
    }

    pub fn min_temp(&self) -> f64 {
        self.snapshot()
            .map_or(DEFAULT_MIN_TEMP, |s| s.min_temp_or_default())
    }

    pub fn max_temp(&self) -> f64 {
        self.snapshot()
            .map_or(DEFAULT_MAX_TEMP, |s| s.max_temp_or_default())
    }

    // Operations

    pub async fn set_hvac_mode(&self, mode: HvacMode, context: &Context) -> ProxyResult<()> {
        self.forwarder.set_hvac_mode(mode, context.child()).await
    }

    /// Translate a temperature request and send it upstream as one command
    #[instrument(skip(self, context), fields(entity_id = %self.entity_id))]
    pub async fn set_temperature(
        &self,
        request: TemperatureRequest,
        context: &Context,
    ) -> ProxyResult<()> {
        let command = translate(&request, self.snapshot().as_deref(), self.variant);
        debug!(?command, "Sending translated temperature command");
        self.forwarder.set_temperature(&command, context.child()).await
    }

    pub async fn set_fan_mode(&self, fan_mode: &str, context: &Context) -> ProxyResult<()> {
        self.forwarder.set_fan_mode(fan_mode, context.child()).await
    }

    pub async fn set_swing_mode(&self, swing_mode: &str, context: &Context) -> ProxyResult<()> {
        self.forwarder.set_swing_mode(swing_mode, context.child()).await
    }

    pub async fn set_preset_mode(&self, preset_mode: &str, context: &Context) -> ProxyResult<()> {
        self.forwarder
            .set_preset_mode(preset_mode, context.child())
            .await
    }

    /// State and attributes to publish
    ///
    /// Capability attributes are always written; the rest only while the
    /// proxy is available.
    pub fn render(&self) -> RenderedState {
        let snapshot = self.snapshot();
        let snapshot = snapshot.as_deref();
        let features = project_features(snapshot, self.variant);

        let mut attributes: HashMap<String, Value> = HashMap::new();
        attributes.insert(attr::FRIENDLY_NAME.to_string(), json!(self.name));
        attributes.insert(attr::SUPPORTED_FEATURES.to_string(), json!(features.bits()));
        attributes.insert(attr::HVAC_MODES.to_string(), json!(self.hvac_modes()));
        attributes.insert(attr::MIN_TEMP.to_string(), json!(self.min_temp()));
        attributes.insert(attr::MAX_TEMP.to_string(), json!(self.max_temp()));
        if features.contains(ClimateEntityFeature::FAN_MODE) {
            attributes.insert(attr::FAN_MODES.to_string(), json!(self.fan_modes()));
        }
        if features.contains(ClimateEntityFeature::SWING_MODE) {
            attributes.insert(attr::SWING_MODES.to_string(), json!(self.swing_modes()));
        }
        if features.contains(ClimateEntityFeature::PRESET_MODE) {
            attributes.insert(attr::PRESET_MODES.to_string(), json!(self.preset_modes()));
        }

        if !is_available(snapshot) {
            return RenderedState {
                state: STATE_UNAVAILABLE.to_string(),
                attributes,
            };
        }

        attributes.insert(
            attr::CURRENT_TEMPERATURE.to_string(),
            json!(self.current_temperature()),
        );
        if features.contains(ClimateEntityFeature::TARGET_TEMPERATURE) {
            attributes.insert(attr::TEMPERATURE.to_string(), json!(self.target_temperature()));
        }
        if features.contains(ClimateEntityFeature::TARGET_TEMPERATURE_RANGE) {
            attributes.insert(
                attr::TARGET_TEMP_LOW.to_string(),
                json!(self.target_temperature_low()),
            );
            attributes.insert(
                attr::TARGET_TEMP_HIGH.to_string(),
                json!(self.target_temperature_high()),
            );
        }
        if let Some(action) = self.hvac_action() {
            attributes.insert(attr::HVAC_ACTION.to_string(), json!(action));
        }
        if features.contains(ClimateEntityFeature::FAN_MODE) {
            attributes.insert(attr::FAN_MODE.to_string(), json!(self.fan_mode()));
        }
        if features.contains(ClimateEntityFeature::SWING_MODE) {
            attributes.insert(attr::SWING_MODE.to_string(), json!(self.swing_mode()));
        }
        if features.contains(ClimateEntityFeature::PRESET_MODE) {
            attributes.insert(attr::PRESET_MODE.to_string(), json!(self.preset_mode()));
        }
        attributes.insert(
            attr::UNIT_OF_MEASUREMENT.to_string(),
            json!(self.temperature_unit()),
        );

        RenderedState {
            state: self.hvac_mode().to_string(),
            attributes,
        }
    }
}

impl std::fmt::Debug for ProxyClimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyClimate")
            .field("entity_id", &self.entity_id)
            .field("source", self.source_entity())
            .field("variant", &self.variant)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[async_trait]
impl ClimateEntity for ProxyClimate {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn render(&self) -> RenderedState {
        ProxyClimate::render(self)
    }

    async fn set_hvac_mode(&self, mode: HvacMode, context: &Context) -> Result<(), ServiceError> {
        Ok(ProxyClimate::set_hvac_mode(self, mode, context).await?)
    }

    async fn set_temperature(
        &self,
        request: TemperatureRequest,
        context: &Context,
    ) -> Result<(), ServiceError> {
        Ok(ProxyClimate::set_temperature(self, request, context).await?)
    }

    async fn set_fan_mode(&self, fan_mode: String, context: &Context) -> Result<(), ServiceError> {
        Ok(ProxyClimate::set_fan_mode(self, &fan_mode, context).await?)
    }

    async fn set_swing_mode(
        &self,
        swing_mode: String,
        context: &Context,
    ) -> Result<(), ServiceError> {
        Ok(ProxyClimate::set_swing_mode(self, &swing_mode, context).await?)
    }

    async fn set_preset_mode(
        &self,
        preset_mode: String,
        context: &Context,
    ) -> Result<(), ServiceError> {
        Ok(ProxyClimate::set_preset_mode(self, &preset_mode, context).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProxyError;
    use crate::forwarder::tests::RecordingProvider;

    fn upstream(code: &str, attributes: Value) -> State {
        let attributes: HashMap<String, Value> = serde_json::from_value(attributes).unwrap();
        State::new("climate.heat_pump".parse().unwrap(), code, attributes, Context::new())
    }

    fn heat_cool() -> State {
        upstream(
            "heat_cool",
            json!({
                "current_temperature": 20.5,
                "target_temp_low": 18,
                "target_temp_high": 22,
                "supported_features": 1 | 2 | 8,
                "hvac_modes": ["off", "heat", "cool", "heat_cool", "eco"],
                "hvac_action": "heating",
                "fan_mode": "auto",
                "fan_modes": ["auto", "quiet"],
                "unit_of_measurement": "°C",
                "min_temp": 16,
                "max_temp": 31
            }),
        )
    }

    fn proxy(variant: ProxyVariant, initial: Option<State>) -> (ProxyClimate, Arc<RecordingProvider>) {
        let provider = Arc::new(RecordingProvider::default());
        *provider.state.lock() = initial;
        let config = ProxyConfig::new(variant, "climate.heat_pump".parse().unwrap()).with_name("Heat Pump Hybrid");
        let proxy = ProxyClimate::new(&config, provider.clone()).unwrap();
        (proxy, provider)
    }

    #[test]
    fn test_identity() {
        let (proxy, _) = proxy(ProxyVariant::Hybrid, None);
        assert_eq!(proxy.entity_id().to_string(), "climate.heat_pump_hybrid");
        assert_eq!(proxy.name(), "Heat Pump Hybrid");
        assert_eq!(proxy.unique_id(), "climate.heat_pump_hybrid");
        assert_eq!(proxy.source_entity().to_string(), "climate.heat_pump");
    }

    #[test]
    fn test_unresolved_source_reads_as_defaults() {
        let (proxy, _) = proxy(ProxyVariant::ClimateProxy, None);
        proxy.on_attached().unwrap();

        assert!(!proxy.available());
        assert_eq!(proxy.hvac_mode(), HvacMode::Off);
        assert!(proxy.hvac_modes().is_empty());
        assert!(proxy.supported_features().is_empty());
        assert_eq!(proxy.target_temperature(), None);
        assert_eq!(proxy.current_temperature(), None);
        assert_eq!(proxy.temperature_unit(), "°C");
        assert_eq!(proxy.min_temp(), 7.0);
        assert_eq!(proxy.max_temp(), 35.0);

        let rendered = proxy.render();
        assert_eq!(rendered.state, "unavailable");
        assert_eq!(rendered.attributes["supported_features"], json!(0));
        assert!(!rendered.attributes.contains_key("temperature"));
        assert!(!rendered.attributes.contains_key("current_temperature"));
    }

    #[test]
    fn test_properties_follow_snapshot() {
        let (proxy, _) = proxy(ProxyVariant::ClimateProxy, Some(heat_cool()));
        proxy.on_attached().unwrap();

        assert!(proxy.available());
        assert_eq!(proxy.hvac_mode(), HvacMode::HeatCool);
        assert_eq!(
            proxy.hvac_modes(),
            vec![HvacMode::Off, HvacMode::Heat, HvacMode::Cool, HvacMode::HeatCool]
        );
        assert_eq!(proxy.target_temperature(), Some(20.0));
        assert_eq!(proxy.target_temperature_low(), Some(18.0));
        assert_eq!(proxy.target_temperature_high(), Some(22.0));
        assert_eq!(proxy.hvac_action(), Some(HvacAction::Heating));
        assert_eq!(proxy.fan_mode().as_deref(), Some("auto"));
        assert_eq!(proxy.min_temp(), 16.0);
        assert_eq!(proxy.max_temp(), 31.0);

        let features = proxy.supported_features();
        assert!(features.contains(ClimateEntityFeature::TARGET_TEMPERATURE_RANGE));
        assert!(!features.contains(ClimateEntityFeature::TARGET_TEMPERATURE));
    }

    #[test]
    fn test_render_shows_only_the_active_setpoint_shape() {
        let (proxy, _) = proxy(ProxyVariant::ClimateProxy, Some(heat_cool()));
        proxy.on_attached().unwrap();

        let rendered = proxy.render();
        assert_eq!(rendered.state, "heat_cool");
        assert_eq!(rendered.attributes["friendly_name"], json!("Heat Pump Hybrid"));
        assert_eq!(rendered.attributes["target_temp_low"], json!(18.0));
        assert_eq!(rendered.attributes["target_temp_high"], json!(22.0));
        assert!(!rendered.attributes.contains_key("temperature"));
        assert_eq!(rendered.attributes["hvac_action"], json!("heating"));
        assert_eq!(rendered.attributes["fan_modes"], json!(["auto", "quiet"]));
        assert!(!rendered.attributes.contains_key("swing_mode"));

        proxy.on_upstream_changed(Some(&upstream(
            "cool",
            json!({"target_temp_low": 18, "target_temp_high": 24, "supported_features": 3}),
        )));
        let rendered = proxy.render();
        assert_eq!(rendered.state, "cool");
        assert_eq!(rendered.attributes["temperature"], json!(24.0));
        assert!(!rendered.attributes.contains_key("target_temp_low"));
        assert!(!rendered.attributes.contains_key("hvac_action"));
    }

    #[test]
    fn test_notifications_replace_snapshot_until_detached() {
        let (proxy, _) = proxy(ProxyVariant::Hybrid, Some(heat_cool()));
        assert_eq!(
            proxy.on_upstream_changed(Some(&heat_cool())),
            MirrorUpdate::Ignored
        );
        proxy.on_attached().unwrap();

        assert_eq!(proxy.on_upstream_changed(None), MirrorUpdate::Rerender);
        assert!(!proxy.available());

        let heat = upstream("heat", json!({"temperature": 21}));
        assert_eq!(proxy.on_upstream_changed(Some(&heat)), MirrorUpdate::Rerender);
        assert_eq!(proxy.hvac_mode(), HvacMode::Heat);

        proxy.on_detached();
        assert_eq!(proxy.lifecycle(), Lifecycle::Detached);
        assert_eq!(proxy.on_upstream_changed(None), MirrorUpdate::Ignored);
        assert_eq!(proxy.hvac_mode(), HvacMode::Heat);
        assert!(matches!(proxy.on_attached(), Err(ProxyError::Lifecycle { .. })));
    }

    #[tokio::test]
    async fn test_set_temperature_translates_against_snapshot() {
        let (proxy, provider) = proxy(ProxyVariant::ClimateProxy, Some(heat_cool()));
        proxy.on_attached().unwrap();

        proxy
            .set_temperature(TemperatureRequest::single(21.0), &Context::new())
            .await
            .unwrap();

        let calls = provider.calls.lock().clone();
        assert_eq!(
            calls,
            vec![(
                "set_temperature".to_string(),
                json!({"entity_id": "climate.heat_pump", "target_temp_low": 19.0, "target_temp_high": 23.0})
            )]
        );
    }

    #[tokio::test]
    async fn test_trait_surface_maps_upstream_failure() {
        let (proxy, provider) = proxy(ProxyVariant::Hybrid, Some(heat_cool()));
        proxy.on_attached().unwrap();
        *provider.fail_with.lock() = Some(ServiceError::InvalidData("bad mode".to_string()));

        let entity: &dyn ClimateEntity = &proxy;
        let err = entity
            .set_hvac_mode(HvacMode::Dry, &Context::new())
            .await
            .unwrap_err();
        match err {
            ServiceError::CallFailed(message) => assert!(message.contains("bad mode")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!entity.render_after_command());
    }
}
