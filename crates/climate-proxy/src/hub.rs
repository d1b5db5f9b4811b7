//! Running a proxy inside a [`Hub`]
//!
//! Attaching a proxy subscribes to `state_changed` before seeding the
//! snapshot, so no upstream change between the two is lost. A pump task
//! then delivers the source entity's changes to the proxy in order and has
//! the platform re-render it once per change.

use async_trait::async_trait;
use hvac_core::climate::DOMAIN as CLIMATE_DOMAIN;
use hvac_core::events::StateChangedData;
use hvac_core::{Context, EntityId, State};
use hvac_hub::{
    ClimatePlatform, Hub, RecvError, ServiceError, ServiceRegistry, StateStore, TypedEventReceiver,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::ProxyConfig;
use crate::config_flow::ConfigEntry;
use crate::entity::ProxyClimate;
use crate::error::ProxyResult;
use crate::forwarder::SourceProvider;
use crate::mirror::MirrorUpdate;

/// Reads upstream state from the hub's state store and calls its services
#[derive(Clone)]
pub struct HubProvider {
    states: Arc<StateStore>,
    services: Arc<ServiceRegistry>,
}

impl HubProvider {
    pub fn new(hub: &Hub) -> Self {
        Self {
            states: hub.states.clone(),
            services: hub.services.clone(),
        }
    }
}

#[async_trait]
impl SourceProvider for HubProvider {
    fn get_state(&self, entity_id: &EntityId) -> Option<State> {
        self.states.get(&entity_id.to_string())
    }

    async fn call_climate_service(
        &self,
        service: &'static str,
        data: Value,
        context: Context,
    ) -> Result<(), ServiceError> {
        self.services
            .call(CLIMATE_DOMAIN, service, data, context)
            .await
    }
}

/// A proxy attached to a hub
///
/// Dropping the handle leaves the proxy running; call [`ProxyHandle::detach`]
/// to tear it down.
pub struct ProxyHandle {
    proxy: Arc<ProxyClimate>,
    platform: Arc<ClimatePlatform>,
    pump: JoinHandle<()>,
}

impl ProxyHandle {
    pub fn proxy(&self) -> &Arc<ProxyClimate> {
        &self.proxy
    }

    /// Stop observing the upstream and remove the proxy entity
    pub fn detach(self) {
        self.proxy.on_detached();
        self.pump.abort();
        self.platform.remove_entity(self.proxy.entity_id());
    }
}

/// Create a proxy, publish it and start following its source
///
/// Must be called from within a tokio runtime.
pub fn attach_proxy(hub: &Hub, config: &ProxyConfig) -> ProxyResult<ProxyHandle> {
    let provider = Arc::new(HubProvider::new(hub));
    let proxy = Arc::new(ProxyClimate::new(config, provider)?);

    let rx = hub.bus.subscribe_typed::<StateChangedData>();
    proxy.on_attached()?;
    hub.climate.add_entity(proxy.clone());

    let pump = tokio::spawn(pump(
        proxy.clone(),
        rx,
        hub.climate.clone(),
        hub.states.clone(),
    ));

    Ok(ProxyHandle {
        proxy,
        platform: hub.climate.clone(),
        pump,
    })
}

/// Attach the proxy a config entry describes
pub fn attach_entry(hub: &Hub, entry: &ConfigEntry) -> ProxyResult<ProxyHandle> {
    let config = entry.proxy_config()?;
    info!(entry_id = %entry.entry_id, title = %entry.title, "Setting up proxy from config entry");
    attach_proxy(hub, &config)
}

async fn pump(
    proxy: Arc<ProxyClimate>,
    mut rx: TypedEventReceiver<StateChangedData>,
    platform: Arc<ClimatePlatform>,
    states: Arc<StateStore>,
) {
    let source = proxy.source_entity().clone();
    let entity_id = proxy.entity_id().clone();

    loop {
        let (update, context) = match rx.recv().await {
            Ok(event) => {
                if event.data.entity_id != source {
                    continue;
                }
                trace!(source = %source, "Source state changed");
                let update = proxy.on_upstream_changed(event.data.new_state.as_ref());
                (update, event.context.child())
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(source = %source, skipped, "Missed source updates, resynchronising");
                let current = states.get(&source.to_string());
                (proxy.on_upstream_changed(current.as_ref()), Context::new())
            }
            Err(RecvError::Closed) => {
                debug!(source = %source, "Event bus closed");
                break;
            }
        };

        match update {
            MirrorUpdate::Rerender => {
                platform.write_state(&entity_id, context);
            }
            MirrorUpdate::Ignored => break,
        }
    }
}
