//! Service registry with async handlers

use dashmap::DashMap;
use hvac_core::{Context, ServiceCall};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Result of a service call
pub type ServiceResult = Result<(), ServiceError>;

/// Future type for async service handlers
pub type ServiceFuture = Pin<Box<dyn Future<Output = ServiceResult> + Send>>;

/// Service handler function type
pub type ServiceHandler = Arc<dyn Fn(ServiceCall) -> ServiceFuture + Send + Sync>;

/// Errors that can occur when calling services
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("no entity {0} handles this service")]
    EntityNotFound(String),

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("service call failed: {0}")]
    CallFailed(String),
}

/// Metadata about a registered service
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    pub domain: String,
    pub service: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ServiceDescription {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            name: None,
            description: None,
        }
    }
}

struct RegisteredService {
    handler: ServiceHandler,
    description: ServiceDescription,
}

/// Routes service calls to their handlers
///
/// Calls are awaited to completion; a caller that gets `Ok(())` back knows
/// the handler finished.
pub struct ServiceRegistry {
    /// Services indexed by "domain.service"
    services: DashMap<String, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Register (or replace) a service
    #[instrument(skip(self, handler, description), fields(domain = %description.domain, service = %description.service))]
    pub fn register<F, Fut>(&self, description: ServiceDescription, handler: F)
    where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let key = format!("{}.{}", description.domain, description.service);
        debug!("Registering service");

        let handler: ServiceHandler =
            Arc::new(move |call| Box::pin(handler(call)) as ServiceFuture);

        self.services.insert(
            key,
            RegisteredService {
                handler,
                description,
            },
        );
    }

    /// Call a service and wait for its handler to finish
    #[instrument(skip(self, service_data, context))]
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: serde_json::Value,
        context: Context,
    ) -> ServiceResult {
        let key = format!("{}.{}", domain, service);

        let handler = match self.services.get(&key) {
            Some(registered) => registered.handler.clone(),
            None => {
                warn!("Service not found");
                return Err(ServiceError::NotFound {
                    domain: domain.to_string(),
                    service: service.to_string(),
                });
            }
        };

        debug!(data = %service_data, "Calling service");
        handler(ServiceCall::new(domain, service, service_data, context)).await
    }

    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services.contains_key(&format!("{}.{}", domain, service))
    }

    pub fn get_service(&self, domain: &str, service: &str) -> Option<ServiceDescription> {
        self.services
            .get(&format!("{}.{}", domain, service))
            .map(|s| s.description.clone())
    }

    /// Descriptions of every service in `domain`, sorted by service name
    pub fn domain_services(&self, domain: &str) -> Vec<ServiceDescription> {
        let mut services: Vec<_> = self
            .services
            .iter()
            .filter(|s| s.description.domain == domain)
            .map(|s| s.description.clone())
            .collect();
        services.sort_by(|a, b| a.service.cmp(&b.service));
        services
    }

    #[instrument(skip(self))]
    pub fn unregister(&self, domain: &str, service: &str) -> bool {
        let removed = self
            .services
            .remove(&format!("{}.{}", domain, service))
            .is_some();
        if removed {
            debug!("Unregistered service");
        }
        removed
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_register_and_call() {
        let registry = ServiceRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        registry.register(ServiceDescription::new("climate", "set_fan_mode"), move |call| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(call.service_data);
                Ok(())
            }
        });

        registry
            .call("climate", "set_fan_mode", json!({"fan_mode": "low"}), Context::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!({"fan_mode": "low"})]);
    }

    #[tokio::test]
    async fn test_service_not_found() {
        let registry = ServiceRegistry::new();
        let result = registry
            .call("climate", "set_humidity", json!({}), Context::new())
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let registry = ServiceRegistry::new();
        registry.register(ServiceDescription::new("climate", "set_temperature"), |_| async {
            Err(ServiceError::CallFailed("device timeout".to_string()))
        });

        let result = registry
            .call("climate", "set_temperature", json!({}), Context::new())
            .await;
        assert_eq!(
            result,
            Err(ServiceError::CallFailed("device timeout".to_string()))
        );
    }

    #[test]
    fn test_domain_services_and_unregister() {
        let registry = ServiceRegistry::new();
        for service in ["set_swing_mode", "set_hvac_mode"] {
            registry.register(ServiceDescription::new("climate", service), |_| async { Ok(()) });
        }
        registry.register(ServiceDescription::new("light", "turn_on"), |_| async { Ok(()) });

        let names: Vec<_> = registry
            .domain_services("climate")
            .into_iter()
            .map(|d| d.service)
            .collect();
        assert_eq!(names, vec!["set_hvac_mode", "set_swing_mode"]);

        assert!(registry.unregister("climate", "set_hvac_mode"));
        assert!(!registry.has_service("climate", "set_hvac_mode"));
        assert!(!registry.unregister("climate", "set_hvac_mode"));
        assert!(registry.get_service("light", "turn_on").is_some());
    }
}
