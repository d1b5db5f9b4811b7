//! Error types for the climate proxy

use hvac_core::EntityIdError;
use hvac_hub::ServiceError;
use thiserror::Error;

use crate::mirror::Lifecycle;

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors surfaced by a proxy
///
/// An unresolved source or an unparsable mode is never an error: both are
/// absorbed into the projected view.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A lifecycle hook was called out of order
    #[error("cannot {action} proxy of {source_entity} while {lifecycle:?}")]
    Lifecycle {
        source_entity: String,
        action: &'static str,
        lifecycle: Lifecycle,
    },

    /// The upstream entity rejected or failed a forwarded command
    #[error("upstream {source_entity} failed climate.{service}: {error}")]
    Upstream {
        source_entity: String,
        service: &'static str,
        #[source]
        error: ServiceError,
    },

    /// Configuration could not be turned into a proxy
    #[error("invalid proxy configuration: {0}")]
    Config(String),

    #[error(transparent)]
    InvalidEntityId(#[from] EntityIdError),
}

impl From<ProxyError> for ServiceError {
    fn from(err: ProxyError) -> Self {
        ServiceError::CallFailed(err.to_string())
    }
}
