//! Climate setpoint proxy
//!
//! A [`ProxyClimate`] mirrors one upstream climate entity and presents it
//! with a mode-dependent capability surface: a single target temperature in
//! heat, cool, dry and fan-only modes, and a low/high range in heat_cool and
//! auto. Temperature commands are translated between the two shapes before
//! they are forwarded upstream; every other command is forwarded verbatim.
//!
//! The engine is split the way the data flows:
//!
//! - [`mirror`] caches the latest upstream snapshot and tracks attachment
//! - [`features`] projects the advertised `supported_features`
//! - [`translator`] derives the presented temperature and builds upstream
//!   temperature commands
//! - [`forwarder`] sends commands to the upstream entity
//! - [`availability`] decides whether the proxy is available
//!
//! [`hub`] wires a proxy into an [`hvac_hub::Hub`]; [`config_flow`] creates
//! proxies interactively.

pub mod availability;
pub mod config;
pub mod config_flow;
mod entity;
mod error;
pub mod features;
pub mod forwarder;
pub mod hub;
pub mod mirror;
mod snapshot;
pub mod translator;

pub use config::{ProxyConfig, ProxyVariant};
pub use entity::ProxyClimate;
pub use error::{ProxyError, ProxyResult};
pub use forwarder::{CommandForwarder, SourceProvider};
pub use config_flow::{ConfigEntries, ConfigEntry, FlowResult, ProxyConfigFlow};
pub use hub::{attach_entry, attach_proxy, HubProvider, ProxyHandle};
pub use mirror::{Lifecycle, MirrorUpdate, StateMirror};
pub use snapshot::SourceSnapshot;
