//! Climate proxy host
//!
//! Loads a YAML configuration, registers simulated upstream thermostats and
//! attaches one proxy per configured `climate` entry, then runs until Ctrl-C.

mod config;
mod demo;
mod error;
mod loader;
mod secrets;

use anyhow::{Context as _, Result};
use clap::Parser;
use climate_proxy::{attach_proxy, ProxyHandle};
use hvac_hub::Hub;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{load_config, LoggingConfig};
use crate::demo::DemoThermostat;

#[derive(Parser)]
#[command(name = "climate-proxyd")]
#[command(author, version, about = "Runs single-setpoint climate proxies for dual-setpoint thermostats")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(default_value = "configuration.yaml")]
    config: PathBuf,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(logging.level())
            .with_context(|| format!("invalid log level '{}'", logging.level()))?,
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let path = args.config;

    let config = load_config(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    init_tracing(&config.logging)?;

    info!("Starting climate proxy host");
    let hub = Hub::new();

    for demo in &config.demo {
        let thermostat = DemoThermostat::new(demo);
        hub.climate.add_entity(Arc::new(thermostat));
        info!(entity_id = %demo.entity_id, dual_setpoint = demo.dual_setpoint, "Added demo thermostat");
    }

    let mut handles: Vec<ProxyHandle> = Vec::new();
    for proxy in config.proxies()? {
        let handle = attach_proxy(&hub, &proxy)
            .with_context(|| format!("failed to attach proxy for {}", proxy.source_entity))?;
        if !handle.proxy().available() {
            warn!(source = %proxy.source_entity, "Proxy source is not available yet");
        }
        handles.push(handle);
    }

    info!(
        entities = hub.climate.entity_ids().len(),
        proxies = handles.len(),
        "Climate proxy host is running"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    for handle in handles {
        handle.detach();
    }

    Ok(())
}
