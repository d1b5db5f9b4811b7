//! Translation between the presented and the upstream setpoint shapes
//!
//! Reading collapses whatever the upstream reports into one presented
//! temperature. Writing expands a single requested temperature into the
//! setpoints the upstream expects in the effective mode, filling the side
//! the caller did not mention from the cached snapshot.

use hvac_core::climate::{DEFAULT_MAX_TEMP, DEFAULT_MIN_TEMP};
use hvac_core::{HvacMode, TemperatureRequest};
use tracing::trace;

use crate::config::ProxyVariant;
use crate::snapshot::SourceSnapshot;

/// Half of the spread synthesised when a range mode has no cached setpoint
const DEFAULT_HALF_SPREAD: f64 = 2.0;

/// The single temperature the proxy presents
pub fn presented_temperature(snapshot: &SourceSnapshot) -> Option<f64> {
    if let Some(temperature) = snapshot.temperature {
        return Some(temperature);
    }

    let low = snapshot.target_temp_low;
    let high = snapshot.target_temp_high;
    match snapshot.hvac_mode() {
        HvacMode::Heat => low.or(high),
        HvacMode::Cool | HvacMode::Dry => high.or(low),
        mode if mode.is_dual_setpoint() => match (low, high) {
            (Some(low), Some(high)) => Some((low + high) / 2.0),
            (low, high) => low.or(high),
        },
        _ => None,
    }
}

/// Build the upstream `set_temperature` data for a request
///
/// The result is sent as a single command. A requested mode is carried
/// along unchanged.
pub fn translate(
    request: &TemperatureRequest,
    snapshot: Option<&SourceSnapshot>,
    variant: ProxyVariant,
) -> TemperatureRequest {
    let mut command = TemperatureRequest {
        hvac_mode: request.hvac_mode,
        ..TemperatureRequest::default()
    };

    if request.has_range() {
        command.target_temp_low = request.target_temp_low;
        command.target_temp_high = request.target_temp_high;
        return command;
    }

    let Some(t) = request.temperature else {
        return command;
    };

    if variant.checks_source_range() && !snapshot.is_some_and(SourceSnapshot::supports_range) {
        command.temperature = Some(t);
        return command;
    }

    let mode = request
        .hvac_mode
        .or_else(|| snapshot.map(SourceSnapshot::hvac_mode))
        .unwrap_or(HvacMode::Off);
    let cached_low = snapshot.and_then(|s| s.target_temp_low);
    let cached_high = snapshot.and_then(|s| s.target_temp_high);

    match mode {
        HvacMode::Heat => {
            let current_high = cached_high.unwrap_or_else(|| {
                snapshot.map_or(DEFAULT_MAX_TEMP, SourceSnapshot::max_temp_or_default)
            });
            command.target_temp_low = Some(t);
            if t > current_high {
                command.target_temp_high = Some(t);
            } else if variant.sends_complete_pair() {
                command.target_temp_high = Some(current_high);
            }
        }
        HvacMode::Cool | HvacMode::Dry => {
            let current_low = cached_low.unwrap_or_else(|| {
                snapshot.map_or(DEFAULT_MIN_TEMP, SourceSnapshot::min_temp_or_default)
            });
            command.target_temp_high = Some(t);
            if t < current_low {
                command.target_temp_low = Some(t);
            } else if variant.sends_complete_pair() {
                command.target_temp_low = Some(current_low);
            }
        }
        mode if mode.is_dual_setpoint() => {
            let current_low = cached_low.unwrap_or(t - DEFAULT_HALF_SPREAD);
            let current_high = cached_high.unwrap_or(t + DEFAULT_HALF_SPREAD);
            let half_spread = (current_high - current_low) / 2.0;
            command.target_temp_low = Some(t - half_spread);
            command.target_temp_high = Some(t + half_spread);
        }
        _ => command.temperature = Some(t),
    }

    trace!(?mode, requested = t, ?command, "Translated set_temperature");
    command
}
