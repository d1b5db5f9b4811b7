//! Capability projection
//!
//! The proxy never advertises the upstream's own temperature flags. It
//! decides between a single setpoint and a range from the current mode, and
//! passes every other upstream flag through untouched.

use hvac_core::{ClimateEntityFeature, HvacMode};

use crate::config::ProxyVariant;
use crate::snapshot::SourceSnapshot;

/// Flags the proxy advertises for the given snapshot
///
/// Whenever a snapshot exists exactly one of `TARGET_TEMPERATURE` and
/// `TARGET_TEMPERATURE_RANGE` is set.
pub fn project_features(
    snapshot: Option<&SourceSnapshot>,
    variant: ProxyVariant,
) -> ClimateEntityFeature {
    let Some(snapshot) = snapshot else {
        return ClimateEntityFeature::empty();
    };

    let mut features = snapshot.supported_features;
    features.remove(
        ClimateEntityFeature::TARGET_TEMPERATURE | ClimateEntityFeature::TARGET_TEMPERATURE_RANGE,
    );

    if presents_range(snapshot, variant) {
        features.insert(ClimateEntityFeature::TARGET_TEMPERATURE_RANGE);
    } else {
        features.insert(ClimateEntityFeature::TARGET_TEMPERATURE);
    }
    features
}

fn presents_range(snapshot: &SourceSnapshot, variant: ProxyVariant) -> bool {
    match snapshot.hvac_mode() {
        mode if mode.is_dual_setpoint() => true,
        HvacMode::Off if variant.range_when_off() => snapshot
            .supported_hvac_modes()
            .contains(&HvacMode::HeatCool),
        _ => false,
    }
}
