//! Availability of a proxy

use hvac_core::{STATE_UNAVAILABLE, STATE_UNKNOWN};

use crate::snapshot::SourceSnapshot;

/// A proxy is available while it holds a snapshot whose state is a real value
pub fn is_available(snapshot: Option<&SourceSnapshot>) -> bool {
    snapshot.is_some_and(|s| s.state_code != STATE_UNAVAILABLE && s.state_code != STATE_UNKNOWN)
}
