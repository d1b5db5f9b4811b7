//! Cached upstream state and attachment lifecycle

use hvac_core::{EntityId, State};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::error::{ProxyError, ProxyResult};
use crate::snapshot::SourceSnapshot;

/// Where a proxy is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, not yet observing the upstream
    Unattached,
    /// Observing the upstream; the snapshot may or may not be present
    Attached,
    /// Torn down; terminal
    Detached,
}

/// Outcome of delivering an upstream notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorUpdate {
    /// The snapshot was replaced; the proxy must be rendered once
    Rerender,
    /// The notification was dropped
    Ignored,
}

/// Holds the latest upstream snapshot for one source entity
///
/// The snapshot is only ever replaced as a whole, so a reader never sees a
/// mix of two upstream updates.
#[derive(Debug)]
pub struct StateMirror {
    source: EntityId,
    lifecycle: Lifecycle,
    snapshot: Option<Arc<SourceSnapshot>>,
}

impl StateMirror {
    pub fn new(source: EntityId) -> Self {
        Self {
            source,
            lifecycle: Lifecycle::Unattached,
            snapshot: None,
        }
    }

    pub fn source(&self) -> &EntityId {
        &self.source
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Latest snapshot, if the upstream has been seen
    pub fn snapshot(&self) -> Option<Arc<SourceSnapshot>> {
        self.snapshot.clone()
    }

    /// Start observing; `initial` is the upstream state read at attach time
    pub fn attach(&mut self, initial: Option<&State>) -> ProxyResult<()> {
        if self.lifecycle != Lifecycle::Unattached {
            return Err(ProxyError::Lifecycle {
                source_entity: self.source.to_string(),
                action: "attach",
                lifecycle: self.lifecycle,
            });
        }

        self.lifecycle = Lifecycle::Attached;
        self.snapshot = self.decode(initial);
        debug!(
            source = %self.source,
            resolved = self.snapshot.is_some(),
            "Attached to source entity"
        );
        Ok(())
    }

    /// Replace the snapshot with a notification's new state
    ///
    /// `None` means the upstream was removed. Notifications arriving before
    /// attach or after detach are ignored.
    pub fn on_upstream_changed(&mut self, new_state: Option<&State>) -> MirrorUpdate {
        if self.lifecycle != Lifecycle::Attached {
            trace!(source = %self.source, lifecycle = ?self.lifecycle, "Ignoring late notification");
            return MirrorUpdate::Ignored;
        }
        if let Some(state) = new_state {
            if state.entity_id != self.source {
                warn!(
                    source = %self.source,
                    received = %state.entity_id,
                    "Ignoring notification for another entity"
                );
                return MirrorUpdate::Ignored;
            }
        }

        self.snapshot = self.decode(new_state);
        trace!(source = %self.source, present = self.snapshot.is_some(), "Source state replaced");
        MirrorUpdate::Rerender
    }

    /// Stop observing; returns false if already detached
    pub fn detach(&mut self) -> bool {
        if self.lifecycle == Lifecycle::Detached {
            return false;
        }
        self.lifecycle = Lifecycle::Detached;
        debug!(source = %self.source, "Detached from source entity");
        true
    }

    fn decode(&self, state: Option<&State>) -> Option<Arc<SourceSnapshot>> {
        state.map(|s| Arc::new(SourceSnapshot::from_state(s)))
    }
}
