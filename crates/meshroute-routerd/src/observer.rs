//! Structured events emitted by the reconciler.
//!
//! Failures the reconciler absorbs instead of returning are reported here, so
//! callers and tests can see them without scraping logs.

use meshroute_types::RouteId;
use tracing::{debug, error, info, warn};

/// Something the reconciler did or failed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    RouteAdded {
        route_id: RouteId,
        display: String,
    },
    RouteRemoved {
        route_id: RouteId,
        display: String,
    },
    /// Installing a route failed; it stays unapplied and is retried next cycle.
    AddFailed {
        route_id: RouteId,
        error: String,
    },
    /// Removing a route failed; it was evicted from the applied set anyway.
    RemoveFailed {
        route_id: RouteId,
        error: String,
    },
    RoutingToggled {
        enabled: bool,
    },
    RoutingToggleFailed {
        enabled: bool,
        error: String,
    },
    CleanupRemoveFailed {
        route_id: RouteId,
        error: String,
    },
    CleanupComplete {
        removed: usize,
        failed: usize,
    },
}

impl ReconcileEvent {
    /// Returns true for events describing a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ReconcileEvent::AddFailed { .. }
                | ReconcileEvent::RemoveFailed { .. }
                | ReconcileEvent::RoutingToggleFailed { .. }
                | ReconcileEvent::CleanupRemoveFailed { .. }
        )
    }
}

/// Receives [`ReconcileEvent`]s. Called while the reconciler holds its lock,
/// so implementations must not block.
pub trait ReconcilerObserver: Send + Sync {
    fn on_event(&self, event: &ReconcileEvent);
}

/// Default observer: writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ReconcilerObserver for TracingObserver {
    fn on_event(&self, event: &ReconcileEvent) {
        match event {
            ReconcileEvent::RouteAdded {
                route_id,
                display: route,
            } => {
                info!(route_id = %route_id, route = %route, "Route added to server network");
            }
            ReconcileEvent::RouteRemoved {
                route_id,
                display: route,
            } => {
                info!(route_id = %route_id, route = %route, "Route removed from server network");
            }
            ReconcileEvent::AddFailed { route_id, error } => {
                error!(route_id = %route_id, error = %error, "Unable to add route to server network");
            }
            ReconcileEvent::RemoveFailed { route_id, error } => {
                error!(route_id = %route_id, error = %error, "Unable to remove route from server network");
            }
            ReconcileEvent::RoutingToggled { enabled } => {
                debug!(enabled, "Routing toggled");
            }
            ReconcileEvent::RoutingToggleFailed { enabled, error } => {
                error!(enabled, error = %error, "Failed to toggle routing");
            }
            ReconcileEvent::CleanupRemoveFailed { route_id, error } => {
                warn!(route_id = %route_id, error = %error, "Failed to remove route during cleanup");
            }
            ReconcileEvent::CleanupComplete { removed, failed } => {
                info!(removed, failed, "Server routes cleaned up");
            }
        }
    }
}
