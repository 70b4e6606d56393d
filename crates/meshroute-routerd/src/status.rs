//! Local peer status mirror.

use std::collections::HashMap;

use meshroute_types::ResourceId;
use parking_lot::RwLock;

/// Sink for the routes this peer serves, as shown to the user.
///
/// Purely observational: calls cannot fail.
pub trait StatusRecorder: Send + Sync {
    fn add_local_peer_state_route(&self, route: &str, resource_id: Option<&ResourceId>);

    fn remove_local_peer_state_route(&self, route: &str);

    fn clean_local_peer_state_routes(&self);
}

/// In-memory [`StatusRecorder`] keyed by the route's display string.
#[derive(Debug, Default)]
pub struct LocalPeerStatus {
    routes: RwLock<HashMap<String, Option<ResourceId>>>,
}

impl LocalPeerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the display strings of all served routes, sorted.
    pub fn local_routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.routes.read().keys().cloned().collect();
        routes.sort();
        routes
    }

    /// Returns the resource a served route was reported with.
    pub fn resource_id(&self, route: &str) -> Option<ResourceId> {
        self.routes.read().get(route).cloned().flatten()
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }
}

impl StatusRecorder for LocalPeerStatus {
    fn add_local_peer_state_route(&self, route: &str, resource_id: Option<&ResourceId>) {
        self.routes
            .write()
            .insert(route.to_string(), resource_id.cloned());
    }

    fn remove_local_peer_state_route(&self, route: &str) {
        self.routes.write().remove(route);
    }

    fn clean_local_peer_state_routes(&self) {
        self.routes.write().clear();
    }
}
