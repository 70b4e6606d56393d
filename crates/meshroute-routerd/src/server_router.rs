//! ServerRouter - converges installed NAT rules to the advertised routes

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use meshroute_common::{RouteMgrError, RouteMgrResult};
use meshroute_types::{Route, RouteId};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::diff::diff_routes;
use crate::firewall::Firewall;
use crate::iface::TunnelIface;
use crate::observer::{ReconcileEvent, ReconcilerObserver, TracingObserver};
use crate::router_pair::route_to_router_pair;
use crate::status::StatusRecorder;

/// Counters kept alongside the applied set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub cycles: u64,
    pub rules_added: u64,
    pub rules_removed: u64,
    pub failures: u64,
}

#[derive(Default)]
struct RouterState {
    /// Routes whose NAT rules are installed, by id
    routes: HashMap<RouteId, Route>,
    stats: ReconcilerStats,
}

/// Server-side route reconciler.
///
/// Every firewall-affecting call of the per-route operations runs inside one
/// critical section together with the applied-set and status update. A whole
/// [`update_routes`](Self::update_routes) cycle is not atomic: other callers
/// may interleave between its per-route steps.
pub struct ServerRouter {
    state: Mutex<RouterState>,
    cancel: CancellationToken,
    iface: Arc<dyn TunnelIface>,
    firewall: Arc<dyn Firewall>,
    status: Arc<dyn StatusRecorder>,
    observer: Arc<dyn ReconcilerObserver>,
}

impl ServerRouter {
    /// Create a new ServerRouter with an empty applied set
    pub fn new(
        cancel: CancellationToken,
        iface: Arc<dyn TunnelIface>,
        firewall: Arc<dyn Firewall>,
        status: Arc<dyn StatusRecorder>,
    ) -> Self {
        info!("Server router created for interface {}", iface.name());

        Self {
            state: Mutex::new(RouterState::default()),
            cancel,
            iface,
            firewall,
            status,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default logging observer
    pub fn with_observer(mut self, observer: Arc<dyn ReconcilerObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Snapshot of the applied set
    pub async fn applied_routes(&self) -> HashMap<RouteId, Route> {
        self.state.lock().await.routes.clone()
    }

    pub async fn stats(&self) -> ReconcilerStats {
        self.state.lock().await.stats
    }

    /// Converge installed rules to `desired`, the complete target state.
    ///
    /// Stale and changed routes are removed first, then routing is enabled
    /// (non-empty set) or disabled (empty set), then missing routes are
    /// added. Only a routing toggle failure is returned; per-route failures
    /// are reported to the observer and retried on the next call.
    #[instrument(skip(self, desired), fields(iface = self.iface.name(), desired = desired.len()))]
    pub async fn update_routes(&self, desired: &HashMap<RouteId, Route>) -> RouteMgrResult<()> {
        let applied = {
            let mut state = self.state.lock().await;
            state.stats.cycles += 1;
            state.routes.clone()
        };
        let diff = diff_routes(&applied, desired);
        if diff.is_empty() {
            debug!("Applied routes already match the desired set");
        }

        for route_id in &diff.to_remove {
            let Some(old) = applied.get(route_id) else {
                continue;
            };
            if let Err(e) = self.remove_from_server_network(old).await {
                self.observer.on_event(&ReconcileEvent::RemoveFailed {
                    route_id: route_id.clone(),
                    error: e.to_string(),
                });
                // A cancelled removal never reached the firewall; keep the
                // entry so clean_up still removes its rule.
                let mut state = self.state.lock().await;
                if !e.is_cancelled() && state.routes.get(route_id) == Some(old) {
                    state.routes.remove(route_id);
                }
                state.stats.failures += 1;
            }
        }

        // Adding needs forwarding on; disabling waits until nothing is
        // routed through it any more.
        let enabled = !desired.is_empty();
        let toggled = if enabled {
            self.firewall.enable_routing().await
        } else {
            self.firewall.disable_routing().await
        };
        if let Err(e) = toggled {
            self.observer.on_event(&ReconcileEvent::RoutingToggleFailed {
                enabled,
                error: e.to_string(),
            });
            let action = if enabled { "enable" } else { "disable" };
            return Err(RouteMgrError::routing_toggle(action, e));
        }
        self.observer
            .on_event(&ReconcileEvent::RoutingToggled { enabled });

        let present: HashSet<RouteId> = self.state.lock().await.routes.keys().cloned().collect();
        for route_id in &diff.to_add {
            if present.contains(route_id) {
                continue;
            }
            let Some(route) = desired.get(route_id) else {
                continue;
            };
            if let Err(e) = self.add_to_server_network(route).await {
                self.observer.on_event(&ReconcileEvent::AddFailed {
                    route_id: route_id.clone(),
                    error: e.to_string(),
                });
                self.state.lock().await.stats.failures += 1;
            }
        }

        Ok(())
    }

    /// Install the NAT rule for `route` and record it as applied.
    #[instrument(skip(self, route), fields(route_id = %route.id))]
    pub async fn add_to_server_network(&self, route: &Route) -> RouteMgrResult<()> {
        if self.cancel.is_cancelled() {
            info!("Not adding to server network because context is done");
            return Err(RouteMgrError::Cancelled);
        }

        let mut state = self.state.lock().await;

        let pair = route_to_router_pair(route)?;
        self.firewall.add_nat_rule(&pair).await?;

        state.routes.insert(route.id.clone(), route.clone());
        state.stats.rules_added += 1;

        let display = route.display_string();
        self.status
            .add_local_peer_state_route(&display, route.resource_id.as_ref());
        self.observer.on_event(&ReconcileEvent::RouteAdded {
            route_id: route.id.clone(),
            display,
        });

        Ok(())
    }

    /// Remove the NAT rule for `route` and drop it from the applied set.
    #[instrument(skip(self, route), fields(route_id = %route.id))]
    pub async fn remove_from_server_network(&self, route: &Route) -> RouteMgrResult<()> {
        if self.cancel.is_cancelled() {
            info!("Not removing from server network because context is done");
            return Err(RouteMgrError::Cancelled);
        }

        let mut state = self.state.lock().await;

        let pair = route_to_router_pair(route)?;
        self.firewall.remove_nat_rule(&pair).await?;

        state.routes.remove(&route.id);
        state.stats.rules_removed += 1;

        let display = route.display_string();
        self.status.remove_local_peer_state_route(&display);
        self.observer.on_event(&ReconcileEvent::RouteRemoved {
            route_id: route.id.clone(),
            display,
        });

        Ok(())
    }

    /// Remove every installed rule and wipe the applied set and status
    /// mirror. Individual removal failures do not stop the wipe.
    #[instrument(skip(self))]
    pub async fn clean_up(&self) {
        let mut state = self.state.lock().await;

        let mut routes: Vec<Route> = std::mem::take(&mut state.routes).into_values().collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut failed = 0;
        for route in &routes {
            let result = match route_to_router_pair(route) {
                Ok(pair) => self.firewall.remove_nat_rule(&pair).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failed += 1;
                self.observer.on_event(&ReconcileEvent::CleanupRemoveFailed {
                    route_id: route.id.clone(),
                    error: e.to_string(),
                });
            }
        }

        let removed = routes.len() - failed;
        state.stats.rules_removed += removed as u64;
        state.stats.failures += failed as u64;

        self.status.clean_local_peer_state_routes();
        self.observer
            .on_event(&ReconcileEvent::CleanupComplete { removed, failed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::StaticTunnelIface;
    use crate::router_pair::RouterPair;
    use crate::status::LocalPeerStatus;
    use async_trait::async_trait;
    use meshroute_types::{Domain, Domains, ResourceId};
    use parking_lot::Mutex as SyncMutex;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Enable,
        Disable,
        Add(RouterPair),
        Remove(RouterPair),
    }

    #[derive(Default)]
    struct MockFirewall {
        calls: SyncMutex<Vec<Call>>,
        fail_add: SyncMutex<HashSet<String>>,
        fail_remove: SyncMutex<HashSet<String>>,
        fail_toggle: SyncMutex<bool>,
    }

    impl MockFirewall {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn clear(&self) {
            self.calls.lock().clear();
        }

        fn nat_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Add(_) | Call::Remove(_)))
                .collect()
        }
    }

    #[async_trait]
    impl Firewall for MockFirewall {
        async fn enable_routing(&self) -> RouteMgrResult<()> {
            self.calls.lock().push(Call::Enable);
            if *self.fail_toggle.lock() {
                return Err(RouteMgrError::firewall("enable routing", "sysctl denied"));
            }
            Ok(())
        }

        async fn disable_routing(&self) -> RouteMgrResult<()> {
            self.calls.lock().push(Call::Disable);
            if *self.fail_toggle.lock() {
                return Err(RouteMgrError::firewall("disable routing", "sysctl denied"));
            }
            Ok(())
        }

        async fn add_nat_rule(&self, pair: &RouterPair) -> RouteMgrResult<()> {
            self.calls.lock().push(Call::Add(pair.clone()));
            if self.fail_add.lock().contains(pair.id.as_str()) {
                return Err(RouteMgrError::firewall("add nat rule", "rejected"));
            }
            Ok(())
        }

        async fn remove_nat_rule(&self, pair: &RouterPair) -> RouteMgrResult<()> {
            self.calls.lock().push(Call::Remove(pair.clone()));
            if self.fail_remove.lock().contains(pair.id.as_str()) {
                return Err(RouteMgrError::firewall("remove nat rule", "rejected"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: SyncMutex<Vec<ReconcileEvent>>,
    }

    impl RecordingObserver {
        fn failures(&self) -> Vec<ReconcileEvent> {
            self.events
                .lock()
                .iter()
                .filter(|e| e.is_failure())
                .cloned()
                .collect()
        }
    }

    impl ReconcilerObserver for RecordingObserver {
        fn on_event(&self, event: &ReconcileEvent) {
            self.events.lock().push(event.clone());
        }
    }

    struct Harness {
        router: ServerRouter,
        firewall: Arc<MockFirewall>,
        status: Arc<LocalPeerStatus>,
        observer: Arc<RecordingObserver>,
        cancel: CancellationToken,
    }

    fn harness() -> Harness {
        let firewall = Arc::new(MockFirewall::default());
        let status = Arc::new(LocalPeerStatus::new());
        let observer = Arc::new(RecordingObserver::default());
        let cancel = CancellationToken::new();
        let router = ServerRouter::new(
            cancel.clone(),
            Arc::new(StaticTunnelIface::new("wt0", None)),
            firewall.clone(),
            status.clone(),
        )
        .with_observer(observer.clone());
        Harness {
            router,
            firewall,
            status,
            observer,
            cancel,
        }
    }

    fn static_route(id: &str, network: &str, masquerade: bool) -> Route {
        Route::new_static(id.parse().unwrap(), network.parse().unwrap(), masquerade)
    }

    fn routes(list: &[Route]) -> HashMap<RouteId, Route> {
        list.iter().map(|r| (r.id.clone(), r.clone())).collect()
    }

    fn pair(id: &str, destination: &str, masquerade: bool) -> RouterPair {
        RouterPair {
            id: id.parse().unwrap(),
            source: "0.0.0.0/0".parse().unwrap(),
            destination: destination.parse().unwrap(),
            masquerade,
        }
    }

    #[tokio::test]
    async fn test_add_then_remove_all() {
        let h = harness();
        let a = static_route("A", "10.0.0.0/24", true);

        h.router.update_routes(&routes(&[a.clone()])).await.unwrap();

        assert_eq!(
            h.firewall.calls(),
            vec![Call::Enable, Call::Add(pair("A", "10.0.0.0/24", true))]
        );
        assert_eq!(h.status.local_routes(), vec!["10.0.0.0/24".to_string()]);
        assert_eq!(h.router.applied_routes().await, routes(&[a]));

        h.firewall.clear();
        h.router.update_routes(&HashMap::new()).await.unwrap();

        assert_eq!(
            h.firewall.calls(),
            vec![Call::Remove(pair("A", "10.0.0.0/24", true)), Call::Disable]
        );
        assert_eq!(h.status.route_count(), 0);
        assert!(h.router.applied_routes().await.is_empty());
    }

    #[tokio::test]
    async fn test_idempotent_update() {
        let h = harness();
        let desired = routes(&[
            static_route("a", "10.0.0.0/24", true),
            static_route("b", "10.1.0.0/16", false),
        ]);

        h.router.update_routes(&desired).await.unwrap();
        h.firewall.clear();
        h.router.update_routes(&desired).await.unwrap();

        assert!(h.firewall.nat_calls().is_empty());
        assert_eq!(h.router.applied_routes().await, desired);
        assert_eq!(h.router.stats().await.cycles, 2);
        assert_eq!(h.router.stats().await.rules_added, 2);
    }

    #[tokio::test]
    async fn test_changed_route_removed_then_added() {
        let h = harness();
        let old = static_route("a", "10.0.0.0/24", true);
        let new = static_route("a", "10.0.0.0/24", false);

        h.router.update_routes(&routes(&[old])).await.unwrap();
        h.firewall.clear();
        h.router.update_routes(&routes(&[new.clone()])).await.unwrap();

        assert_eq!(
            h.firewall.calls(),
            vec![
                Call::Remove(pair("a", "10.0.0.0/24", true)),
                Call::Enable,
                Call::Add(pair("a", "10.0.0.0/24", false)),
            ]
        );
        assert_eq!(h.router.applied_routes().await, routes(&[new]));
    }

    #[tokio::test]
    async fn test_partial_add_failure_isolated() {
        let h = harness();
        h.firewall.fail_add.lock().insert("b".to_string());
        let desired = routes(&[
            static_route("a", "10.0.0.0/24", true),
            static_route("b", "10.1.0.0/24", true),
            static_route("c", "10.2.0.0/24", true),
        ]);

        h.router.update_routes(&desired).await.unwrap();

        let applied = h.router.applied_routes().await;
        assert_eq!(applied.len(), 2);
        assert!(!applied.contains_key(&"b".parse::<RouteId>().unwrap()));
        assert_eq!(
            h.observer.failures(),
            vec![ReconcileEvent::AddFailed {
                route_id: "b".parse().unwrap(),
                error: "Firewall operation failed: add nat rule: rejected".to_string(),
            }]
        );

        // the failed route is retried on the next cycle
        h.firewall.fail_add.lock().clear();
        h.firewall.clear();
        h.router.update_routes(&desired).await.unwrap();
        assert_eq!(
            h.firewall.nat_calls(),
            vec![Call::Add(pair("b", "10.1.0.0/24", true))]
        );
        assert_eq!(h.router.applied_routes().await, desired);
    }

    #[tokio::test]
    async fn test_failed_removal_still_evicted() {
        let h = harness();
        h.router
            .update_routes(&routes(&[static_route("a", "10.0.0.0/24", true)]))
            .await
            .unwrap();
        h.firewall.fail_remove.lock().insert("a".to_string());

        h.router.update_routes(&HashMap::new()).await.unwrap();

        assert!(h.router.applied_routes().await.is_empty());
        assert!(h.firewall.calls().contains(&Call::Disable));
        assert_eq!(h.observer.failures().len(), 1);
        assert_eq!(h.router.stats().await.failures, 1);
    }

    #[tokio::test]
    async fn test_toggle_failure_aborts_cycle() {
        let h = harness();
        *h.firewall.fail_toggle.lock() = true;

        let err = h
            .router
            .update_routes(&routes(&[static_route("a", "10.0.0.0/24", true)]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RouteMgrError::RoutingToggle {
                action: "enable",
                ..
            }
        ));
        assert_eq!(h.firewall.calls(), vec![Call::Enable]);
        assert!(h.router.applied_routes().await.is_empty());
    }

    #[tokio::test]
    async fn test_disable_failure_after_removals() {
        let h = harness();
        h.router
            .update_routes(&routes(&[static_route("a", "10.0.0.0/24", true)]))
            .await
            .unwrap();
        *h.firewall.fail_toggle.lock() = true;

        let err = h.router.update_routes(&HashMap::new()).await.unwrap_err();
        assert!(matches!(
            err,
            RouteMgrError::RoutingToggle {
                action: "disable",
                ..
            }
        ));
        // removals happened before the toggle
        assert!(h.router.applied_routes().await.is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_route_status_uses_domains() {
        let h = harness();
        let domains: Domains = ["example.com", "example.org"]
            .iter()
            .map(|d| d.parse::<Domain>().unwrap())
            .collect();
        let route = Route::new_dynamic("dyn".parse().unwrap(), domains, true)
            .with_resource_id(ResourceId::new("res-9"));

        h.router.update_routes(&routes(&[route])).await.unwrap();

        assert_eq!(
            h.firewall.nat_calls(),
            vec![Call::Add(pair("dyn", "0.0.0.0/0", true))]
        );
        assert_eq!(
            h.status.local_routes(),
            vec!["example.com, example.org".to_string()]
        );
        assert_eq!(
            h.status.resource_id("example.com, example.org"),
            Some(ResourceId::new("res-9"))
        );
    }

    #[tokio::test]
    async fn test_ipv6_route_not_applied() {
        let h = harness();
        let desired = routes(&[
            static_route("v4", "10.0.0.0/24", true),
            static_route("v6", "2001:db8::/32", true),
        ]);

        h.router.update_routes(&desired).await.unwrap();

        assert_eq!(h.router.applied_routes().await.len(), 1);
        assert_eq!(h.firewall.nat_calls().len(), 1);
        assert_eq!(h.observer.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_fast() {
        let h = harness();
        let route = static_route("a", "10.0.0.0/24", true);
        h.cancel.cancel();

        let err = h.router.add_to_server_network(&route).await.unwrap_err();
        assert!(err.is_cancelled());
        let err = h.router.remove_from_server_network(&route).await.unwrap_err();
        assert!(err.is_cancelled());

        assert!(h.firewall.calls().is_empty());
        assert!(h.router.applied_routes().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_cycle_counts_every_failure() {
        let h = harness();
        h.router
            .update_routes(&routes(&[static_route("a", "10.0.0.0/24", true)]))
            .await
            .unwrap();
        h.cancel.cancel();

        // "a" is refused for removal, "b" for addition
        h.router
            .update_routes(&routes(&[static_route("b", "10.1.0.0/24", true)]))
            .await
            .unwrap();

        assert_eq!(h.router.stats().await.failures, 2);
        assert_eq!(h.observer.failures().len(), 2);
        // the refused removal stays applied for clean_up
        assert!(h
            .router
            .applied_routes()
            .await
            .contains_key(&"a".parse::<RouteId>().unwrap()));
    }

    #[tokio::test]
    async fn test_clean_up_drains_despite_failures() {
        let h = harness();
        h.router
            .update_routes(&routes(&[
                static_route("a", "10.0.0.0/24", true),
                static_route("b", "10.1.0.0/24", true),
            ]))
            .await
            .unwrap();
        h.firewall.fail_remove.lock().insert("a".to_string());
        h.firewall.clear();

        h.router.clean_up().await;

        assert_eq!(h.firewall.nat_calls().len(), 2);
        assert!(h.router.applied_routes().await.is_empty());
        assert_eq!(h.status.route_count(), 0);
        assert_eq!(
            h.observer.events.lock().last(),
            Some(&ReconcileEvent::CleanupComplete {
                removed: 1,
                failed: 1
            })
        );
    }

    #[tokio::test]
    async fn test_clean_up_ignores_cancellation() {
        let h = harness();
        h.router
            .update_routes(&routes(&[static_route("a", "10.0.0.0/24", true)]))
            .await
            .unwrap();
        h.cancel.cancel();

        h.router.clean_up().await;

        assert!(h.router.applied_routes().await.is_empty());
        assert!(h.firewall.calls().contains(&Call::Remove(pair(
            "a",
            "10.0.0.0/24",
            true
        ))));
    }
}
