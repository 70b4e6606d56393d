//! Route to NAT rule translation.

use meshroute_common::{RouteMgrError, RouteMgrResult};
use meshroute_types::{AddressFamily, IpPrefix, Route, RouteId, RouteTarget};
use std::fmt;

/// One NAT rule instruction for the firewall.
///
/// Derived from a [`Route`] on every add/remove and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouterPair {
    pub id: RouteId,
    pub source: IpPrefix,
    pub destination: IpPrefix,
    pub masquerade: bool,
}

impl fmt::Display for RouterPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} (masquerade={})",
            self.id, self.source, self.destination, self.masquerade
        )
    }
}

/// Returns the "any address" prefix of the same family as `prefix`.
pub fn default_prefix(prefix: &IpPrefix) -> IpPrefix {
    IpPrefix::unspecified(prefix.family())
}

/// Translates a route into the NAT pair installed for it.
///
/// Static routes use their network with host bits cleared. Dynamic routes
/// are not resolved here, so their destination is the IPv4 "any address"
/// placeholder. The source is always "any address" of the destination's
/// family.
///
/// # Errors
///
/// IPv6 static routes are rejected with
/// [`RouteMgrError::UnsupportedAddressFamily`].
pub fn route_to_router_pair(route: &Route) -> RouteMgrResult<RouterPair> {
    let destination = match &route.target {
        RouteTarget::Static(network) => {
            if network.family() != AddressFamily::V4 {
                return Err(RouteMgrError::UnsupportedAddressFamily {
                    route_id: route.id.clone(),
                    family: network.family(),
                });
            }
            network.masked()
        }
        // TODO: install an IPv6 pair alongside once dual-stack NAT lands
        RouteTarget::Dynamic(_) => IpPrefix::unspecified(AddressFamily::V4),
    };

    Ok(RouterPair {
        id: route.id.clone(),
        source: default_prefix(&destination),
        destination,
        masquerade: route.masquerade,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshroute_types::{Domain, Domains};
    use pretty_assertions::assert_eq;

    fn static_route(id: &str, network: &str, masquerade: bool) -> Route {
        Route::new_static(id.parse().unwrap(), network.parse().unwrap(), masquerade)
    }

    #[test]
    fn test_static_route_is_masked() {
        let pair = route_to_router_pair(&static_route("a", "10.0.0.77/24", true)).unwrap();
        assert_eq!(pair.id.as_str(), "a");
        assert_eq!(pair.source.to_string(), "0.0.0.0/0");
        assert_eq!(pair.destination.to_string(), "10.0.0.0/24");
        assert!(pair.masquerade);
    }

    #[test]
    fn test_masquerade_copied() {
        let pair = route_to_router_pair(&static_route("a", "192.168.1.0/24", false)).unwrap();
        assert!(!pair.masquerade);
    }

    #[test]
    fn test_dynamic_route_uses_any_address() {
        let domains: Domains = ["example.com", "example.net"]
            .iter()
            .map(|d| d.parse::<Domain>().unwrap())
            .collect();
        let route = Route::new_dynamic("dyn".parse().unwrap(), domains, true);

        let pair = route_to_router_pair(&route).unwrap();
        assert_eq!(pair.destination.to_string(), "0.0.0.0/0");
        assert_eq!(pair.source.to_string(), "0.0.0.0/0");

        let empty = Route::new_dynamic("dyn2".parse().unwrap(), Domains::default(), false);
        assert_eq!(
            route_to_router_pair(&empty).unwrap().destination,
            pair.destination
        );
    }

    #[test]
    fn test_ipv6_rejected() {
        let err = route_to_router_pair(&static_route("v6", "2001:db8::/32", true)).unwrap_err();
        assert!(matches!(
            err,
            RouteMgrError::UnsupportedAddressFamily {
                family: AddressFamily::V6,
                ..
            }
        ));
    }

    #[test]
    fn test_default_prefix() {
        assert_eq!(
            default_prefix(&"10.1.0.0/16".parse().unwrap()).to_string(),
            "0.0.0.0/0"
        );
        assert_eq!(
            default_prefix(&"fd00::/8".parse().unwrap()).to_string(),
            "::/0"
        );
    }

    #[test]
    fn test_display() {
        let pair = route_to_router_pair(&static_route("a", "10.0.0.0/8", true)).unwrap();
        assert_eq!(pair.to_string(), "a: 0.0.0.0/0 -> 10.0.0.0/8 (masquerade=true)");
    }
}
