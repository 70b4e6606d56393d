//! Desired route set read from a JSON file.

use std::collections::HashMap;
use std::path::Path;

use meshroute_common::{RouteMgrError, RouteMgrResult};
use meshroute_types::{Domain, Domains, IpPrefix, ResourceId, Route, RouteId, RouteTarget};
use serde::{Deserialize, Serialize};

/// One route as written in the route file.
///
/// Exactly one of `network` and `domains` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    pub id: RouteId,
    #[serde(default)]
    pub net_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub network: Option<IpPrefix>,
    #[serde(default)]
    pub domains: Option<Vec<Domain>>,
    #[serde(default)]
    pub masquerade: bool,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
}

impl TryFrom<RouteSpec> for Route {
    type Error = RouteMgrError;

    fn try_from(spec: RouteSpec) -> Result<Self, Self::Error> {
        let target = match (spec.network, spec.domains) {
            (Some(network), None) => RouteTarget::Static(network),
            (None, Some(domains)) if !domains.is_empty() => {
                RouteTarget::Dynamic(Domains::new(domains))
            }
            (None, Some(_)) => {
                return Err(RouteMgrError::invalid_route(spec.id, "domain list is empty"))
            }
            (Some(_), Some(_)) => {
                return Err(RouteMgrError::invalid_route(
                    spec.id,
                    "network and domains are mutually exclusive",
                ))
            }
            (None, None) => {
                return Err(RouteMgrError::invalid_route(
                    spec.id,
                    "either network or domains is required",
                ))
            }
        };

        Ok(Route {
            net_id: spec.net_id.unwrap_or_else(|| spec.id.to_string()),
            id: spec.id,
            description: spec.description,
            target,
            masquerade: spec.masquerade,
            resource_id: spec.resource_id,
        })
    }
}

/// Parse a JSON array of [`RouteSpec`]s into a desired route set.
///
/// Duplicate ids are rejected rather than silently collapsed.
pub fn parse_routes(json: &str) -> RouteMgrResult<HashMap<RouteId, Route>> {
    let specs: Vec<RouteSpec> = serde_json::from_str(json)
        .map_err(|e| RouteMgrError::invalid_config("routes", e.to_string()))?;

    let mut routes = HashMap::with_capacity(specs.len());
    for spec in specs {
        let route = Route::try_from(spec)?;
        if routes.contains_key(&route.id) {
            return Err(RouteMgrError::invalid_config(
                "routes",
                format!("duplicate route id {}", route.id),
            ));
        }
        routes.insert(route.id.clone(), route);
    }
    Ok(routes)
}

/// Read and parse the route file at `path`.
pub async fn load_routes(path: &Path) -> RouteMgrResult<HashMap<RouteId, Route>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RouteMgrError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    parse_routes(&content)
}
