//! Routes advertised to a peer acting as a routing gateway.

use crate::{Domains, IpPrefix, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque, unique route identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteId(String);

impl RouteId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RouteId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseError::InvalidRouteId(s.to_string()));
        }
        Ok(RouteId(s.to_string()))
    }
}

impl TryFrom<String> for RouteId {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RouteId> for String {
    fn from(id: RouteId) -> Self {
        id.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the network resource a route belongs to. Only used when
/// reporting status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        ResourceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a route points: a concrete prefix or a list of domains that are
/// resolved elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteTarget {
    Static(IpPrefix),
    Dynamic(Domains),
}

/// A route as delivered by the control plane.
///
/// Routes are immutable values; two routes are equal only when every field
/// matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub id: RouteId,
    /// Human readable network identifier.
    pub net_id: String,
    pub description: String,
    pub target: RouteTarget,
    /// Whether traffic to this route is source-NATed.
    pub masquerade: bool,
    pub resource_id: Option<ResourceId>,
}

impl Route {
    /// Creates a static route for `network`.
    pub fn new_static(id: RouteId, network: IpPrefix, masquerade: bool) -> Self {
        Self {
            net_id: id.to_string(),
            id,
            description: String::new(),
            target: RouteTarget::Static(network),
            masquerade,
            resource_id: None,
        }
    }

    /// Creates a dynamic route resolved from `domains`.
    pub fn new_dynamic(id: RouteId, domains: Domains, masquerade: bool) -> Self {
        Self {
            net_id: id.to_string(),
            id,
            description: String::new(),
            target: RouteTarget::Dynamic(domains),
            masquerade,
            resource_id: None,
        }
    }

    pub fn with_resource_id(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.target, RouteTarget::Dynamic(_))
    }

    /// Returns the concrete prefix of a static route.
    pub fn network(&self) -> Option<&IpPrefix> {
        match &self.target {
            RouteTarget::Static(prefix) => Some(prefix),
            RouteTarget::Dynamic(_) => None,
        }
    }

    /// Returns the domains of a dynamic route.
    pub fn domains(&self) -> Option<&Domains> {
        match &self.target {
            RouteTarget::Static(_) => None,
            RouteTarget::Dynamic(domains) => Some(domains),
        }
    }

    /// Display form used for status reporting: the prefix as configured for
    /// static routes, the joined domain list for dynamic ones.
    pub fn display_string(&self) -> String {
        match &self.target {
            RouteTarget::Static(prefix) => prefix.to_string(),
            RouteTarget::Dynamic(domains) => domains.safe_string(),
        }
    }
}
