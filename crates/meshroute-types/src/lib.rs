//! Value types shared by the meshroute crates.
//!
//! This crate provides type-safe representations of the inputs the route
//! reconciler works on:
//!
//! - [`IpPrefix`]: IP network prefixes (CIDR notation) with masking helpers
//! - [`AddressFamily`]: IPv4/IPv6 discrimination
//! - [`Domain`] and [`Domains`]: validated domain names for dynamic routes
//! - [`Route`]: a static or dynamic route advertised to the routing peer

mod domain;
mod ip;
mod route;

pub use domain::{Domain, Domains};
pub use ip::{AddressFamily, IpPrefix};
pub use route::{ResourceId, Route, RouteId, RouteTarget};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid domain name: {0}")]
    InvalidDomain(String),

    #[error("invalid route id: {0:?}")]
    InvalidRouteId(String),
}
