//! Server-side route reconciliation for a mesh routing peer.
//!
//! [`ServerRouter`] holds the routes currently installed on this host and
//! converges them to the desired set delivered by the control plane, driving
//! a [`Firewall`] for NAT/forwarding rules and a [`StatusRecorder`] for the
//! observable status mirror.

mod commands;
mod config;
mod diff;
mod firewall;
mod iface;
mod observer;
mod router_pair;
mod route_source;
mod server_router;
mod status;

pub use commands::*;
pub use config::{InterfaceConfig, RouterdConfig, DEFAULT_CONFIG_PATH, DEFAULT_ROUTES_PATH};
pub use diff::{diff_routes, RouteDiff};
pub use firewall::{Firewall, IptablesFirewall};
pub use iface::{StaticTunnelIface, TunnelIface};
pub use observer::{ReconcileEvent, ReconcilerObserver, TracingObserver};
pub use router_pair::{default_prefix, route_to_router_pair, RouterPair};
pub use route_source::{load_routes, parse_routes, RouteSpec};
pub use server_router::{ReconcilerStats, ServerRouter};
pub use status::{LocalPeerStatus, StatusRecorder};
