//! Tunnel interface the routed traffic arrives on.

use meshroute_types::IpPrefix;

/// The mesh tunnel interface.
///
/// The reconciler only holds it to tie lifetimes together; firewall backends
/// use the name to scope their rules.
pub trait TunnelIface: Send + Sync {
    fn name(&self) -> &str;

    /// The overlay address of this peer, if assigned.
    fn address(&self) -> Option<IpPrefix>;
}

/// A [`TunnelIface`] with fixed name and address, as read from configuration.
#[derive(Debug, Clone)]
pub struct StaticTunnelIface {
    name: String,
    address: Option<IpPrefix>,
}

impl StaticTunnelIface {
    pub fn new(name: impl Into<String>, address: Option<IpPrefix>) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

impl TunnelIface for StaticTunnelIface {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Option<IpPrefix> {
        self.address
    }
}
