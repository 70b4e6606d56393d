//! IP prefix types with safe parsing and masking.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// The address family of an IP address or prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Returns the maximum prefix length for this family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// Returns the family of the given address.
    pub const fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("ipv4"),
            AddressFamily::V6 => f.write_str("ipv6"),
        }
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
///
/// The address is stored as given; use [`IpPrefix::masked`] to clear the
/// host bits.
///
/// # Examples
///
/// ```
/// use meshroute_types::IpPrefix;
///
/// let prefix: IpPrefix = "10.0.0.7/24".parse().unwrap();
/// assert_eq!(prefix.to_string(), "10.0.0.7/24");
/// assert_eq!(prefix.masked().to_string(), "10.0.0.0/24");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddr,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a new IP prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is invalid for the address type
    /// (>32 for IPv4, >128 for IPv6).
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = AddressFamily::of(&address).max_prefix_len();

        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for address type",
                prefix_len, max_len
            )));
        }

        Ok(IpPrefix {
            address,
            prefix_len,
        })
    }

    /// Returns the "any address" prefix for a family (0.0.0.0/0 or ::/0).
    pub const fn unspecified(family: AddressFamily) -> Self {
        let address = match family {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        IpPrefix {
            address,
            prefix_len: 0,
        }
    }

    /// Returns the address this prefix was built from.
    pub const fn address(&self) -> &IpAddr {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the address family of this prefix.
    pub const fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.address)
    }

    /// Returns the prefix with all host bits cleared.
    pub fn masked(&self) -> Self {
        let address = match self.address {
            IpAddr::V4(addr) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(u32::from(addr) & mask))
            }
            IpAddr::V6(addr) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(u128::from(addr) & mask))
            }
        };
        IpPrefix {
            address,
            prefix_len: self.prefix_len,
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddr = addr_str
            .parse()
            .map_err(|_| ParseError::InvalidIpAddress(addr_str.to_string()))?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> Self {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ip_prefix_parse() {
        let prefix: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert_eq!(prefix.family(), AddressFamily::V4);
        assert_eq!(prefix.prefix_len(), 24);
        assert_eq!(prefix.family(), AddressFamily::V4);

        let v6_prefix: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert_eq!(v6_prefix.family(), AddressFamily::V6);
        assert_eq!(v6_prefix.prefix_len(), 32);
    }

    #[test]
    fn test_unspecified() {
        let v4 = IpPrefix::unspecified(AddressFamily::V4);
        assert_eq!(v4.to_string(), "0.0.0.0/0");
        assert_eq!(v4.prefix_len(), 0);

        let v6 = IpPrefix::unspecified(AddressFamily::V6);
        assert_eq!(v6.to_string(), "::/0");
        assert_eq!(v6.prefix_len(), 0);
    }

    #[test]
    fn test_masked() {
        let prefix: IpPrefix = "192.168.17.42/20".parse().unwrap();
        assert_eq!(prefix.masked().to_string(), "192.168.16.0/20");

        let host: IpPrefix = "10.1.2.3/32".parse().unwrap();
        assert_eq!(host.masked(), host);

        let any: IpPrefix = "10.1.2.3/0".parse().unwrap();
        assert_eq!(any.masked().to_string(), "0.0.0.0/0");

        let v6: IpPrefix = "2001:db8:abcd::1/48".parse().unwrap();
        assert_eq!(v6.masked().to_string(), "2001:db8:abcd::/48");
    }

    #[test]
    fn test_invalid_prefix() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
        assert_eq!(
            "10.0.0.x/8".parse::<IpPrefix>(),
            Err(ParseError::InvalidIpAddress("10.0.0.x".to_string()))
        );
    }

    #[test]
    fn test_serde_as_string() {
        let prefix: IpPrefix = serde_json::from_str("\"172.16.0.0/12\"").unwrap();
        assert_eq!(prefix.prefix_len(), 12);
        assert_eq!(serde_json::to_string(&prefix).unwrap(), "\"172.16.0.0/12\"");
        assert!(serde_json::from_str::<IpPrefix>("\"bogus\"").is_err());
    }
}
