//! IP network prefix type shared by the address and route paths.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::error::{Error, Result};

/// An IP address with a prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNet {
    /// Network or host address.
    pub addr: IpAddr,
    /// Prefix length in bits.
    pub prefix_len: u8,
}

impl IpNet {
    /// Create a new prefix. The prefix length is clamped to the family
    /// bit width.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Self {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        Self {
            addr,
            prefix_len: prefix_len.min(max),
        }
    }

    /// Create a host prefix (/32 or /128).
    pub fn host(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self { addr, prefix_len: 32 },
            IpAddr::V6(_) => Self {
                addr,
                prefix_len: 128,
            },
        }
    }

    /// The zero network for a family: `0.0.0.0/0` or `::/0`.
    ///
    /// Routes without an explicit destination (default routes) are
    /// normalized to this.
    pub fn zero(family: u8) -> Result<Self> {
        match family as i32 {
            libc::AF_INET => Ok(Self {
                addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                prefix_len: 0,
            }),
            libc::AF_INET6 => Ok(Self {
                addr: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                prefix_len: 0,
            }),
            _ => Err(Error::InvalidInput(format!(
                "no zero network for family {}",
                family
            ))),
        }
    }

    /// The address family of this prefix.
    pub fn family(&self) -> u8 {
        ip_family(&self.addr)
    }

    /// Raw address bytes in network order.
    pub fn addr_bytes(&self) -> Vec<u8> {
        ip_octets(&self.addr)
    }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl From<IpAddr> for IpNet {
    fn from(addr: IpAddr) -> Self {
        Self::host(addr)
    }
}

/// The netlink address family of an IP address.
pub fn ip_family(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => libc::AF_INET as u8,
        IpAddr::V6(_) => libc::AF_INET6 as u8,
    }
}

/// Raw octets of an IP address in network order.
pub fn ip_octets(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(a) => a.octets().to_vec(),
        IpAddr::V6(a) => a.octets().to_vec(),
    }
}
