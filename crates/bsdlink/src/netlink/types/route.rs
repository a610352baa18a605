//! Route message types.

use crate::netlink::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Route message (struct rtmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    /// Address family.
    pub rtm_family: u8,
    /// Destination prefix length.
    pub rtm_dst_len: u8,
    /// Source prefix length.
    pub rtm_src_len: u8,
    /// TOS filter.
    pub rtm_tos: u8,
    /// Routing table ID.
    pub rtm_table: u8,
    /// Routing protocol (RTPROT_*).
    pub rtm_protocol: u8,
    /// Route scope (RT_SCOPE_*).
    pub rtm_scope: u8,
    /// Route type (RTN_*).
    pub rtm_type: u8,
    /// Route flags.
    pub rtm_flags: u32,
}

impl RtMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new route message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            })
    }
}

/// Multipath nexthop header (struct rtnexthop).
///
/// A RTA_MULTIPATH payload is a run of these, each immediately followed
/// by that hop's own attributes, with `rtnh_len` covering both.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtNexthop {
    /// Length of this hop including nested attributes.
    pub rtnh_len: u16,
    /// Hop flags (RTNH_F_*).
    pub rtnh_flags: u8,
    /// Hop weight minus one.
    pub rtnh_hops: u8,
    /// Output interface index.
    pub rtnh_ifindex: i32,
}

impl RtNexthop {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            })
    }
}

/// Route attributes (RTA_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RtaAttr {
    Unspec = 0,
    Dst = 1,
    Src = 2,
    Iif = 3,
    Oif = 4,
    Gateway = 5,
    Priority = 6,
    Prefsrc = 7,
    Metrics = 8,
    Multipath = 9,
    Flow = 11,
    Cacheinfo = 12,
    Table = 15,
    Mark = 16,
    Via = 18,
    Newdst = 19,
    Pref = 20,
    EncapType = 21,
    Encap = 22,
    Expires = 23,
    Pad = 24,
    Uid = 25,
    TtlPropagate = 26,
    IpProto = 27,
    Sport = 28,
    Dport = 29,
    NhId = 30,
}

impl From<u16> for RtaAttr {
    fn from(val: u16) -> Self {
        match val {
            1 => Self::Dst,
            2 => Self::Src,
            3 => Self::Iif,
            4 => Self::Oif,
            5 => Self::Gateway,
            6 => Self::Priority,
            7 => Self::Prefsrc,
            8 => Self::Metrics,
            9 => Self::Multipath,
            11 => Self::Flow,
            12 => Self::Cacheinfo,
            15 => Self::Table,
            16 => Self::Mark,
            18 => Self::Via,
            19 => Self::Newdst,
            20 => Self::Pref,
            21 => Self::EncapType,
            22 => Self::Encap,
            23 => Self::Expires,
            24 => Self::Pad,
            25 => Self::Uid,
            26 => Self::TtlPropagate,
            27 => Self::IpProto,
            28 => Self::Sport,
            29 => Self::Dport,
            30 => Self::NhId,
            _ => Self::Unspec,
        }
    }
}

/// Route types (RTN_*).
pub mod rtn {
    pub const UNSPEC: u8 = 0;
    pub const UNICAST: u8 = 1;
    pub const LOCAL: u8 = 2;
    pub const BROADCAST: u8 = 3;
    pub const ANYCAST: u8 = 4;
    pub const MULTICAST: u8 = 5;
    pub const BLACKHOLE: u8 = 6;
    pub const UNREACHABLE: u8 = 7;
    pub const PROHIBIT: u8 = 8;
    pub const THROW: u8 = 9;
    pub const NAT: u8 = 10;
}

/// Route protocols (RTPROT_*).
pub mod rtprot {
    pub const UNSPEC: u8 = 0;
    pub const REDIRECT: u8 = 1;
    pub const KERNEL: u8 = 2;
    pub const BOOT: u8 = 3;
    pub const STATIC: u8 = 4;
    pub const RA: u8 = 9;
    pub const ZEBRA: u8 = 11;
    pub const BIRD: u8 = 12;
    pub const DHCP: u8 = 16;
    pub const BGP: u8 = 186;
    pub const OSPF: u8 = 188;
    pub const RIP: u8 = 189;
}

/// Route scope (RT_SCOPE_*).
pub mod rt_scope {
    pub const UNIVERSE: u8 = 0;
    pub const SITE: u8 = 200;
    pub const LINK: u8 = 253;
    pub const HOST: u8 = 254;
    pub const NOWHERE: u8 = 255;
}

/// Route table IDs.
pub mod rt_table {
    pub const UNSPEC: u32 = 0;
    pub const COMPAT: u32 = 252;
    pub const DEFAULT: u32 = 253;
    pub const MAIN: u32 = 254;
    pub const LOCAL: u32 = 255;
}

/// Route flags (RTM_F_*).
pub mod rtm_flags {
    pub const NOTIFY: u32 = 0x100;
    pub const CLONED: u32 = 0x200;
    pub const EQUALIZE: u32 = 0x400;
    pub const PREFIX: u32 = 0x800;
    pub const LOOKUP_TABLE: u32 = 0x1000;
    pub const FIB_MATCH: u32 = 0x2000;
    pub const OFFLOAD: u32 = 0x4000;
    pub const TRAP: u32 = 0x8000;
}

/// Route metrics attributes (RTAX_*).
pub mod rtax {
    pub const LOCK: u16 = 1;
    pub const MTU: u16 = 2;
    pub const WINDOW: u16 = 3;
    pub const RTT: u16 = 4;
    pub const RTTVAR: u16 = 5;
    pub const SSTHRESH: u16 = 6;
    pub const CWND: u16 = 7;
    pub const ADVMSS: u16 = 8;
    pub const REORDERING: u16 = 9;
    pub const HOPLIMIT: u16 = 10;
    pub const INITCWND: u16 = 11;
    pub const FEATURES: u16 = 12;
    pub const RTO_MIN: u16 = 13;
    pub const INITRWND: u16 = 14;
    pub const QUICKACK: u16 = 15;
    pub const CC_ALGO: u16 = 16;
    pub const FASTOPEN_NO_COOKIE: u16 = 17;
}

/// Nexthop flags (RTNH_F_*).
pub mod rtnh_flags {
    pub const DEAD: u8 = 1;
    pub const PERVASIVE: u8 = 2;
    pub const ONLINK: u8 = 4;
    pub const OFFLOAD: u8 = 8;
    pub const LINKDOWN: u8 = 16;
    pub const UNRESOLVED: u8 = 32;
    pub const TRAP: u8 = 64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtmsg_size() {
        assert_eq!(RtMsg::SIZE, 12);
    }

    #[test]
    fn test_rtnexthop_size() {
        assert_eq!(RtNexthop::SIZE, 8);
    }

    #[test]
    fn test_rtmsg_roundtrip() {
        let msg = RtMsg {
            rtm_family: libc::AF_INET as u8,
            rtm_dst_len: 24,
            rtm_table: rt_table::MAIN as u8,
            rtm_protocol: rtprot::BOOT,
            rtm_type: rtn::UNICAST,
            rtm_flags: rtm_flags::CLONED,
            ..Default::default()
        };
        let parsed = RtMsg::from_bytes(msg.as_bytes()).unwrap();
        assert_eq!(parsed.rtm_dst_len, 24);
        assert_eq!(parsed.rtm_flags, rtm_flags::CLONED);
    }

    #[test]
    fn test_rtmsg_truncated() {
        assert!(RtMsg::from_bytes(&[0u8; 4]).is_err());
    }
}
