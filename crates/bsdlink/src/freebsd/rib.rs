//! Native FreeBSD routing table access.
//!
//! Reads a snapshot of the routing information base through the
//! `route(4)` sysctl interface and translates it into the shared
//! [`Route`] model. The wire format is a run of `rt_msghdr` records,
//! each followed by the sockaddrs selected by its `rtm_addrs` bitmask.
//!
//! Parsing is platform independent so it can be tested anywhere; only
//! the sysctl snapshot itself is FreeBSD specific.

use std::net::{IpAddr, Ipv4Addr};

use tracing::debug;

use crate::netlink::error::{Error, Result};
use crate::netlink::ip::IpNet;
use crate::netlink::route::{Destination, Route};
use crate::netlink::types::route::{rt_table, rtn};

/// Size of `struct rt_msghdr` on 64-bit FreeBSD.
const RT_MSGHDR_LEN: usize = 152;

/// Routing message version this parser understands.
const RTM_VERSION: u8 = 5;

// rtm_addrs bit positions, lowest bit first in the sockaddr run.
const RTAX_DST: usize = 0;
const RTAX_GATEWAY: usize = 1;
const RTAX_NETMASK: usize = 2;
const RTAX_MAX: usize = 8;

// rtm_flags bits.
const RTF_HOST: i32 = 0x4;

/// Sockaddrs in a routing message are padded to long alignment.
fn sa_roundup(len: usize) -> usize {
    if len == 0 { 8 } else { (len + 7) & !7 }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_ne_bytes([data[offset], data[offset + 1]])
}

fn read_i32(data: &[u8], offset: usize) -> i32 {
    i32::from_ne_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// An IPv4 address pulled out of a sockaddr_in, or `None` when the
/// sockaddr belongs to another family (interface routes carry AF_LINK
/// gateways).
fn sockaddr_in_addr(sa: &[u8]) -> Option<Ipv4Addr> {
    if sa.len() < 8 || sa[1] as i32 != libc::AF_INET {
        return None;
    }
    Some(Ipv4Addr::new(sa[4], sa[5], sa[6], sa[7]))
}

/// Netmask sockaddrs are routinely truncated to their significant
/// bytes; anything past `sa_len` reads as zero.
fn netmask_prefix(sa: &[u8]) -> u8 {
    let sa_len = sa[0] as usize;
    let mut octets = [0u8; 4];
    for i in 4..sa_len.min(8) {
        octets[i - 4] = sa[i];
    }
    u32::from_be_bytes(octets).leading_ones() as u8
}

/// Parse one record's sockaddr run into per-slot slices.
fn split_sockaddrs<'a>(mut data: &'a [u8], addrs: i32) -> Vec<Option<&'a [u8]>> {
    let mut slots = vec![None; RTAX_MAX];
    for (bit, slot) in slots.iter_mut().enumerate() {
        if addrs & (1 << bit) == 0 {
            continue;
        }
        if data.is_empty() {
            break;
        }
        let sa_len = data[0] as usize;
        // A zero sa_len still carries the length byte itself.
        *slot = Some(&data[..sa_len.max(1).min(data.len())]);
        let consumed = sa_roundup(sa_len).min(data.len());
        data = &data[consumed..];
    }
    slots
}

/// Parse a `NET_RT_DUMP` snapshot into routes.
///
/// Only IPv4 unicast entries are translated. Records with an unknown
/// message version or a non-IPv4 destination are skipped, not errors;
/// a snapshot is allowed to contain things this layer does not model.
pub fn parse_rib(buf: &[u8]) -> Result<Vec<Route>> {
    let mut routes = Vec::new();
    let mut offset = 0;

    while offset + RT_MSGHDR_LEN <= buf.len() {
        let record = &buf[offset..];
        let msglen = read_u16(record, 0) as usize;
        if msglen < RT_MSGHDR_LEN || offset + msglen > buf.len() {
            return Err(Error::InvalidMessage(format!(
                "rt_msghdr length {} exceeds snapshot",
                msglen
            )));
        }
        let record = &buf[offset..offset + msglen];
        offset += msglen;

        if record[2] != RTM_VERSION {
            debug!(version = record[2], "skipping rt_msghdr with unknown version");
            continue;
        }

        let index = read_u16(record, 4) as u32;
        let flags = read_i32(record, 8);
        let addrs = read_i32(record, 12);

        let slots = split_sockaddrs(&record[RT_MSGHDR_LEN..], addrs);

        let Some(dst_sa) = slots[RTAX_DST] else {
            continue;
        };
        let Some(dst) = sockaddr_in_addr(dst_sa) else {
            continue;
        };

        let prefix_len = if flags & RTF_HOST != 0 {
            32
        } else {
            slots[RTAX_NETMASK].map(netmask_prefix).unwrap_or(32)
        };

        let gw = slots[RTAX_GATEWAY]
            .and_then(sockaddr_in_addr)
            .map(IpAddr::V4);

        routes.push(Route {
            family: libc::AF_INET as u8,
            dst: Some(Destination::Ip(IpNet::new(IpAddr::V4(dst), prefix_len))),
            gw,
            oif: index,
            table: rt_table::MAIN,
            rtype: rtn::UNICAST,
            ..Default::default()
        });
    }

    Ok(routes)
}

/// Fill in missing source addresses from the configured interface
/// addresses: the first IPv4 address on a route's output interface.
///
/// The RIB does not record a preferred source, so this is the same
/// best-effort answer the resolver would give.
pub fn recover_src(routes: &mut [Route], addrs: &[(u32, Ipv4Addr)]) {
    for route in routes {
        if route.src.is_some() || route.oif == 0 {
            continue;
        }
        route.src = addrs
            .iter()
            .find(|(index, _)| *index == route.oif)
            .map(|(_, addr)| IpAddr::V4(*addr));
    }
}

/// Fetch an IPv4 `NET_RT_DUMP` snapshot of the routing table.
#[cfg(target_os = "freebsd")]
pub fn fetch_rib() -> Result<Vec<u8>> {
    let mut mib: [libc::c_int; 6] = [
        libc::CTL_NET,
        libc::PF_ROUTE,
        0,
        libc::AF_INET,
        libc::NET_RT_DUMP,
        0,
    ];

    let mut len: libc::size_t = 0;
    // SAFETY: mib is a valid 6-element MIB; passing a null buffer asks
    // the kernel for the required size.
    let ret = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            std::ptr::null_mut(),
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if ret != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let mut buf = vec![0u8; len];
    // SAFETY: buf has the capacity the kernel just reported; the table
    // can shrink between calls, in which case len comes back smaller.
    let ret = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            buf.as_mut_ptr() as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if ret != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    buf.truncate(len);
    Ok(buf)
}

/// Interface index and IPv4 address pairs from getifaddrs.
#[cfg(target_os = "freebsd")]
fn interface_addrs() -> Result<Vec<(u32, Ipv4Addr)>> {
    use std::ffi::CStr;

    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: getifaddrs allocates the list; it is freed below.
    if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let mut addrs = Vec::new();
    let mut cursor = ifap;
    while !cursor.is_null() {
        // SAFETY: cursor walks the list getifaddrs returned.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_addr.is_null() {
            continue;
        }
        // SAFETY: ifa_addr is valid for the lifetime of the list.
        let family = unsafe { (*entry.ifa_addr).sa_family };
        if family as i32 != libc::AF_INET {
            continue;
        }
        // SAFETY: AF_INET entries point at a sockaddr_in.
        let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
        let addr = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));

        // SAFETY: ifa_name is a NUL-terminated interface name.
        let name = unsafe { CStr::from_ptr(entry.ifa_name) };
        let index = match name.to_str() {
            Ok(name) => crate::netlink::link::ifname_to_index(name).unwrap_or(0),
            Err(_) => 0,
        };
        if index != 0 {
            addrs.push((index, addr));
        }
    }
    // SAFETY: ifap came from getifaddrs above.
    unsafe { libc::freeifaddrs(ifap) };

    Ok(addrs)
}

/// List IPv4 routes from the native RIB.
///
/// List-only; mutation goes through the netlink connection.
#[cfg(target_os = "freebsd")]
pub fn route_list() -> Result<Vec<Route>> {
    let snapshot = fetch_rib()?;
    let mut routes = parse_rib(&snapshot)?;
    recover_src(&mut routes, &interface_addrs()?);
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sockaddr_in(addr: Ipv4Addr) -> Vec<u8> {
        let mut sa = vec![0u8; 16];
        sa[0] = 16;
        sa[1] = libc::AF_INET as u8;
        sa[4..8].copy_from_slice(&addr.octets());
        sa
    }

    fn record(index: u16, flags: i32, sockaddrs: &[Vec<u8>], addrs_mask: i32) -> Vec<u8> {
        let mut buf = vec![0u8; RT_MSGHDR_LEN];
        buf[2] = RTM_VERSION;
        buf[3] = 4; // RTM_GET, what NET_RT_DUMP emits
        buf[4..6].copy_from_slice(&index.to_ne_bytes());
        buf[8..12].copy_from_slice(&flags.to_ne_bytes());
        buf[12..16].copy_from_slice(&addrs_mask.to_ne_bytes());
        for sa in sockaddrs {
            let mut padded = sa.clone();
            padded.resize(sa_roundup(sa.len().max(sa[0] as usize)), 0);
            buf.extend_from_slice(&padded);
        }
        let len = buf.len() as u16;
        buf[0..2].copy_from_slice(&len.to_ne_bytes());
        buf
    }

    #[test]
    fn test_parse_network_route() {
        let buf = record(
            2,
            0,
            &[
                sockaddr_in("10.0.0.0".parse().unwrap()),
                sockaddr_in("192.0.2.1".parse().unwrap()),
                sockaddr_in("255.0.0.0".parse().unwrap()),
            ],
            (1 << RTAX_DST) | (1 << RTAX_GATEWAY) | (1 << RTAX_NETMASK),
        );

        let routes = parse_rib(&buf).unwrap();
        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        assert_eq!(
            route.dst,
            Some(Destination::Ip(IpNet::new("10.0.0.0".parse().unwrap(), 8)))
        );
        assert_eq!(route.gw, Some("192.0.2.1".parse().unwrap()));
        assert_eq!(route.oif, 2);
        assert_eq!(route.table, rt_table::MAIN);
    }

    #[test]
    fn test_host_route_gets_full_prefix() {
        let buf = record(
            1,
            RTF_HOST,
            &[sockaddr_in("10.0.0.5".parse().unwrap())],
            1 << RTAX_DST,
        );

        let routes = parse_rib(&buf).unwrap();
        assert_eq!(
            routes[0].dst,
            Some(Destination::Ip(IpNet::new("10.0.0.5".parse().unwrap(), 32)))
        );
    }

    #[test]
    fn test_truncated_netmask_sockaddr() {
        // Netmask truncated after its first significant byte: sa_len 5,
        // one mask byte, meaning 255.0.0.0.
        let mut mask = vec![0u8; 5];
        mask[0] = 5;
        mask[4] = 0xff;

        let buf = record(
            2,
            0,
            &[sockaddr_in("10.0.0.0".parse().unwrap()), mask],
            (1 << RTAX_DST) | (1 << RTAX_NETMASK),
        );

        let routes = parse_rib(&buf).unwrap();
        assert_eq!(
            routes[0].dst,
            Some(Destination::Ip(IpNet::new("10.0.0.0".parse().unwrap(), 8)))
        );
    }

    #[test]
    fn test_default_route_zero_length_netmask() {
        let mut mask = vec![0u8; 1];
        mask[0] = 0;

        let buf = record(
            2,
            0,
            &[
                sockaddr_in("0.0.0.0".parse().unwrap()),
                sockaddr_in("192.0.2.1".parse().unwrap()),
                mask,
            ],
            (1 << RTAX_DST) | (1 << RTAX_GATEWAY) | (1 << RTAX_NETMASK),
        );

        let routes = parse_rib(&buf).unwrap();
        assert_eq!(
            routes[0].dst,
            Some(Destination::Ip(IpNet::new("0.0.0.0".parse().unwrap(), 0)))
        );
    }

    #[test]
    fn test_non_inet_records_skipped() {
        // AF_LINK destination, as interface routes have.
        let mut link_sa = vec![0u8; 16];
        link_sa[0] = 16;
        link_sa[1] = 18; // AF_LINK

        let mut buf = record(3, 0, &[link_sa], 1 << RTAX_DST);
        buf.extend_from_slice(&record(
            2,
            RTF_HOST,
            &[sockaddr_in("10.0.0.5".parse().unwrap())],
            1 << RTAX_DST,
        ));

        let routes = parse_rib(&buf).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].oif, 2);
    }

    #[test]
    fn test_unknown_version_skipped() {
        let mut buf = record(
            2,
            RTF_HOST,
            &[sockaddr_in("10.0.0.5".parse().unwrap())],
            1 << RTAX_DST,
        );
        buf[2] = 3; // ancient version
        assert!(parse_rib(&buf).unwrap().is_empty());
    }

    #[test]
    fn test_bad_length_is_error() {
        let mut buf = record(
            2,
            RTF_HOST,
            &[sockaddr_in("10.0.0.5".parse().unwrap())],
            1 << RTAX_DST,
        );
        buf[0..2].copy_from_slice(&4096u16.to_ne_bytes());
        assert!(parse_rib(&buf).is_err());
    }

    #[test]
    fn test_recover_src() {
        let mut routes = parse_rib(&record(
            2,
            RTF_HOST,
            &[sockaddr_in("10.0.0.5".parse().unwrap())],
            1 << RTAX_DST,
        ))
        .unwrap();

        recover_src(
            &mut routes,
            &[
                (1, "127.0.0.1".parse().unwrap()),
                (2, "10.0.0.1".parse().unwrap()),
            ],
        );
        assert_eq!(routes[0].src, Some("10.0.0.1".parse().unwrap()));
    }
}
