//! Interface address management.

use std::net::{IpAddr, Ipv4Addr};

use super::attr::{AttrIter, get};
use super::builder::MessageBuilder;
use super::connection::{Connection, ack_request, dump_request};
use super::error::{Error, Result};
use super::ip::{IpNet, ip_octets};
use super::link::ifindex_to_name;
use super::message::{NLM_F_CREATE, NLM_F_EXCL, NLM_F_REPLACE, NlMsgType};
use super::types::addr::{IfAddrMsg, IfaAttr, IfaCacheinfo};

/// An interface address.
///
/// `ip` is the local address with its prefix length. On a
/// point-to-point link `peer` holds the remote address, which then
/// carries the prefix on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Local address and prefix length.
    pub ip: IpNet,
    /// Peer address for point-to-point links.
    pub peer: Option<IpAddr>,
    /// Broadcast address. For IPv4 prefixes shorter than /31 it is
    /// derived from the local address when unset.
    pub broadcast: Option<IpAddr>,
    /// Address label. Must be the interface name or start with the
    /// interface name followed by a colon.
    pub label: Option<String>,
    /// Address flags (IFA_F_*).
    pub flags: u32,
    /// Address scope (RT_SCOPE_*).
    pub scope: u8,
    /// Preferred lifetime in seconds. Zero means forever.
    pub preferred_lft: u32,
    /// Valid lifetime in seconds. Zero means forever.
    pub valid_lft: u32,
    /// Interface index, filled in when listing.
    pub link_index: u32,
}

impl Address {
    /// Create an address from a local prefix.
    pub fn new(ip: IpNet) -> Self {
        Self {
            ip,
            peer: None,
            broadcast: None,
            label: None,
            flags: 0,
            scope: 0,
            preferred_lft: 0,
            valid_lft: 0,
            link_index: 0,
        }
    }

    /// The broadcast address that will go on the wire: the explicit one
    /// if set, otherwise derived for IPv4 prefixes shorter than /31.
    fn effective_broadcast(&self) -> Option<IpAddr> {
        if self.broadcast.is_some() {
            return self.broadcast;
        }
        match self.ip.addr {
            IpAddr::V4(local) if self.ip.prefix_len < 31 => {
                let mask = if self.ip.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.ip.prefix_len as u32)
                };
                let bits = u32::from(local) | !mask;
                Some(IpAddr::V4(Ipv4Addr::from(bits)))
            }
            _ => None,
        }
    }
}

/// An address label must be the interface name itself or an alias of
/// the form `name:suffix`.
fn label_allowed(label: &str, ifname: &str) -> bool {
    label == ifname || label.starts_with(&format!("{}:", ifname))
}

/// Build the message body for an address add or delete request.
///
/// The label, when set, is checked against the interface name before
/// anything is sent: the kernel rejects mismatched labels with a bare
/// EINVAL, so the check here produces a usable error instead.
fn prepare_addr_req(
    link_index: u32,
    addr: &Address,
    msg_type: u16,
    flags: u16,
) -> Result<MessageBuilder> {
    if let Some(ref label) = addr.label {
        let ifname = ifindex_to_name(link_index)?;
        if !label_allowed(label, &ifname) {
            return Err(Error::InvalidInput(format!(
                "label {:?} must match interface name {:?}",
                label, ifname
            )));
        }
    }

    let family = addr.ip.family();
    let msg = IfAddrMsg {
        ifa_family: family,
        ifa_prefixlen: addr.ip.prefix_len,
        ifa_flags: addr.flags as u8,
        ifa_scope: addr.scope,
        ifa_index: link_index,
    };

    let mut builder = ack_request(msg_type, flags);
    builder.append(&msg);

    builder.append_attr(IfaAttr::Local as u16, &ip_octets(&addr.ip.addr));
    // IFA_ADDRESS is the peer on point-to-point links, otherwise it
    // repeats the local address.
    let address = addr.peer.unwrap_or(addr.ip.addr);
    builder.append_attr(IfaAttr::Address as u16, &ip_octets(&address));

    if msg_type == NlMsgType::RTM_NEWADDR {
        if let Some(broadcast) = addr.effective_broadcast() {
            builder.append_attr(IfaAttr::Broadcast as u16, &ip_octets(&broadcast));
        }
        if let Some(ref label) = addr.label {
            builder.append_attr_str(IfaAttr::Label as u16, label);
        }
        if addr.flags > u8::MAX as u32 {
            builder.append_attr_u32(IfaAttr::Flags as u16, addr.flags);
        }
        if addr.preferred_lft != 0 || addr.valid_lft != 0 {
            let cacheinfo = IfaCacheinfo {
                ifa_prefered: addr.preferred_lft,
                ifa_valid: addr.valid_lft,
                cstamp: 0,
                tstamp: 0,
            };
            builder.append_attr(IfaAttr::Cacheinfo as u16, cacheinfo.as_bytes());
        }
    }

    Ok(builder)
}

/// Decode an RTM_NEWADDR/RTM_DELADDR message payload.
///
/// Point-to-point addresses arrive with IFA_LOCAL as the local side and
/// IFA_ADDRESS as the peer; ordinary addresses carry the same value in
/// both or only IFA_ADDRESS. The two cases are reconciled so `ip` is
/// always the local address.
pub fn deserialize_address(payload: &[u8]) -> Result<Address> {
    let msg = IfAddrMsg::from_bytes(payload)?;

    let mut local = None;
    let mut address = None;
    let mut addr = Address {
        ip: IpNet::zero(msg.ifa_family)?,
        peer: None,
        broadcast: None,
        label: None,
        flags: msg.ifa_flags as u32,
        scope: msg.ifa_scope,
        preferred_lft: 0,
        valid_lft: 0,
        link_index: msg.ifa_index,
    };

    for item in AttrIter::new(&payload[IfAddrMsg::SIZE..]) {
        let (attr_type, data) = item?;
        match IfaAttr::from(attr_type) {
            IfaAttr::Local => local = Some(get::ip_addr(msg.ifa_family, data)?),
            IfaAttr::Address => address = Some(get::ip_addr(msg.ifa_family, data)?),
            IfaAttr::Broadcast => {
                addr.broadcast = Some(get::ip_addr(msg.ifa_family, data)?)
            }
            IfaAttr::Label => addr.label = Some(get::string(data)?.to_owned()),
            IfaAttr::Flags => addr.flags = get::u32_ne(data)?,
            IfaAttr::Cacheinfo => {
                let info = IfaCacheinfo::from_bytes(data)?;
                addr.preferred_lft = info.ifa_prefered;
                addr.valid_lft = info.ifa_valid;
            }
            _ => {}
        }
    }

    match (local, address) {
        (Some(local), Some(address)) if local != address => {
            addr.ip = IpNet::new(local, msg.ifa_prefixlen);
            addr.peer = Some(address);
        }
        (Some(local), _) => addr.ip = IpNet::new(local, msg.ifa_prefixlen),
        (None, Some(address)) => addr.ip = IpNet::new(address, msg.ifa_prefixlen),
        (None, None) => {
            return Err(Error::InvalidMessage(
                "address message without an address".into(),
            ));
        }
    }

    Ok(addr)
}

impl Connection {
    /// Add an address to an interface; fails if it already exists.
    pub async fn addr_add(&self, link_index: u32, addr: &Address) -> Result<()> {
        let builder = prepare_addr_req(
            link_index,
            addr,
            NlMsgType::RTM_NEWADDR,
            NLM_F_CREATE | NLM_F_EXCL,
        )?;
        self.request_ack(builder).await
    }

    /// Add an address, replacing an existing one.
    pub async fn addr_replace(&self, link_index: u32, addr: &Address) -> Result<()> {
        let builder = prepare_addr_req(
            link_index,
            addr,
            NlMsgType::RTM_NEWADDR,
            NLM_F_CREATE | NLM_F_REPLACE,
        )?;
        self.request_ack(builder).await
    }

    /// Remove an address from an interface.
    pub async fn addr_del(&self, link_index: u32, addr: &Address) -> Result<()> {
        let builder = prepare_addr_req(link_index, addr, NlMsgType::RTM_DELADDR, 0)?;
        self.request_ack(builder).await
    }

    /// List addresses, optionally restricted to one interface and one
    /// address family.
    pub async fn addr_list(
        &self,
        link_index: Option<u32>,
        family: Option<u8>,
    ) -> Result<Vec<Address>> {
        let mut builder = dump_request(NlMsgType::RTM_GETADDR);
        let msg = IfAddrMsg {
            ifa_family: family.unwrap_or(libc::AF_UNSPEC as u8),
            ..Default::default()
        };
        builder.append(&msg);

        let mut addrs = Vec::new();
        self.dump_iter(builder, |header, payload| {
            if header.nlmsg_type != NlMsgType::RTM_NEWADDR {
                return Ok(true);
            }
            // A malformed reply aborts the dump, like the route path.
            let addr = deserialize_address(payload)?;
            if let Some(index) = link_index {
                if addr.link_index != index {
                    return Ok(true);
                }
            }
            if let Some(family) = family {
                if addr.ip.family() != family {
                    return Ok(true);
                }
            }
            addrs.push(addr);
            Ok(true)
        })
        .await?;
        Ok(addrs)
    }
}
