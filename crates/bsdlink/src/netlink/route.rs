//! Route management over the netlink route family.
//!
//! The data model mirrors rtnetlink: a [`Route`] is the rtmsg header
//! fields plus the RTA_* attributes, with multipath hops, metrics and
//! MPLS encapsulation as typed sub-structures. [`Connection`] methods
//! map one to one onto RTM_NEWROUTE/RTM_DELROUTE/RTM_GETROUTE with the
//! flag combinations the kernel distinguishes them by.

use std::net::IpAddr;

use super::attr::{AttrIter, get, push_attr};
use super::builder::MessageBuilder;
use super::connection::{Connection, ack_request, dump_request};
use super::error::{Error, Result};
use super::filter::route_matches;
use super::ip::{IpNet, ip_family, ip_octets};
use super::link::ifname_to_index;
use super::message::{NLM_F_APPEND, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REPLACE, NLM_F_REQUEST, NlMsgType};
use super::mpls::{MplsDestination, MplsEncap};
use super::types::mpls::{AF_MPLS, MPLS_DST_LEN};
use super::types::route::{
    RtMsg, RtNexthop, RtaAttr, rt_table, rtax, rtm_flags, rtn, rtprot,
};

/// A route destination: an IP prefix or an MPLS label stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// IP prefix.
    Ip(IpNet),
    /// MPLS label stack.
    Mpls(MplsDestination),
}

impl Destination {
    /// The address family this destination selects.
    pub fn family(&self) -> u8 {
        match self {
            Self::Ip(net) => net.family(),
            Self::Mpls(_) => AF_MPLS,
        }
    }

    /// The prefix length carried in rtm_dst_len.
    pub fn prefix_len(&self) -> u8 {
        match self {
            Self::Ip(net) => net.prefix_len,
            Self::Mpls(_) => MPLS_DST_LEN,
        }
    }

    /// Encode the RTA_DST payload.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Ip(net) => net.addr_bytes(),
            Self::Mpls(dst) => dst.encode(),
        }
    }
}

impl From<IpNet> for Destination {
    fn from(net: IpNet) -> Self {
        Self::Ip(net)
    }
}

impl From<IpAddr> for Destination {
    fn from(addr: IpAddr) -> Self {
        Self::Ip(IpNet::host(addr))
    }
}

/// A gateway in a different family than the route itself (RTA_VIA).
///
/// Used for IP routes over an MPLS path and MPLS routes over an IP
/// nexthop. The wire form is the address family as a native-endian u16
/// followed by the raw address bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Via {
    /// Gateway address.
    pub addr: IpAddr,
}

impl Via {
    /// Encode the RTA_VIA payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = (ip_family(&self.addr) as u16).to_ne_bytes().to_vec();
        buf.extend_from_slice(&ip_octets(&self.addr));
        buf
    }

    /// Decode from an RTA_VIA payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(Error::InvalidAttribute("truncated RTA_VIA".into()));
        }
        let family = u16::from_ne_bytes([data[0], data[1]]) as u8;
        let addr = get::ip_addr(family, &data[2..])?;
        Ok(Self { addr })
    }
}

/// Lightweight tunnel encapsulation attached to a route or nexthop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encap {
    /// Push an MPLS label stack.
    Mpls(MplsEncap),
}

impl Encap {
    /// The LWTUNNEL_ENCAP type tag (RTA_ENCAP_TYPE).
    pub fn encap_type(&self) -> u16 {
        match self {
            Self::Mpls(encap) => encap.encap_type(),
        }
    }

    /// Build the RTA_ENCAP payload.
    pub(crate) fn payload_bytes(&self) -> Vec<u8> {
        match self {
            Self::Mpls(encap) => encap.payload_bytes(),
        }
    }

    /// Decode from an RTA_ENCAP payload given the type tag.
    pub fn decode(encap_type: u16, data: &[u8]) -> Result<Self> {
        use super::types::mpls::lwtunnel_encap;
        match encap_type {
            lwtunnel_encap::MPLS => Ok(Self::Mpls(MplsEncap::decode(data)?)),
            other => Err(Error::NotSupported(format!(
                "encap type {} not supported",
                other
            ))),
        }
    }
}

/// One nexthop of a multipath route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NexthopInfo {
    /// Gateway address.
    pub gw: Option<IpAddr>,
    /// Cross-family gateway.
    pub via: Option<Via>,
    /// MPLS label replacement for this hop.
    pub new_dst: Option<MplsDestination>,
    /// Encapsulation for this hop.
    pub encap: Option<Encap>,
    /// Output interface index.
    pub oif: u32,
    /// RTNH_F_* flags.
    pub flags: u8,
    /// Relative weight, 1-based. Stored on the wire as weight minus one.
    pub weight: u8,
}

/// Route metrics (the nested RTA_METRICS attribute).
///
/// Zero-valued fields are not written; absent attributes decode as
/// zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMetrics {
    pub mtu: u32,
    pub window: u32,
    pub rtt: u32,
    pub rttvar: u32,
    pub ssthresh: u32,
    pub cwnd: u32,
    pub advmss: u32,
    pub reordering: u32,
    pub hoplimit: u32,
    pub initcwnd: u32,
    pub features: u32,
    pub rto_min: u32,
    pub initrwnd: u32,
    pub quickack: u32,
    /// Congestion control algorithm name (RTAX_CC_ALGO).
    pub congctl: Option<String>,
    pub fastopen_no_cookie: u32,
}

impl RouteMetrics {
    /// Check whether any metric is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn write_to(&self, builder: &mut MessageBuilder) {
        let nest = builder.nest_start(RtaAttr::Metrics as u16);
        let fields = [
            (rtax::MTU, self.mtu),
            (rtax::WINDOW, self.window),
            (rtax::RTT, self.rtt),
            (rtax::RTTVAR, self.rttvar),
            (rtax::SSTHRESH, self.ssthresh),
            (rtax::CWND, self.cwnd),
            (rtax::ADVMSS, self.advmss),
            (rtax::REORDERING, self.reordering),
            (rtax::HOPLIMIT, self.hoplimit),
            (rtax::INITCWND, self.initcwnd),
            (rtax::FEATURES, self.features),
            (rtax::RTO_MIN, self.rto_min),
            (rtax::INITRWND, self.initrwnd),
            (rtax::QUICKACK, self.quickack),
            (rtax::FASTOPEN_NO_COOKIE, self.fastopen_no_cookie),
        ];
        for (ty, value) in fields {
            if value != 0 {
                builder.append_attr_u32(ty, value);
            }
        }
        if let Some(ref algo) = self.congctl {
            builder.append_attr_str(rtax::CC_ALGO, algo);
        }
        builder.nest_end(nest);
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut metrics = Self::default();
        for item in AttrIter::new(data) {
            let (attr_type, payload) = item?;
            match attr_type {
                rtax::MTU => metrics.mtu = get::u32_ne(payload)?,
                rtax::WINDOW => metrics.window = get::u32_ne(payload)?,
                rtax::RTT => metrics.rtt = get::u32_ne(payload)?,
                rtax::RTTVAR => metrics.rttvar = get::u32_ne(payload)?,
                rtax::SSTHRESH => metrics.ssthresh = get::u32_ne(payload)?,
                rtax::CWND => metrics.cwnd = get::u32_ne(payload)?,
                rtax::ADVMSS => metrics.advmss = get::u32_ne(payload)?,
                rtax::REORDERING => metrics.reordering = get::u32_ne(payload)?,
                rtax::HOPLIMIT => metrics.hoplimit = get::u32_ne(payload)?,
                rtax::INITCWND => metrics.initcwnd = get::u32_ne(payload)?,
                rtax::FEATURES => metrics.features = get::u32_ne(payload)?,
                rtax::RTO_MIN => metrics.rto_min = get::u32_ne(payload)?,
                rtax::INITRWND => metrics.initrwnd = get::u32_ne(payload)?,
                rtax::QUICKACK => metrics.quickack = get::u32_ne(payload)?,
                rtax::FASTOPEN_NO_COOKIE => {
                    metrics.fastopen_no_cookie = get::u32_ne(payload)?
                }
                rtax::CC_ALGO => metrics.congctl = Some(get::string(payload)?.to_owned()),
                _ => {}
            }
        }
        Ok(metrics)
    }
}

/// A route, readable and writable through a [`Connection`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    /// Address family. Zero means derive from the addresses.
    pub family: u8,
    /// Destination prefix or label stack.
    pub dst: Option<Destination>,
    /// Preferred source address (RTA_PREFSRC).
    pub src: Option<IpAddr>,
    /// Gateway in the route's own family.
    pub gw: Option<IpAddr>,
    /// Gateway in a different family.
    pub via: Option<Via>,
    /// MPLS label replacement (RTA_NEWDST).
    pub new_dst: Option<MplsDestination>,
    /// Lightweight tunnel encapsulation.
    pub encap: Option<Encap>,
    /// Output interface index.
    pub oif: u32,
    /// Input interface index.
    pub iif: u32,
    /// Routing table id. Zero means the main table.
    pub table: u32,
    /// Route priority (metric).
    pub priority: u32,
    /// Realm (RTA_FLOW).
    pub realm: u32,
    /// TOS filter.
    pub tos: u8,
    /// Route scope (RT_SCOPE_*).
    pub scope: u8,
    /// Originating protocol (RTPROT_*). Zero means RTPROT_BOOT on add.
    pub protocol: u8,
    /// Route type (RTN_*). Zero means RTN_UNICAST on add.
    pub rtype: u8,
    /// Route flags (RTM_F_*).
    pub flags: u32,
    /// Multipath nexthops. When present, gw/via/oif describe nothing.
    pub multipath: Vec<NexthopInfo>,
    /// Route metrics.
    pub metrics: Option<RouteMetrics>,
}

impl Route {
    /// The family this route resolves to, checking the addresses agree.
    fn resolved_family(&self) -> Result<u8> {
        if let Some(Destination::Mpls(_)) = self.dst {
            if self.gw.is_some() {
                return Err(Error::InvalidInput(
                    "MPLS route gateway must use via".into(),
                ));
            }
            return Ok(AF_MPLS);
        }

        let mut family = self.family;
        let candidates = [
            self.dst.as_ref().map(|d| d.family()),
            self.src.as_ref().map(ip_family),
            self.gw.as_ref().map(ip_family),
        ];
        for fam in candidates.into_iter().flatten() {
            if family == 0 {
                family = fam;
            } else if family != fam {
                return Err(Error::InvalidInput(format!(
                    "route mixes address families {} and {}",
                    family, fam
                )));
            }
        }
        if family == 0 {
            return Err(Error::InvalidInput(
                "route address family cannot be determined".into(),
            ));
        }
        Ok(family)
    }
}

/// Build the message body for a route add, change or delete request.
///
/// Everything except RTM_GETROUTE needs at least one of destination,
/// preferred source or gateway, and all of them must agree on the
/// address family. Validation happens here, before anything touches
/// the socket.
pub(crate) fn prepare_route_req(
    route: &Route,
    msg_type: u16,
    flags: u16,
) -> Result<MessageBuilder> {
    if route.dst.is_none() && route.src.is_none() && route.gw.is_none() {
        return Err(Error::InvalidInput(
            "route needs a destination, source or gateway".into(),
        ));
    }
    let family = route.resolved_family()?;

    let table = if route.table == rt_table::UNSPEC {
        rt_table::MAIN
    } else {
        route.table
    };

    let mut msg = RtMsg {
        rtm_family: family,
        rtm_dst_len: route.dst.as_ref().map(|d| d.prefix_len()).unwrap_or(0),
        rtm_src_len: 0,
        rtm_tos: route.tos,
        rtm_table: if table < 256 {
            table as u8
        } else {
            rt_table::UNSPEC as u8
        },
        rtm_protocol: route.protocol,
        rtm_scope: route.scope,
        rtm_type: route.rtype,
        rtm_flags: route.flags,
    };
    if msg_type == NlMsgType::RTM_NEWROUTE {
        if msg.rtm_protocol == rtprot::UNSPEC {
            msg.rtm_protocol = rtprot::BOOT;
        }
        if msg.rtm_type == rtn::UNSPEC {
            msg.rtm_type = rtn::UNICAST;
        }
    }

    let mut builder = ack_request(msg_type, flags);
    builder.append(&msg);

    if let Some(ref dst) = route.dst {
        builder.append_attr(RtaAttr::Dst as u16, &dst.encode());
    }
    if let Some(ref new_dst) = route.new_dst {
        builder.append_attr(RtaAttr::Newdst as u16, &new_dst.encode());
    }
    if let Some(ref encap) = route.encap {
        builder.append_attr_u16(RtaAttr::EncapType as u16, encap.encap_type());
        builder.append_attr(RtaAttr::Encap as u16, &encap.payload_bytes());
    }
    if let Some(ref src) = route.src {
        builder.append_attr(RtaAttr::Prefsrc as u16, &ip_octets(src));
    }
    if let Some(ref gw) = route.gw {
        builder.append_attr(RtaAttr::Gateway as u16, &ip_octets(gw));
    }
    if let Some(ref via) = route.via {
        builder.append_attr(RtaAttr::Via as u16, &via.encode());
    }
    if !route.multipath.is_empty() {
        builder.append_attr(RtaAttr::Multipath as u16, &encode_multipath(&route.multipath));
    }
    if table >= 256 {
        builder.append_attr_u32(RtaAttr::Table as u16, table);
    }
    if route.priority != 0 {
        builder.append_attr_u32(RtaAttr::Priority as u16, route.priority);
    }
    if route.realm != 0 {
        builder.append_attr_u32(RtaAttr::Flow as u16, route.realm);
    }
    if let Some(ref metrics) = route.metrics {
        if !metrics.is_empty() {
            metrics.write_to(&mut builder);
        }
    }
    // RTA_OIF is always attached, zero included.
    builder.append_attr_i32(RtaAttr::Oif as u16, route.oif as i32);

    Ok(builder)
}

/// Encode the RTA_MULTIPATH payload: rtnexthop headers back to back,
/// each followed by that hop's attributes, rtnh_len covering both.
fn encode_multipath(hops: &[NexthopInfo]) -> Vec<u8> {
    let mut buf = Vec::new();
    for hop in hops {
        let start = buf.len();
        let header = RtNexthop {
            rtnh_len: 0,
            rtnh_flags: hop.flags,
            rtnh_hops: hop.weight.saturating_sub(1),
            rtnh_ifindex: hop.oif as i32,
        };
        buf.extend_from_slice(header.as_bytes());

        if let Some(ref gw) = hop.gw {
            push_attr(&mut buf, RtaAttr::Gateway as u16, &ip_octets(gw));
        }
        if let Some(ref via) = hop.via {
            push_attr(&mut buf, RtaAttr::Via as u16, &via.encode());
        }
        if let Some(ref new_dst) = hop.new_dst {
            push_attr(&mut buf, RtaAttr::Newdst as u16, &new_dst.encode());
        }
        if let Some(ref encap) = hop.encap {
            push_attr(
                &mut buf,
                RtaAttr::EncapType as u16,
                &encap.encap_type().to_ne_bytes(),
            );
            push_attr(&mut buf, RtaAttr::Encap as u16, &encap.payload_bytes());
        }

        let len = (buf.len() - start) as u16;
        buf[start..start + 2].copy_from_slice(&len.to_ne_bytes());
    }
    buf
}

/// Decode an RTA_MULTIPATH payload, bounds checking every hop length.
fn decode_multipath(data: &[u8]) -> Result<Vec<NexthopInfo>> {
    let mut hops = Vec::new();
    let mut offset = 0;

    while offset + RtNexthop::SIZE <= data.len() {
        let header = RtNexthop::from_bytes(&data[offset..])?;
        let len = header.rtnh_len as usize;
        if len < RtNexthop::SIZE || offset + len > data.len() {
            return Err(Error::InvalidAttribute(format!(
                "nexthop length {} exceeds multipath payload",
                len
            )));
        }

        let mut hop = NexthopInfo {
            oif: header.rtnh_ifindex as u32,
            flags: header.rtnh_flags,
            weight: header.rtnh_hops.saturating_add(1),
            ..Default::default()
        };

        let mut encap_type = None;
        let mut encap_data = None;
        for item in AttrIter::new(&data[offset + RtNexthop::SIZE..offset + len]) {
            let (attr_type, payload) = item?;
            match RtaAttr::from(attr_type) {
                RtaAttr::Gateway => {
                    // The hop's family is whatever length the kernel sent.
                    let family = if payload.len() >= 16 {
                        libc::AF_INET6 as u8
                    } else {
                        libc::AF_INET as u8
                    };
                    hop.gw = Some(get::ip_addr(family, payload)?);
                }
                RtaAttr::Via => hop.via = Some(Via::decode(payload)?),
                RtaAttr::Newdst => hop.new_dst = Some(MplsDestination::decode(payload)?),
                RtaAttr::EncapType => encap_type = Some(get::u16_ne(payload)?),
                RtaAttr::Encap => encap_data = Some(payload.to_vec()),
                _ => {}
            }
        }
        if let (Some(ty), Some(payload)) = (encap_type, encap_data) {
            hop.encap = Some(Encap::decode(ty, &payload)?);
        }

        hops.push(hop);
        offset += len;
    }

    Ok(hops)
}

/// Decode an RTM_NEWROUTE/RTM_DELROUTE message payload into a [`Route`].
///
/// IP routes without an RTA_DST attribute are default routes; the
/// destination is synthesized as the zero network of the route family
/// so callers never see a missing destination.
pub fn deserialize_route(payload: &[u8]) -> Result<Route> {
    let msg = RtMsg::from_bytes(payload)?;

    let mut route = Route {
        family: msg.rtm_family,
        table: msg.rtm_table as u32,
        tos: msg.rtm_tos,
        scope: msg.rtm_scope,
        protocol: msg.rtm_protocol,
        rtype: msg.rtm_type,
        flags: msg.rtm_flags,
        ..Default::default()
    };

    let mut encap_type = None;
    let mut encap_data = None;

    for item in AttrIter::new(&payload[RtMsg::SIZE..]) {
        let (attr_type, data) = item?;
        match RtaAttr::from(attr_type) {
            RtaAttr::Dst => {
                route.dst = Some(if msg.rtm_family == AF_MPLS {
                    Destination::Mpls(MplsDestination::decode(data)?)
                } else {
                    Destination::Ip(IpNet::new(
                        get::ip_addr(msg.rtm_family, data)?,
                        msg.rtm_dst_len,
                    ))
                });
            }
            RtaAttr::Gateway => route.gw = Some(get::ip_addr(msg.rtm_family, data)?),
            RtaAttr::Prefsrc => route.src = Some(get::ip_addr(msg.rtm_family, data)?),
            RtaAttr::Iif => route.iif = get::i32_ne(data)? as u32,
            RtaAttr::Oif => route.oif = get::i32_ne(data)? as u32,
            RtaAttr::Priority => route.priority = get::u32_ne(data)?,
            RtaAttr::Flow => route.realm = get::u32_ne(data)?,
            RtaAttr::Table => route.table = get::u32_ne(data)?,
            RtaAttr::Via => route.via = Some(Via::decode(data)?),
            RtaAttr::Newdst => route.new_dst = Some(MplsDestination::decode(data)?),
            RtaAttr::EncapType => encap_type = Some(get::u16_ne(data)?),
            RtaAttr::Encap => encap_data = Some(data.to_vec()),
            RtaAttr::Metrics => route.metrics = Some(RouteMetrics::decode(data)?),
            RtaAttr::Multipath => route.multipath = decode_multipath(data)?,
            _ => {}
        }
    }

    if let (Some(ty), Some(data)) = (encap_type, encap_data) {
        route.encap = Some(Encap::decode(ty, &data)?);
    }

    if route.dst.is_none()
        && (msg.rtm_family as i32 == libc::AF_INET || msg.rtm_family as i32 == libc::AF_INET6)
    {
        // No RTA_DST means the zero network, with whatever prefix
        // length the header declared (zero for a default route).
        let zero = IpNet::zero(msg.rtm_family)?;
        route.dst = Some(Destination::Ip(IpNet::new(zero.addr, msg.rtm_dst_len)));
    }

    Ok(route)
}

/// Options for a route lookup (RTM_GETROUTE without dump).
#[derive(Debug, Clone, Default)]
pub struct RouteGetOptions {
    /// Input interface name (RTA_IIF).
    pub iif: Option<String>,
    /// Output interface name (RTA_OIF).
    pub oif: Option<String>,
    /// VRF device to scope the lookup to, resolved to RTA_OIF.
    pub vrf_name: Option<String>,
    /// Source address for the lookup (RTA_SRC).
    pub src_addr: Option<IpAddr>,
    /// UID for UID-based routing (RTA_UID).
    pub uid: Option<u32>,
    /// Firewall mark (RTA_MARK).
    pub mark: Option<u32>,
    /// Report the matched FIB entry instead of the resolved nexthop.
    pub fib_match: bool,
}

impl Connection {
    /// Add a route; fails if an equivalent route exists.
    pub async fn route_add(&self, route: &Route) -> Result<()> {
        let builder = prepare_route_req(
            route,
            NlMsgType::RTM_NEWROUTE,
            NLM_F_CREATE | NLM_F_EXCL,
        )?;
        self.request_ack(builder).await
    }

    /// Add a route alongside existing ones for the same destination.
    pub async fn route_append(&self, route: &Route) -> Result<()> {
        let builder = prepare_route_req(
            route,
            NlMsgType::RTM_NEWROUTE,
            NLM_F_CREATE | NLM_F_APPEND,
        )?;
        self.request_ack(builder).await
    }

    /// Add a multipath route without the exclusive flag, so repeated
    /// adds of the same hop set do not fail.
    pub async fn route_add_ecmp(&self, route: &Route) -> Result<()> {
        let builder = prepare_route_req(route, NlMsgType::RTM_NEWROUTE, NLM_F_CREATE)?;
        self.request_ack(builder).await
    }

    /// Change an existing route; fails if it does not exist.
    pub async fn route_change(&self, route: &Route) -> Result<()> {
        let builder = prepare_route_req(route, NlMsgType::RTM_NEWROUTE, NLM_F_REPLACE)?;
        self.request_ack(builder).await
    }

    /// Add a route, replacing an existing equivalent one.
    pub async fn route_replace(&self, route: &Route) -> Result<()> {
        let builder = prepare_route_req(
            route,
            NlMsgType::RTM_NEWROUTE,
            NLM_F_CREATE | NLM_F_REPLACE,
        )?;
        self.request_ack(builder).await
    }

    /// Delete a route.
    pub async fn route_del(&self, route: &Route) -> Result<()> {
        let builder = prepare_route_req(route, NlMsgType::RTM_DELROUTE, 0)?;
        self.request_ack(builder).await
    }

    /// List routes, optionally restricted to one address family.
    pub async fn route_list(&self, family: Option<u8>) -> Result<Vec<Route>> {
        let filter = Route::default();
        self.route_list_filtered(family, &filter, 0).await
    }

    /// List routes matching a filter.
    pub async fn route_list_filtered(
        &self,
        family: Option<u8>,
        filter: &Route,
        filter_mask: u32,
    ) -> Result<Vec<Route>> {
        let mut routes = Vec::new();
        self.route_list_filtered_iter(family, filter, filter_mask, |route| {
            routes.push(route);
            Ok(true)
        })
        .await?;
        Ok(routes)
    }

    /// Stream routes matching a filter through a callback.
    ///
    /// Cloned routes are always skipped. Routes outside the main table
    /// are skipped unless the filter mask selects a table. The callback
    /// returning `Ok(false)` stops iteration; the dump is still drained
    /// so the connection stays usable.
    pub async fn route_list_filtered_iter<F>(
        &self,
        family: Option<u8>,
        filter: &Route,
        filter_mask: u32,
        mut cb: F,
    ) -> Result<()>
    where
        F: FnMut(Route) -> Result<bool>,
    {
        use super::filter::rt_filter;

        let mut builder = dump_request(NlMsgType::RTM_GETROUTE);
        let msg = RtMsg {
            rtm_family: family.unwrap_or(libc::AF_UNSPEC as u8),
            ..Default::default()
        };
        builder.append(&msg);

        self.dump_iter(builder, |header, payload| {
            if header.nlmsg_type != NlMsgType::RTM_NEWROUTE {
                return Ok(true);
            }
            // A malformed reply aborts the dump; results already
            // delivered to the callback stay delivered.
            let route = deserialize_route(payload)?;
            if let Some(family) = family {
                if route.family != family {
                    return Ok(true);
                }
            }
            if route.flags & rtm_flags::CLONED != 0 {
                return Ok(true);
            }
            if filter_mask & rt_filter::TABLE == 0 && route.table != rt_table::MAIN {
                return Ok(true);
            }
            if !route_matches(&route, filter, filter_mask) {
                return Ok(true);
            }
            cb(route)
        })
        .await
    }

    /// Look up the route the kernel would use for a destination.
    pub async fn route_get(
        &self,
        dst: IpAddr,
        options: Option<&RouteGetOptions>,
    ) -> Result<Vec<Route>> {
        let family = ip_family(&dst);
        let mut msg = RtMsg {
            rtm_family: family,
            rtm_dst_len: if dst.is_ipv4() { 32 } else { 128 },
            rtm_flags: rtm_flags::LOOKUP_TABLE,
            ..Default::default()
        };

        let default_options = RouteGetOptions::default();
        let options = options.unwrap_or(&default_options);
        if options.fib_match {
            msg.rtm_flags |= rtm_flags::FIB_MATCH;
        }

        let mut builder = MessageBuilder::new(NlMsgType::RTM_GETROUTE, NLM_F_REQUEST);
        builder.append(&msg);
        builder.append_attr(RtaAttr::Dst as u16, &ip_octets(&dst));

        if let Some(ref name) = options.iif {
            builder.append_attr_u32(RtaAttr::Iif as u16, ifname_to_index(name)?);
        }
        if let Some(ref name) = options.oif {
            builder.append_attr_u32(RtaAttr::Oif as u16, ifname_to_index(name)?);
        }
        if let Some(ref name) = options.vrf_name {
            builder.append_attr_u32(RtaAttr::Oif as u16, ifname_to_index(name)?);
        }
        if let Some(ref src) = options.src_addr {
            builder.append_attr(RtaAttr::Src as u16, &ip_octets(src));
        }
        if let Some(uid) = options.uid {
            builder.append_attr_u32(RtaAttr::Uid as u16, uid);
        }
        if let Some(mark) = options.mark {
            builder.append_attr_u32(RtaAttr::Mark as u16, mark);
        }

        let replies = self.request(builder).await?;
        let mut routes = Vec::with_capacity(replies.len());
        for (header, payload) in replies {
            if header.nlmsg_type == NlMsgType::RTM_NEWROUTE {
                routes.push(deserialize_route(&payload)?);
            }
        }
        Ok(routes)
    }
}
