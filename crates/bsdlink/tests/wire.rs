//! End-to-end wire format tests against the public API: messages are
//! built the way requests go out and parsed the way kernel replies
//! come back, without a socket.

use bsdlink::netlink::attr::AttrIter;
use bsdlink::netlink::builder::MessageBuilder;
use bsdlink::netlink::message::{
    MessageIter, NLM_F_MULTI, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgHdr, NlMsgType, nlmsg_align,
};
use bsdlink::netlink::mpls::{MplsDestination, MplsEncap};
use bsdlink::netlink::route::deserialize_route;
use bsdlink::netlink::types::route::{RtMsg, RtaAttr, rt_table, rtn, rtprot};
use bsdlink::{Destination, Encap, IpNet, Route, Via, rt_filter};

fn route_message(route: &Route) -> Vec<u8> {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWROUTE, NLM_F_REQUEST);
    let msg = RtMsg {
        rtm_family: route.family,
        rtm_dst_len: route.dst.as_ref().map(|d| d.prefix_len()).unwrap_or(0),
        rtm_table: route.table.min(255) as u8,
        rtm_protocol: route.protocol,
        rtm_scope: route.scope,
        rtm_type: route.rtype,
        rtm_flags: route.flags,
        ..Default::default()
    };
    builder.append(&msg);
    if let Some(ref dst) = route.dst {
        builder.append_attr(RtaAttr::Dst as u16, &dst.encode());
    }
    if let Some(ref gw) = route.gw {
        let octets = match gw {
            std::net::IpAddr::V4(a) => a.octets().to_vec(),
            std::net::IpAddr::V6(a) => a.octets().to_vec(),
        };
        builder.append_attr(RtaAttr::Gateway as u16, &octets);
    }
    if route.priority != 0 {
        builder.append_attr_u32(RtaAttr::Priority as u16, route.priority);
    }
    builder.finish()
}

#[test]
fn kernel_style_reply_parses_back() {
    let route = Route {
        family: libc::AF_INET as u8,
        dst: Some(Destination::Ip(IpNet::new("10.20.0.0".parse().unwrap(), 16))),
        gw: Some("10.20.0.1".parse().unwrap()),
        priority: 100,
        table: rt_table::MAIN,
        protocol: rtprot::STATIC,
        rtype: rtn::UNICAST,
        ..Default::default()
    };

    let msg = route_message(&route);
    let (header, payload) = MessageIter::new(&msg).next().unwrap().unwrap();
    assert_eq!(header.nlmsg_type, NlMsgType::RTM_NEWROUTE);

    let parsed = deserialize_route(payload).unwrap();
    assert_eq!(parsed.dst, route.dst);
    assert_eq!(parsed.gw, route.gw);
    assert_eq!(parsed.priority, 100);
    assert_eq!(parsed.protocol, rtprot::STATIC);
}

#[test]
fn multipart_dump_walk_skips_done() {
    // Two routes followed by NLMSG_DONE, as one datagram.
    let mut data = Vec::new();
    for dst in ["10.0.0.0", "10.1.0.0"] {
        let route = Route {
            family: libc::AF_INET as u8,
            dst: Some(Destination::Ip(IpNet::new(dst.parse().unwrap(), 16))),
            table: rt_table::MAIN,
            ..Default::default()
        };
        let mut msg = route_message(&route);
        // Mark as part of a multipart reply.
        let flags = NLM_F_MULTI.to_ne_bytes();
        msg[6..8].copy_from_slice(&flags);
        data.extend_from_slice(&msg);
    }
    let mut done = NlMsgHdr::new(NlMsgType::DONE, NLM_F_MULTI);
    done.nlmsg_len = (NLMSG_HDRLEN + 4) as u32;
    data.extend_from_slice(done.as_bytes());
    data.extend_from_slice(&0i32.to_ne_bytes());
    data.resize(nlmsg_align(data.len()), 0);

    let mut seen = Vec::new();
    for item in MessageIter::new(&data) {
        let (header, payload) = item.unwrap();
        if header.is_done() {
            break;
        }
        seen.push(deserialize_route(payload).unwrap());
    }
    assert_eq!(seen.len(), 2);
    assert_eq!(
        seen[1].dst,
        Some(Destination::Ip(IpNet::new("10.1.0.0".parse().unwrap(), 16)))
    );
}

#[test]
fn nested_metrics_survive_reply_parse() {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWROUTE, 0);
    builder.append(&RtMsg {
        rtm_family: libc::AF_INET as u8,
        rtm_table: rt_table::MAIN as u8,
        ..Default::default()
    });
    let nest = builder.nest_start(RtaAttr::Metrics as u16);
    builder.append_attr_u32(2, 1400); // RTAX_MTU
    builder.append_attr_u32(10, 5); // RTAX_HOPLIMIT
    builder.append_attr_str(16, "newreno"); // RTAX_CC_ALGO
    builder.nest_end(nest);
    let msg = builder.finish();

    let (_, payload) = MessageIter::new(&msg).next().unwrap().unwrap();
    let route = deserialize_route(payload).unwrap();
    let metrics = route.metrics.unwrap();
    assert_eq!(metrics.mtu, 1400);
    assert_eq!(metrics.hoplimit, 5);
    assert_eq!(metrics.congctl.as_deref(), Some("newreno"));
}

#[test]
fn mpls_and_via_attributes_parse() {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWROUTE, 0);
    builder.append(&RtMsg {
        rtm_family: 28, // AF_MPLS
        rtm_dst_len: 20,
        rtm_table: rt_table::MAIN as u8,
        ..Default::default()
    });
    let dst = MplsDestination::new(vec![100]).unwrap();
    builder.append_attr(RtaAttr::Dst as u16, &dst.encode());
    let via = Via {
        addr: "10.0.0.1".parse().unwrap(),
    };
    builder.append_attr(RtaAttr::Via as u16, &via.encode());
    let msg = builder.finish();

    let (_, payload) = MessageIter::new(&msg).next().unwrap().unwrap();
    let route = deserialize_route(payload).unwrap();
    assert_eq!(route.dst, Some(Destination::Mpls(dst)));
    assert_eq!(route.via, Some(via));
}

#[test]
fn encap_attributes_parse() {
    let encap = Encap::Mpls(MplsEncap::new(vec![16, 17]).unwrap());

    let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWROUTE, 0);
    builder.append(&RtMsg {
        rtm_family: libc::AF_INET as u8,
        rtm_dst_len: 24,
        rtm_table: rt_table::MAIN as u8,
        ..Default::default()
    });
    builder.append_attr(RtaAttr::Dst as u16, &[10, 0, 0, 0]);
    builder.append_attr_u16(RtaAttr::EncapType as u16, encap.encap_type());

    // MPLS_IPTUNNEL_DST with the label stack, built by hand the way the
    // kernel frames it.
    let Encap::Mpls(ref mpls) = encap;
    let stack = MplsDestination::new(mpls.labels.clone()).unwrap().encode();
    let mut encap_payload = ((4 + stack.len()) as u16).to_ne_bytes().to_vec();
    encap_payload.extend_from_slice(&1u16.to_ne_bytes());
    encap_payload.extend_from_slice(&stack);
    encap_payload.resize((encap_payload.len() + 3) & !3, 0);
    builder.append_attr(RtaAttr::Encap as u16, &encap_payload);
    let msg = builder.finish();

    let (_, payload) = MessageIter::new(&msg).next().unwrap().unwrap();
    let route = deserialize_route(payload).unwrap();
    match route.encap {
        Some(Encap::Mpls(parsed)) => assert_eq!(parsed.labels, vec![16, 17]),
        other => panic!("expected MPLS encap, got {:?}", other),
    }
}

#[test]
fn filter_table_scenario() {
    let main_route = Route {
        family: libc::AF_INET as u8,
        dst: Some(Destination::Ip(IpNet::new("10.0.0.0".parse().unwrap(), 8))),
        table: rt_table::MAIN,
        ..Default::default()
    };
    let mut vrf_route = main_route.clone();
    vrf_route.table = 100;

    let mut filter = Route::default();
    filter.table = 100;

    use bsdlink::netlink::filter::route_matches;
    assert!(route_matches(&vrf_route, &filter, rt_filter::TABLE));
    assert!(!route_matches(&main_route, &filter, rt_filter::TABLE));

    // Without the table bit the filter ignores tables entirely.
    assert!(route_matches(&main_route, &filter, 0));
    assert!(route_matches(&vrf_route, &filter, 0));
}

#[test]
fn attribute_iteration_over_real_message() {
    let route = Route {
        family: libc::AF_INET as u8,
        dst: Some(Destination::Ip(IpNet::new("10.0.0.0".parse().unwrap(), 24))),
        gw: Some("10.0.0.1".parse().unwrap()),
        priority: 20,
        table: rt_table::MAIN,
        ..Default::default()
    };
    let msg = route_message(&route);

    let types: Vec<u16> = AttrIter::new(&msg[NLMSG_HDRLEN + RtMsg::SIZE..])
        .map(|item| item.unwrap().0)
        .collect();
    assert_eq!(
        types,
        vec![
            RtaAttr::Dst as u16,
            RtaAttr::Gateway as u16,
            RtaAttr::Priority as u16,
        ]
    );
}

#[test]
fn rib_snapshot_translates_to_routes() {
    // One host route record in rt_msghdr form.
    let mut record = vec![0u8; 152];
    record[2] = 5; // RTM_VERSION
    record[3] = 4; // RTM_GET
    record[4..6].copy_from_slice(&2u16.to_ne_bytes());
    record[8..12].copy_from_slice(&0x4i32.to_ne_bytes()); // RTF_HOST
    record[12..16].copy_from_slice(&1i32.to_ne_bytes()); // RTA_DST
    let mut sa = vec![0u8; 16];
    sa[0] = 16;
    sa[1] = libc::AF_INET as u8;
    sa[4..8].copy_from_slice(&[203, 0, 113, 9]);
    record.extend_from_slice(&sa);
    let len = record.len() as u16;
    record[0..2].copy_from_slice(&len.to_ne_bytes());

    let routes = bsdlink::freebsd::parse_rib(&record).unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(
        routes[0].dst,
        Some(Destination::Ip(IpNet::new(
            "203.0.113.9".parse().unwrap(),
            32
        )))
    );
    assert_eq!(routes[0].oif, 2);
}
