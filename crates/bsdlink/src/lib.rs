//! rtnetlink-compatible routing and address management.
//!
//! FreeBSD ships a netlink(4) socket layer that speaks the Linux
//! rtnetlink wire protocol for the route family. This crate talks to it
//! directly: a binary attribute codec, an async request/response
//! connection, and typed address and route operations on top of it.
//!
//! For hosts where netlink is unavailable, [`freebsd`] reads the native
//! routing information base through the classic `route(4)` sysctl
//! interface and translates it into the same [`Route`] data model. That
//! path is list-only; the netlink connection is the authoritative
//! backend for mutation.
//!
//! All state lives in an explicit [`Connection`] handle. There is no
//! process-global socket.
//!
//! # Example
//!
//! ```ignore
//! use bsdlink::{Connection, Route, IpNet};
//!
//! let conn = Connection::new()?;
//!
//! let route = Route {
//!     dst: Some(IpNet::new("10.0.0.0".parse()?, 8).into()),
//!     gw: Some("192.168.1.1".parse()?),
//!     ..Default::default()
//! };
//! conn.route_add(&route).await?;
//!
//! for route in conn.route_list(None).await? {
//!     println!("{:?}", route);
//! }
//! ```

pub mod freebsd;
pub mod netlink;

pub use netlink::addr::Address;
pub use netlink::connection::Connection;
pub use netlink::error::{Error, Result};
pub use netlink::events::{RouteSubscription, RouteUpdate, SubscribeOptions, route_subscribe};
pub use netlink::filter::rt_filter;
pub use netlink::ip::IpNet;
pub use netlink::mpls::{MplsDestination, MplsEncap};
pub use netlink::route::{
    Destination, Encap, NexthopInfo, Route, RouteGetOptions, RouteMetrics, Via,
};
