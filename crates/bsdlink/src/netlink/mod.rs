//! Netlink protocol implementation.
//!
//! Layered bottom-up: [`attr`] and [`message`] implement the wire
//! codec, [`builder`] constructs outgoing messages, [`socket`] wraps
//! the raw netlink socket for async use, and [`connection`] ties them
//! together into a request/response handle. The [`addr`], [`route`]
//! and [`events`] modules implement the typed operations on top.

pub mod addr;
pub mod attr;
pub mod builder;
pub mod connection;
pub mod error;
pub mod events;
pub mod filter;
pub mod ip;
pub mod link;
pub mod message;
pub mod mpls;
pub mod route;
pub mod socket;
pub mod types;

pub use addr::Address;
pub use builder::MessageBuilder;
pub use connection::Connection;
pub use error::{Error, Result};
pub use events::{RouteSubscription, RouteUpdate, SubscribeOptions, route_subscribe};
pub use ip::IpNet;
pub use mpls::{MplsDestination, MplsEncap};
pub use route::{Destination, Encap, NexthopInfo, Route, RouteGetOptions, RouteMetrics, Via};
pub use socket::NetlinkSocket;
