//! Native FreeBSD fallbacks for hosts without netlink support.

pub mod rib;

pub use rib::parse_rib;
#[cfg(target_os = "freebsd")]
pub use rib::{fetch_rib, route_list};
