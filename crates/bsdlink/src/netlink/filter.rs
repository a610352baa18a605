//! Route list filtering.
//!
//! A filter is an ordinary [`Route`] whose fields are compared against
//! each dumped route, with a bit mask selecting which fields take part.

use super::ip::IpNet;
use super::route::{Destination, Route};
use super::types::route::rt_table;

/// Filter selection bits (RT_FILTER_*).
pub mod rt_filter {
    pub const PROTOCOL: u32 = 1 << 1;
    pub const SCOPE: u32 = 1 << 2;
    pub const TYPE: u32 = 1 << 3;
    pub const TOS: u32 = 1 << 4;
    pub const IIF: u32 = 1 << 5;
    pub const OIF: u32 = 1 << 6;
    pub const DST: u32 = 1 << 7;
    pub const SRC: u32 = 1 << 8;
    pub const GW: u32 = 1 << 9;
    pub const TABLE: u32 = 1 << 10;
    pub const HOPLIMIT: u32 = 1 << 11;
    pub const PRIORITY: u32 = 1 << 12;
    pub const REALM: u32 = 1 << 15;
}

/// A table id of zero means the main table.
fn effective_table(table: u32) -> u32 {
    if table == 0 { rt_table::MAIN } else { table }
}

/// The hoplimit carried in a route's metrics, zero when absent.
fn hoplimit(route: &Route) -> u32 {
    route.metrics.as_ref().map(|m| m.hoplimit).unwrap_or(0)
}

/// Check a dumped route against a filter under the given mask.
///
/// A destination filter left empty matches the zero network of the
/// route's family, so `DST` without an explicit prefix selects default
/// routes. MPLS destinations compare by label stack equality.
pub fn route_matches(route: &Route, filter: &Route, mask: u32) -> bool {
    if mask & rt_filter::TABLE != 0
        && effective_table(filter.table) != effective_table(route.table)
    {
        return false;
    }
    if mask & rt_filter::PROTOCOL != 0 && filter.protocol != route.protocol {
        return false;
    }
    if mask & rt_filter::SCOPE != 0 && filter.scope != route.scope {
        return false;
    }
    if mask & rt_filter::TYPE != 0 && filter.rtype != route.rtype {
        return false;
    }
    if mask & rt_filter::TOS != 0 && filter.tos != route.tos {
        return false;
    }
    if mask & rt_filter::IIF != 0 && filter.iif != route.iif {
        return false;
    }
    if mask & rt_filter::OIF != 0 && filter.oif != route.oif {
        return false;
    }
    if mask & rt_filter::GW != 0 && filter.gw != route.gw {
        return false;
    }
    if mask & rt_filter::SRC != 0 && filter.src != route.src {
        return false;
    }
    if mask & rt_filter::PRIORITY != 0 && filter.priority != route.priority {
        return false;
    }
    if mask & rt_filter::REALM != 0 && filter.realm != route.realm {
        return false;
    }
    if mask & rt_filter::HOPLIMIT != 0 && hoplimit(filter) != hoplimit(route) {
        return false;
    }
    if mask & rt_filter::DST != 0 && !dst_matches(route, filter) {
        return false;
    }
    true
}

fn dst_matches(route: &Route, filter: &Route) -> bool {
    match (&filter.dst, &route.dst) {
        (Some(f), Some(r)) => f == r,
        // No filter destination: match the zero network for the
        // route's family.
        (None, Some(Destination::Ip(net))) => {
            IpNet::zero(net.family()).map(|zero| *net == zero).unwrap_or(false)
        }
        (None, Some(Destination::Mpls(_))) => false,
        (Some(_), None) => false,
        (None, None) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::mpls::MplsDestination;
    use crate::netlink::route::RouteMetrics;

    fn v4_route(dst: &str, prefix: u8) -> Route {
        Route {
            family: libc::AF_INET as u8,
            dst: Some(Destination::Ip(IpNet::new(dst.parse().unwrap(), prefix))),
            table: rt_table::MAIN,
            ..Default::default()
        }
    }

    #[test]
    fn test_table_zero_means_main() {
        let route = v4_route("10.0.0.0", 8);
        let filter = Route::default();
        assert!(route_matches(&route, &filter, rt_filter::TABLE));

        let mut other = v4_route("10.0.0.0", 8);
        other.table = 100;
        assert!(!route_matches(&other, &filter, rt_filter::TABLE));
    }

    #[test]
    fn test_dst_filter_exact_prefix() {
        let route = v4_route("10.1.0.0", 16);
        let mut filter = Route::default();

        filter.dst = Some(Destination::Ip(IpNet::new("10.1.0.0".parse().unwrap(), 16)));
        assert!(route_matches(&route, &filter, rt_filter::DST));

        // Same address, different prefix length is a different net.
        filter.dst = Some(Destination::Ip(IpNet::new("10.1.0.0".parse().unwrap(), 24)));
        assert!(!route_matches(&route, &filter, rt_filter::DST));
    }

    #[test]
    fn test_empty_dst_filter_selects_default_route() {
        let filter = Route::default();

        let default_route = v4_route("0.0.0.0", 0);
        assert!(route_matches(&default_route, &filter, rt_filter::DST));

        let specific = v4_route("10.0.0.0", 8);
        assert!(!route_matches(&specific, &filter, rt_filter::DST));
    }

    #[test]
    fn test_mpls_dst_by_label_equality() {
        let route = Route {
            dst: Some(Destination::Mpls(
                MplsDestination::new(vec![100, 200]).unwrap(),
            )),
            ..Default::default()
        };

        let mut filter = Route::default();
        filter.dst = Some(Destination::Mpls(
            MplsDestination::new(vec![100, 200]).unwrap(),
        ));
        assert!(route_matches(&route, &filter, rt_filter::DST));

        filter.dst = Some(Destination::Mpls(MplsDestination::new(vec![100]).unwrap()));
        assert!(!route_matches(&route, &filter, rt_filter::DST));
    }

    #[test]
    fn test_hoplimit_absent_metrics_is_zero() {
        let route = v4_route("10.0.0.0", 8);
        let filter = Route::default();
        assert!(route_matches(&route, &filter, rt_filter::HOPLIMIT));

        let mut limited = v4_route("10.0.0.0", 8);
        limited.metrics = Some(RouteMetrics {
            hoplimit: 5,
            ..Default::default()
        });
        assert!(!route_matches(&limited, &filter, rt_filter::HOPLIMIT));
    }

    #[test]
    fn test_unmasked_fields_ignored() {
        let mut route = v4_route("10.0.0.0", 8);
        route.protocol = 4;
        route.priority = 100;

        // Only scope is masked; protocol and priority differ but don't count.
        let filter = Route::default();
        assert!(route_matches(&route, &filter, rt_filter::SCOPE));
        assert!(!route_matches(&route, &filter, rt_filter::PROTOCOL));
    }

    #[test]
    fn test_realm_match() {
        let mut route = v4_route("10.0.0.0", 8);
        route.realm = 7;

        let mut filter = Route::default();
        filter.realm = 7;
        assert!(route_matches(&route, &filter, rt_filter::REALM));

        filter.realm = 8;
        assert!(!route_matches(&route, &filter, rt_filter::REALM));
    }

    #[test]
    fn test_filter_idempotent() {
        let routes = vec![v4_route("10.0.0.0", 8), v4_route("0.0.0.0", 0)];
        let filter = Route::default();
        let mask = rt_filter::DST;

        let pass1: Vec<_> = routes
            .iter()
            .filter(|r| route_matches(r, &filter, mask))
            .cloned()
            .collect();
        let pass2: Vec<_> = pass1
            .iter()
            .filter(|r| route_matches(r, &filter, mask))
            .cloned()
            .collect();
        assert_eq!(pass1, pass2);
        assert_eq!(pass2.len(), 1);
    }
}
