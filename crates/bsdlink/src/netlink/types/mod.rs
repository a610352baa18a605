//! Fixed-layout message types shared by the route and address paths.

pub mod addr;
pub mod mpls;
pub mod route;
