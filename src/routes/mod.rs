//! Route derivation, the route table, and always-on service routes.

pub mod builder;
pub mod common;
pub mod route;

pub use builder::RouteBuilder;
pub use common::common_routes;
pub use route::{HttpMethod, Mount, Operation, Route, RouteMatch, RouteTable};
