//! Resolution of the interface facing the public network.

pub mod error;
pub mod procfs;

pub use error::{Result, RoutingError};
pub use procfs::ProcRouteTable;

use bon::Builder;
use ipnet::Ipv4Net;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// `None` for the wildcard destination of a default route.
    pub destination: Option<Ipv4Net>,
    pub link_index: u32,
}

impl Route {
    pub fn is_default(&self) -> bool {
        self.destination.is_none()
    }
}

pub trait RouteTable: Send + Sync {
    fn routes(&self) -> Result<Vec<Route>>;

    fn link_name(&self, index: u32) -> Result<String>;
}

/// Name of the interface the default route leaves through.
pub fn public_interface(table: &dyn RouteTable) -> Result<String> {
    let routes = table.routes()?;

    let default_route = routes
        .iter()
        .find(|r| r.is_default())
        .ok_or(RoutingError::MissingDefaultRoute)?;

    let name = table.link_name(default_route.link_index)?;
    debug!(
        interface = %name,
        link_index = default_route.link_index,
        "Resolved public interface"
    );
    Ok(name)
}

#[derive(Debug, Clone, Default, Builder)]
/// Fixed routes and links, for tests and hosts with a known layout.
pub struct StaticRouteTable {
    #[builder(default)]
    pub routes: Vec<Route>,
    #[builder(default)]
    pub links: HashMap<u32, String>,
}

impl StaticRouteTable {
    /// A table holding only a default route through `interface`.
    pub fn with_default_route(interface: impl Into<String>) -> Self {
        Self {
            routes: vec![Route {
                destination: None,
                link_index: 2,
            }],
            links: HashMap::from([(2, interface.into())]),
        }
    }
}

impl RouteTable for StaticRouteTable {
    fn routes(&self) -> Result<Vec<Route>> {
        Ok(self.routes.clone())
    }

    fn link_name(&self, index: u32) -> Result<String> {
        self.links
            .get(&index)
            .cloned()
            .ok_or_else(|| RoutingError::link_not_found(index))
    }
}
