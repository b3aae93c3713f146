use super::{Result, Route, RouteTable, RoutingError};
use bon::Builder;
use ipnet::Ipv4Net;
use nix::net::if_::{if_nameindex, if_nametoindex};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_ROUTE_PATH: &str = "/proc/net/route";

const RTF_UP: u32 = 0x0001;

/// One row of the kernel's IPv4 routing table, before link resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcRoute {
    pub interface: String,
    pub destination: Option<Ipv4Net>,
}

#[derive(Debug, Clone, Builder)]
/// Reads the main IPv4 routing table from procfs.
pub struct ProcRouteTable {
    #[builder(default = PathBuf::from(DEFAULT_ROUTE_PATH), into)]
    path: PathBuf,
}

impl Default for ProcRouteTable {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ProcRouteTable {
    pub fn read_routes(&self) -> Result<Vec<ProcRoute>> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            RoutingError::route_list(format!("failed to read {}", self.path.display()), e)
        })?;
        parse_routes(&contents, &self.path)
    }
}

impl RouteTable for ProcRouteTable {
    fn routes(&self) -> Result<Vec<Route>> {
        let mut routes = Vec::new();
        for route in self.read_routes()? {
            let link_index = match if_nametoindex(route.interface.as_str()) {
                Ok(index) => index,
                // blackhole, unreachable and prohibit routes print `*` as their interface
                Err(e) if route.destination.is_some() => {
                    debug!(
                        interface = %route.interface,
                        destination = ?route.destination,
                        error = %e,
                        "Skipping route without a resolvable interface"
                    );
                    continue;
                }
                Err(e) => {
                    return Err(RoutingError::RouteList {
                        message: format!(
                            "failed to resolve interface {} of default route: {}",
                            route.interface, e
                        ),
                        source: None,
                    });
                }
            };
            routes.push(Route {
                destination: route.destination,
                link_index,
            });
        }
        Ok(routes)
    }

    fn link_name(&self, index: u32) -> Result<String> {
        let interfaces =
            if_nameindex().map_err(|e| RoutingError::link_lookup_failed(index, e.to_string()))?;

        interfaces
            .iter()
            .find(|iface| iface.index() == index)
            .map(|iface| iface.name().to_string_lossy().into_owned())
            .ok_or_else(|| RoutingError::link_not_found(index))
    }
}

/// Parse the `/proc/net/route` format. Routes that are not up are skipped.
pub fn parse_routes(contents: &str, path: &Path) -> Result<Vec<ProcRoute>> {
    let mut routes = Vec::new();

    // First line is the column header
    for (number, line) in contents.lines().enumerate().skip(1) {
        let line_no = number + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 8 {
            return Err(RoutingError::malformed(
                path,
                line_no,
                format!("expected at least 8 fields, got {}", fields.len()),
            ));
        }

        let flags = parse_hex(fields[3], path, line_no)?;
        if flags & RTF_UP == 0 {
            continue;
        }

        let destination = hex_to_addr(fields[1], path, line_no)?;
        let mask = hex_to_addr(fields[7], path, line_no)?;
        let prefix = ipnet::ipv4_mask_to_prefix(mask).map_err(|_| {
            RoutingError::malformed(path, line_no, format!("non-contiguous netmask {}", mask))
        })?;

        let destination = if prefix == 0 {
            None
        } else {
            Some(Ipv4Net::new(destination, prefix).map_err(|e| {
                RoutingError::malformed(path, line_no, e.to_string())
            })?)
        };

        routes.push(ProcRoute {
            interface: fields[0].to_string(),
            destination,
        });
    }

    Ok(routes)
}

fn parse_hex(field: &str, path: &Path, line: usize) -> Result<u32> {
    u32::from_str_radix(field, 16)
        .map_err(|e| RoutingError::malformed(path, line, format!("bad hex field '{}': {}", field, e)))
}

// procfs prints the network-order address as a native integer
fn hex_to_addr(field: &str, path: &Path, line: usize) -> Result<Ipv4Addr> {
    Ok(Ipv4Addr::from(parse_hex(field, path, line)?.to_ne_bytes()))
}
