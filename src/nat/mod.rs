//! Port-forwarding reconciliation for the `nat` table.
//!
//! Two kinds of rules are managed. Default rules must exist for forwarding to
//! work at all; they are appended when missing and anything else already in
//! their chains is left alone. The PREROUTING chain carries one DNAT rule per
//! forwarded (container, port, protocol) and is converged to exactly that set.

pub mod defaults;
pub mod error;
pub mod rules;
pub mod sync;

pub use defaults::{default_rules, install_default_rules};
pub use error::{NatError, Result};
pub use rules::{Protocol, routing_rules};
pub use sync::{ChainDiff, SyncReport, sync_chain};

use crate::firewall::{Firewall, NAT_TABLE, PREROUTING_CHAIN};
use crate::policy::{Connection, Container};
use crate::routing::{RouteTable, public_interface};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;
use tracing::debug;

/// Default source block masqueraded on the way out.
pub const DEFAULT_INTERNAL_SUBNET: &str = "10.0.0.0/8";

pub fn default_internal_subnet() -> Ipv4Net {
    Ipv4Net::new_assert(Ipv4Addr::new(10, 0, 0, 0), 8)
}

/// One reconciliation pass: resolve the public interface, ensure the default
/// rules, then converge PREROUTING to the compiled target.
pub fn update_nat(
    fw: &dyn Firewall,
    routes: &dyn RouteTable,
    internal_subnet: &Ipv4Net,
    containers: &[Container],
    connections: &[Connection],
) -> Result<SyncReport> {
    let interface = public_interface(routes)?;

    install_default_rules(fw, &interface, internal_subnet)?;

    let target = routing_rules(&interface, containers, connections);
    debug!(
        interface = %interface,
        rules = target.len(),
        "Compiled port-forwarding rules"
    );

    sync_chain(fw, NAT_TABLE, PREROUTING_CHAIN, &target)
}
