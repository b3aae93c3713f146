//! Compilation of connection policy into destination-NAT rules.

use crate::policy::{Connection, Container};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Tcp, Protocol::Udp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container address to the ports it accepts public traffic on.
pub type PortForwards = BTreeMap<String, BTreeSet<u16>>;

/// Join public connections against the containers carrying their destination label.
///
/// Only a connection's `min_port` is forwarded; a range collapses to its first
/// port.
pub fn public_port_forwards(containers: &[Container], connections: &[Connection]) -> PortForwards {
    let mut forwards = PortForwards::new();

    for conn in connections.iter().filter(|c| c.is_from_public()) {
        for container in containers {
            // unscheduled containers have no address to forward to
            if !container.is_scheduled() || !container.has_label(&conn.to) {
                continue;
            }
            forwards
                .entry(container.ip.clone())
                .or_default()
                .insert(conn.min_port);
        }
    }

    forwards
}

/// Render a DNAT rule exactly as `iptables -S` prints it.
pub fn dnat_rule(interface: &str, protocol: Protocol, address: &str, port: u16) -> String {
    format!(
        "-i {iface} -p {proto} -m {proto} --dport {port} -j DNAT --to-destination {addr}:{port}",
        iface = interface,
        proto = protocol,
        port = port,
        addr = address,
    )
}

/// Desired contents of the `nat` PREROUTING chain.
pub fn routing_rules(
    public_interface: &str,
    containers: &[Container],
    connections: &[Connection],
) -> BTreeSet<String> {
    public_port_forwards(containers, connections)
        .iter()
        .flat_map(|(address, ports)| {
            ports.iter().flat_map(move |&port| {
                Protocol::ALL
                    .into_iter()
                    .map(move |proto| dnat_rule(public_interface, proto, address, port))
            })
        })
        .collect()
}
