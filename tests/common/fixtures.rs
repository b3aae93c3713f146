use natkeeper::policy::{Connection, Container, Node, PUBLIC_INTERNET_LABEL, Role};
use natkeeper::snapshot::Snapshot;

/// Snapshot documents as the cluster agent writes them.
pub struct SnapshotDocs;

impl SnapshotDocs {
    /// One public connection to "web" on port 80, one scheduled web container.
    pub fn single_web() -> &'static str {
        r#"
node:
  initialized: true
  role: worker
containers:
  - id: web-1
    ip: 10.0.0.5
    labels: [web]
connections:
  - from: public
    to: web
    min_port: 80
    max_port: 80
"#
    }

    /// The web container has not been given an address yet.
    pub fn unscheduled_web() -> &'static str {
        r#"
node:
  initialized: true
  role: worker
containers:
  - id: web-1
    labels: [web]
connections:
  - from: public
    to: web
    min_port: 80
    max_port: 80
"#
    }

    /// The web container was rescheduled onto a new address.
    pub fn rescheduled_web() -> &'static str {
        r#"
node:
  initialized: true
  role: worker
containers:
  - id: web-1
    ip: 10.0.0.9
    labels: [web]
connections:
  - from: public
    to: web
    min_port: 80
    max_port: 80
"#
    }

    pub fn master_node() -> &'static str {
        r#"
node:
  initialized: true
  role: master
containers:
  - id: web-1
    ip: 10.0.0.5
    labels: [web]
connections:
  - from: public
    to: web
    min_port: 80
    max_port: 80
"#
    }

    pub fn unregistered() -> &'static str {
        "containers: []\nconnections: []\n"
    }
}

pub fn worker() -> Node {
    Node::builder().initialized(true).role(Role::Worker).build()
}

pub fn container(id: &str, ip: &str, labels: &[&str]) -> Container {
    Container::builder()
        .id(id)
        .ip(ip)
        .labels(labels.iter().map(|l| l.to_string()).collect())
        .build()
}

pub fn public_connection(to: &str, min_port: u16, max_port: u16) -> Connection {
    Connection::builder()
        .from(PUBLIC_INTERNET_LABEL)
        .to(to)
        .min_port(min_port)
        .max_port(max_port)
        .build()
}

pub fn worker_snapshot(containers: Vec<Container>, connections: Vec<Connection>) -> Snapshot {
    Snapshot::builder()
        .node(worker())
        .containers(containers)
        .connections(connections)
        .build()
}

/// `/proc/net/route` contents with a default route through `interface`.
pub fn route_table_with_default(interface: &str) -> String {
    // procfs prints the network-order address as a native integer
    let hex = |octets: [u8; 4]| format!("{:08X}", u32::from_ne_bytes(octets));
    format!(
        "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n\
         {iface}\t{any}\t{gw}\t0003\t0\t0\t100\t{any}\t0\t0\t0\n",
        iface = interface,
        any = hex([0, 0, 0, 0]),
        gw = hex([127, 0, 0, 1]),
    )
}

/// `/proc/net/route` contents with only a link-local route.
pub fn route_table_without_default(interface: &str) -> String {
    let hex = |octets: [u8; 4]| format!("{:08X}", u32::from_ne_bytes(octets));
    format!(
        "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n\
         {iface}\t{dst}\t{any}\t0001\t0\t0\t0\t{mask}\t0\t0\t0\n",
        iface = interface,
        dst = hex([127, 0, 0, 0]),
        any = hex([0, 0, 0, 0]),
        mask = hex([255, 0, 0, 0]),
    )
}
