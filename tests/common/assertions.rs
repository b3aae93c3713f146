use natkeeper::firewall::{MemoryFirewall, NAT_TABLE, PREROUTING_CHAIN};

/// The DNAT rule text the compiler produces for one forward.
pub fn dnat(interface: &str, protocol: &str, address: &str, port: u16) -> String {
    format!(
        "-i {iface} -p {proto} -m {proto} --dport {port} -j DNAT --to-destination {address}:{port}",
        iface = interface,
        proto = protocol,
        port = port,
        address = address,
    )
}

/// PREROUTING holds exactly `expected`, in any order.
pub fn assert_dnat_rules(fw: &MemoryFirewall, expected: &[String]) {
    let mut live = fw.rules(NAT_TABLE, PREROUTING_CHAIN);
    live.sort();
    let mut expected = expected.to_vec();
    expected.sort();
    assert_eq!(live, expected, "PREROUTING does not match the expected rules");
}
