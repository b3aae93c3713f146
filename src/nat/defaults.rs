use super::{NatError, Result};
use crate::firewall::{
    Firewall, INPUT_CHAIN, NAT_TABLE, OUTPUT_CHAIN, POSTROUTING_CHAIN, Rule,
};
use ipnet::Ipv4Net;
use tracing::debug;

/// Baseline rules the port-forwarding chain depends on.
pub fn default_rules(public_interface: &str, internal_subnet: &Ipv4Net) -> Vec<Rule> {
    vec![
        Rule::new(NAT_TABLE, INPUT_CHAIN, "-j ACCEPT"),
        Rule::new(NAT_TABLE, OUTPUT_CHAIN, "-j ACCEPT"),
        Rule::new(
            NAT_TABLE,
            POSTROUTING_CHAIN,
            format!(
                "-s {} -o {} -j MASQUERADE",
                internal_subnet, public_interface
            ),
        ),
    ]
}

/// Ensure every baseline rule exists. Rules are only ever added, never removed.
pub fn install_default_rules(
    fw: &dyn Firewall,
    public_interface: &str,
    internal_subnet: &Ipv4Net,
) -> Result<()> {
    for rule in default_rules(public_interface, internal_subnet) {
        fw.append_unique(&rule.table, &rule.chain, &rule.args)
            .map_err(|source| NatError::DefaultRule {
                table: rule.table.clone(),
                chain: rule.chain.clone(),
                rule: rule.args.clone(),
                source,
            })?;
        debug!(rule = %rule, "Default rule present");
    }
    Ok(())
}
