use super::{Firewall, Result};
use tracing::info;

/// Reads live state through the wrapped backend but only logs mutations.
pub struct DryRunFirewall {
    inner: Box<dyn Firewall>,
}

impl DryRunFirewall {
    pub fn new(inner: Box<dyn Firewall>) -> Self {
        Self { inner }
    }
}

impl Firewall for DryRunFirewall {
    fn append(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        info!(table, chain, rule, "dry run: would append rule");
        Ok(())
    }

    fn append_unique(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        info!(table, chain, rule, "dry run: would append rule if absent");
        Ok(())
    }

    fn delete(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        info!(table, chain, rule, "dry run: would delete rule");
        Ok(())
    }

    fn list(&self, table: &str, chain: &str) -> Result<Vec<String>> {
        self.inner.list(table, chain)
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
