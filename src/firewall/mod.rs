//! Narrow capability interface over an iptables-style rule chain.
//!
//! The engine only ever appends, appends-if-absent, deletes and lists. Rules
//! are exchanged as the argument string the tool itself prints in `-S`
//! listings so that live state can be diffed byte-for-byte.

pub mod dry_run;
pub mod error;
pub mod memory;

pub use dry_run::DryRunFirewall;
pub use error::{FirewallError, Operation, Result};
pub use memory::MemoryFirewall;

use bon::Builder;
use std::fmt;
use tracing::debug;

pub const NAT_TABLE: &str = "nat";
pub const PREROUTING_CHAIN: &str = "PREROUTING";
pub const INPUT_CHAIN: &str = "INPUT";
pub const OUTPUT_CHAIN: &str = "OUTPUT";
pub const POSTROUTING_CHAIN: &str = "POSTROUTING";

/// Listing prefix of an appended rule, e.g. `-A PREROUTING -i eth0 ...`.
pub const APPEND_MARKER: &str = "-A";

pub trait Firewall: Send + Sync {
    fn append(&self, table: &str, chain: &str, rule: &str) -> Result<()>;

    /// Append `rule` unless an identical rule is already in the chain.
    fn append_unique(&self, table: &str, chain: &str, rule: &str) -> Result<()>;

    fn delete(&self, table: &str, chain: &str, rule: &str) -> Result<()>;

    /// Raw `-S` style listing of a chain, policy and chain-creation lines included.
    fn list(&self, table: &str, chain: &str) -> Result<Vec<String>>;

    /// True when mutations are only logged, never applied.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Hands out a firewall handle for one reconciliation pass.
pub trait FirewallProvider: Send + Sync {
    fn open(&self) -> Result<Box<dyn Firewall>>;
}

/// One firewall rule: where it lives and its canonical argument string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rule {
    pub table: String,
    pub chain: String,
    pub args: String,
}

impl Rule {
    pub fn new(table: impl Into<String>, chain: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            chain: chain.into(),
            args: args.into(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.table, self.chain, self.args)
    }
}

/// IPv4 iptables backend.
pub struct IptablesClient {
    inner: iptables::IPTables,
}

impl IptablesClient {
    pub fn new() -> Result<Self> {
        let inner = iptables::new(false).map_err(|e| FirewallError::unavailable(e.to_string()))?;
        debug!("Opened iptables handle");
        Ok(Self { inner })
    }
}

impl Firewall for IptablesClient {
    fn append(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        self.inner.append(table, chain, rule).map_err(|e| {
            FirewallError::command(Operation::Append, table, chain, Some(rule), e.to_string())
        })
    }

    fn append_unique(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        self.inner.append_unique(table, chain, rule).map_err(|e| {
            FirewallError::command(
                Operation::AppendUnique,
                table,
                chain,
                Some(rule),
                e.to_string(),
            )
        })
    }

    fn delete(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        self.inner.delete(table, chain, rule).map_err(|e| {
            FirewallError::command(Operation::Delete, table, chain, Some(rule), e.to_string())
        })
    }

    fn list(&self, table: &str, chain: &str) -> Result<Vec<String>> {
        self.inner
            .list(table, chain)
            .map_err(|e| FirewallError::command(Operation::List, table, chain, None, e.to_string()))
    }
}

#[derive(Debug, Clone, Default, Builder)]
/// Opens a fresh [`IptablesClient`] per pass, optionally wrapped for dry runs.
pub struct IptablesProvider {
    #[builder(default = false)]
    pub dry_run: bool,
}

impl FirewallProvider for IptablesProvider {
    fn open(&self) -> Result<Box<dyn Firewall>> {
        let client = IptablesClient::new()?;
        if self.dry_run {
            Ok(Box::new(DryRunFirewall::new(Box::new(client))))
        } else {
            Ok(Box::new(client))
        }
    }
}
