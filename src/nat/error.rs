use crate::firewall::FirewallError;
use crate::routing::RoutingError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NatError>;

#[derive(Error, Debug)]
pub enum NatError {
    #[error("get public interface: {0}")]
    PublicInterface(#[from] RoutingError),

    #[error("install default rule {table}/{chain} '{rule}'")]
    DefaultRule {
        table: String,
        chain: String,
        rule: String,
        #[source]
        source: FirewallError,
    },

    #[error("list {table}/{chain}")]
    ListChain {
        table: String,
        chain: String,
        #[source]
        source: FirewallError,
    },

    #[error("malformed rule in {table}/{chain}: {line}")]
    MalformedRule {
        table: String,
        chain: String,
        line: String,
    },

    #[error("apply edit to {table}/{chain} after {applied} of {planned} changes")]
    ApplyEdit {
        table: String,
        chain: String,
        applied: usize,
        planned: usize,
        #[source]
        source: FirewallError,
    },
}

impl NatError {
    pub fn malformed_rule(
        table: impl Into<String>,
        chain: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        Self::MalformedRule {
            table: table.into(),
            chain: chain.into(),
            line: line.into(),
        }
    }

    /// True when the pass stopped before touching the firewall.
    pub fn is_pre_mutation(&self) -> bool {
        matches!(self, Self::PublicInterface(_))
    }
}
