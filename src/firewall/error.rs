use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FirewallError>;

/// The four chain operations the engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Append,
    AppendUnique,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Append => "append",
            Self::AppendUnique => "append-unique",
            Self::Delete => "delete",
            Self::List => "list",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FirewallError {
    #[error("iptables {operation} failed on {table}/{chain}{}: {message}", .rule.as_ref().map(|r| format!(" for rule '{}'", r)).unwrap_or_default())]
    Command {
        operation: Operation,
        table: String,
        chain: String,
        rule: Option<String>,
        message: String,
    },

    #[error("Firewall backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Chain '{chain}' not found in table '{table}'")]
    ChainNotFound { table: String, chain: String },

    #[error("Rule '{rule}' not found in {table}/{chain}")]
    RuleNotFound {
        table: String,
        chain: String,
        rule: String,
    },
}

impl FirewallError {
    pub fn command(
        operation: Operation,
        table: impl Into<String>,
        chain: impl Into<String>,
        rule: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Command {
            operation,
            table: table.into(),
            chain: chain.into(),
            rule: rule.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn chain_not_found(table: impl Into<String>, chain: impl Into<String>) -> Self {
        Self::ChainNotFound {
            table: table.into(),
            chain: chain.into(),
        }
    }

    pub fn rule_not_found(
        table: impl Into<String>,
        chain: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self::RuleNotFound {
            table: table.into(),
            chain: chain.into(),
            rule: rule.into(),
        }
    }

    /// The operation that failed, when the error came from a chain call.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Command { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    pub fn is_permission_error(&self) -> bool {
        match self {
            Self::Command { message, .. } | Self::Unavailable { reason: message } => {
                message.contains("Permission denied") || message.contains("Operation not permitted")
            }
            _ => false,
        }
    }
}
