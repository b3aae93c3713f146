//! Read-only records consumed from the cluster's container and policy tables.

#[cfg(test)]
mod tests;

use bon::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection endpoint label denoting anything outside the cluster.
pub const PUBLIC_INTERNET_LABEL: &str = "public";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct Container {
    #[builder(into)]
    pub id: String,
    /// Empty until the container has been scheduled and given an address.
    #[serde(default)]
    #[builder(default, into)]
    pub ip: String,
    #[serde(default)]
    #[builder(default)]
    pub labels: Vec<String>,
}

impl Container {
    pub fn is_scheduled(&self) -> bool {
        !self.ip.is_empty()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Permission for traffic from `from` to `to` on ports `min_port..=max_port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct Connection {
    #[builder(into)]
    pub from: String,
    #[builder(into)]
    pub to: String,
    pub min_port: u16,
    pub max_port: u16,
}

impl Connection {
    pub fn is_from_public(&self) -> bool {
        self.from == PUBLIC_INTERNET_LABEL
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    None,
    Master,
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Master => "master",
            Self::Worker => "worker",
        };
        f.write_str(name)
    }
}

/// This host's record in the cluster store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct Node {
    #[serde(default)]
    #[builder(default)]
    pub initialized: bool,
    #[serde(default)]
    #[builder(default)]
    pub role: Role,
}

impl Node {
    pub fn is_ready_worker(&self) -> bool {
        self.initialized && self.role == Role::Worker
    }
}
