//! In-memory firewall that mimics iptables chain semantics and listing format.
//!
//! Used by the test suites and for simulating a pass without touching the
//! kernel. Every call is recorded so callers can assert on the exact edit
//! script that was applied.

use super::{
    APPEND_MARKER, Firewall, FirewallError, FirewallProvider, INPUT_CHAIN, NAT_TABLE,
    OUTPUT_CHAIN, Operation, POSTROUTING_CHAIN, PREROUTING_CHAIN, Result,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallCall {
    pub operation: Operation,
    pub table: String,
    pub chain: String,
    pub rule: Option<String>,
}

impl FirewallCall {
    pub fn is_mutation(&self) -> bool {
        self.operation != Operation::List
    }
}

#[derive(Debug, Default)]
struct ChainState {
    builtin: bool,
    rules: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    chains: BTreeMap<(String, String), ChainState>,
    calls: Vec<FirewallCall>,
    failing: HashSet<Operation>,
}

#[derive(Debug, Clone)]
pub struct MemoryFirewall {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryFirewall {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFirewall {
    /// A firewall with the built-in `nat` chains, all empty.
    pub fn new() -> Self {
        let mut state = State::default();
        for chain in [PREROUTING_CHAIN, INPUT_CHAIN, OUTPUT_CHAIN, POSTROUTING_CHAIN] {
            state.chains.insert(
                (NAT_TABLE.to_string(), chain.to_string()),
                ChainState {
                    builtin: true,
                    rules: Vec::new(),
                },
            );
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add a user-defined chain.
    pub fn with_chain(self, table: &str, chain: &str) -> Self {
        self.lock()
            .chains
            .entry((table.to_string(), chain.to_string()))
            .or_default();
        self
    }

    /// Seed a rule without recording a call.
    pub fn with_rule(self, table: &str, chain: &str, rule: &str) -> Self {
        self.lock()
            .chains
            .entry((table.to_string(), chain.to_string()))
            .or_default()
            .rules
            .push(rule.to_string());
        self
    }

    /// Make every subsequent call of `operation` fail.
    pub fn fail_on(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    pub fn rules(&self, table: &str, chain: &str) -> Vec<String> {
        self.lock()
            .chains
            .get(&(table.to_string(), chain.to_string()))
            .map(|c| c.rules.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<FirewallCall> {
        self.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<FirewallCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(
        state: &mut State,
        operation: Operation,
        table: &str,
        chain: &str,
        rule: Option<&str>,
    ) -> Result<()> {
        state.calls.push(FirewallCall {
            operation,
            table: table.to_string(),
            chain: chain.to_string(),
            rule: rule.map(str::to_string),
        });
        if state.failing.contains(&operation) {
            return Err(FirewallError::command(
                operation,
                table,
                chain,
                rule,
                "injected failure",
            ));
        }
        Ok(())
    }
}

fn chain_mut<'a>(state: &'a mut State, table: &str, chain: &str) -> Result<&'a mut ChainState> {
    state
        .chains
        .get_mut(&(table.to_string(), chain.to_string()))
        .ok_or_else(|| FirewallError::chain_not_found(table, chain))
}

impl Firewall for MemoryFirewall {
    fn append(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        let mut state = self.lock();
        Self::record(&mut state, Operation::Append, table, chain, Some(rule))?;
        chain_mut(&mut state, table, chain)?
            .rules
            .push(rule.to_string());
        Ok(())
    }

    fn append_unique(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        let mut state = self.lock();
        Self::record(&mut state, Operation::AppendUnique, table, chain, Some(rule))?;
        let chain_state = chain_mut(&mut state, table, chain)?;
        if !chain_state.rules.iter().any(|r| r == rule) {
            chain_state.rules.push(rule.to_string());
        }
        Ok(())
    }

    fn delete(&self, table: &str, chain: &str, rule: &str) -> Result<()> {
        let mut state = self.lock();
        Self::record(&mut state, Operation::Delete, table, chain, Some(rule))?;
        let chain_state = chain_mut(&mut state, table, chain)?;
        // iptables -D removes the first match only
        match chain_state.rules.iter().position(|r| r == rule) {
            Some(index) => {
                chain_state.rules.remove(index);
                Ok(())
            }
            None => Err(FirewallError::rule_not_found(table, chain, rule)),
        }
    }

    fn list(&self, table: &str, chain: &str) -> Result<Vec<String>> {
        let mut state = self.lock();
        Self::record(&mut state, Operation::List, table, chain, None)?;
        let chain_state = chain_mut(&mut state, table, chain)?;

        let header = if chain_state.builtin {
            format!("-P {} ACCEPT", chain)
        } else {
            format!("-N {}", chain)
        };

        Ok(std::iter::once(header)
            .chain(
                chain_state
                    .rules
                    .iter()
                    .map(|r| format!("{} {} {}", APPEND_MARKER, chain, r)),
            )
            .collect())
    }
}

impl FirewallProvider for MemoryFirewall {
    fn open(&self) -> Result<Box<dyn Firewall>> {
        Ok(Box::new(self.clone()))
    }
}
