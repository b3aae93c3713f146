//! Diff-and-apply of one chain against its desired rule set.

use super::{NatError, Result};
use crate::firewall::{APPEND_MARKER, Firewall};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Edit script turning the live chain into the desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainDiff {
    pub to_delete: Vec<String>,
    pub to_add: Vec<String>,
    pub unchanged: usize,
}

impl ChainDiff {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_delete.len() + self.to_add.len()
    }
}

/// Outcome of one chain synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub deleted: usize,
    pub added: usize,
    pub unchanged: usize,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.deleted > 0 || self.added > 0
    }

    /// Rules in the chain that match the desired set after the pass.
    pub fn managed(&self) -> usize {
        self.unchanged + self.added
    }
}

/// Appended rules of a chain, with the `-A <chain>` prefix stripped.
pub fn current_rules(fw: &dyn Firewall, table: &str, chain: &str) -> Result<Vec<String>> {
    let raw = fw.list(table, chain).map_err(|source| NatError::ListChain {
        table: table.to_string(),
        chain: chain.to_string(),
        source,
    })?;

    let mut rules = Vec::new();
    for line in raw {
        if !line.starts_with(APPEND_MARKER) {
            continue;
        }

        let fields: Vec<&str> = line.splitn(3, ' ').collect();
        if fields.len() != 3 {
            return Err(NatError::malformed_rule(table, chain, line));
        }
        rules.push(fields[2].to_string());
    }

    Ok(rules)
}

/// Symmetric difference of the live rules against the target, keyed by rule string.
///
/// Live duplicates of a wanted rule are deleted down to one copy.
pub fn diff(current: &[String], target: &BTreeSet<String>) -> ChainDiff {
    let mut live: BTreeMap<&str, usize> = BTreeMap::new();
    for rule in current {
        *live.entry(rule.as_str()).or_default() += 1;
    }

    let mut result = ChainDiff::default();

    for (&rule, &count) in &live {
        let keep = usize::from(target.contains(rule));
        result.unchanged += keep;
        result
            .to_delete
            .extend(std::iter::repeat_n(rule.to_string(), count - keep));
    }

    result.to_add = target
        .iter()
        .filter(|rule| !live.contains_key(rule.as_str()))
        .cloned()
        .collect();

    result
}

/// Apply a diff: every deletion, then every addition. Stops at the first error.
pub fn apply(fw: &dyn Firewall, table: &str, chain: &str, diff: &ChainDiff) -> Result<SyncReport> {
    let planned = diff.len();
    let mut report = SyncReport {
        unchanged: diff.unchanged,
        ..SyncReport::default()
    };

    let edit_error = |applied: usize, source| NatError::ApplyEdit {
        table: table.to_string(),
        chain: chain.to_string(),
        applied,
        planned,
        source,
    };

    for rule in &diff.to_delete {
        fw.delete(table, chain, rule)
            .map_err(|e| edit_error(report.deleted, e))?;
        info!(table, chain, rule = %rule, "Deleted rule");
        report.deleted += 1;
    }

    for rule in &diff.to_add {
        fw.append(table, chain, rule)
            .map_err(|e| edit_error(report.deleted + report.added, e))?;
        info!(table, chain, rule = %rule, "Appended rule");
        report.added += 1;
    }

    Ok(report)
}

/// Bring `table`/`chain` in line with `target`, touching only rules that differ.
pub fn sync_chain(
    fw: &dyn Firewall,
    table: &str,
    chain: &str,
    target: &BTreeSet<String>,
) -> Result<SyncReport> {
    let current = current_rules(fw, table, chain)?;
    let diff = diff(&current, target);

    debug!(
        table,
        chain,
        current = current.len(),
        target = target.len(),
        to_delete = diff.to_delete.len(),
        to_add = diff.to_add.len(),
        "Computed chain diff"
    );

    if diff.is_empty() {
        return Ok(SyncReport {
            unchanged: diff.unchanged,
            ..SyncReport::default()
        });
    }

    apply(fw, table, chain, &diff)
}
