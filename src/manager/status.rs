use crate::nat::SyncReport;
use crate::policy::Role;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Why a tick did nothing. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NodeNotRegistered,
    NodeNotInitialized,
    NotWorker(Role),
    FirewallUnavailable(String),
    PreviousPassRunning,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotRegistered => f.write_str("node not registered"),
            Self::NodeNotInitialized => f.write_str("node not initialized"),
            Self::NotWorker(role) => write!(f, "node role is {}", role),
            Self::FirewallUnavailable(reason) => write!(f, "firewall unavailable: {}", reason),
            Self::PreviousPassRunning => f.write_str("previous pass still running"),
        }
    }
}

/// Result of a pass that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Applied(SyncReport),
    /// Edits computed against live state but not applied.
    Planned(SyncReport),
}

/// What the loop remembers about a pass, failures included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickRecord {
    Skipped(SkipReason),
    Applied(SyncReport),
    Planned(SyncReport),
    Failed(String),
}

impl TickRecord {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped(_) => "skipped",
            Self::Applied(_) => "applied",
            Self::Planned(_) => "planned",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl From<TickOutcome> for TickRecord {
    fn from(outcome: TickOutcome) -> Self {
        match outcome {
            TickOutcome::Skipped(reason) => Self::Skipped(reason),
            TickOutcome::Applied(report) => Self::Applied(report),
            TickOutcome::Planned(report) => Self::Planned(report),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastTick {
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub record: TickRecord,
}

#[derive(Debug, Default)]
struct StatusInner {
    last_tick: Option<LastTick>,
    last_applied: Option<DateTime<Utc>>,
    ticks: u64,
    failures: u64,
}

/// Shared view of the loop's progress, read by the health server.
#[derive(Debug, Clone, Default)]
pub struct ManagerStatus {
    inner: Arc<RwLock<StatusInner>>,
}

impl ManagerStatus {
    pub fn record(&self, tick: LastTick) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.ticks += 1;
        match tick.record {
            TickRecord::Applied(_) => inner.last_applied = Some(tick.finished_at),
            TickRecord::Failed(_) => inner.failures += 1,
            TickRecord::Skipped(_) | TickRecord::Planned(_) => {}
        }
        inner.last_tick = Some(tick);
    }

    pub fn last_applied(&self) -> Option<DateTime<Utc>> {
        self.read().last_applied
    }

    pub fn ticks(&self) -> u64 {
        self.read().ticks
    }

    pub fn failures(&self) -> u64 {
        self.read().failures
    }

    /// Ready once a pass has converged the firewall at least once.
    pub fn is_ready(&self) -> bool {
        self.read().last_applied.is_some()
    }

    pub fn to_json(&self) -> Value {
        let inner = self.read();
        let last_tick = inner.last_tick.as_ref().map(|tick| {
            let mut value = json!({
                "outcome": tick.record.label(),
                "finished_at": tick.finished_at.to_rfc3339(),
                "duration_ms": tick.duration.as_millis() as u64,
            });
            match &tick.record {
                TickRecord::Applied(report) => {
                    value["rules_added"] = json!(report.added);
                    value["rules_deleted"] = json!(report.deleted);
                    value["rules_unchanged"] = json!(report.unchanged);
                }
                TickRecord::Planned(report) => {
                    value["rules_to_add"] = json!(report.added);
                    value["rules_to_delete"] = json!(report.deleted);
                    value["rules_unchanged"] = json!(report.unchanged);
                }
                TickRecord::Skipped(reason) => value["reason"] = json!(reason.to_string()),
                TickRecord::Failed(error) => value["error"] = json!(error),
            }
            value
        });

        json!({
            "ticks": inner.ticks,
            "failures": inner.failures,
            "last_applied": inner.last_applied.map(|t| t.to_rfc3339()),
            "last_tick": last_tick,
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StatusInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}
