//! The periodic control loop.
//!
//! Every tick re-derives the desired firewall state from a fresh snapshot and
//! converges the live chains towards it. Nothing is carried over between
//! ticks except the status record exposed to the health server.

pub mod error;
pub mod status;

pub use error::ManagerError;
pub use status::{LastTick, ManagerStatus, SkipReason, TickOutcome, TickRecord};

use crate::firewall::FirewallProvider;
use crate::nat::{self, default_internal_subnet};
use crate::policy::Role;
use crate::routing::RouteTable;
use crate::server::{self, HealthServer};
use crate::snapshot::SnapshotSource;
use crate::{Result, error::display_chain};
use bon::{Builder, bon};
use ipnet::Ipv4Net;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TICK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Builder)]
/// Everything one reconciliation pass reads from or writes to.
pub struct Reconciler {
    snapshot: Arc<dyn SnapshotSource>,
    firewall: Arc<dyn FirewallProvider>,
    routes: Arc<dyn RouteTable>,
    #[builder(default = default_internal_subnet())]
    internal_subnet: Ipv4Net,
}

impl Reconciler {
    /// Run one pass synchronously. Gating failures come back as
    /// [`TickOutcome::Skipped`]; everything else that goes wrong is an error.
    /// A dry-run firewall yields [`TickOutcome::Planned`].
    pub fn tick(&self) -> Result<TickOutcome> {
        let snapshot = self.snapshot.load()?;

        let Some(node) = snapshot.node.as_ref() else {
            return Ok(TickOutcome::Skipped(SkipReason::NodeNotRegistered));
        };
        if !node.initialized {
            return Ok(TickOutcome::Skipped(SkipReason::NodeNotInitialized));
        }
        if node.role != Role::Worker {
            return Ok(TickOutcome::Skipped(SkipReason::NotWorker(node.role)));
        }

        let fw = match self.firewall.open() {
            Ok(fw) => fw,
            Err(e) => {
                if e.is_permission_error() {
                    warn!(error = %e, "Firewall access denied, check CAP_NET_ADMIN");
                } else {
                    info!(error = %e, "Failed to get firewall handle, skipping tick");
                }
                return Ok(TickOutcome::Skipped(SkipReason::FirewallUnavailable(
                    e.to_string(),
                )));
            }
        };

        let containers = snapshot.scheduled_containers();
        let report = nat::update_nat(
            fw.as_ref(),
            self.routes.as_ref(),
            &self.internal_subnet,
            &containers,
            &snapshot.connections,
        )?;

        if fw.is_dry_run() {
            return Ok(TickOutcome::Planned(report));
        }
        Ok(TickOutcome::Applied(report))
    }
}

/// Runs passes on the blocking pool, one at a time, each bounded by a timeout.
struct TickDriver {
    reconciler: Arc<Reconciler>,
    tick_timeout: Duration,
    status: ManagerStatus,
    // a pass that outlived its timeout and is still running
    in_flight: Option<JoinHandle<Result<TickOutcome>>>,
}

impl TickDriver {
    async fn run_pass(&mut self) -> TickRecord {
        let started = Instant::now();
        let record = self.execute().await;
        let duration = started.elapsed();

        match &record {
            TickRecord::Applied(report) if report.changed() => info!(
                added = report.added,
                deleted = report.deleted,
                unchanged = report.unchanged,
                "Updated NAT rules"
            ),
            TickRecord::Applied(report) => {
                debug!(unchanged = report.unchanged, "NAT rules already up to date")
            }
            TickRecord::Planned(report) => info!(
                would_add = report.added,
                would_delete = report.deleted,
                unchanged = report.unchanged,
                "Dry run finished, no NAT rules were changed"
            ),
            TickRecord::Skipped(reason) => debug!(%reason, "Skipped tick"),
            TickRecord::Failed(reason) => error!(error = %reason, "Failed to update NAT rules"),
        }

        server::record_tick(&record, duration);
        self.status.record(LastTick {
            finished_at: chrono::Utc::now(),
            duration,
            record: record.clone(),
        });
        record
    }

    async fn execute(&mut self) -> TickRecord {
        if let Some(previous) = self.in_flight.take() {
            if !previous.is_finished() {
                self.in_flight = Some(previous);
                return TickRecord::Skipped(SkipReason::PreviousPassRunning);
            }
            match previous.await {
                Ok(Ok(outcome)) => debug!(?outcome, "Timed out pass eventually finished"),
                Ok(Err(e)) => warn!(error = %display_chain(&e), "Timed out pass eventually failed"),
                Err(e) => warn!(error = %e, "Timed out pass panicked"),
            }
        }

        let reconciler = Arc::clone(&self.reconciler);
        let mut handle = tokio::task::spawn_blocking(move || reconciler.tick());

        match tokio::time::timeout(self.tick_timeout, &mut handle).await {
            Ok(Ok(Ok(outcome))) => outcome.into(),
            Ok(Ok(Err(e))) => TickRecord::Failed(display_chain(&e)),
            Ok(Err(join_error)) => {
                TickRecord::Failed(ManagerError::task_failed(join_error.to_string()).to_string())
            }
            Err(_) => {
                self.in_flight = Some(handle);
                TickRecord::Failed(ManagerError::tick_timeout(self.tick_timeout).to_string())
            }
        }
    }
}

/// Owns the control loop and the optional health server.
pub struct NatManager {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    tick_timeout: Duration,
    health_server_addr: Option<String>,
    status: ManagerStatus,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

#[bon]
impl NatManager {
    #[builder]
    pub fn new(
        reconciler: Reconciler,
        #[builder(default = DEFAULT_INTERVAL)] interval: Duration,
        #[builder(default = DEFAULT_TICK_TIMEOUT)] tick_timeout: Duration,
        health_server_addr: Option<String>,
    ) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            interval,
            tick_timeout,
            health_server_addr,
            status: ManagerStatus::default(),
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }
}

impl NatManager {
    pub fn status(&self) -> &ManagerStatus {
        &self.status
    }

    fn driver(&self) -> TickDriver {
        TickDriver {
            reconciler: Arc::clone(&self.reconciler),
            tick_timeout: self.tick_timeout,
            status: self.status.clone(),
            in_flight: None,
        }
    }

    /// Run a single pass and return its record.
    pub async fn run_once(&self) -> TickRecord {
        self.driver().run_pass().await
    }

    /// Start the health server, if configured, and the control loop.
    pub async fn start(mut self) -> Result<Self> {
        if let Some(addr) = self.health_server_addr.clone() {
            let prometheus_handle = server::setup_metrics()?;
            let health_server = HealthServer::new(
                &addr,
                prometheus_handle,
                self.status.clone(),
                crate::VERSION.to_string(),
            )
            .await?;

            let shutdown = self.shutdown.clone();
            self.tasks.push(tokio::spawn(async move {
                tokio::select! {
                    result = health_server.serve() => {
                        if let Err(e) = result {
                            error!("Health server stopped: {}", e);
                        }
                    }
                    _ = shutdown.cancelled() => {}
                }
            }));
        }

        info!(
            interval = ?self.interval,
            tick_timeout = ?self.tick_timeout,
            "Starting NAT control loop"
        );

        let mut driver = self.driver();
        let interval = self.interval;
        let shutdown = self.shutdown.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Control loop received shutdown signal");
                        return;
                    }
                    _ = ticker.tick() => {}
                }
                driver.run_pass().await;
            }
        }));

        Ok(self)
    }

    /// Signal shutdown and wait for background tasks to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Background task failed during shutdown: {}", e);
            }
        }
        info!("NAT manager stopped");
    }
}
