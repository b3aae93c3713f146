use natkeeper::Reconciler;
use natkeeper::firewall::MemoryFirewall;
use natkeeper::routing::ProcRouteTable;
use natkeeper::snapshot::FileSnapshot;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Interface every Linux network namespace has.
pub const LOOPBACK: &str = "lo";

/// A snapshot file and a route table on disk, plus an in-memory firewall.
pub struct TestEnvironment {
    pub dir: TempDir,
    pub snapshot_path: PathBuf,
    pub route_path: PathBuf,
    pub firewall: MemoryFirewall,
}

impl TestEnvironment {
    pub fn new(snapshot: &str, routes: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let snapshot_path = dir.path().join("snapshot.yaml");
        let route_path = dir.path().join("route");
        std::fs::write(&snapshot_path, snapshot).expect("Failed to write snapshot");
        std::fs::write(&route_path, routes).expect("Failed to write route table");

        Self {
            dir,
            snapshot_path,
            route_path,
            firewall: MemoryFirewall::new(),
        }
    }

    /// Replace the snapshot document, as the cluster agent would.
    pub fn write_snapshot(&self, snapshot: &str) {
        std::fs::write(&self.snapshot_path, snapshot).expect("Failed to write snapshot");
    }

    pub fn write_routes(&self, routes: &str) {
        std::fs::write(&self.route_path, routes).expect("Failed to write route table");
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::builder()
            .snapshot(Arc::new(FileSnapshot::new(&self.snapshot_path)))
            .firewall(Arc::new(self.firewall.clone()))
            .routes(Arc::new(
                ProcRouteTable::builder().path(&self.route_path).build(),
            ))
            .build()
    }
}
