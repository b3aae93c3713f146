use clap::Parser;
use ipnet::Ipv4Net;
use natkeeper::firewall::IptablesProvider;
use natkeeper::manager::TickRecord;
use natkeeper::routing::ProcRouteTable;
use natkeeper::routing::procfs::DEFAULT_ROUTE_PATH;
use natkeeper::snapshot::FileSnapshot;
use natkeeper::{NatManager, Reconciler, VERSION, parse_duration, shutdown_signal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(author, version, about = "Keep iptables port forwards in sync with container connection policy", long_about = None)]
struct Args {
    /// Snapshot document holding the node record, containers and connections
    #[arg(short = 's', long, env = "NATKEEPER_SNAPSHOT", default_value = "/var/lib/natkeeper/snapshot.yaml")]
    snapshot: PathBuf,

    /// Time between reconciliation passes
    #[arg(short = 'i', long, env = "NATKEEPER_INTERVAL", default_value = "30s", value_parser = parse_duration)]
    interval: Duration,

    /// Upper bound on a single reconciliation pass
    #[arg(short = 't', long, env = "NATKEEPER_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    timeout: Duration,

    /// Source block masqueraded on the way out of the public interface
    #[arg(long, env = "NATKEEPER_INTERNAL_SUBNET", default_value = "10.0.0.0/8")]
    internal_subnet: Ipv4Net,

    /// Kernel routing table to read the default route from
    #[arg(long, env = "NATKEEPER_ROUTE_TABLE", default_value = DEFAULT_ROUTE_PATH)]
    route_table: PathBuf,

    /// Enable health check server on specified address (e.g., "127.0.0.1:8080")
    #[arg(long, env = "NATKEEPER_HEALTH_SERVER")]
    health_server: Option<String>,

    /// Run a single reconciliation pass and exit
    #[arg(long, env = "NATKEEPER_ONCE")]
    once: bool,

    /// Log rule changes instead of applying them
    #[arg(long, env = "NATKEEPER_DRY_RUN")]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long, env = "NATKEEPER_DEBUG")]
    debug: bool,

    /// Path to log to (use "stdout" or "stderr" for console output)
    #[arg(short = 'l', long, env = "NATKEEPER_LOG_PATH", default_value = "stdout")]
    log_path: String,

    /// Print version and build information and exit
    #[arg(long = "version-info")]
    version_info: bool,
}

#[tokio::main]
async fn main() {
    // Load .env file if it exists
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Error loading .env file: {}", e);
        }
    }

    let args = Args::parse();

    if args.version_info {
        println!("natkeeper {}", VERSION);
        println!(
            "build time: {}",
            option_env!("BUILD_TIME").unwrap_or("unknown")
        );
        println!(
            "git commit: {}",
            option_env!("GIT_COMMIT").unwrap_or("unknown")
        );
        return;
    }

    // Initialize logging
    let env_filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let subscriber = tracing_subscriber::registry().with(env_filter);

    // Keeps the non-blocking writer flushing until main returns
    let _guard = if args.log_path == "stdout" {
        tracing::subscriber::set_global_default(subscriber.with(fmt::layer()))
            .expect("Failed to set tracing subscriber");
        None
    } else if args.log_path == "stderr" {
        tracing::subscriber::set_global_default(
            subscriber.with(fmt::layer().with_writer(std::io::stderr)),
        )
        .expect("Failed to set tracing subscriber");
        None
    } else {
        let file_appender = tracing_appender::rolling::never("", &args.log_path);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing::subscriber::set_global_default(
            subscriber.with(fmt::layer().with_writer(non_blocking)),
        )
        .expect("Failed to set tracing subscriber");
        Some(guard)
    };

    // Dry runs only list chains, which still needs the capability
    if let Err(e) = natkeeper::security::check_capabilities() {
        error!("Capability check failed: {}", e);
        std::process::exit(1);
    }
    info!("All required capabilities are present");

    let reconciler = Reconciler::builder()
        .snapshot(Arc::new(FileSnapshot::new(&args.snapshot)))
        .firewall(Arc::new(
            IptablesProvider::builder().dry_run(args.dry_run).build(),
        ))
        .routes(Arc::new(
            ProcRouteTable::builder().path(&args.route_table).build(),
        ))
        .internal_subnet(args.internal_subnet)
        .build();

    let manager = NatManager::builder()
        .reconciler(reconciler)
        .interval(args.interval)
        .tick_timeout(args.timeout)
        .maybe_health_server_addr(args.health_server)
        .build();

    info!(
        snapshot = %args.snapshot.display(),
        internal_subnet = %args.internal_subnet,
        dry_run = args.dry_run,
        "Starting natkeeper v{}",
        VERSION
    );

    if args.once {
        match manager.run_once().await {
            TickRecord::Failed(_) => std::process::exit(1),
            record => info!(outcome = record.label(), "Single pass finished"),
        }
        return;
    }

    let manager = match manager.start().await {
        Ok(started_manager) => started_manager,
        Err(e) => {
            error!("Failed to start NAT manager: {}", e);
            std::process::exit(1);
        }
    };

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutting down");

    manager.stop().await;
}
