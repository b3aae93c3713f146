mod common;

use common::environment::LOOPBACK;
use common::fixtures::{
    SnapshotDocs, container, public_connection, route_table_with_default,
    route_table_without_default, worker_snapshot,
};
use common::{TestEnvironment, assert_dnat_rules, dnat};
use natkeeper::firewall::{
    Firewall, MemoryFirewall, NAT_TABLE, Operation, POSTROUTING_CHAIN, PREROUTING_CHAIN,
};
use natkeeper::manager::{SkipReason, TickOutcome, TickRecord};
use natkeeper::nat::{self, NatError};
use natkeeper::policy::Role;
use natkeeper::routing::{RoutingError, StaticRouteTable};
use natkeeper::snapshot::SharedSnapshot;
use natkeeper::{Error, NatManager, Reconciler};
use std::sync::Arc;
use std::time::Duration;

fn applied(outcome: TickOutcome) -> nat::SyncReport {
    match outcome {
        TickOutcome::Applied(report) => report,
        other => panic!("expected an applied pass, got {other:?}"),
    }
}

#[test]
fn test_public_connection_forwards_both_protocols() {
    let env = TestEnvironment::new(
        SnapshotDocs::single_web(),
        &route_table_with_default(LOOPBACK),
    );

    let report = applied(env.reconciler().tick().unwrap());
    assert_eq!(report.added, 2);

    assert_dnat_rules(
        &env.firewall,
        &[
            dnat(LOOPBACK, "tcp", "10.0.0.5", 80),
            dnat(LOOPBACK, "udp", "10.0.0.5", 80),
        ],
    );
    assert_eq!(
        env.firewall.rules(NAT_TABLE, POSTROUTING_CHAIN),
        vec![format!("-s 10.0.0.0/8 -o {} -j MASQUERADE", LOOPBACK)]
    );
}

#[test]
fn test_unscheduled_container_gets_no_forward() {
    let env = TestEnvironment::new(
        SnapshotDocs::unscheduled_web(),
        &route_table_with_default(LOOPBACK),
    );

    let report = applied(env.reconciler().tick().unwrap());
    assert_eq!(report.managed(), 0);
    assert_dnat_rules(&env.firewall, &[]);
}

#[test]
fn test_rescheduled_container_replaces_stale_forward() {
    let env = TestEnvironment::new(
        SnapshotDocs::rescheduled_web(),
        &route_table_with_default(LOOPBACK),
    );
    let reconciler = env.reconciler();
    reconciler.tick().unwrap();

    env.write_snapshot(SnapshotDocs::single_web());
    env.firewall.clear_calls();
    let report = applied(reconciler.tick().unwrap());
    assert_eq!((report.deleted, report.added), (2, 2));

    // every delete lands before the first append
    let mutations: Vec<_> = env
        .firewall
        .mutations()
        .into_iter()
        .filter(|c| c.chain == PREROUTING_CHAIN)
        .collect();
    let first_append = mutations
        .iter()
        .position(|c| c.operation == Operation::Append)
        .unwrap();
    assert!(mutations[..first_append]
        .iter()
        .all(|c| c.operation == Operation::Delete));
    assert_eq!(first_append, 2);

    assert_dnat_rules(
        &env.firewall,
        &[
            dnat(LOOPBACK, "tcp", "10.0.0.5", 80),
            dnat(LOOPBACK, "udp", "10.0.0.5", 80),
        ],
    );
}

#[test]
fn test_missing_default_route_makes_no_firewall_calls() {
    let env = TestEnvironment::new(
        SnapshotDocs::single_web(),
        &route_table_without_default(LOOPBACK),
    );

    let err = env.reconciler().tick().unwrap_err();
    assert!(matches!(
        err,
        Error::Nat(NatError::PublicInterface(RoutingError::MissingDefaultRoute))
    ));
    assert!(env.firewall.calls().is_empty());
}

#[test]
fn test_same_port_for_two_labels_forwards_to_each_container() {
    let fw = MemoryFirewall::new();
    let snapshot = worker_snapshot(
        vec![
            container("web-1", "10.0.0.5", &["web"]),
            container("api-1", "10.0.0.6", &["api"]),
        ],
        vec![
            public_connection("web", 443, 443),
            public_connection("api", 443, 443),
        ],
    );
    let reconciler = Reconciler::builder()
        .snapshot(Arc::new(SharedSnapshot::new(snapshot)))
        .firewall(Arc::new(fw.clone()))
        .routes(Arc::new(StaticRouteTable::with_default_route("eth0")))
        .build();

    let report = applied(reconciler.tick().unwrap());
    assert_eq!(report.added, 4);
    assert_dnat_rules(
        &fw,
        &[
            dnat("eth0", "tcp", "10.0.0.5", 443),
            dnat("eth0", "udp", "10.0.0.5", 443),
            dnat("eth0", "tcp", "10.0.0.6", 443),
            dnat("eth0", "udp", "10.0.0.6", 443),
        ],
    );
}

#[test]
fn test_foreign_rules_are_converged_and_defaults_kept() {
    let env = TestEnvironment::new(
        SnapshotDocs::single_web(),
        &route_table_with_default(LOOPBACK),
    );
    let foreign = "-i lo -p tcp -m tcp --dport 22 -j DNAT --to-destination 10.0.0.2:22";
    let duplicate = dnat(LOOPBACK, "tcp", "10.0.0.5", 80);
    for rule in [foreign, duplicate.as_str(), duplicate.as_str()] {
        env.firewall.append(NAT_TABLE, PREROUTING_CHAIN, rule).unwrap();
    }
    env.firewall
        .append(NAT_TABLE, POSTROUTING_CHAIN, "-j ACCEPT")
        .unwrap();

    let report = applied(env.reconciler().tick().unwrap());
    assert_eq!((report.deleted, report.added, report.unchanged), (2, 1, 1));

    assert_dnat_rules(
        &env.firewall,
        &[
            dnat(LOOPBACK, "tcp", "10.0.0.5", 80),
            dnat(LOOPBACK, "udp", "10.0.0.5", 80),
        ],
    );
    // default chains are only ever appended to
    assert_eq!(
        env.firewall.rules(NAT_TABLE, POSTROUTING_CHAIN),
        vec![
            "-j ACCEPT".to_string(),
            format!("-s 10.0.0.0/8 -o {} -j MASQUERADE", LOOPBACK),
        ]
    );
}

#[test]
fn test_second_pass_is_a_no_op() {
    let env = TestEnvironment::new(
        SnapshotDocs::single_web(),
        &route_table_with_default(LOOPBACK),
    );
    let reconciler = env.reconciler();
    reconciler.tick().unwrap();

    env.firewall.clear_calls();
    let report = applied(reconciler.tick().unwrap());
    assert!(!report.changed());
    assert!(env
        .firewall
        .mutations()
        .iter()
        .all(|c| c.operation == Operation::AppendUnique));
}

#[test]
fn test_gating_follows_snapshot_node_record() {
    let env = TestEnvironment::new(
        SnapshotDocs::unregistered(),
        &route_table_with_default(LOOPBACK),
    );
    let reconciler = env.reconciler();

    assert_eq!(
        reconciler.tick().unwrap(),
        TickOutcome::Skipped(SkipReason::NodeNotRegistered)
    );

    env.write_snapshot(SnapshotDocs::master_node());
    assert_eq!(
        reconciler.tick().unwrap(),
        TickOutcome::Skipped(SkipReason::NotWorker(Role::Master))
    );
    assert!(env.firewall.calls().is_empty());

    env.write_snapshot(SnapshotDocs::single_web());
    applied(reconciler.tick().unwrap());
}

#[test]
fn test_unreadable_snapshot_fails_the_pass() {
    let env = TestEnvironment::new("containers: [", &route_table_with_default(LOOPBACK));

    let err = env.reconciler().tick().unwrap_err();
    assert!(matches!(err, Error::Snapshot(_)));
    assert!(env.firewall.calls().is_empty());
}

#[tokio::test]
async fn test_manager_recovers_once_default_route_appears() {
    let env = TestEnvironment::new(
        SnapshotDocs::single_web(),
        &route_table_without_default(LOOPBACK),
    );
    let manager = NatManager::builder()
        .reconciler(env.reconciler())
        .interval(Duration::from_millis(20))
        .build();

    let record = manager.run_once().await;
    assert!(record.is_failure());
    assert_eq!(manager.status().failures(), 1);

    env.write_routes(&route_table_with_default(LOOPBACK));
    let record = manager.run_once().await;
    assert!(matches!(record, TickRecord::Applied(ref r) if r.added == 2));
    assert!(manager.status().is_ready());
}
