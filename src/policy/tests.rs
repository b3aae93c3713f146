use super::*;

#[test]
fn test_container_scheduling_and_labels() {
    let container = Container::builder()
        .id("c1")
        .labels(vec!["web".to_string(), "frontend".to_string()])
        .build();
    assert!(!container.is_scheduled());
    assert!(container.has_label("web"));
    assert!(!container.has_label("db"));

    let container = Container::builder().id("c2").ip("10.0.0.5").build();
    assert!(container.is_scheduled());
}

#[test]
fn test_connection_from_public() {
    let conn = Connection::builder()
        .from(PUBLIC_INTERNET_LABEL)
        .to("web")
        .min_port(80)
        .max_port(80)
        .build();
    assert!(conn.is_from_public());

    let conn = Connection::builder()
        .from("web")
        .to(PUBLIC_INTERNET_LABEL)
        .min_port(443)
        .max_port(443)
        .build();
    assert!(!conn.is_from_public());
}

#[test]
fn test_node_readiness() {
    assert!(!Node::default().is_ready_worker());
    assert!(
        !Node::builder()
            .initialized(true)
            .role(Role::Master)
            .build()
            .is_ready_worker()
    );
    assert!(
        !Node::builder()
            .role(Role::Worker)
            .build()
            .is_ready_worker()
    );
    assert!(
        Node::builder()
            .initialized(true)
            .role(Role::Worker)
            .build()
            .is_ready_worker()
    );
}

#[test]
fn test_records_deserialize() {
    let node: Node = serde_yaml::from_str("initialized: true\nrole: worker\n").unwrap();
    assert!(node.is_ready_worker());

    let container: Container = serde_yaml::from_str("id: abc\nlabels: [web]\n").unwrap();
    assert_eq!(container.ip, "");
    assert_eq!(container.labels, vec!["web"]);

    let conn: Connection =
        serde_yaml::from_str("from: public\nto: web\nmin_port: 8000\nmax_port: 8080\n").unwrap();
    assert_eq!((conn.min_port, conn.max_port), (8000, 8080));

    assert!(serde_yaml::from_str::<Node>("role: leader\n").is_err());
}
