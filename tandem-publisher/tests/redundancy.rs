//! Redundant publishing, republishing and maintenance scenarios.

mod common;

use std::collections::HashSet;

use common::{publisher, server, servers};
use tandem_core::{encode, EncodeOptions, Error, PublishOverrides};
use tandem_publisher::testing::MockBroker;

#[test]
fn test_two_healthy_servers_receive_one_copy_each() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a", "b", "c"]);

    let count = publisher.publish("payment_received", "{}", &PublishOverrides::none()).unwrap();

    assert_eq!(count, 2);
    let targets: HashSet<_> = broker.delivered_to().into_iter().collect();
    assert_eq!(targets.len(), 2);
    let ids: HashSet<_> = broker.deliveries().iter().map(|d| d.message.id()).collect();
    assert_eq!(ids.len(), 1);
    assert!(broker.deliveries().iter().all(|d| d.message.is_redundant()));
}

#[test]
fn test_failed_path_is_replaced() {
    let broker = MockBroker::new();
    broker.take_down(&server("s1"));
    // s1 is the first server selected.
    let mut publisher = publisher(&broker, &["s3", "s1", "s2"]);

    let count = publisher.publish("payment_received", "{}", &PublishOverrides::none()).unwrap();

    assert_eq!(count, 2);
    assert!(publisher.pool().is_dead(&server("s1")));
    let targets: HashSet<_> = broker.delivered_to().into_iter().collect();
    assert_eq!(targets, servers(&["s2", "s3"]).into_iter().collect());
}

#[test]
fn test_single_survivor_gets_one_copy() {
    let broker = MockBroker::new();
    broker.take_down(&server("b"));
    let mut publisher = publisher(&broker, &["a", "b"]);

    let count = publisher.publish("payment_received", "{}", &PublishOverrides::none()).unwrap();

    assert_eq!(count, 1);
    assert_eq!(broker.delivered_to(), servers(&["a"]));
    assert!(broker.deliveries()[0].message.is_redundant());
}

#[test]
fn test_all_paths_down_returns_zero() {
    let broker = MockBroker::new();
    broker.take_down(&server("a"));
    broker.take_down(&server("b"));
    let mut publisher = publisher(&broker, &["a", "b"]);

    let count = publisher.publish("payment_received", "{}", &PublishOverrides::none()).unwrap();

    assert_eq!(count, 0);
    assert!(publisher.pool().is_empty());
    assert_eq!(broker.total_connect_attempts(), 2);
}

#[test]
fn test_one_active_server_degrades_to_failover() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a"]);

    let count = publisher.publish("payment_received", "{}", &PublishOverrides::none()).unwrap();

    assert_eq!(count, 1);
    assert_eq!(broker.publish_attempts(), 1);
    assert!(!broker.deliveries()[0].message.is_redundant());
}

#[test]
fn test_never_sends_twice_to_one_server() {
    let broker = MockBroker::new();
    broker.take_down(&server("c"));
    let mut publisher = publisher(&broker, &["a", "b", "c"]);

    for _ in 0..5 {
        publisher.publish("payment_received", "{}", &PublishOverrides::none()).unwrap();
        let delivered = broker.delivered_to();
        let distinct: HashSet<_> = delivered.iter().collect();
        assert_eq!(distinct.len(), delivered.len());
        broker.clear_events();
    }
}

#[test]
fn test_redundant_override_can_be_disabled() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a", "b"]);

    let overrides = PublishOverrides::none().with_redundant(false);
    assert_eq!(publisher.publish("payment_received", "{}", &overrides).unwrap(), 1);
}

#[test]
fn test_republish_recovered_message() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a", "b"]);
    let recovered = encode("{}", EncodeOptions { redundant: true, ..Default::default() });

    publisher
        .republish(&server("a"), "payment_received", &recovered, &PublishOverrides::none())
        .unwrap();

    let deliveries = broker.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].server, server("a"));
    assert_eq!(deliveries[0].message.id(), recovered.id());
    assert_eq!(deliveries[0].flags.routing_key, "order.paid");
}

#[test]
fn test_republish_to_down_server_fails_without_retry() {
    let broker = MockBroker::new();
    broker.take_down(&server("a"));
    let mut publisher = publisher(&broker, &["a", "b"]);
    let recovered = encode("{}", EncodeOptions::default());

    let err = publisher
        .republish(&server("a"), "order_placed", &recovered, &PublishOverrides::none())
        .unwrap_err();

    assert!(matches!(err, Error::ConnectionDown { .. }));
    assert!(broker.deliveries().is_empty());
    assert_eq!(broker.total_connect_attempts(), 1);
}

#[test]
fn test_purge_runs_on_active_servers_only() {
    let broker = MockBroker::new();
    broker.take_down(&server("b"));
    let mut publisher = publisher(&broker, &["a", "b", "c"]);

    publisher.publish("order_placed", "{}", &PublishOverrides::none()).unwrap();
    assert!(publisher.pool().is_dead(&server("b")));
    broker.bring_up(&server("b"));

    publisher.purge("audit").unwrap();
    assert_eq!(broker.purged_on("audit"), servers(&["a", "c"]));
}
