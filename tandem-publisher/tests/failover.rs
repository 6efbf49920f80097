//! Failover publishing scenarios against the mock broker.

mod common;

use std::time::Duration;

use common::{publisher, publisher_with_timeout, server, servers};
use tandem_core::{Error, PublishOverrides};
use tandem_publisher::testing::{BrokerEvent, MockBroker};

#[test]
fn test_failed_server_is_marked_dead_and_next_one_delivers() {
    let broker = MockBroker::new();
    broker.take_down(&server("s1"));
    // The first publish advances past the initial cursor, so s1 is tried first.
    let mut publisher = publisher(&broker, &["s2", "s1"]);

    let count = publisher.publish("order_placed", "{}", &PublishOverrides::none()).unwrap();

    assert_eq!(count, 1);
    assert_eq!(broker.delivered_to(), servers(&["s2"]));
    assert!(publisher.pool().is_dead(&server("s1")));
    assert_eq!(publisher.pool().current(), Some(&server("s2")));
}

#[test]
fn test_every_server_down_returns_zero() {
    let broker = MockBroker::new();
    for name in ["a", "b", "c"] {
        broker.take_down(&server(name));
    }
    let mut publisher = publisher(&broker, &["a", "b", "c"]);

    let count = publisher.publish("order_placed", "{}", &PublishOverrides::none()).unwrap();

    assert_eq!(count, 0);
    assert_eq!(broker.total_connect_attempts(), 3);
    assert!(publisher.pool().is_empty());
    assert_eq!(publisher.status().dead, servers(&["a", "b", "c"]));
    assert_eq!(publisher.pool().current(), None);
}

#[test]
fn test_empty_pool_makes_no_network_call() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &[]);

    let count = publisher.publish("order_placed", "{}", &PublishOverrides::none()).unwrap();

    assert_eq!(count, 0);
    assert!(broker.events().is_empty());
}

#[test]
fn test_exhausted_pool_returns_zero_on_later_publishes() {
    let broker = MockBroker::new();
    broker.take_down(&server("a"));
    let mut publisher = publisher(&broker, &["a"]);

    assert_eq!(publisher.publish("order_placed", "1", &PublishOverrides::none()).unwrap(), 0);
    broker.clear_events();
    assert_eq!(publisher.publish("order_placed", "2", &PublishOverrides::none()).unwrap(), 0);
    assert!(broker.events().is_empty());
}

#[test]
fn test_rotation_spreads_publishes() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a", "b", "c"]);

    for _ in 0..4 {
        publisher.publish("order_placed", "{}", &PublishOverrides::none()).unwrap();
    }
    assert_eq!(broker.delivered_to(), servers(&["b", "c", "a", "b"]));
}

#[test]
fn test_queues_bound_once_per_server() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a", "b"]);

    for _ in 0..4 {
        publisher.publish("order_placed", "{}", &PublishOverrides::none()).unwrap();
    }
    assert_eq!(broker.bind_count(&server("a")), 1);
    assert_eq!(broker.bind_count(&server("b")), 1);
    assert_eq!(broker.connect_attempts(&server("a")), 1);
    assert!(broker.events().contains(&BrokerEvent::Bound {
        server: server("a"),
        queue: "audit".into(),
        exchange: "events".into(),
        key: "order.#".into(),
    }));
}

#[test]
fn test_dead_server_recycled_after_timeout() {
    let broker = MockBroker::new();
    let a = server("a");
    let mut publisher = publisher_with_timeout(&broker, &["b", "a"], Duration::ZERO);

    broker.take_down(&a);
    assert_eq!(publisher.publish("order_placed", "1", &PublishOverrides::none()).unwrap(), 1);
    assert!(publisher.pool().is_dead(&a));
    assert!(!publisher.is_connected(&a));

    broker.bring_up(&a);
    publisher.publish("order_placed", "2", &PublishOverrides::none()).unwrap();
    assert!(!publisher.pool().is_dead(&a));
    assert!(publisher.pool().active().contains(&a));

    publisher.publish("order_placed", "3", &PublishOverrides::none()).unwrap();
    assert!(broker.delivered_to().contains(&a));
    assert_eq!(broker.bind_count(&a), 1);
}

#[test]
fn test_dead_server_stays_out_before_timeout() {
    let broker = MockBroker::new();
    let a = server("a");
    let mut publisher = publisher(&broker, &["b", "a"]);

    broker.take_down(&a);
    publisher.publish("order_placed", "1", &PublishOverrides::none()).unwrap();
    broker.bring_up(&a);

    for _ in 0..3 {
        publisher.publish("order_placed", "{}", &PublishOverrides::none()).unwrap();
    }
    assert!(publisher.pool().is_dead(&a));
    assert!(!broker.delivered_to().contains(&a));
}

#[test]
fn test_server_lost_after_connecting_fails_over() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a", "b"]);

    publisher.publish("order_placed", "1", &PublishOverrides::none()).unwrap();
    assert!(publisher.is_connected(&server("b")));

    broker.take_down(&server("b"));
    publisher.publish("order_placed", "2", &PublishOverrides::none()).unwrap();
    publisher.publish("order_placed", "3", &PublishOverrides::none()).unwrap();

    assert_eq!(broker.delivered_to().iter().filter(|s| **s == server("a")).count(), 2);
    assert!(publisher.pool().is_dead(&server("b")));
    assert!(!publisher.is_connected(&server("b")));
}

#[test]
fn test_overrides_reach_the_broker() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a"]);
    let overrides = PublishOverrides::none()
        .with_routing_key("order.refunded")
        .with_persistent(false)
        .with_reply_to("replies")
        .with_ttl(Duration::from_secs(30));

    let sent_at = unix_now();
    publisher.publish("order_placed", "{}", &overrides).unwrap();

    let delivery = &broker.deliveries()[0];
    assert!(delivery.message.properties.expires_at >= sent_at + 30);
    assert!(delivery.message.properties.expires_at <= sent_at + 32);
    assert_eq!(delivery.exchange, "events");
    assert_eq!(delivery.flags.routing_key, "order.refunded");
    assert!(!delivery.flags.persistent);
    assert_eq!(delivery.flags.reply_to.as_deref(), Some("replies"));
    assert_eq!(delivery.message.payload.as_ref(), b"{}");
}

#[test]
fn test_unknown_message_fails_before_network() {
    let broker = MockBroker::new();
    let mut publisher = publisher(&broker, &["a"]);

    let err = publisher.publish("order_lost", "{}", &PublishOverrides::none()).unwrap_err();
    assert_eq!(err, Error::UnknownMessage("order_lost".into()));
    assert!(err.is_configuration_fault());
    assert!(broker.events().is_empty());
}

fn unix_now() -> i64 {
    let elapsed = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap();
    i64::try_from(elapsed.as_secs()).unwrap()
}
