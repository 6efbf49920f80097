//! Shared fixtures for publisher integration tests.

#![allow(dead_code)]

use std::time::Duration;

use tandem_core::{
    config::{ExchangeDeclaration, MessageDeclaration, QueueDeclaration},
    MessageRegistry, Server,
};
use tandem_publisher::{testing::MockBroker, Publisher, PublisherConfig};

/// Registry with one exchange, one bound queue, a plain and a redundant message.
pub fn registry() -> MessageRegistry {
    let mut registry = MessageRegistry::new();
    registry.register_exchange("events", &ExchangeDeclaration::default());
    registry
        .register_queue(
            "audit",
            &QueueDeclaration {
                exchange: Some("events".into()),
                keys: vec!["order.#".into()],
                ..Default::default()
            },
        )
        .unwrap();
    registry
        .register_message(
            "order_placed",
            &MessageDeclaration {
                exchange: Some("events".into()),
                key: Some("order.placed".into()),
                ..Default::default()
            },
        )
        .unwrap();
    registry
        .register_message(
            "payment_received",
            &MessageDeclaration {
                exchange: Some("events".into()),
                key: Some("order.paid".into()),
                redundant: true,
                ..Default::default()
            },
        )
        .unwrap();
    registry
}

pub fn server(name: &str) -> Server {
    Server::new(name, 5672)
}

pub fn servers(names: &[&str]) -> Vec<Server> {
    names.iter().map(|n| server(n)).collect()
}

pub fn publisher_with_timeout(
    broker: &MockBroker,
    names: &[&str],
    recycle_timeout: Duration,
) -> Publisher<MockBroker> {
    let _ = tandem_core::logging::init_for_tests();
    let config = PublisherConfig::new(servers(names))
        .with_recycle_timeout(recycle_timeout)
        .with_rng_seed(17);
    Publisher::new(broker.clone(), registry(), config)
}

/// Publisher whose dead servers never recycle within a test.
pub fn publisher(broker: &MockBroker, names: &[&str]) -> Publisher<MockBroker> {
    publisher_with_timeout(broker, names, Duration::from_secs(3600))
}
