//! # Integration Tests
//!
//! End-to-end tests wiring `InMemoryBroker` through the relay.
//!
//! Covers:
//! - Contract snapshot tests
//! - Fan-out / rejection scenarios without a real broker
//! - Acknowledgement bookkeeping and shutdown

#[cfg(test)]
mod contract_tests {
    use contracts::{AckMode, RelayBlueprint};

    #[test]
    fn test_default_route_is_stock_fork() {
        let blueprint = RelayBlueprint::default();
        assert_eq!(blueprint.route.id, "ForkRoute");
        assert_eq!(blueprint.route.source, "source.queue");
        assert_eq!(blueprint.broker.ack_mode, AckMode::Auto);
        config_loader::ConfigLoader::validate(&blueprint).unwrap();
    }

    #[test]
    fn test_default_route_survives_toml() {
        let toml = config_loader::ConfigLoader::to_toml(&RelayBlueprint::default()).unwrap();
        let parsed = config_loader::ConfigLoader::load_from_str(
            &toml,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(parsed.route.destinations, RelayBlueprint::default().route.destinations);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use broker::{InMemoryBroker, InMemoryPublisher, InMemorySource};
    use bytes::Bytes;
    use contracts::{AckMode, RelayBlueprint};
    use relay::{ConsoleReporter, FanOutDispatcher, Relay, RelayStats};

    const SOURCE: &str = "source.queue";
    const TARGET1: &str = "target1.queue";
    const TARGET2: &str = "target2.queue";

    /// Console stand-in shared between the relay and the test
    #[derive(Clone, Default)]
    struct SharedConsole(Arc<Mutex<Vec<u8>>>);

    impl SharedConsole {
        fn lines(&self) -> Vec<String> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for SharedConsole {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    type TestRelay = Relay<InMemorySource, InMemoryPublisher, ConsoleReporter<SharedConsole>>;

    fn build_relay(
        broker: &InMemoryBroker,
        blueprint: &RelayBlueprint,
        console: &SharedConsole,
    ) -> TestRelay {
        let route = &blueprint.route;
        Relay::new(
            route.id.clone(),
            broker.consumer(route.source.clone()),
            FanOutDispatcher::new(broker.publisher(), route.destinations.clone()),
            ConsoleReporter::new(console.clone()),
            blueprint.broker.ack_mode,
        )
    }

    /// Run the stock route over `bodies` (None = no body) until the source drains
    async fn relay_bodies(
        broker: &InMemoryBroker,
        bodies: &[Option<&'static str>],
        ack_mode: AckMode,
    ) -> (RelayStats, SharedConsole) {
        for body in bodies {
            match body {
                Some(b) => broker.push(SOURCE, *b),
                None => broker.push_without_body(SOURCE),
            };
        }
        broker.close_queue(SOURCE);

        let mut blueprint = RelayBlueprint::default();
        blueprint.broker.ack_mode = ack_mode;
        let console = SharedConsole::default();
        let stats = build_relay(broker, &blueprint, &console)
            .run(std::future::pending())
            .await;
        (stats, console)
    }

    #[tokio::test]
    async fn test_message_reaches_both_targets() {
        let broker = InMemoryBroker::new();

        let (stats, console) = relay_bodies(&broker, &[Some("hello")], AckMode::Auto).await;

        assert_eq!(broker.drain(TARGET1), vec![Bytes::from_static(b"hello")]);
        assert_eq!(broker.drain(TARGET2), vec![Bytes::from_static(b"hello")]);
        assert!(console.lines().is_empty());
        assert_eq!(stats.counters.forwarded, 1);
        assert_eq!(stats.counters.copies_published, 2);
    }

    #[tokio::test]
    async fn test_zero_length_body_is_reported_once() {
        let broker = InMemoryBroker::new();

        let (stats, console) = relay_bodies(&broker, &[Some("")], AckMode::Auto).await;

        assert_eq!(console.lines(), ["Message is empty!"]);
        assert_eq!(broker.depth(TARGET1), 0);
        assert_eq!(broker.depth(TARGET2), 0);
        assert_eq!(stats.counters.rejected, 1);
        assert_eq!(stats.counters.copies_published, 0);
    }

    #[tokio::test]
    async fn test_absent_body_is_reported_once() {
        let broker = InMemoryBroker::new();

        let (_, console) = relay_bodies(&broker, &[None], AckMode::Auto).await;

        assert_eq!(console.lines(), ["Message is empty!"]);
        assert_eq!(broker.depth(TARGET1), 0);
        assert_eq!(broker.depth(TARGET2), 0);
    }

    #[tokio::test]
    async fn test_whitespace_body_is_forwarded_unchanged() {
        let broker = InMemoryBroker::new();

        let (_, console) = relay_bodies(&broker, &[Some("   ")], AckMode::Auto).await;

        assert_eq!(broker.drain(TARGET1), vec![Bytes::from_static(b"   ")]);
        assert_eq!(broker.drain(TARGET2), vec![Bytes::from_static(b"   ")]);
        assert!(console.lines().is_empty());
    }

    #[tokio::test]
    async fn test_every_message_forwarded_or_reported_never_both() {
        let broker = InMemoryBroker::new();
        let bodies = [Some("a"), Some(""), Some("b"), None, Some("c")];

        let (stats, console) = relay_bodies(&broker, &bodies, AckMode::Auto).await;

        let expected: Vec<Bytes> = ["a", "b", "c"].into_iter().map(Bytes::from).collect();
        assert_eq!(broker.drain(TARGET1), expected);
        assert_eq!(broker.drain(TARGET2), expected);
        assert_eq!(console.lines().len(), 2);
        assert_eq!(stats.counters.received, 5);
        assert_eq!(
            stats.counters.forwarded + stats.counters.rejected,
            stats.counters.received
        );
    }

    #[tokio::test]
    async fn test_failed_target_is_not_reported_as_empty() {
        let broker = InMemoryBroker::new();
        broker.fail_queue(TARGET2);

        let (stats, console) =
            relay_bodies(&broker, &[Some("hello"), Some("")], AckMode::Auto).await;

        assert_eq!(broker.drain(TARGET1), vec![Bytes::from_static(b"hello")]);
        assert!(broker.drain(TARGET2).is_empty());
        assert_eq!(console.lines(), ["Message is empty!"]);
        assert_eq!(stats.counters.delivery_failures, 1);
        assert_eq!(stats.counters.forwarded, 0);
        assert_eq!(stats.counters.rejected, 1);
    }

    #[tokio::test]
    async fn test_after_dispatch_acks_handled_messages() {
        let broker = InMemoryBroker::new();

        relay_bodies(&broker, &[Some("ok"), Some("")], AckMode::AfterDispatch).await;

        assert_eq!(broker.acked().len(), 2);
        assert!(broker.rejected().is_empty());
    }

    #[tokio::test]
    async fn test_after_dispatch_rejects_partial_delivery() {
        let broker = InMemoryBroker::new();
        broker.fail_queue(TARGET1);
        let failing_tag = broker.push(SOURCE, "lost");

        relay_bodies(&broker, &[Some("")], AckMode::AfterDispatch).await;

        assert_eq!(broker.rejected(), vec![failing_tag]);
        assert_eq!(broker.acked().len(), 1);
        assert_eq!(broker.drain(TARGET2), vec![Bytes::from_static(b"lost")]);
    }

    #[tokio::test]
    async fn test_auto_mode_leaves_settlement_to_broker() {
        let broker = InMemoryBroker::new();

        relay_bodies(&broker, &[Some("x"), None], AckMode::Auto).await;

        assert!(broker.acked().is_empty());
        assert!(broker.rejected().is_empty());
    }

    #[tokio::test]
    async fn test_configured_destinations_each_get_a_copy() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
                [route]
                id = "Audit"
                source = "orders.in"
                destinations = ["orders.billing", "orders.audit", "orders.search"]
            "#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let broker = InMemoryBroker::new();
        broker.push("orders.in", "order-42");
        broker.close_queue("orders.in");

        let console = SharedConsole::default();
        let stats = build_relay(&broker, &blueprint, &console)
            .run(std::future::pending())
            .await;

        assert_eq!(stats.route_id, "Audit");
        for queue in ["orders.billing", "orders.audit", "orders.search"] {
            assert_eq!(broker.drain(queue), vec![Bytes::from_static(b"order-42")]);
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_open_source() {
        let broker = InMemoryBroker::new();
        broker.push(SOURCE, "one");
        broker.push(SOURCE, "two");

        let console = SharedConsole::default();
        let relay = build_relay(&broker, &RelayBlueprint::default(), &console);
        let metrics = relay.metrics();
        let shutdown = async move {
            while metrics.received() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        let stats = tokio::time::timeout(Duration::from_secs(5), relay.run(shutdown))
            .await
            .expect("relay did not stop on shutdown");

        assert_eq!(stats.counters.received, 2);
        assert_eq!(broker.drain(TARGET1).len(), 2);
    }
}
