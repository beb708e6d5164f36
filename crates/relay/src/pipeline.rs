//! Relay pipeline - consume, classify, fan out or report, settle

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use contracts::{
    AckMode, Classification, DeliveryTag, Message, MessagePublisher, MessageSource, Outcome,
};
use observability::{RunningStats, StatsSummary};

use crate::dispatcher::FanOutDispatcher;
use crate::error::{DispatchError, RelayError};
use crate::metrics::{MetricsSnapshot, RelayMetrics};
use crate::reporter::ErrorReporter;
use crate::validator::classify;

/// Final statistics of one relay run
#[derive(Debug, Clone)]
pub struct RelayStats {
    pub route_id: String,
    pub counters: MetricsSnapshot,
    /// Wall time of each fan-out, in milliseconds
    pub dispatch_latency: StatsSummary,
}

/// One route: a source queue fanned out to a destination list
pub struct Relay<S, P, R> {
    route_id: String,
    source: S,
    dispatcher: FanOutDispatcher<P>,
    reporter: R,
    ack_mode: AckMode,
    metrics: Arc<RelayMetrics>,
    latency: RunningStats,
}

impl<S, P, R> Relay<S, P, R>
where
    S: MessageSource,
    P: MessagePublisher,
    R: ErrorReporter,
{
    pub fn new(
        route_id: impl Into<String>,
        source: S,
        dispatcher: FanOutDispatcher<P>,
        reporter: R,
        ack_mode: AckMode,
    ) -> Self {
        Self {
            route_id: route_id.into(),
            source,
            dispatcher,
            reporter,
            ack_mode,
            metrics: Arc::new(RelayMetrics::new()),
            latency: RunningStats::default(),
        }
    }

    /// Shared counters, readable while the relay runs
    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    /// Process one message and settle its delivery
    ///
    /// A delivery failure is returned as [`RelayError::Dispatch`]; it is never
    /// reported as an empty message.
    #[instrument(
        name = "relay_handle",
        skip(self, message),
        fields(route = %self.route_id, delivery_tag = message.delivery_tag, bytes = message.body_len())
    )]
    pub async fn handle(&mut self, message: Message) -> Result<Outcome, RelayError> {
        self.metrics.inc_received();
        observability::record_message_received(&message.source);

        match classify(&message) {
            Classification::Valid(body) => {
                let start = Instant::now();
                let result = self.dispatcher.dispatch(&body).await;
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                self.latency.push(elapsed_ms);
                observability::record_dispatch_latency_ms(elapsed_ms);

                match result {
                    Ok(copies) => {
                        self.metrics.inc_forwarded();
                        self.metrics.add_copies_published(copies);
                        observability::record_message_forwarded(&self.route_id);
                        self.settle_ack(message.delivery_tag).await?;
                        Ok(Outcome::Forwarded {
                            destinations: copies,
                        })
                    }
                    Err(e) => {
                        let DispatchError::Delivery { delivered, .. } = &e;
                        self.metrics.inc_delivery_failures();
                        self.metrics.add_copies_published(*delivered);
                        observability::record_delivery_failure(&self.route_id);
                        self.settle_reject(message.delivery_tag).await;
                        Err(e.into())
                    }
                }
            }
            Classification::Empty => {
                let rejection = contracts::Rejection::EmptyMessage;
                self.reporter.report(&rejection);
                self.metrics.inc_rejected();
                observability::record_message_rejected(rejection.as_label());
                self.settle_ack(message.delivery_tag).await?;
                Ok(Outcome::Rejected(rejection))
            }
        }
    }

    /// Consume until the source ends or `shutdown` resolves
    ///
    /// Shutdown is observed between messages; a message already being
    /// dispatched completes first.
    #[instrument(name = "relay_run", skip(self, shutdown), fields(route = %self.route_id))]
    pub async fn run<F>(mut self, shutdown: F) -> RelayStats
    where
        F: Future<Output = ()>,
    {
        info!(
            source = %self.source.queue(),
            destinations = self.dispatcher.destinations().len(),
            ack_mode = ?self.ack_mode,
            "Relay started"
        );

        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping relay");
                    break;
                }
                next = self.source.next() => next,
            };

            match next {
                None => {
                    info!("Source closed, stopping relay");
                    break;
                }
                Some(Err(e)) => {
                    self.metrics.inc_consume_errors();
                    error!(error = %e, "Failed to receive message");
                }
                Some(Ok(message)) => match self.handle(message).await {
                    Ok(outcome) => debug!(?outcome, "Message handled"),
                    Err(e) => error!(error = %e, "Message not fully delivered"),
                },
            }

            let received = self.metrics.received();
            if received > 0 && received % 100 == 0 {
                debug!(received, "Relay progress");
            }
        }

        let stats = self.stats();
        info!(
            received = stats.counters.received,
            forwarded = stats.counters.forwarded,
            rejected = stats.counters.rejected,
            delivery_failures = stats.counters.delivery_failures,
            "Relay stopped"
        );
        stats
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            route_id: self.route_id.clone(),
            counters: self.metrics.snapshot(),
            dispatch_latency: self.latency.summary(),
        }
    }

    async fn settle_ack(&mut self, delivery_tag: DeliveryTag) -> Result<(), RelayError> {
        if self.ack_mode.is_manual() {
            self.source.ack(delivery_tag).await?;
        }
        Ok(())
    }

    /// Best effort: a failed reject must not hide the dispatch error
    async fn settle_reject(&mut self, delivery_tag: DeliveryTag) {
        if !self.ack_mode.is_manual() {
            return;
        }
        warn!(delivery_tag, "Rejecting partially delivered message");
        if let Err(e) = self.source.reject(delivery_tag).await {
            error!(delivery_tag, error = %e, "Failed to reject delivery");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use broker::InMemoryBroker;
    use bytes::Bytes;
    use contracts::{ContractError, DestinationList, QueueName};

    use crate::reporter::ConsoleReporter;

    /// Publisher recording every call in order
    #[derive(Default, Clone)]
    struct RecordingPublisher {
        calls: Arc<Mutex<Vec<(QueueName, Bytes)>>>,
    }

    impl MessagePublisher for RecordingPublisher {
        async fn publish(&self, queue: &QueueName, body: Bytes) -> Result<(), ContractError> {
            self.calls.lock().unwrap().push((queue.clone(), body));
            Ok(())
        }
    }

    /// Source whose channel is gone: every settlement fails
    struct ClosedChannelSource {
        queue: QueueName,
    }

    impl MessageSource for ClosedChannelSource {
        fn queue(&self) -> &QueueName {
            &self.queue
        }

        async fn next(&mut self) -> Option<Result<Message, ContractError>> {
            None
        }

        async fn ack(&mut self, delivery_tag: DeliveryTag) -> Result<(), ContractError> {
            Err(ContractError::acknowledge(delivery_tag, "channel closed"))
        }

        async fn reject(&mut self, delivery_tag: DeliveryTag) -> Result<(), ContractError> {
            Err(ContractError::acknowledge(delivery_tag, "channel closed"))
        }
    }

    fn relay_on(
        broker: &InMemoryBroker,
        ack_mode: AckMode,
    ) -> Relay<broker::InMemorySource, broker::InMemoryPublisher, ConsoleReporter<Vec<u8>>> {
        let dispatcher = FanOutDispatcher::new(broker.publisher(), DestinationList::default());
        Relay::new(
            "ForkRoute",
            broker.consumer("source.queue"),
            dispatcher,
            ConsoleReporter::new(Vec::new()),
            ack_mode,
        )
    }

    #[tokio::test]
    async fn test_handle_forwards_valid_message() {
        let broker = InMemoryBroker::new();
        let mut relay = relay_on(&broker, AckMode::Auto);

        let outcome = relay
            .handle(Message::new("source.queue", 1, "hello"))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Forwarded { destinations: 2 });
        assert_eq!(broker.drain("target1.queue"), vec![Bytes::from_static(b"hello")]);
        assert_eq!(broker.drain("target2.queue"), vec![Bytes::from_static(b"hello")]);
        assert!(relay.reporter().get_ref().is_empty());
    }

    #[tokio::test]
    async fn test_handle_reports_empty_message() {
        let broker = InMemoryBroker::new();
        let mut relay = relay_on(&broker, AckMode::Auto);

        let outcome = relay
            .handle(Message::new("source.queue", 1, ""))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Rejected(contracts::Rejection::EmptyMessage));
        assert_eq!(relay.reporter().get_ref(), b"Message is empty!\n");
        assert_eq!(broker.depth("target1.queue"), 0);
        assert_eq!(broker.depth("target2.queue"), 0);
        assert_eq!(relay.metrics().rejected(), 1);
    }

    #[tokio::test]
    async fn test_publisher_sees_identical_bodies() {
        let publisher = RecordingPublisher::default();
        let broker = InMemoryBroker::new();
        let dispatcher = FanOutDispatcher::new(publisher.clone(), DestinationList::default());
        let mut relay = Relay::new(
            "ForkRoute",
            broker.consumer("source.queue"),
            dispatcher,
            ConsoleReporter::new(Vec::new()),
            AckMode::Auto,
        );

        relay
            .handle(Message::new("source.queue", 7, "   "))
            .await
            .unwrap();

        let calls = publisher.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, body)| body.as_ref() == b"   "));
        let mut queues: Vec<&str> = calls.iter().map(|(q, _)| q.as_str()).collect();
        queues.sort_unstable();
        assert_eq!(queues, ["target1.queue", "target2.queue"]);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_not_reported_as_empty() {
        let broker = InMemoryBroker::new();
        broker.fail_queue("target2.queue");
        let mut relay = relay_on(&broker, AckMode::Auto);

        let result = relay.handle(Message::new("source.queue", 1, "hello")).await;

        assert!(matches!(result, Err(RelayError::Dispatch(_))));
        assert!(relay.reporter().get_ref().is_empty());
        assert_eq!(relay.metrics().delivery_failures(), 1);
        assert_eq!(relay.metrics().copies_published(), 1);
    }

    #[tokio::test]
    async fn test_auto_mode_never_settles() {
        let broker = InMemoryBroker::new();
        let mut relay = relay_on(&broker, AckMode::Auto);

        relay.handle(Message::new("source.queue", 1, "a")).await.unwrap();
        relay.handle(Message::new("source.queue", 2, "")).await.unwrap();

        assert!(broker.acked().is_empty());
        assert!(broker.rejected().is_empty());
    }

    #[tokio::test]
    async fn test_after_dispatch_mode_settles_each_message() {
        let broker = InMemoryBroker::new();
        let mut relay = relay_on(&broker, AckMode::AfterDispatch);

        relay.handle(Message::new("source.queue", 1, "a")).await.unwrap();
        relay.handle(Message::new("source.queue", 2, "")).await.unwrap();
        broker.fail_queue("target1.queue");
        relay
            .handle(Message::new("source.queue", 3, "b"))
            .await
            .unwrap_err();

        assert_eq!(broker.acked(), vec![1, 2]);
        assert_eq!(broker.rejected(), vec![3]);
    }

    #[tokio::test]
    async fn test_failed_reject_keeps_dispatch_error() {
        let broker = InMemoryBroker::new();
        broker.fail_queue("target2.queue");
        let mut relay = Relay::new(
            "ForkRoute",
            ClosedChannelSource {
                queue: "source.queue".into(),
            },
            FanOutDispatcher::new(broker.publisher(), DestinationList::default()),
            ConsoleReporter::new(Vec::new()),
            AckMode::AfterDispatch,
        );

        let err = relay
            .handle(Message::new("source.queue", 9, "hello"))
            .await
            .unwrap_err();

        let dispatch = match err {
            RelayError::Dispatch(dispatch) => dispatch,
            other => panic!("expected dispatch error, got {other:?}"),
        };
        let failed: Vec<&str> = dispatch.failed_queues().map(QueueName::as_str).collect();
        assert_eq!(failed, ["target2.queue"]);
        assert_eq!(relay.metrics().delivery_failures(), 1);
        assert!(relay.reporter().get_ref().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_source_closes() {
        let broker = InMemoryBroker::new();
        broker.push("source.queue", "one");
        broker.push_without_body("source.queue");
        broker.push("source.queue", "two");
        broker.close_queue("source.queue");

        let relay = relay_on(&broker, AckMode::Auto);
        let stats = relay.run(std::future::pending()).await;

        assert_eq!(stats.route_id, "ForkRoute");
        assert_eq!(stats.counters.received, 3);
        assert_eq!(stats.counters.forwarded, 2);
        assert_eq!(stats.counters.rejected, 1);
        assert_eq!(stats.counters.copies_published, 4);
        assert_eq!(stats.dispatch_latency.count, 2);
        assert_eq!(broker.drain("target1.queue").len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let broker = InMemoryBroker::new();
        let relay = relay_on(&broker, AckMode::Auto);

        let stats = relay.run(async {}).await;

        assert_eq!(stats.counters.received, 0);
    }
}
