//! Fan-out dispatcher
//!
//! Publishes one unmodified copy of a body to every destination queue. All
//! copies are attempted concurrently; a failing destination never prevents
//! the others from receiving theirs.

use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, instrument, warn};

use contracts::{DestinationList, MessagePublisher, QueueName};

use crate::error::{DeliveryFailure, DispatchError};

/// Sends each valid body to a fixed list of destinations
pub struct FanOutDispatcher<P> {
    publisher: P,
    destinations: DestinationList,
}

impl<P: MessagePublisher> FanOutDispatcher<P> {
    pub fn new(publisher: P, destinations: DestinationList) -> Self {
        Self {
            publisher,
            destinations,
        }
    }

    pub fn destinations(&self) -> &DestinationList {
        &self.destinations
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Publish `body` to every destination
    ///
    /// Returns the number of copies delivered, which equals the destination
    /// count on success.
    #[instrument(
        name = "fanout_dispatch",
        skip(self, body),
        fields(bytes = body.len(), destinations = self.destinations.len())
    )]
    pub async fn dispatch(&self, body: &Bytes) -> Result<usize, DispatchError> {
        let sends = self
            .destinations
            .iter()
            .map(|queue| self.send_copy(queue, body.clone()));
        let results = join_all(sends).await;

        let attempted = results.len();
        let failures: Vec<DeliveryFailure> = results.into_iter().filter_map(Result::err).collect();
        let delivered = attempted - failures.len();

        if failures.is_empty() {
            debug!(copies = delivered, "Fan-out complete");
            Ok(delivered)
        } else {
            Err(DispatchError::Delivery {
                attempted,
                delivered,
                failures,
            })
        }
    }

    async fn send_copy(&self, queue: &QueueName, body: Bytes) -> Result<(), DeliveryFailure> {
        match self.publisher.publish(queue, body).await {
            Ok(()) => {
                observability::record_copy_published(queue, true);
                Ok(())
            }
            Err(e) => {
                observability::record_copy_published(queue, false);
                warn!(queue = %queue, error = %e, "Copy not delivered");
                Err(DeliveryFailure {
                    queue: queue.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::InMemoryBroker;

    fn targets() -> DestinationList {
        DestinationList::default()
    }

    #[tokio::test]
    async fn test_dispatch_delivers_one_copy_per_destination() {
        let broker = InMemoryBroker::new();
        let dispatcher = FanOutDispatcher::new(broker.publisher(), targets());

        let copies = dispatcher
            .dispatch(&Bytes::from_static(b"hello"))
            .await
            .unwrap();

        assert_eq!(copies, 2);
        assert_eq!(broker.drain("target1.queue"), vec![Bytes::from_static(b"hello")]);
        assert_eq!(broker.drain("target2.queue"), vec![Bytes::from_static(b"hello")]);
    }

    #[tokio::test]
    async fn test_dispatch_preserves_bytes_exactly() {
        let broker = InMemoryBroker::new();
        let dispatcher = FanOutDispatcher::new(broker.publisher(), targets());
        let body = Bytes::from(vec![0u8, 0xff, b' ', b'\n', 0x80]);

        dispatcher.dispatch(&body).await.unwrap();

        assert_eq!(broker.drain("target1.queue"), vec![body.clone()]);
        assert_eq!(broker.drain("target2.queue"), vec![body]);
    }

    #[tokio::test]
    async fn test_failed_destination_does_not_block_others() {
        let broker = InMemoryBroker::new();
        broker.fail_queue("target1.queue");
        let dispatcher = FanOutDispatcher::new(broker.publisher(), targets());

        let err = dispatcher
            .dispatch(&Bytes::from_static(b"hello"))
            .await
            .unwrap_err();

        match &err {
            DispatchError::Delivery {
                attempted,
                delivered,
                failures,
            } => {
                assert_eq!(*attempted, 2);
                assert_eq!(*delivered, 1);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].queue, "target1.queue");
            }
        }
        assert!(broker.drain("target1.queue").is_empty());
        assert_eq!(broker.drain("target2.queue").len(), 1);
    }

    #[tokio::test]
    async fn test_single_destination() {
        let broker = InMemoryBroker::new();
        let only: DestinationList = std::iter::once(QueueName::from("audit.queue")).collect();
        let dispatcher = FanOutDispatcher::new(broker.publisher(), only);

        assert_eq!(dispatcher.dispatch(&Bytes::from_static(b"x")).await.unwrap(), 1);
        assert_eq!(broker.drain("audit.queue").len(), 1);
    }
}
