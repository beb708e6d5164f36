//! In-memory broker
//!
//! Named FIFO queues backed by unbounded channels. Supports injecting publish
//! failures per queue and records every ack / reject for inspection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use contracts::{
    ContractError, DeliveryTag, Message, MessagePublisher, MessageSource, QueueName,
};
use tracing::{debug, instrument, warn};

/// Process-local broker
///
/// Cloning is cheap; all clones share the same queues.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<QueueName, Queue>>,
    failing: Mutex<HashSet<QueueName>>,
    acked: Mutex<Vec<DeliveryTag>>,
    rejected: Mutex<Vec<DeliveryTag>>,
    next_tag: AtomicU64,
}

#[derive(Clone)]
struct Queue {
    tx: async_channel::Sender<Message>,
    rx: async_channel::Receiver<Message>,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self { tx, rx }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumer on `queue` (created on first use)
    pub fn consumer(&self, queue: impl Into<QueueName>) -> InMemorySource {
        let queue = queue.into();
        let rx = self.queue(&queue).rx;
        InMemorySource {
            broker: self.clone(),
            queue,
            rx,
        }
    }

    /// Publisher able to reach every queue of this broker
    pub fn publisher(&self) -> InMemoryPublisher {
        InMemoryPublisher {
            broker: self.clone(),
        }
    }

    /// Enqueue a message with `body`, returning its delivery tag
    pub fn push(&self, queue: impl Into<QueueName>, body: impl Into<Bytes>) -> DeliveryTag {
        let tag = self.allocate_tag();
        self.enqueue(Message::new(queue, tag, body));
        tag
    }

    /// Enqueue a message that carries no body at all
    pub fn push_without_body(&self, queue: impl Into<QueueName>) -> DeliveryTag {
        let tag = self.allocate_tag();
        self.enqueue(Message::without_body(queue, tag));
        tag
    }

    /// Remove and return every body currently waiting on `queue`
    pub fn drain(&self, queue: &str) -> Vec<Bytes> {
        let Some(q) = lock(&self.inner.queues).get(queue).cloned() else {
            return Vec::new();
        };
        let mut bodies = Vec::new();
        while let Ok(message) = q.rx.try_recv() {
            bodies.push(message.body.unwrap_or_default());
        }
        bodies
    }

    /// Number of messages waiting on `queue`
    pub fn depth(&self, queue: &str) -> usize {
        lock(&self.inner.queues)
            .get(queue)
            .map_or(0, |q| q.rx.len())
    }

    /// Make every publish to `queue` fail until [`Self::heal_queue`]
    pub fn fail_queue(&self, queue: impl Into<QueueName>) {
        lock(&self.inner.failing).insert(queue.into());
    }

    pub fn heal_queue(&self, queue: &str) {
        lock(&self.inner.failing).remove(queue);
    }

    /// Close `queue`; consumers end once the remaining messages are drained
    pub fn close_queue(&self, queue: &str) {
        if let Some(q) = lock(&self.inner.queues).get(queue) {
            q.tx.close();
        }
    }

    /// Delivery tags acknowledged so far
    pub fn acked(&self) -> Vec<DeliveryTag> {
        lock(&self.inner.acked).clone()
    }

    /// Delivery tags rejected so far
    pub fn rejected(&self) -> Vec<DeliveryTag> {
        lock(&self.inner.rejected).clone()
    }

    fn queue(&self, name: &QueueName) -> Queue {
        lock(&self.inner.queues)
            .entry(name.clone())
            .or_insert_with(Queue::new)
            .clone()
    }

    fn allocate_tag(&self) -> DeliveryTag {
        self.inner.next_tag.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_failing(&self, queue: &str) -> bool {
        lock(&self.inner.failing).contains(queue)
    }

    fn enqueue(&self, message: Message) {
        let queue = self.queue(&message.source);
        if let Err(e) = queue.tx.try_send(message) {
            warn!(queue = %e.into_inner().source, "Queue closed, message discarded");
        }
    }
}

/// Consumer side of an [`InMemoryBroker`] queue
pub struct InMemorySource {
    broker: InMemoryBroker,
    queue: QueueName,
    rx: async_channel::Receiver<Message>,
}

impl MessageSource for InMemorySource {
    fn queue(&self) -> &QueueName {
        &self.queue
    }

    async fn next(&mut self) -> Option<Result<Message, ContractError>> {
        self.rx.recv().await.ok().map(Ok)
    }

    async fn ack(&mut self, delivery_tag: DeliveryTag) -> Result<(), ContractError> {
        lock(&self.broker.inner.acked).push(delivery_tag);
        Ok(())
    }

    async fn reject(&mut self, delivery_tag: DeliveryTag) -> Result<(), ContractError> {
        lock(&self.broker.inner.rejected).push(delivery_tag);
        Ok(())
    }
}

/// Publisher side of an [`InMemoryBroker`]
#[derive(Clone)]
pub struct InMemoryPublisher {
    broker: InMemoryBroker,
}

impl MessagePublisher for InMemoryPublisher {
    #[instrument(
        name = "memory_publish",
        skip(self, body),
        fields(queue = %queue, bytes = body.len())
    )]
    async fn publish(&self, queue: &QueueName, body: Bytes) -> Result<(), ContractError> {
        if self.broker.is_failing(queue) {
            return Err(ContractError::publish(queue.as_str(), "destination unreachable"));
        }

        let tag = self.broker.allocate_tag();
        self.broker
            .queue(queue)
            .tx
            .try_send(Message::new(queue.clone(), tag, body))
            .map_err(|_| ContractError::publish(queue.as_str(), "queue closed"))?;

        debug!(queue = %queue, delivery_tag = tag, "Copy enqueued");
        Ok(())
    }
}
