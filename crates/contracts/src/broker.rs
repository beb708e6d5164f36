//! Broker client traits - relay input and output interfaces
//!
//! The relay never talks to a broker directly; it consumes a
//! [`MessageSource`] and publishes through a [`MessagePublisher`].

use bytes::Bytes;

use crate::{ContractError, DeliveryTag, Message, QueueName};

/// Consumer bound to one source queue
#[trait_variant::make(MessageSource: Send)]
pub trait LocalMessageSource {
    /// Queue this source consumes from
    fn queue(&self) -> &QueueName;

    /// Wait for the next message
    ///
    /// Returns `None` once the source is closed.
    async fn next(&mut self) -> Option<Result<Message, ContractError>>;

    /// Acknowledge a delivery as consumed
    async fn ack(&mut self, delivery_tag: DeliveryTag) -> Result<(), ContractError>;

    /// Reject a delivery without requeueing it
    async fn reject(&mut self, delivery_tag: DeliveryTag) -> Result<(), ContractError>;
}

/// Publisher able to put a body on a named queue
#[trait_variant::make(MessagePublisher: Send)]
pub trait LocalMessagePublisher {
    /// Publish one copy of `body` to `queue`
    ///
    /// # Errors
    /// Returns [`ContractError::Publish`] when the broker refuses the copy
    async fn publish(&self, queue: &QueueName, body: Bytes) -> Result<(), ContractError>;
}
