//! # Broker
//!
//! Message broker clients implementing the `MessageSource` /
//! `MessagePublisher` contracts.
//!
//! - `InMemoryBroker`: process-local queues with failure injection, used by
//!   tests and local experiments
//! - `AmqpBroker`: real AMQP 0-9-1 connection via lapin
//!
//! ## Feature Flags
//!
//! - `amqp`: Enable the real AMQP client (requires lapin)

pub mod memory_broker;

#[cfg(feature = "amqp")]
pub mod amqp_broker;

pub use contracts::{MessagePublisher, MessageSource};
pub use memory_broker::{InMemoryBroker, InMemoryPublisher, InMemorySource};

#[cfg(feature = "amqp")]
pub use amqp_broker::{AmqpBroker, AmqpConsumer, AmqpPublisher};
