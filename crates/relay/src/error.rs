//! Relay error types

use std::fmt;

use contracts::{ContractError, QueueName};
use thiserror::Error;

/// One destination that did not receive its copy
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub queue: QueueName,
    pub reason: String,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.queue, self.reason)
    }
}

/// Fan-out errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// At least one destination refused its copy
    #[error(
        "delivered to {delivered} of {attempted} destinations, failed: {}",
        join_failures(.failures)
    )]
    Delivery {
        attempted: usize,
        delivered: usize,
        failures: Vec<DeliveryFailure>,
    },
}

impl DispatchError {
    /// Destinations that did not receive a copy
    pub fn failed_queues(&self) -> impl Iterator<Item = &QueueName> {
        match self {
            Self::Delivery { failures, .. } => failures.iter().map(|f| &f.queue),
        }
    }
}

fn join_failures(failures: &[DeliveryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-message pipeline errors
#[derive(Debug, Error)]
pub enum RelayError {
    /// Fan-out failed
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Broker-level failure (ack / reject)
    #[error(transparent)]
    Contract(#[from] ContractError),
}
