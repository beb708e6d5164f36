//! Message model
//!
//! `Message` is produced by a broker client on receipt, read by the relay,
//! and discarded once the delivery is settled.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

use crate::QueueName;

/// Broker handle used to acknowledge or reject a delivery
pub type DeliveryTag = u64;

/// Inbound message as handed over by the broker client
#[derive(Debug, Clone)]
pub struct Message {
    /// Payload; `None` when the broker delivered no body at all
    pub body: Option<Bytes>,

    /// Broker headers (carried, never inspected)
    pub headers: BTreeMap<String, String>,

    /// Delivery tag for ack / reject
    pub delivery_tag: DeliveryTag,

    /// Queue the message was consumed from
    pub source: QueueName,
}

impl Message {
    /// Message with a body and no headers
    pub fn new(
        source: impl Into<QueueName>,
        delivery_tag: DeliveryTag,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            body: Some(body.into()),
            headers: BTreeMap::new(),
            delivery_tag,
            source: source.into(),
        }
    }

    /// Message without a body
    pub fn without_body(source: impl Into<QueueName>, delivery_tag: DeliveryTag) -> Self {
        Self {
            body: None,
            headers: BTreeMap::new(),
            delivery_tag,
            source: source.into(),
        }
    }

    /// Body length in bytes (0 when absent)
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }
}

/// Result of inspecting a message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Body present with at least one byte; forwarded as-is
    Valid(Bytes),
    /// Body absent or zero-length
    Empty,
}

impl Classification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Rejection reason for a non-forwardable message
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Valid(_) => None,
            Self::Empty => Some(Rejection::EmptyMessage),
        }
    }
}

/// Why a message was discarded instead of forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Body absent or zero-length
    EmptyMessage,
}

impl Rejection {
    /// Stable label for metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "empty",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => f.write_str("Message is empty!"),
        }
    }
}

/// Terminal state of one handled message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// One copy published to each of `destinations` queues
    Forwarded { destinations: usize },
    /// Reported and dropped
    Rejected(Rejection),
}
