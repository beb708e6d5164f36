//! Layered error definitions
//!
//! Categorized by source: config / broker / general

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Broker Errors =====
    /// Broker unreachable or handshake rejected
    #[error("broker connection error at '{url}': {message}")]
    BrokerConnection { url: String, message: String },

    /// Publishing a copy to a destination failed
    #[error("publish to '{queue}' failed: {message}")]
    Publish { queue: String, message: String },

    /// Receiving from the source queue failed
    #[error("consume from '{queue}' failed: {message}")]
    Consume { queue: String, message: String },

    /// Acknowledging or rejecting a delivery failed
    #[error("acknowledge of delivery {delivery_tag} failed: {message}")]
    Acknowledge { delivery_tag: u64, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create broker connection error
    pub fn broker_connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrokerConnection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create publish error
    pub fn publish(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Create consume error
    pub fn consume(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Consume {
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// Create acknowledge error
    pub fn acknowledge(delivery_tag: u64, message: impl Into<String>) -> Self {
        Self::Acknowledge {
            delivery_tag,
            message: message.into(),
        }
    }
}
