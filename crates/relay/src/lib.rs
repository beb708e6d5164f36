//! # Relay
//!
//! Message fan-out pipeline.
//!
//! Responsibilities:
//! - Classify each inbound message (`validator`)
//! - Fan valid bodies out to every destination queue (`dispatcher`)
//! - Report and drop empty messages (`reporter`)
//! - Settle deliveries and keep running counters (`pipeline`, `metrics`)

pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod reporter;
pub mod validator;

pub use contracts::{Classification, Message, Outcome, Rejection};
pub use dispatcher::FanOutDispatcher;
pub use error::{DeliveryFailure, DispatchError, RelayError};
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use pipeline::{Relay, RelayStats};
pub use reporter::{ConsoleReporter, ErrorReporter};
pub use validator::classify;
