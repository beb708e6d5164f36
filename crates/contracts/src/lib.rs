//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate: the message model,
//! the relay blueprint (configuration), the error taxonomy and the broker
//! client traits. Business crates depend on this crate only, never the other
//! way around.
//!
//! ## Delivery model
//! - One source queue, a fixed ordered list of destination queues
//! - A message is either forwarded to every destination or rejected

mod blueprint;
mod broker;
mod error;
mod message;
mod queue_name;

pub use blueprint::*;
pub use broker::*;
pub use error::*;
pub use message::*;
pub use queue_name::QueueName;
