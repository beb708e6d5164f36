//! Message classification
//!
//! A message is empty when its body is absent or zero bytes long. No trimming
//! happens: a body of spaces is a valid body.

use contracts::{Classification, Message};

/// Classify a message for forwarding
///
/// Pure function; classifying the same message twice gives the same answer.
pub fn classify(message: &Message) -> Classification {
    match &message.body {
        Some(body) if !body.is_empty() => Classification::Valid(body.clone()),
        _ => Classification::Empty,
    }
}
