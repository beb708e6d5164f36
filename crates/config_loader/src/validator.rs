//! Configuration validation
//!
//! Rules:
//! - field-level constraints declared on the blueprint types
//! - broker url uses the amqp / amqps scheme
//! - queue names are non-empty and fit an AMQP short string
//! - at least one destination, no duplicates
//! - the source queue is never a destination

use std::collections::HashSet;

use contracts::{ContractError, QueueName, RelayBlueprint};
use ::validator::Validate;

/// Longest queue name the AMQP wire format can carry
const MAX_QUEUE_NAME_LEN: usize = 255;

/// Validate a RelayBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_broker_scheme(blueprint)?;
    validate_queue_names(blueprint)?;
    validate_destinations(blueprint)?;
    Ok(())
}

fn validate_fields(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

fn validate_broker_scheme(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let url = &blueprint.broker.url;
    if url.starts_with("amqp://") || url.starts_with("amqps://") {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            "broker.url",
            format!("unsupported scheme in '{url}', expected amqp:// or amqps://"),
        ))
    }
}

fn validate_queue_names(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    check_queue_name("route.source", &blueprint.route.source)?;
    for (idx, queue) in blueprint.route.destinations.iter().enumerate() {
        check_queue_name(&format!("route.destinations[{idx}]"), queue)?;
    }
    Ok(())
}

fn check_queue_name(field: &str, queue: &QueueName) -> Result<(), ContractError> {
    if queue.is_empty() {
        return Err(ContractError::config_validation(
            field,
            "queue name cannot be empty",
        ));
    }
    if queue.len() > MAX_QUEUE_NAME_LEN {
        return Err(ContractError::config_validation(
            field,
            format!(
                "queue name is {} bytes, limit is {MAX_QUEUE_NAME_LEN}",
                queue.len()
            ),
        ));
    }
    Ok(())
}

fn validate_destinations(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let route = &blueprint.route;

    if route.destinations.is_empty() {
        return Err(ContractError::config_validation(
            "route.destinations",
            "at least one destination queue is required",
        ));
    }

    let mut seen = HashSet::new();
    for queue in &route.destinations {
        if !seen.insert(queue.as_str()) {
            return Err(ContractError::config_validation(
                format!("route.destinations[{queue}]"),
                "duplicate destination queue",
            ));
        }
    }

    if route.destinations.contains(&route.source) {
        return Err(ContractError::config_validation(
            "route.destinations",
            format!("source queue '{}' cannot also be a destination", route.source),
        ));
    }

    Ok(())
}
