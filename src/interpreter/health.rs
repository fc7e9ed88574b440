//! Static health state derived from a component's `health` property

use crate::error::SemanticError;
use crate::graph::{Component, HealthState, HealthValue};

/// Value used when neither the component nor the defaults set `health`
pub const DEFAULT_HEALTH: &str = "HealthCheck|CLEAR";

/// Check name used when `health` carries only a state
pub const DEFAULT_CHECK_NAME: &str = "HealthCheck";

/// Split `"NAME|STATE"` or a bare `"STATE"`
pub fn parse_health(health: &str, element: &str) -> Result<(String, HealthValue), SemanticError> {
    let (name, state) = health.split_once('|').unwrap_or((DEFAULT_CHECK_NAME, health));
    let value = state
        .parse::<HealthValue>()
        .map_err(|state| SemanticError::InvalidHealthState {
            state,
            element: element.to_string(),
        })?;
    Ok((name.to_string(), value))
}

/// Health state for a fully resolved component
pub fn health_state(
    component: &Component,
    health: &str,
    message: String,
) -> Result<HealthState, SemanticError> {
    let (check_name, value) = parse_health(health, &component.name)?;
    Ok(HealthState {
        check_id: format!("{}_static_states", component.name),
        check_name,
        topo_identifier: component.topo_identifier().to_string(),
        value,
        message,
    })
}
