//! Scenario validation
//!
//! Rules:
//! - field ranges declared on the contract types (`validator` derive)
//! - vehicle type filters, when given, are non-empty
//! - ego type filter, when given, is non-empty
//! - the chase camera blueprint is a sensor

use contracts::{ContractError, ScenarioConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a ScenarioConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ScenarioConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_vehicle_types(config)?;
    validate_camera(config)?;
    Ok(())
}

/// Declarative range checks
fn validate_ranges(config: &ScenarioConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_error(&errors, "")
            .unwrap_or_else(|| ("scenario".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// Depth-first search for the first failing field, with its dotted path
fn first_error(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(errs) => {
                if let Some(err) = errs.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", err.code));
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_error(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_error(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// Vehicle type filters
fn validate_vehicle_types(config: &ScenarioConfig) -> Result<(), ContractError> {
    let Some(types) = &config.fleet.vehicle_types else {
        return Ok(());
    };

    if types.is_empty() {
        return Err(ContractError::config_validation(
            "fleet.vehicle_types",
            "list must contain at least one filter, or be omitted for any vehicle",
        ));
    }

    for (idx, filter) in types.iter().enumerate() {
        if filter.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("fleet.vehicle_types[{}]", idx),
                "vehicle type filter cannot be empty",
            ));
        }
    }
    Ok(())
}

/// Chase camera settings
fn validate_camera(config: &ScenarioConfig) -> Result<(), ContractError> {
    let camera = &config.camera;

    if let Some(ego) = &camera.ego_type {
        if ego.trim().is_empty() {
            return Err(ContractError::config_validation(
                "camera.ego_type",
                "ego type filter cannot be empty",
            ));
        }
    }

    if !camera.blueprint.starts_with("sensor.") {
        return Err(ContractError::config_validation(
            "camera.blueprint",
            format!("'{}' is not a sensor blueprint", camera.blueprint),
        ));
    }

    Ok(())
}
