//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ScenarioConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ScenarioSummary>,
}

#[derive(Serialize)]
struct ScenarioSummary {
    endpoint: String,
    stepped_mode: bool,
    fleet_count: usize,
    vehicle_types: Option<Vec<String>>,
    camera_enabled: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating scenario");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Scenario validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ScenarioSummary {
                    endpoint: config.session.endpoint(),
                    stepped_mode: config.session.stepped_mode,
                    fleet_count: config.fleet.count,
                    vehicle_types: config.fleet.vehicle_types.clone(),
                    camera_enabled: config.camera.enabled,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect scenario warnings (non-fatal issues)
fn collect_warnings(config: &ScenarioConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.fleet.count == 0 && !config.camera.enabled {
        warnings.push("fleet.count is 0 and the camera is disabled - nothing will be spawned".to_string());
    }

    if config.session.stepped_mode && config.session.step_size > 0.1 {
        warnings.push(format!(
            "session.step_size {}s is larger than 0.1s - physics may become unstable",
            config.session.step_size
        ));
    }

    if !config.fleet.cleanup_on_exit && (config.fleet.count > 0 || config.camera.enabled) {
        warnings.push("fleet.cleanup_on_exit is false - spawned actors stay in the world".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Scenario is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  CARLA: {}", summary.endpoint);
            println!("  Stepped: {}", summary.stepped_mode);
            println!("  Fleet: {}", summary.fleet_count);
            if let Some(ref types) = summary.vehicle_types {
                println!("  Vehicle types: {}", types.join(", "));
            }
            println!("  Camera: {}", summary.camera_enabled);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Scenario is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
