//! `autopilot` and `destroy-all` command implementations.

use actor_factory::{CarlaClient, FleetController};
use anyhow::{Context, Result};
use contracts::SessionConfig;

use super::common;
use crate::cli::AutopilotArgs;

/// Execute the `autopilot` command
pub async fn run_autopilot<C: CarlaClient>(
    client: C,
    session: &SessionConfig,
    args: &AutopilotArgs,
) -> Result<()> {
    let (_connection, scene) = common::connect(client, session).await?;
    let enabled = !args.off;

    let result = FleetController::new(scene.clone()).set_autopilot(enabled).await;
    common::release(&scene, session).await;

    let updated = result.context("Failed to update autopilot")?;
    println!(
        "Autopilot {} on {updated} vehicles",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// Execute the `destroy-all` command
pub async fn run_destroy_all<C: CarlaClient>(client: C, session: &SessionConfig) -> Result<()> {
    let (_connection, scene) = common::connect(client, session).await?;

    let result = FleetController::new(scene.clone()).destroy_all().await;
    common::release(&scene, session).await;

    let destroyed = result.context("Failed to destroy actors")?;
    println!("Destroyed {destroyed} actors");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::{MockCarlaClient, MockConfig};

    #[tokio::test]
    async fn test_destroy_all_on_empty_world() {
        run_destroy_all(MockCarlaClient::new(), &SessionConfig::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_autopilot_unreachable_server_fails() {
        let client = MockCarlaClient::with_config(MockConfig {
            unreachable: true,
            ..Default::default()
        });

        let err = run_autopilot(client, &SessionConfig::default(), &AutopilotArgs { off: false })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }
}
