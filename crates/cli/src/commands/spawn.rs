//! `spawn` and `spawn-many` command implementations.

use actor_factory::{ActorFactory, CarlaClient, FleetController};
use anyhow::{Context, Result};
use contracts::SessionConfig;
use tracing::info;

use super::common;
use crate::cli::{SpawnArgs, SpawnManyArgs};

/// Execute the `spawn` command
pub async fn run_spawn<C: CarlaClient>(
    client: C,
    session: &SessionConfig,
    args: &SpawnArgs,
) -> Result<()> {
    let (_connection, scene) = common::connect(client, session).await?;
    let factory = ActorFactory::new(scene.clone());

    let result = async {
        let actor = factory
            .spawn_one(args.type_filter.as_deref())
            .await
            .context("Failed to spawn vehicle")?;

        if args.autopilot {
            scene
                .set_autopilot(&actor, true)
                .await
                .with_context(|| format!("Failed to enable autopilot on {actor}"))?;
            info!(actor_id = actor.id(), "Autopilot enabled");
        }
        Ok::<_, anyhow::Error>(actor)
    }
    .await;

    common::release(&scene, session).await;
    let actor = result?;

    println!("Spawned {actor}");
    Ok(())
}

/// Execute the `spawn-many` command
pub async fn run_spawn_many<C: CarlaClient>(
    client: C,
    session: &SessionConfig,
    args: &SpawnManyArgs,
) -> Result<()> {
    let (_connection, scene) = common::connect(client, session).await?;
    let factory = ActorFactory::new(scene.clone());

    let summary = factory
        .spawn_many(args.count, Some(args.types.as_slice()))
        .await;

    let autopilot = if args.autopilot && summary.spawned > 0 {
        Some(FleetController::new(scene.clone()).set_autopilot(true).await)
    } else {
        None
    };

    common::release(&scene, session).await;

    println!("Spawn summary: {summary}");
    if let Some(result) = autopilot {
        let updated = result.context("Failed to enable autopilot")?;
        println!("Autopilot enabled on {updated} vehicles");
    }
    if summary.attempted == 0 && args.count > 0 {
        anyhow::bail!("No vehicles spawned: vehicle types could not be resolved");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::MockCarlaClient;

    #[tokio::test]
    async fn test_spawn_many_with_autopilot() {
        let client = MockCarlaClient::new();
        let probe = client.clone();
        let args = SpawnManyArgs {
            count: 5,
            types: Vec::new(),
            autopilot: true,
        };

        run_spawn_many(client, &SessionConfig::default(), &args)
            .await
            .unwrap();

        let ids = probe.all_actor_ids();
        assert!(!ids.is_empty());
        assert!(ids.iter().all(|id| probe.autopilot_enabled(*id) == Some(true)));
    }

    #[tokio::test]
    async fn test_spawn_many_unknown_type_fails() {
        let args = SpawnManyArgs {
            count: 3,
            types: vec!["vehicle.unknown.*".to_string()],
            autopilot: false,
        };

        let result = run_spawn_many(MockCarlaClient::new(), &SessionConfig::default(), &args).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_spawn_restores_free_running_mode() {
        let client = MockCarlaClient::new();
        let probe = client.clone();
        let session = SessionConfig::default().with_stepped_mode(0.05);
        let args = SpawnArgs {
            type_filter: Some("vehicle.audi.tt".to_string()),
            autopilot: false,
        };

        run_spawn(client, &session, &args).await.unwrap();

        assert_eq!(probe.actor_count(), 1);
        assert_eq!(probe.frame(), 1);
        assert!(!probe.settings().synchronous_mode);
    }
}
