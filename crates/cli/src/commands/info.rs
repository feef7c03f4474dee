//! `info` command implementation.

use std::collections::BTreeMap;

use actor_factory::CarlaClient;
use anyhow::{Context, Result};
use contracts::SessionConfig;
use serde::Serialize;

use super::common;
use crate::cli::InfoArgs;

/// World info for JSON output
#[derive(Serialize)]
struct WorldInfo {
    endpoint: String,
    server_version: String,
    synchronous_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixed_delta_seconds: Option<f64>,
    spawn_points: usize,
    vehicle_blueprints: usize,
    /// Actor count per category (first segment of the type id)
    actor_counts: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    actors: Vec<ActorInfo>,
}

#[derive(Serialize)]
struct ActorInfo {
    id: u32,
    type_id: String,
}

/// Execute the `info` command
pub async fn run_info<C: CarlaClient>(
    client: C,
    session: &SessionConfig,
    args: &InfoArgs,
) -> Result<()> {
    let (connection, scene) = common::connect(client, session).await?;

    let result = async {
        let settings = scene.settings().await.context("Failed to read episode settings")?;
        let actors = scene.actors(None).await.context("Failed to list actors")?;

        let mut actor_counts = BTreeMap::new();
        for actor in &actors {
            let category = actor.type_id().split('.').next().unwrap_or_default();
            *actor_counts.entry(category.to_string()).or_insert(0) += 1;
        }

        Ok::<_, anyhow::Error>(WorldInfo {
            endpoint: session.endpoint(),
            server_version: connection
                .server_version()
                .await
                .context("Failed to read server version")?,
            synchronous_mode: settings.synchronous_mode,
            fixed_delta_seconds: settings.fixed_delta_seconds,
            spawn_points: scene.spawn_points().await.context("Failed to read spawn points")?.len(),
            vehicle_blueprints: scene
                .find_blueprints("vehicle")
                .await
                .context("Failed to read blueprint library")?
                .len(),
            actor_counts,
            actors: if args.actors {
                actors
                    .iter()
                    .map(|a| ActorInfo {
                        id: a.id(),
                        type_id: a.type_id().to_string(),
                    })
                    .collect()
            } else {
                Vec::new()
            },
        })
    }
    .await;

    common::release(&scene, session).await;
    let info = result?;

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize world info")?;
        println!("{}", json);
    } else {
        print_world_info(&info);
    }

    Ok(())
}

fn print_world_info(info: &WorldInfo) {
    println!("\n=== CARLA World ===\n");
    println!("Server: {} (version {})", info.endpoint, info.server_version);
    match info.fixed_delta_seconds {
        Some(step) if info.synchronous_mode => println!("Mode: stepped, {step:.3}s per tick"),
        _ => println!("Mode: free-running"),
    }
    println!("Spawn points: {}", info.spawn_points);
    println!("Vehicle blueprints: {}", info.vehicle_blueprints);

    println!("\nActors:");
    if info.actor_counts.is_empty() {
        println!("  (none)");
    }
    for (category, count) in &info.actor_counts {
        println!("  {category}: {count}");
    }

    if !info.actors.is_empty() {
        println!();
        for actor in &info.actors {
            println!("  - {} ({})", actor.type_id, actor.id);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::MockCarlaClient;

    #[tokio::test]
    async fn test_info_reads_world() {
        let args = InfoArgs {
            json: true,
            actors: true,
        };
        run_info(MockCarlaClient::new(), &SessionConfig::default(), &args)
            .await
            .unwrap();
    }
}
