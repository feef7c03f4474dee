//! Helpers shared by the commands that talk to the simulator.

use std::future::Future;
use std::time::Duration;

use actor_factory::{Actor, CarlaClient, Connection, Scene, Session};
use anyhow::{Context, Result};
use camera_follower::CancellationToken;
use contracts::{ScenarioConfig, SessionConfig};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Validate the session settings and connect
pub async fn connect<C: CarlaClient>(
    client: C,
    config: &SessionConfig,
) -> Result<(Connection<C>, Scene<C>)> {
    config_loader::ConfigLoader::validate(&ScenarioConfig {
        session: config.clone(),
        ..Default::default()
    })
    .context("Invalid connection settings")?;

    let (connection, scene) = Session::connect(client, config)
        .await
        .with_context(|| format!("Failed to connect to CARLA at {}", config.endpoint()))?;

    match connection.server_version().await {
        Ok(version) => info!(endpoint = %config.endpoint(), server_version = %version, "Connected"),
        Err(e) => warn!(error = %e, "Connected, but failed to read server version"),
    }

    Ok((connection, scene))
}

/// Run `body` with the simulator ticking in stepped mode, then hand the
/// world back in free-running mode
///
/// `stop` is cancelled once `body` returns, which also ends the ticker.
pub async fn with_ticking<C, F, Fut, T>(
    scene: &Scene<C>,
    config: &SessionConfig,
    stop: CancellationToken,
    body: F,
) -> Result<T>
where
    C: CarlaClient + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let ticker = if config.stepped_mode {
        let step = Duration::try_from_secs_f64(config.step_size).context("Invalid step size")?;
        Some(spawn_ticker(scene.clone(), step, stop.clone()))
    } else {
        None
    };

    let result = body().await;

    stop.cancel();
    if let Some(ticker) = ticker {
        match ticker.await {
            Ok(ticks) => debug!(ticks, "Ticker finished"),
            Err(e) => warn!(error = %e, "Ticker task failed"),
        }
    }
    release(scene, config).await;

    result
}

/// Leave the simulator free-running if this process switched it to stepped mode
pub async fn release<C: CarlaClient>(scene: &Scene<C>, config: &SessionConfig) {
    if !config.stepped_mode {
        return;
    }

    // Let pending requests take effect before handing control back
    if let Err(e) = scene.tick().await {
        warn!(error = %e, "Final tick failed");
    }
    match scene.set_stepped_mode(false, config.step_size).await {
        Ok(()) => info!("Restored free-running mode"),
        Err(e) => warn!(error = %e, "Failed to restore free-running mode"),
    }
}

/// Advance the simulation once per `step` until `stop` fires
///
/// Returns the number of ticks sent.
pub fn spawn_ticker<C: CarlaClient + 'static>(
    scene: Scene<C>,
    step: Duration,
    stop: CancellationToken,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(step);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = scene.tick().await {
                        error!(error = %e, "Tick failed, stopping ticker");
                        break;
                    }
                    ticks += 1;
                }
            }
        }

        ticks
    })
}

/// Token cancelled on Ctrl+C / SIGTERM, or once `duration` has elapsed
pub fn stop_token(duration: Option<Duration>) -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();

    tokio::spawn(async move {
        let deadline = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown_signal() => warn!("Received shutdown signal, stopping..."),
            _ = deadline => info!("Duration elapsed, stopping..."),
            _ = watcher.cancelled() => {}
        }
        watcher.cancel();
    });

    token
}

/// Look up an existing vehicle by id
pub async fn find_vehicle<C: CarlaClient>(scene: &Scene<C>, actor_id: u32) -> Result<Actor> {
    let actor = scene
        .actors(None)
        .await
        .context("Failed to list actors")?
        .into_iter()
        .find(|a| a.id() == actor_id)
        .with_context(|| format!("Actor {actor_id} not found"))?;

    if !actor.is_vehicle() {
        anyhow::bail!("Actor {actor} is not a vehicle");
    }
    Ok(actor)
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::MockCarlaClient;

    #[tokio::test]
    async fn test_with_ticking_ticks_and_restores() {
        let client = MockCarlaClient::new();
        let probe = client.clone();
        let config = SessionConfig::default().with_stepped_mode(0.01);
        let (_connection, scene) = connect(client, &config).await.unwrap();
        let stop = CancellationToken::new();

        let value = with_ticking(&scene, &config, stop.clone(), || async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            Ok(42)
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert!(stop.is_cancelled());
        assert!(probe.frame() >= 2);
        assert!(!probe.settings().synchronous_mode);
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_port() {
        let config = SessionConfig::new("localhost", 0);
        let err = connect(MockCarlaClient::new(), &config).await.err().unwrap();
        assert!(err.to_string().contains("Invalid connection settings"));
    }

    #[tokio::test]
    async fn test_find_vehicle() {
        let (_connection, scene) = connect(MockCarlaClient::new(), &SessionConfig::default())
            .await
            .unwrap();
        let vehicle = scene
            .spawn("vehicle.audi.tt", contracts::Transform::default())
            .await
            .unwrap();
        let camera = scene
            .spawn_attached("sensor.camera.rgb", contracts::Transform::default(), &vehicle)
            .await
            .unwrap();

        assert_eq!(find_vehicle(&scene, vehicle.id()).await.unwrap(), vehicle);
        assert!(find_vehicle(&scene, camera.id()).await.is_err());
        assert!(find_vehicle(&scene, 4242).await.is_err());
    }
}
