//! Headless tracker host binary.
//!
//! Claims the single-instance role, then assembles and boots the tracker
//! core. A launch that finds a live primary asks it to surface itself and
//! exits immediately. The primary then sits in a drain loop, logging board
//! changes and wake requests until interrupted.

use std::sync::Arc;
use taskdeck::config::TrackerConfig;
use taskdeck::notify::TracingSink;
use taskdeck::singleton::SingletonCoordinator;
use taskdeck::startup;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskdeck=info")),
        )
        .init();

    let coordinator = SingletonCoordinator::open_default();
    if !coordinator.try_become_primary()? {
        tracing::info!("another tracker instance is running, asking it to surface");
        if let Err(e) = coordinator.raise_activation() {
            tracing::warn!("could not wake the running instance: {e}");
        }
        return Ok(());
    }

    let (wake_tx, mut wakes) = mpsc::unbounded_channel();
    coordinator.spawn_listener(wake_tx)?;

    let config = TrackerConfig::load()?;
    let mut host = startup::initialize(&config, Arc::new(TracingSink)).await?;
    tracing::info!("taskdeck host running");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            Some(_signal) = wakes.recv() => {
                // a UI shell would bring its window to the foreground here
                tracing::info!("activation requested by another instance");
            }
            Some(event) = host.events.recv() => {
                tracing::debug!(?event, "board changed");
            }
        }
    }

    host.engine.stop();
    coordinator.release();
    Ok(())
}
