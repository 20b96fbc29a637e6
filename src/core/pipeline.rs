//! Wiring for the fetch → queue → play pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::fetcher::CallFetcher;
use super::ledger::SeenLedger;
use super::player::CallPlayer;
use super::queue;
use super::shutdown::Shutdown;
use crate::adapters::{AudioPlayer, CallSource};
use crate::config::Settings;

/// Tunables for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub fetch_interval: Duration,
    pub queue_capacity: usize,
    pub grace_period: Duration,
}

impl From<&Settings> for PipelineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            fetch_interval: settings.fetch_interval,
            queue_capacity: settings.queue_capacity,
            grace_period: settings.grace_period,
        }
    }
}

/// A configured, not yet started pipeline for one system
pub struct Pipeline {
    source: Arc<dyn CallSource>,
    player: Arc<dyn AudioPlayer>,
    system: String,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn CallSource>,
        player: Arc<dyn AudioPlayer>,
        system: impl Into<String>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source,
            player,
            system: system.into(),
            options,
        }
    }

    /// Spawn the fetcher and player tasks
    pub fn spawn(self) -> Result<RunningPipeline> {
        let (tx, rx) = queue::bounded(self.options.queue_capacity)?;
        let ledger = Arc::new(SeenLedger::new());
        let shutdown = Shutdown::new(self.options.grace_period);

        info!(
            system = %self.system,
            capacity = self.options.queue_capacity,
            interval = ?self.options.fetch_interval,
            "Starting pipeline"
        );

        let fetcher = CallFetcher::new(
            self.source,
            self.system,
            ledger.clone(),
            tx,
            self.options.fetch_interval,
        );
        let fetcher = tokio::spawn(fetcher.run(shutdown.token()));

        let player = CallPlayer::new(self.player, rx);
        let token = shutdown.token();
        let player = tokio::spawn(async move {
            let played = player.run(token).await;
            debug!(played, "Player finished");
        });

        Ok(RunningPipeline {
            shutdown,
            ledger,
            fetcher,
            player,
        })
    }
}

/// Handle to a pipeline whose loops are running
pub struct RunningPipeline {
    shutdown: Shutdown,
    ledger: Arc<SeenLedger>,
    fetcher: JoinHandle<()>,
    player: JoinHandle<()>,
}

impl RunningPipeline {
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn ledger(&self) -> &Arc<SeenLedger> {
        &self.ledger
    }

    /// Block until SIGINT/SIGTERM, then stop
    pub async fn run_until_interrupt(self) -> Result<()> {
        self.shutdown.wait_for_interrupt().await?;
        self.stop().await;
        Ok(())
    }

    /// Signal both loops and wait up to the grace period.
    ///
    /// Returns `true` if both loops exited within it.
    pub async fn stop(self) -> bool {
        self.shutdown.trigger();
        self.shutdown.drain(vec![self.fetcher, self.player]).await
    }
}
