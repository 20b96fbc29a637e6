//! Call player: the consumer side of the pipeline.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::queue::CallReceiver;
use crate::adapters::AudioPlayer;
use crate::domain::Call;

/// Consumer loop: plays queued calls strictly one at a time
pub struct CallPlayer {
    player: Arc<dyn AudioPlayer>,
    queue: CallReceiver,
}

impl CallPlayer {
    pub fn new(player: Arc<dyn AudioPlayer>, queue: CallReceiver) -> Self {
        Self { player, queue }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// A call already playing when shutdown fires is not interrupted here; the
    /// caller bounds that with the grace period. Returns the number of calls
    /// played successfully.
    pub async fn run(mut self, shutdown: CancellationToken) -> usize {
        let mut played = 0;

        while let Some(call) = self.queue.dequeue(&shutdown).await {
            if self.play_one(&call).await {
                played += 1;
            }
        }

        info!("Stopping audio player.");
        played
    }

    async fn play_one(&self, call: &Call) -> bool {
        match call.recorded_at() {
            Some(at) => info!(
                call_id = %call.id,
                age_secs = (chrono::Utc::now() - at).num_seconds(),
                "Processing call: {}",
                call.filename
            ),
            None => info!(call_id = %call.id, "Processing call: {}", call.filename),
        }

        match self.player.play(call).await {
            Ok(()) => true,
            Err(e) => {
                error!(call_id = %call.id, "Failed to play call: {:#}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FailingOn {
        bad_id: String,
        attempted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AudioPlayer for FailingOn {
        async fn play(&self, call: &Call) -> Result<()> {
            self.attempted.lock().unwrap().push(call.id.clone());
            if call.id == self.bad_id {
                anyhow::bail!("mpg123 exited with code 1");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_loop() {
        let (tx, rx) = queue::bounded(5).unwrap();
        for id in ["a", "b", "c"] {
            tx.try_enqueue(Call::new(id, "https://example.com/x.m4a"));
        }

        let backend = Arc::new(FailingOn {
            bad_id: "b".to_string(),
            ..Default::default()
        });
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(CallPlayer::new(backend.clone(), rx).run(shutdown.clone()));

        while backend.attempted.lock().unwrap().len() < 3 {
            tokio::task::yield_now().await;
        }
        shutdown.cancel();

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(*backend.attempted.lock().unwrap(), vec!["a", "b", "c"]);
    }
}
