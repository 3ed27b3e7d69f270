use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::StoreError,
    metrics::{MetricsHandle, NoopMetrics},
    store::ResultStore,
};

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between two scans of the result store.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Periodically removes results that have outlived the retention window.
///
/// Runs independently of request traffic. An entry survives at most one
/// sweep interval past its window in storage; reads hide it as soon as the
/// window elapses.
pub struct RetentionSweeper {
    store: ResultStore,
    config: SweeperConfig,
    metrics: MetricsHandle,
}

impl RetentionSweeper {
    pub fn new(store: ResultStore, config: SweeperConfig) -> Self {
        Self {
            store,
            config,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run a single scan.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let removed = self.store.purge_expired().await?;
        if removed > 0 {
            self.metrics.record_results_expired(removed);
            info!(removed, "expired results swept");
        }
        Ok(removed)
    }

    /// Start the sweep loop on the current runtime.
    pub fn spawn(self) -> SweeperHandle {
        let token = CancellationToken::new();
        let child = token.child_token();
        let join = tokio::spawn(async move { self.run(child).await });
        SweeperHandle { token, join }
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(
            interval_ms = self.config.interval.as_millis() as u64,
            retention_secs = self.store.retention().as_secs(),
            "retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "retention sweep failed; retrying next tick");
                    }
                }
            }
        }
        debug!("retention sweeper stopped");
    }
}

/// Control handle for a spawned [`RetentionSweeper`].
pub struct SweeperHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Token that stops the sweeper when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "retention sweeper task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryBackend;
    use crate::testkit::{id, outcome};
    use serde_json::json;
    use std::time::UNIX_EPOCH;

    const WINDOW: Duration = Duration::from_secs(30 * 60);

    fn fixture() -> (ResultStore, ManualClock, Arc<MemoryBackend>) {
        let clock = ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let backend = Arc::new(MemoryBackend::new());
        let store = ResultStore::new(backend.clone(), WINDOW).with_clock(Arc::new(clock.clone()));
        (store, clock, backend)
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn sweep_once_removes_only_expired() {
        let (store, clock, backend) = fixture();
        store.write(&id("A"), outcome(json!({}))).await.unwrap();
        let sweeper = RetentionSweeper::new(store.clone(), SweeperConfig::default());

        clock.advance(Duration::from_secs(29 * 60));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        assert_eq!(backend.len(), 1);

        clock.advance(Duration::from_secs(2 * 60));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_sweeps_on_each_tick() {
        let (store, clock, backend) = fixture();
        let handle = RetentionSweeper::new(
            store.clone(),
            SweeperConfig {
                interval: Duration::from_secs(60),
            },
        )
        .spawn();
        settle().await;

        store.write(&id("A"), outcome(json!({"v": 1}))).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(backend.len(), 1);

        clock.advance(WINDOW);
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert!(backend.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let (store, _, _) = fixture();
        let handle = RetentionSweeper::new(store, SweeperConfig::default()).spawn();
        let token = handle.token();

        handle.shutdown().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn sweeping_runs_alongside_other_writes() {
        let (store, clock, _) = fixture();
        store.write(&id("old"), outcome(json!({}))).await.unwrap();
        clock.advance(WINDOW);

        let sweeper = RetentionSweeper::new(store.clone(), SweeperConfig::default());
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for n in 0..50 {
                    store.write(&id(&format!("new{n}")), outcome(json!({"n": n}))).await.unwrap();
                }
            })
        };
        let removed = sweeper.sweep_once().await.unwrap();
        writer.await.unwrap();

        assert_eq!(removed, 1);
        for n in 0..50 {
            assert!(store.read(&id(&format!("new{n}"))).await.unwrap().is_some());
        }
    }
}
