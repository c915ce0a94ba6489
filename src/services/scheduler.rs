use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};

use super::scan_engine::{PassReport, ScanEngine};
use crate::{
    constants::MAX_MONITOR_INTERVAL_MINUTES,
    error::{AppError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_minutes: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct SchedulerState {
    shutdown: Option<watch::Sender<bool>>,
    // Loop task, kept after stop() until a later start() has joined it
    task: Option<JoinHandle<()>>,
    interval_minutes: Option<u64>,
    started_at: Option<DateTime<Utc>>,
}

/// Runs monitoring passes on an interval. Passes inside the loop are
/// sequential; `run_now` runs out-of-band.
pub struct Scheduler {
    engine: Arc<ScanEngine>,
    state: Arc<Mutex<SchedulerState>>,
}

impl Scheduler {
    pub fn new(engine: Arc<ScanEngine>) -> Self {
        Self {
            engine,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Starts the interval loop. The first pass runs immediately.
    pub async fn start(&self, interval_minutes: u64) -> Result<StartOutcome> {
        if interval_minutes == 0 || interval_minutes > MAX_MONITOR_INTERVAL_MINUTES {
            return Err(AppError::BadRequest(format!(
                "interval must be between 1 and {} minutes",
                MAX_MONITOR_INTERVAL_MINUTES
            )));
        }

        let mut state = self.state.lock().await;
        if state.shutdown.is_some() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        // A stopped loop may still be finishing its last pass
        if let Some(previous) = state.task.take() {
            if !previous.is_finished() {
                tracing::info!("Waiting for the previous monitor loop to finish its pass");
            }
            if let Err(e) = previous.await {
                tracing::warn!("Previous monitor loop ended abnormally: {}", e);
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self.engine.clone(), interval_minutes, shutdown_rx));

        state.shutdown = Some(shutdown_tx);
        state.task = Some(task);
        state.interval_minutes = Some(interval_minutes);
        state.started_at = Some(Utc::now());
        tracing::info!("Monitor started, every {} minute(s)", interval_minutes);
        Ok(StartOutcome::Started)
    }

    /// Stops the loop after any in-flight pass finishes.
    pub async fn stop(&self) -> StopOutcome {
        let mut state = self.state.lock().await;
        let Some(shutdown) = state.shutdown.take() else {
            return StopOutcome::NotRunning;
        };
        let _ = shutdown.send(true);
        state.interval_minutes = None;
        state.started_at = None;
        tracing::info!("Monitor stop requested");
        StopOutcome::Stopped
    }

    /// Manual refresh, independent of the interval loop.
    pub async fn run_now(&self) -> Result<PassReport> {
        tracing::info!("Manual monitoring pass triggered");
        self.engine.run_pass().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().await;
        SchedulerStatus {
            running: state.shutdown.is_some(),
            interval_minutes: state.interval_minutes,
            started_at: state.started_at,
        }
    }
}

// Internal helper that drives passes until shutdown is signalled. Shutdown is
// checked before each tick so a stop during a pass ends the loop right after it.
async fn run_loop(
    engine: Arc<ScanEngine>,
    interval_minutes: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(interval_minutes * 60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Fires on stop() or when the sender is dropped
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = engine.run_pass().await {
            tracing::error!("Scheduled monitoring pass failed: {}", e);
        }
    }
    tracing::info!("Monitor loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        indexer::{ChainClient, ChainClients, RawTx},
        models::{Chain, RunStatus},
        services::testing::{idle_engine, FakeFeed, FakeNotifier, FakeResolver, MemoryStore},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Tip lookup that takes a while and records how many run at once.
    #[derive(Default)]
    struct SlowChain {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl ChainClient for SlowChain {
        fn chain(&self) -> Chain {
            Chain::Bitcoin
        }

        async fn get_tip_height(&self) -> Option<u64> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Some(10)
        }

        async fn fetch_outgoing_since(&self, _: &str, _: u64, _: u64) -> Vec<RawTx> {
            Vec::new()
        }
    }

    fn scheduler() -> (Arc<MemoryStore>, Scheduler) {
        let store = Arc::new(MemoryStore::default());
        let engine = Arc::new(idle_engine(store.clone()));
        (store, Scheduler::new(engine))
    }

    #[tokio::test]
    async fn double_start_reports_already_running() {
        let (_, scheduler) = scheduler();
        assert_eq!(scheduler.start(5).await.unwrap(), StartOutcome::Started);
        assert_eq!(
            scheduler.start(10).await.unwrap(),
            StartOutcome::AlreadyRunning
        );

        let status = scheduler.status().await;
        assert!(status.running);
        assert_eq!(status.interval_minutes, Some(5));

        assert_eq!(scheduler.stop().await, StopOutcome::Stopped);
    }

    #[tokio::test]
    async fn stop_when_idle_reports_not_running() {
        let (_, scheduler) = scheduler();
        assert_eq!(scheduler.stop().await, StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn stop_then_start_again() {
        let (_, scheduler) = scheduler();
        scheduler.start(1).await.unwrap();
        assert_eq!(scheduler.stop().await, StopOutcome::Stopped);
        assert!(!scheduler.status().await.running);
        assert_eq!(scheduler.start(2).await.unwrap(), StartOutcome::Started);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn out_of_range_interval_is_rejected() {
        let (_, scheduler) = scheduler();
        assert!(scheduler.start(0).await.is_err());
        assert!(scheduler
            .start(MAX_MONITOR_INTERVAL_MINUTES + 1)
            .await
            .is_err());
        assert!(!scheduler.status().await.running);
    }

    #[tokio::test]
    async fn first_tick_runs_a_pass_immediately() {
        let (store, scheduler) = scheduler();
        scheduler.start(60).await.unwrap();

        let mut completed = false;
        for _ in 0..50 {
            if store.status() == RunStatus::Completed {
                completed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        scheduler.stop().await;
        assert!(completed);
    }

    #[tokio::test]
    async fn restart_waits_for_the_stopped_loop_to_finish_its_pass() {
        let chain = Arc::new(SlowChain::default());
        let store = Arc::new(
            MemoryStore::default().with_address("1a1zp1ep5qgefi2dmptftl5slmv7divfna", "bitcoin", 0),
        );
        let engine = ScanEngine::new(
            store.clone(),
            ChainClients::new().with(chain.clone()),
            Arc::new(FakeResolver::default()),
            Arc::new(FakeNotifier::default()),
            Arc::new(FakeFeed(Vec::new())),
        );
        let scheduler = Scheduler::new(Arc::new(engine));

        scheduler.start(60).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.stop().await, StopOutcome::Stopped);
        assert_eq!(scheduler.start(60).await.unwrap(), StartOutcome::Started);
        tokio::time::sleep(Duration::from_millis(500)).await;
        scheduler.stop().await;

        assert_eq!(chain.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(store.watermark("1a1zp1ep5qgefi2dmptftl5slmv7divfna"), 10);
    }

    #[tokio::test]
    async fn run_now_works_without_the_loop() {
        let (store, scheduler) = scheduler();
        let report = scheduler.run_now().await.unwrap();
        assert_eq!(report, PassReport::default());
        assert_eq!(store.status(), RunStatus::Completed);
        assert!(!scheduler.status().await.running);
    }
}
