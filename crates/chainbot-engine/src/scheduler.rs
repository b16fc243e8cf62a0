//! Background execution of strategy jobs.

use crate::job::{EngineEvent, EventKind, JobSpec, StrategyJob};
use chainbot_broker::PaperConfig;
use chainbot_core::error::BotError;
use chainbot_core::traits::MarketData;
use chainbot_risk::RiskConfig;
use chainbot_strategies::StrategyRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Candles fetched on each tick. Enough to catch up after a missed wakeup.
const TICK_CANDLES: usize = 5;
const WARMUP_RETRY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_jobs_per_user: usize,
    /// Candles fed through a strategy before it may trade.
    pub history_bars: usize,
    /// Wait after a candle closes before fetching it.
    pub close_delay_ms: u64,
    pub event_buffer: usize,
    pub risk: RiskConfig,
    pub paper: PaperConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_jobs_per_user: 5,
            history_bars: 300,
            close_delay_ms: 2_000,
            event_buffer: 256,
            risk: RiskConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}

struct RunningJob {
    user_id: i64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs one tokio task per active strategy job.
///
/// Jobs report what they do through the [`EngineEvent`] channel returned by
/// [`StrategyScheduler::new`].
pub struct StrategyScheduler {
    market: Arc<dyn MarketData>,
    registry: Arc<StrategyRegistry>,
    config: SchedulerConfig,
    jobs: Mutex<HashMap<i64, RunningJob>>,
    events: mpsc::Sender<EngineEvent>,
    shutdown: CancellationToken,
}

impl StrategyScheduler {
    pub fn new(
        market: Arc<dyn MarketData>,
        config: SchedulerConfig,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(config.event_buffer.max(1));
        let scheduler = Self {
            market,
            registry: Arc::new(StrategyRegistry::new()),
            config,
            jobs: Mutex::new(HashMap::new()),
            events: tx,
            shutdown: CancellationToken::new(),
        };
        (scheduler, rx)
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Validate `spec` and start its background task.
    pub async fn start(&self, spec: JobSpec) -> Result<(), BotError> {
        if self.shutdown.is_cancelled() {
            return Err(BotError::Internal("scheduler is shut down".into()));
        }

        let mut jobs = self.jobs.lock().await;
        jobs.retain(|_, job| !job.handle.is_finished());

        if jobs.contains_key(&spec.job_id) {
            return Err(BotError::Validation(format!(
                "Strategy {} is already running",
                spec.job_id
            )));
        }
        let user_jobs = jobs.values().filter(|j| j.user_id == spec.user_id).count();
        if user_jobs >= self.config.max_jobs_per_user {
            return Err(BotError::Validation(format!(
                "You can run at most {} strategies at once",
                self.config.max_jobs_per_user
            )));
        }

        let job = StrategyJob::new(
            spec.clone(),
            &self.registry,
            self.config.risk.clone(),
            self.config.paper.clone(),
        )?;

        let token = self.shutdown.child_token();
        let handle = tokio::spawn(run_job(
            job,
            Arc::clone(&self.market),
            self.events.clone(),
            token.clone(),
            self.config.history_bars,
            Duration::from_millis(self.config.close_delay_ms),
        ));

        info!(
            job_id = spec.job_id,
            user_id = spec.user_id,
            strategy = %spec.strategy_type,
            symbol = %spec.symbol,
            timeframe = %spec.timeframe,
            "strategy job started"
        );
        jobs.insert(
            spec.job_id,
            RunningJob {
                user_id: spec.user_id,
                token,
                handle,
            },
        );
        Ok(())
    }

    /// Cancel a job. Returns whether it was running.
    pub async fn stop(&self, job_id: i64) -> bool {
        let Some(job) = self.jobs.lock().await.remove(&job_id) else {
            return false;
        };
        job.token.cancel();
        if let Err(e) = job.handle.await {
            warn!(job_id, error = %e, "strategy task ended abnormally");
        }
        info!(job_id, "strategy job stopped");
        true
    }

    pub async fn is_running(&self, job_id: i64) -> bool {
        self.jobs
            .lock()
            .await
            .get(&job_id)
            .is_some_and(|j| !j.handle.is_finished())
    }

    /// Ids of live jobs, ascending.
    pub async fn running_jobs(&self) -> Vec<i64> {
        let jobs = self.jobs.lock().await;
        let mut ids: Vec<i64> = jobs
            .iter()
            .filter(|(_, j)| !j.handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Cancel every job and wait for the tasks to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let jobs: Vec<(i64, RunningJob)> = self.jobs.lock().await.drain().collect();
        for (job_id, job) in jobs {
            if let Err(e) = job.handle.await {
                warn!(job_id, error = %e, "strategy task ended abnormally");
            }
        }
        info!("scheduler stopped");
    }
}

async fn run_job(
    mut job: StrategyJob,
    market: Arc<dyn MarketData>,
    events: mpsc::Sender<EngineEvent>,
    token: CancellationToken,
    history_bars: usize,
    close_delay: Duration,
) {
    let spec = job.spec().clone();
    let limit = history_bars.max(job.strategy().warmup_period() + 1);

    loop {
        match market.candles(&spec.symbol, spec.timeframe, limit).await {
            Ok(bars) => {
                job.warm_up(&bars).await;
                break;
            }
            Err(e) => {
                warn!(job_id = spec.job_id, error = %e, "history fetch failed, retrying");
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(WARMUP_RETRY) => {}
                }
            }
        }
    }

    loop {
        let now = chrono::Utc::now().timestamp_millis();
        let wait = spec.timeframe.millis_until_close(now).max(0) as u64;
        let sleep = Duration::from_millis(wait) + close_delay;
        debug!(job_id = spec.job_id, sleep_ms = sleep.as_millis() as u64, "waiting for candle close");

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(sleep) => {}
        }

        let bars = match market.candles(&spec.symbol, spec.timeframe, TICK_CANDLES).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!(job_id = spec.job_id, error = %e, "candle fetch failed, will retry next close");
                continue;
            }
        };

        for bar in bars {
            for event in job.process_bar(bar).await {
                if let EventKind::Failed { message } = &event.kind {
                    error!(job_id = spec.job_id, message = %message, "job error");
                }
                if events.send(event).await.is_err() {
                    debug!(job_id = spec.job_id, "event receiver dropped");
                }
            }
        }
    }

    debug!(job_id = spec.job_id, "strategy task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainbot_core::error::DataError;
    use chainbot_core::types::{Bar, Timeframe};

    struct StaticMarket;

    #[async_trait]
    impl MarketData for StaticMarket {
        async fn candles(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            limit: usize,
        ) -> Result<Vec<Bar>, DataError> {
            Ok((0..limit.min(50))
                .map(|i| Bar::new(i as i64 * 60_000, 100.0, 101.0, 99.0, 100.0, 10.0))
                .collect())
        }

        async fn latest_price(&self, _symbol: &str) -> Result<f64, DataError> {
            Ok(100.0)
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    fn spec(job_id: i64, user_id: i64) -> JobSpec {
        JobSpec {
            job_id,
            user_id,
            strategy_type: "low_rsi".into(),
            symbol: "ETH".into(),
            timeframe: Timeframe::Hour1,
            parameters: serde_json::Value::Null,
            stop_loss_pct: None,
            max_slippage_pct: None,
        }
    }

    fn scheduler(max_jobs_per_user: usize) -> StrategyScheduler {
        let config = SchedulerConfig {
            max_jobs_per_user,
            history_bars: 20,
            ..SchedulerConfig::default()
        };
        StrategyScheduler::new(Arc::new(StaticMarket), config).0
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let scheduler = scheduler(5);
        scheduler.start(spec(1, 10)).await.unwrap();
        assert!(scheduler.is_running(1).await);
        assert_eq!(scheduler.running_jobs().await, vec![1]);

        assert!(scheduler.stop(1).await);
        assert!(!scheduler.is_running(1).await);
        assert!(!scheduler.stop(1).await);
    }

    #[tokio::test]
    async fn test_duplicate_job_is_refused() {
        let scheduler = scheduler(5);
        scheduler.start(spec(1, 10)).await.unwrap();
        assert!(matches!(
            scheduler.start(spec(1, 10)).await,
            Err(BotError::Validation(_))
        ));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_per_user_limit() {
        let scheduler = scheduler(2);
        scheduler.start(spec(1, 10)).await.unwrap();
        scheduler.start(spec(2, 10)).await.unwrap();
        assert!(scheduler.start(spec(3, 10)).await.is_err());
        scheduler.start(spec(4, 11)).await.unwrap();
        assert_eq!(scheduler.running_jobs().await, vec![1, 2, 4]);

        scheduler.shutdown().await;
        assert!(scheduler.running_jobs().await.is_empty());
        assert!(scheduler.start(spec(5, 12)).await.is_err());
    }

    /// Serves scripted candle responses in order, then empty lists.
    struct ScriptedMarket {
        responses: Mutex<std::collections::VecDeque<Result<Vec<Bar>, DataError>>>,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedMarket {
        fn new(responses: Vec<Result<Vec<Bar>, DataError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Default::default(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketData for ScriptedMarket {
        async fn candles(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> Result<Vec<Bar>, DataError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.responses.lock().await.pop_front().unwrap_or(Ok(Vec::new()))
        }

        async fn latest_price(&self, _symbol: &str) -> Result<f64, DataError> {
            Ok(100.0)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn hourly(closes: &[(i64, f64)]) -> Vec<Bar> {
        closes
            .iter()
            .map(|&(hour, c)| Bar::new(hour * 3_600_000, c, c + 0.5, c - 0.5, c, 1_000.0))
            .collect()
    }

    fn crossover_spec() -> JobSpec {
        JobSpec {
            strategy_type: "ema_crossover".into(),
            parameters: serde_json::json!({"period": 3}),
            ..spec(1, 10)
        }
    }

    /// Falling closes that keep a 3 EMA flat, then the candle that crosses it.
    fn history() -> Vec<Bar> {
        hourly(&[(0, 100.0), (1, 99.0), (2, 98.0), (3, 97.0), (4, 96.0)])
    }

    fn tick() -> Vec<Bar> {
        hourly(&[(2, 98.0), (3, 97.0), (4, 96.0), (5, 100.0)])
    }

    async fn next_event(events: &mut mpsc::Receiver<EngineEvent>) -> EngineEvent {
        tokio::time::timeout(Duration::from_secs(3 * 3_600), events.recv())
            .await
            .expect("event before timeout")
            .expect("channel open")
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_trades_the_next_closed_candle() {
        let market = ScriptedMarket::new(vec![Ok(history()), Ok(tick())]);
        let config = SchedulerConfig {
            history_bars: 5,
            ..SchedulerConfig::default()
        };
        let (scheduler, mut events) = StrategyScheduler::new(market.clone(), config);
        scheduler.start(crossover_spec()).await.unwrap();

        let event = next_event(&mut events).await;
        assert_eq!(event.job_id, 1);
        assert_eq!(event.user_id, 10);
        assert_eq!(event.timestamp, 5 * 3_600_000);
        assert!(matches!(event.kind, EventKind::Opened { .. }), "{event:?}");
        assert_eq!(market.calls(), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_retried_next_close() {
        let market = ScriptedMarket::new(vec![
            Err(DataError::ConnectionError("history down".into())),
            Ok(history()),
            Err(DataError::ConnectionError("tick down".into())),
            Ok(tick()),
        ]);
        let config = SchedulerConfig {
            history_bars: 5,
            ..SchedulerConfig::default()
        };
        let (scheduler, mut events) = StrategyScheduler::new(market.clone(), config);
        scheduler.start(crossover_spec()).await.unwrap();

        let event = next_event(&mut events).await;
        assert!(matches!(event.kind, EventKind::Opened { .. }), "{event:?}");
        assert_eq!(market.calls(), 4);
        assert!(scheduler.is_running(1).await);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_strategy_fails_fast() {
        let scheduler = scheduler(5);
        let mut bad = spec(1, 10);
        bad.strategy_type = "nope".into();
        assert!(scheduler.start(bad).await.is_err());
        assert!(scheduler.running_jobs().await.is_empty());
    }
}
