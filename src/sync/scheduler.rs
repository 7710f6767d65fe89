use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::config::{Config, CrlSource};

use super::orchestrator::SyncOrchestrator;

/// Sources and interval for the next cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleConfig {
    pub sources: Vec<CrlSource>,
    pub interval: Duration,
}

impl From<&Config> for CycleConfig {
    fn from(config: &Config) -> Self {
        Self {
            sources: config.sources.clone(),
            interval: config.poll_interval(),
        }
    }
}

/// Provides a fresh source list between cycles.
#[async_trait]
pub trait ConfigReloader: Send + Sync {
    /// `None` keeps the current configuration.
    async fn reload(&self) -> Option<CycleConfig>;
}

/// Re-reads the configuration file before each scheduled cycle
#[derive(Debug, Clone)]
pub struct ConfigFileReloader {
    path: String,
}

impl ConfigFileReloader {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigReloader for ConfigFileReloader {
    async fn reload(&self) -> Option<CycleConfig> {
        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || Config::load_from(&path, None)).await;

        match loaded {
            Ok(Ok(config)) => Some(CycleConfig::from(&config)),
            Ok(Err(e)) => {
                warn!("Error refreshing config, keeping previous: {}", e);
                None
            }
            Err(e) => {
                warn!("Config reload task failed, keeping previous: {}", e);
                None
            }
        }
    }
}

/// Runs the orchestrator once immediately, then on a fixed interval until
/// shutdown is signalled.
pub struct CrlScheduler {
    orchestrator: SyncOrchestrator,
    current: CycleConfig,
    reloader: Option<Arc<dyn ConfigReloader>>,
    ready: Arc<AtomicBool>,
}

impl CrlScheduler {
    pub fn new(orchestrator: SyncOrchestrator, initial: CycleConfig) -> Self {
        Self {
            orchestrator,
            current: initial,
            reloader: None,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_reloader(mut self, reloader: Arc<dyn ConfigReloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    /// Flag raised once the first cycle has completed
    pub fn with_readiness(mut self, ready: Arc<AtomicBool>) -> Self {
        self.ready = ready;
        self
    }

    /// Drive cycles until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A cycle that has started always runs to completion; shutdown is only
    /// observed between cycles. Returns the number of cycles run.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> usize {
        self.run_cycle().await;
        let mut cycles = 1;
        self.ready.store(true, Ordering::SeqCst);

        let mut ticker = new_ticker(self.current.interval);
        info!(
            "CRL scheduler started with an interval of {} seconds",
            self.current.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.refresh().await {
                        ticker = new_ticker(self.current.interval);
                    }
                    self.run_cycle().await;
                    cycles += 1;
                }
            }
        }

        info!("Graceful shutdown of CRL scheduler after {} cycles", cycles);
        cycles
    }

    async fn run_cycle(&self) {
        debug!("Running CRL cycle over {} sources", self.current.sources.len());
        let summary = self.orchestrator.process_crls(&self.current.sources).await;
        debug!("CRL cycle complete, {} writes", summary.writes());
    }

    /// Pull new configuration. Returns `true` when the interval changed.
    async fn refresh(&mut self) -> bool {
        let Some(reloader) = &self.reloader else {
            return false;
        };
        let Some(next) = reloader.reload().await else {
            return false;
        };

        if next == self.current {
            debug!("Configuration not refreshed, no changes detected");
            return false;
        }

        info!("Configuration refreshed, {} sources", next.sources.len());
        let interval_changed = next.interval != self.current.interval;
        if interval_changed {
            info!(
                "Poll interval changed from {}s to {}s",
                self.current.interval.as_secs(),
                next.interval.as_secs()
            );
        }
        self.current = next;
        interval_changed
    }
}

/// First tick fires one full period from now, since a cycle has just run.
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
