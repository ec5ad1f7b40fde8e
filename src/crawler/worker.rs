//! Crawl worker state machine
//!
//! ```text
//! IDLE -> CLAIMING -> PROCESSING -> (SAVING) -> CLAIMING ...
//!                 \-> DRAINED          \-> ABORTED
//! ```
//!
//! A claimed unit is processed in rounds sized by the adaptive controller;
//! each round is awaited fully before the next one is sized. On interruption
//! (or an auto-stop signal) the worker stops issuing fetches, flushes its
//! buffer and releases the held unit back to its source, in that order.

use crate::config::{ControllerConfig, CrawlConfig};
use crate::controller::AdaptiveController;
use crate::crawler::stats::NodeStats;
use crate::dedup::DedupStore;
use crate::fetch::{FetchOutcome, RecordFetcher};
use crate::output::LocalPersistence;
use crate::queue::{WorkSource, WorkUnit};
use crate::registry::NodeRegistry;
use crate::transform::RecordTransform;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Claiming,
    Processing,
    Saving,
    Drained,
    Aborted,
}

/// Why a worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No work left to claim
    QueueDrained,
    /// External interrupt
    Interrupted,
    /// Recent duplicate ratio reached the configured maximum
    DuplicateSaturation,
    /// This node persisted the configured number of unique records
    TargetReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::QueueDrained => "queue drained",
            StopReason::Interrupted => "interrupted",
            StopReason::DuplicateSaturation => "duplicate ratio limit reached",
            StopReason::TargetReached => "unique-record target reached",
        };
        f.write_str(label)
    }
}

/// End-of-run report
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub node_id: String,
    pub reason: StopReason,
    pub final_state: WorkerState,
    pub units_completed: u64,
    pub requests: u64,
    pub errors: u64,
    pub misses: u64,
    pub duplicates: u64,
    pub unique: u64,
    /// Records written to the dataset during this run
    pub flushed: u64,
    /// Records still buffered because the last flush failed
    pub unflushed: usize,
    pub batch_size: usize,
    pub elapsed: Duration,
}

/// Collaborators injected into a worker
pub struct WorkerDeps {
    pub source: Arc<dyn WorkSource>,
    pub dedup: Arc<dyn DedupStore>,
    /// Present in fleet mode only
    pub registry: Option<NodeRegistry>,
    pub fetcher: Arc<dyn RecordFetcher>,
    pub transform: Arc<dyn RecordTransform>,
}

/// Worker tuning taken from `[crawl]`
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub node_id: String,
    pub empty_queue_wait: Duration,
    pub save_interval: usize,
    pub max_duplicate_ratio: Option<f64>,
    pub duplicate_window: usize,
    pub target_unique: Option<u64>,
}

impl WorkerSettings {
    pub fn from_config(crawl: &CrawlConfig, node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            empty_queue_wait: Duration::from_secs(crawl.empty_queue_wait_secs),
            save_interval: crawl.save_interval.max(1),
            max_duplicate_ratio: crawl.max_duplicate_ratio,
            duplicate_window: crawl.duplicate_window,
            target_unique: crawl.target_unique,
        }
    }
}

enum Claim {
    Unit(WorkUnit),
    Drained,
    Interrupted,
}

/// One node's crawl loop
pub struct CrawlWorker {
    deps: WorkerDeps,
    settings: WorkerSettings,
    controller: AdaptiveController,
    persistence: LocalPersistence,
    stats: NodeStats,
    state: WorkerState,
    current: Option<WorkUnit>,
    shutdown: CancellationToken,
}

impl CrawlWorker {
    pub fn new(
        deps: WorkerDeps,
        settings: WorkerSettings,
        controller: ControllerConfig,
        persistence: LocalPersistence,
        shutdown: CancellationToken,
    ) -> Self {
        let stats = NodeStats::new(settings.duplicate_window);
        Self {
            deps,
            settings,
            controller: AdaptiveController::new(controller),
            persistence,
            stats,
            state: WorkerState::Idle,
            current: None,
            shutdown,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    /// Runs until the source drains, an interrupt arrives, or an auto-stop trips
    pub async fn run(&mut self) -> CrawlSummary {
        tracing::info!(
            "Worker {} starting on {} (dedup: {})",
            self.settings.node_id,
            self.deps.source.describe(),
            self.deps.dedup.describe()
        );

        let reason = loop {
            if let Some(reason) = self.stop_signal() {
                break reason;
            }

            self.set_state(WorkerState::Claiming);
            let unit = match self.claim_next().await {
                Claim::Unit(unit) => unit,
                Claim::Drained => break StopReason::QueueDrained,
                Claim::Interrupted => break StopReason::Interrupted,
            };

            self.set_state(WorkerState::Processing);
            match self.process_unit(unit).await {
                None => {
                    self.stats.units_completed += 1;
                    self.current = None;
                    tracing::info!(
                        "Completed unit {} ({} unique, {} duplicates, {:.1}% recent dups)",
                        unit,
                        self.stats.unique,
                        self.stats.duplicates,
                        self.stats.dup_ratio() * 100.0
                    );
                }
                Some(reason) => {
                    tracing::info!("Stopping mid-unit {}: {}", unit, reason);
                    self.flush_buffer();
                    self.deps.source.release(unit).await;
                    self.current = None;
                    break reason;
                }
            }
        };

        self.flush_buffer();
        self.set_state(match reason {
            StopReason::QueueDrained => WorkerState::Drained,
            _ => WorkerState::Aborted,
        });
        self.heartbeat().await;

        tracing::info!(
            "Worker {} finished: {} ({} unique in {:.1}s)",
            self.settings.node_id,
            reason,
            self.stats.unique,
            self.stats.elapsed().as_secs_f64()
        );
        self.summary(reason)
    }

    /// Claims a unit; a shared source gets one delayed re-poll before draining
    async fn claim_next(&mut self) -> Claim {
        if let Some(unit) = self.deps.source.claim().await {
            return Claim::Unit(unit);
        }
        if !self.deps.source.is_shared() {
            return Claim::Drained;
        }

        tracing::info!(
            "Queue empty, re-polling in {}s",
            self.settings.empty_queue_wait.as_secs()
        );
        self.heartbeat().await;

        let shutdown = self.shutdown.clone();
        tokio::select! {
            _ = shutdown.cancelled() => return Claim::Interrupted,
            _ = tokio::time::sleep(self.settings.empty_queue_wait) => {}
        }

        match self.deps.source.claim().await {
            Some(unit) => Claim::Unit(unit),
            None => Claim::Drained,
        }
    }

    /// Processes one unit in controller-sized rounds
    ///
    /// Returns the reason processing stopped early, or `None` once every ID
    /// in the unit has been attempted.
    async fn process_unit(&mut self, unit: WorkUnit) -> Option<StopReason> {
        self.current = Some(unit);
        tracing::debug!("Processing unit {} ({} ids)", unit, unit.len());

        let mut ids = unit.ids();
        loop {
            let round: Vec<u64> = ids.by_ref().take(self.controller.batch_size()).collect();
            if round.is_empty() {
                return None;
            }

            // Only a unit with IDs left to fetch is incomplete.
            if let Some(reason) = self.stop_signal() {
                return Some(reason);
            }

            if !self.run_round(&round).await {
                return Some(StopReason::Interrupted);
            }
            self.after_round().await;
        }
    }

    /// Fetches one round concurrently; false if interrupted before it finished
    async fn run_round(&mut self, round: &[u64]) -> bool {
        let mut pending = FuturesUnordered::new();
        for &id in round {
            let fetcher = Arc::clone(&self.deps.fetcher);
            pending.push(async move {
                let started = Instant::now();
                let outcome = fetcher.fetch(id).await;
                (id, outcome, started.elapsed())
            });
        }

        let shutdown = self.shutdown.clone();
        loop {
            if pending.is_empty() {
                return true;
            }
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::debug!("Interrupted with {} fetches in flight", pending.len());
                    return false;
                }
                next = pending.next() => match next {
                    Some((id, outcome, latency)) => self.handle_outcome(id, outcome, latency).await,
                    None => return true,
                },
            }
        }
    }

    async fn handle_outcome(&mut self, id: u64, outcome: FetchOutcome, latency: Duration) {
        match outcome {
            FetchOutcome::Found(payload) => {
                self.controller.record_success(latency);
                let identifier = self.deps.transform.identifier(id, &payload);
                if self.deps.dedup.mark(&identifier).await {
                    self.persistence
                        .push(self.deps.transform.transform(id, &payload));
                    self.stats.record_found(false);
                } else {
                    tracing::trace!("Duplicate record {} (id {})", identifier, id);
                    self.stats.record_found(true);
                }
            }
            FetchOutcome::Missing => {
                self.controller.record_success(latency);
                self.stats.record_miss();
            }
            FetchOutcome::Failed(error) => {
                self.controller.record_error(latency);
                self.stats.record_error();
                tracing::trace!("Skipping id {}: {}", id, error);
            }
        }
    }

    async fn after_round(&mut self) {
        let batch = self.controller.adjust();
        tracing::debug!(
            "Round done: batch={}, avg latency={:?}, error rate={:.2}",
            batch,
            self.controller.average_latency(),
            self.controller.error_rate()
        );

        self.heartbeat().await;

        if self.persistence.buffered() >= self.settings.save_interval {
            self.set_state(WorkerState::Saving);
            self.flush_buffer();
            self.set_state(WorkerState::Processing);
        }
    }

    /// Checks the interrupt and both auto-stop signals
    fn stop_signal(&self) -> Option<StopReason> {
        if self.shutdown.is_cancelled() {
            return Some(StopReason::Interrupted);
        }
        if let Some(target) = self.settings.target_unique {
            if self.stats.unique >= target {
                return Some(StopReason::TargetReached);
            }
        }
        if let Some(max_ratio) = self.settings.max_duplicate_ratio {
            if self.stats.window_full() && self.stats.dup_ratio() >= max_ratio {
                return Some(StopReason::DuplicateSaturation);
            }
        }
        None
    }

    fn flush_buffer(&mut self) {
        let buffered = self.persistence.buffered();
        match self.persistence.flush() {
            Ok(written) if written > 0 => {
                tracing::info!("Saved {} records ({} total)", written, self.persistence.flushed())
            }
            Ok(_) => {}
            Err(e) => tracing::error!(
                "Failed to save {} buffered records, will retry: {}",
                buffered,
                e
            ),
        }
    }

    async fn heartbeat(&self) {
        if let Some(registry) = &self.deps.registry {
            let status = self.stats.to_status(
                &self.settings.node_id,
                self.controller.batch_size(),
                self.current,
            );
            registry.heartbeat(&status).await;
        }
    }

    fn set_state(&mut self, state: WorkerState) {
        if self.state != state {
            tracing::trace!("Worker state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn summary(&self, reason: StopReason) -> CrawlSummary {
        CrawlSummary {
            node_id: self.settings.node_id.clone(),
            reason,
            final_state: self.state,
            units_completed: self.stats.units_completed,
            requests: self.stats.requests,
            errors: self.stats.errors,
            misses: self.stats.misses,
            duplicates: self.stats.duplicates,
            unique: self.stats.unique,
            flushed: self.persistence.flushed(),
            unflushed: self.persistence.buffered(),
            batch_size: self.controller.batch_size(),
            elapsed: self.stats.elapsed(),
        }
    }
}
