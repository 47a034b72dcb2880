//! Periodic retry sweep over due delivery-log entries.
//!
//! Runs as an independent timer-driven task, never request-driven. Each
//! sweep queries the log store for due failures, claims them one at a
//! time, and re-enters the dispatcher. Claims are atomic at the store
//! level, so overlapping sweeps skip each other's work; deliveries run
//! concurrently up to a small bound with an inter-item stagger to avoid
//! bursting a recovering destination.

use std::{sync::Arc, time::Duration};

use hookline_core::Clock;
use tokio::{
    sync::{RwLock, Semaphore},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    dispatcher::{DispatchOutcome, Dispatcher},
    error::{DeliveryError, Result},
    store::DeliveryLogStore,
};

/// Configuration for the retry scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the sweep runs.
    pub sweep_interval: Duration,

    /// Maximum due entries processed per sweep.
    pub batch_size: usize,

    /// Maximum concurrent retry deliveries.
    pub max_concurrent: usize,

    /// Pause between starting consecutive retries within one sweep.
    pub inter_item_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            batch_size: 50,
            max_concurrent: crate::DEFAULT_MAX_CONCURRENT,
            inter_item_delay: Duration::from_secs(1),
        }
    }
}

/// Counters for scheduler monitoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    /// Sweeps executed since startup.
    pub sweeps: u64,
    /// Retry deliveries attempted.
    pub retries_attempted: u64,
    /// Retries that ended in delivery.
    pub retries_delivered: u64,
    /// Retries that failed and were rescheduled.
    pub retries_rescheduled: u64,
    /// Retries that exhausted the attempt cap.
    pub retries_exhausted: u64,
}

/// Timer-driven retry scheduler.
pub struct RetryScheduler {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn DeliveryLogStore>,
    config: SchedulerConfig,
    stats: Arc<RwLock<SchedulerStats>>,
    clock: Arc<dyn Clock>,
    cancellation_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RetryScheduler {
    /// Creates a scheduler over the given dispatcher and log store.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn DeliveryLogStore>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dispatcher,
            store,
            config,
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            clock,
            cancellation_token: CancellationToken::new(),
            task: None,
        }
    }

    /// Starts the periodic sweep task.
    ///
    /// Returns immediately; use [`RetryScheduler::shutdown`] to stop
    /// gracefully.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            max_concurrent = self.config.max_concurrent,
            "starting retry scheduler"
        );

        let dispatcher = Arc::clone(&self.dispatcher);
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let stats = Arc::clone(&self.stats);
        let clock = Arc::clone(&self.clock);
        let token = self.cancellation_token.clone();

        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(config.sweep_interval) => {
                        if let Err(e) =
                            Self::sweep(&dispatcher, &store, &config, &stats, &clock, &token).await
                        {
                            error!(error = %e, "retry sweep failed");
                        }
                    }
                    () = token.cancelled() => break,
                }
            }
            info!("retry scheduler stopped");
        }));
    }

    /// Runs a single sweep immediately, returning the number of entries
    /// claimed and processed.
    ///
    /// # Errors
    ///
    /// Returns an error when the log store fails; individual retry failures
    /// are absorbed into the delivery log as usual.
    pub async fn sweep_once(&self) -> Result<usize> {
        Self::sweep(
            &self.dispatcher,
            &self.store,
            &self.config,
            &self.stats,
            &self.clock,
            &self.cancellation_token,
        )
        .await
    }

    /// Returns a snapshot of the scheduler counters.
    pub async fn stats(&self) -> SchedulerStats {
        *self.stats.read().await
    }

    /// Gracefully stops the sweep task.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweep task panicked.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutting down retry scheduler");
        self.cancellation_token.cancel();
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| DeliveryError::internal(format!("scheduler task failed: {e}")))?;
        }
        Ok(())
    }

    async fn sweep(
        dispatcher: &Arc<Dispatcher>,
        store: &Arc<dyn DeliveryLogStore>,
        config: &SchedulerConfig,
        stats: &Arc<RwLock<SchedulerStats>>,
        clock: &Arc<dyn Clock>,
        token: &CancellationToken,
    ) -> Result<usize> {
        let now = clock.now_utc();
        let due = store.find_due_retries(now, config.batch_size).await?;
        stats.write().await.sweeps += 1;

        if due.is_empty() {
            return Ok(0);
        }
        debug!(due = due.len(), "processing due retries");

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let mut handles = Vec::new();

        for (index, entry) in due.into_iter().enumerate() {
            if token.is_cancelled() {
                break;
            }
            if index > 0 && !config.inter_item_delay.is_zero() {
                clock.sleep(config.inter_item_delay).await;
            }

            // The claim is the concurrency guard: an entry another sweep
            // already flipped to Retrying comes back as None.
            let Some(claimed) = store.claim_for_retry(entry.id, now).await? else {
                continue;
            };

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| DeliveryError::internal("retry semaphore closed"))?;
            let dispatcher = Arc::clone(dispatcher);
            let stats = Arc::clone(stats);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = dispatcher.retry(&claimed).await;

                let mut stats = stats.write().await;
                stats.retries_attempted += 1;
                match outcome {
                    Ok(DispatchOutcome::Delivered { .. }) => stats.retries_delivered += 1,
                    Ok(DispatchOutcome::FailedScheduled { .. }) => stats.retries_rescheduled += 1,
                    Ok(DispatchOutcome::FailedPermanent { .. }) => stats.retries_exhausted += 1,
                    Ok(DispatchOutcome::NotSubscribed) => {},
                    Err(e) => error!(delivery_id = %claimed.id, error = %e, "retry failed"),
                }
            }));
        }

        let processed = handles.len();
        for handle in handles {
            let _ = handle.await;
        }

        Ok(processed)
    }
}
