//! Cancellable periodic task
//!
//! A [`PeriodicTask`] runs a [`PollJob`] on a fixed interval and publishes
//! every result through a watch channel. Cancelling the task (explicitly or by
//! dropping the handle) stops the schedule; a poll that is still in flight at
//! that moment is abandoned and its result is never published.

use crate::logging::get_logger;
use crate::source::SnapshotSource;
use crate::status::{LiveStatus, StatusInferencer};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Shortest schedule a task runs on; a zero period is raised to this
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Work performed on every tick
#[async_trait]
pub trait PollJob: Send + 'static {
    type Output: Clone + Send + Sync + 'static;

    async fn poll(&mut self) -> Self::Output;
}

/// Handle to a running periodic task
pub struct PeriodicTask<T> {
    cancel_tx: watch::Sender<bool>,
    results_rx: watch::Receiver<T>,
    handle: Option<JoinHandle<()>>,
}

impl<T> PeriodicTask<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn `job` on the current runtime.
    ///
    /// The first poll fires immediately, then every `period`. Ticks missed
    /// because a poll overran are delayed, not bunched up.
    pub fn spawn<J>(name: &str, mut job: J, period: Duration, initial: T) -> Self
    where
        J: PollJob<Output = T>,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (results_tx, results_rx) = watch::channel(initial);
        let logger = get_logger(name);
        if period < MIN_PERIOD {
            logger.warn(&format!("Period {:?} too short; using {:?}", period, MIN_PERIOD));
        }
        let period = period.max(MIN_PERIOD);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            logger.info(&format!("Periodic task started; period={:?}", period));

            loop {
                tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => break,
                    _ = ticker.tick() => {
                        let result = tokio::select! {
                            biased;
                            _ = cancel_rx.changed() => None,
                            out = job.poll() => Some(out),
                        };
                        // Cancelled mid-poll, or cancelled right as the poll finished
                        let Some(result) = result else { break };
                        if *cancel_rx.borrow() {
                            break;
                        }
                        if results_tx.send(result).is_err() {
                            logger.debug("No status subscribers left");
                        }
                    }
                }
            }

            logger.info("Periodic task stopped");
        });

        Self {
            cancel_tx,
            results_rx,
            handle: Some(handle),
        }
    }

    /// Receiver for the published results
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.results_rx.clone()
    }

    /// Latest published result
    pub fn current(&self) -> T {
        self.results_rx.borrow().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Stop the schedule. Idempotent.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// Cancel and wait for the loop to exit
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl<T> Drop for PeriodicTask<T> {
    fn drop(&mut self) {
        self.cancel_tx.send_replace(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Polls the live snapshot and folds each outcome into the published status
pub struct StatusJob {
    source: Arc<dyn SnapshotSource>,
    inferencer: StatusInferencer,
    last: LiveStatus,
}

impl StatusJob {
    pub fn new(source: Arc<dyn SnapshotSource>, inferencer: StatusInferencer) -> Self {
        Self {
            source,
            inferencer,
            last: LiveStatus::default(),
        }
    }
}

#[async_trait]
impl PollJob for StatusJob {
    type Output = LiveStatus;

    async fn poll(&mut self) -> LiveStatus {
        let fetched = self.source.fetch_snapshot().await;
        let next = self.inferencer.infer(&self.last, fetched, chrono::Utc::now());
        self.last = next.clone();
        next
    }
}

/// Start polling the live snapshot
pub fn spawn_status_poller(
    source: Arc<dyn SnapshotSource>,
    inferencer: StatusInferencer,
    period: Duration,
) -> PeriodicTask<LiveStatus> {
    PeriodicTask::spawn(
        "status_poller",
        StatusJob::new(source, inferencer),
        period,
        LiveStatus::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    #[async_trait]
    impl PollJob for Counter {
        type Output = u32;

        async fn poll(&mut self) -> u32 {
            self.0 += 1;
            self.0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_every_period() {
        let task = PeriodicTask::spawn("counter", Counter(0), Duration::from_secs(10), 0);
        let mut rx = task.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
        assert_eq!(task.current(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_publishing() {
        let task = PeriodicTask::spawn("counter", Counter(0), Duration::from_secs(10), 0);
        let mut rx = task.subscribe();
        rx.changed().await.unwrap();

        task.cancel();
        assert!(task.is_cancelled());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*rx.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_still_runs_on_the_minimum_schedule() {
        let task = PeriodicTask::spawn("counter", Counter(0), Duration::ZERO, 0);
        let mut rx = task.subscribe();

        rx.changed().await.unwrap();
        let first = *rx.borrow_and_update();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update() > first);

        task.shutdown().await;
    }
}
