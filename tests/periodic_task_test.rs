use async_trait::async_trait;
use chargeapt::error::{ChargeError, Result};
use chargeapt::poller::{PeriodicTask, PollJob, spawn_status_poller};
use chargeapt::source::SnapshotSource;
use chargeapt::status::{LiveSnapshot, StationStatus, StatusInferencer};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Takes five seconds per poll and counts completed polls
struct SlowJob {
    completed: Arc<AtomicUsize>,
}

#[async_trait]
impl PollJob for SlowJob {
    type Output = usize;

    async fn poll(&mut self) -> usize {
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[tokio::test(start_paused = true)]
async fn poll_in_flight_at_cancel_is_discarded() {
    let completed = Arc::new(AtomicUsize::new(0));
    let task = PeriodicTask::spawn(
        "slow",
        SlowJob {
            completed: completed.clone(),
        },
        Duration::from_secs(10),
        0,
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    task.cancel();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(task.current(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_schedule() {
    let completed = Arc::new(AtomicUsize::new(0));
    let task = PeriodicTask::spawn(
        "slow",
        SlowJob {
            completed: completed.clone(),
        },
        Duration::from_secs(10),
        0,
    );
    let mut rx = task.subscribe();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), 1);

    drop(task);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

struct FlakySnapshots {
    calls: AtomicUsize,
}

#[async_trait]
impl SnapshotSource for FlakySnapshots {
    async fn fetch_snapshot(&self) -> Result<LiveSnapshot> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(serde_json::from_value(serde_json::json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "transactionId": 5,
                "data": {"Power.Active.Import": 11.0}
            }))?)
        } else {
            Err(ChargeError::network("station offline"))
        }
    }
}

#[tokio::test]
async fn status_poller_publishes_inferred_status() {
    let poller = spawn_status_poller(
        Arc::new(FlakySnapshots {
            calls: AtomicUsize::new(0),
        }),
        StatusInferencer::default(),
        Duration::from_millis(20),
    );
    let mut rx = poller.subscribe();

    rx.changed().await.unwrap();
    let first = rx.borrow_and_update().clone();
    assert_eq!(first.state, StationStatus::Charging);

    rx.changed().await.unwrap();
    let second = rx.borrow_and_update().clone();
    assert_eq!(second.state, StationStatus::Unknown);
    // Readings survive the failed poll
    assert_eq!(second.power_kw(), Some(11.0));
    assert_eq!(second.last_update, first.last_update);

    poller.shutdown().await;
}
