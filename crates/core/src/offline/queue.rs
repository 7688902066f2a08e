//! In-memory offline replay queue
//!
//! Requests that fail with a network error while the device is offline are
//! parked here as replay closures. When connectivity returns the queue is
//! drained in insertion order:
//!
//! - items older than the maximum queue age are dropped and reported as
//!   expired work;
//! - the remaining items are replayed one at a time; a successful replay
//!   removes the item, a failed one stays queued for the next drain.
//!
//! Drains are serialised so racing online notifications cannot replay the
//! same item twice. Enqueueing is never blocked by a drain; items added
//! mid-drain wait for the next one.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backstop_domain::{AppError, ClientEvent, DrainReport};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::events::EventBus;

/// Future produced by a replay closure.
pub type ReplayFuture = BoxFuture<'static, Result<(), AppError>>;

/// Reissues a queued request verbatim. Receives the drain's cancellation
/// token so in-flight replays stop on shutdown.
pub type ReplayFn = Arc<dyn Fn(CancellationToken) -> ReplayFuture + Send + Sync>;

/// A request waiting for connectivity.
#[derive(Clone)]
pub struct OfflineQueueItem {
    pub id: Uuid,
    pub enqueued_at: Instant,
    seq: u64,
    replay: ReplayFn,
}

impl fmt::Debug for OfflineQueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineQueueItem")
            .field("id", &self.id)
            .field("enqueued_at", &self.enqueued_at)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

struct QueueState {
    items: VecDeque<OfflineQueueItem>,
    next_seq: u64,
}

pub struct OfflineQueue {
    state: Mutex<QueueState>,
    drain_lock: tokio::sync::Mutex<()>,
    max_age: Duration,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl OfflineQueue {
    pub fn new(max_age: Duration, events: EventBus) -> Self {
        Self::with_clock(max_age, events, Arc::new(SystemClock))
    }

    pub fn with_clock(max_age: Duration, events: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(QueueState { items: VecDeque::new(), next_seq: 0 }),
            drain_lock: tokio::sync::Mutex::new(()),
            max_age,
            clock,
            events,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Append a replay closure for request `id`.
    ///
    /// The same id may be queued more than once; each entry is replayed.
    pub fn enqueue(&self, id: Uuid, replay: ReplayFn) {
        let enqueued_at = self.clock.now();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq = state.next_seq.wrapping_add(1);
        state.items.push_back(OfflineQueueItem { id, enqueued_at, seq, replay });
        debug!(request_id = %id, queued = state.items.len(), "Request queued for replay");
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Ids of queued requests in replay order.
    pub fn pending_ids(&self) -> Vec<Uuid> {
        self.state.lock().items.iter().map(|item| item.id).collect()
    }

    /// Drain the queue: expire stale items, then replay the rest in order.
    ///
    /// Replay failures are logged and leave the item queued; they are never
    /// propagated. Cancelling `cancel` stops the drain after the current
    /// item.
    #[instrument(skip_all)]
    pub async fn process_queue(&self, cancel: &CancellationToken) -> DrainReport {
        let _drain = self.drain_lock.lock().await;

        let expired = self.expire_stale();
        if expired > 0 {
            warn!(count = expired, max_age = ?self.max_age, "Queued work expired");
            self.events.emit(ClientEvent::WorkExpired { count: expired });
        }

        let snapshot: Vec<OfflineQueueItem> = self.state.lock().items.iter().cloned().collect();
        let mut report = DrainReport { expired, ..DrainReport::default() };

        for item in snapshot {
            if cancel.is_cancelled() {
                debug!("Offline queue drain cancelled");
                break;
            }

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(request_id = %item.id, "Replay interrupted by cancellation");
                    break;
                }
                outcome = (item.replay)(cancel.child_token()) => outcome,
            };

            match outcome {
                Ok(()) => {
                    self.remove(item.seq);
                    report.replayed += 1;
                    debug!(request_id = %item.id, "Queued request replayed");
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        request_id = %item.id,
                        kind = %error.kind,
                        error = %error.message,
                        "Queued request replay failed; keeping it for the next drain"
                    );
                }
            }
        }

        report.remaining = self.len();
        if !report.is_noop() {
            info!(
                replayed = report.replayed,
                failed = report.failed,
                expired = report.expired,
                remaining = report.remaining,
                "Offline queue drained"
            );
            self.events.emit(ClientEvent::QueueDrained { report });
        }
        report
    }

    /// Drops items whose age is strictly greater than the max age.
    fn expire_stale(&self) -> usize {
        let now = self.clock.now();
        let max_age = self.max_age;
        let mut state = self.state.lock();
        let before = state.items.len();
        state.items.retain(|item| now.saturating_duration_since(item.enqueued_at) <= max_age);
        before - state.items.len()
    }

    fn remove(&self, seq: u64) {
        let mut state = self.state.lock();
        if let Some(position) = state.items.iter().position(|item| item.seq == seq) {
            state.items.remove(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use backstop_domain::ErrorKind;
    use futures::FutureExt;

    use super::*;
    use crate::clock::MockClock;

    const HOUR: Duration = Duration::from_secs(3600);

    fn recording_replay(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> ReplayFn {
        Arc::new(move |_cancel: CancellationToken| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(name);
                Ok::<(), AppError>(())
            }
            .boxed()
        })
    }

    fn failing_replay(attempts: Arc<AtomicUsize>) -> ReplayFn {
        Arc::new(move |_cancel: CancellationToken| {
            let attempts = Arc::clone(&attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), AppError>(AppError::from_kind(ErrorKind::NetworkError))
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn replays_in_insertion_order() {
        let queue = OfflineQueue::new(HOUR, EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            queue.enqueue(Uuid::new_v4(), recording_replay(Arc::clone(&log), name));
        }

        let report = queue.process_queue(&CancellationToken::new()).await;

        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        assert_eq!(report, DrainReport { replayed: 3, failed: 0, expired: 0, remaining: 0 });
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn duplicate_enqueue_replays_both() {
        let queue = OfflineQueue::new(HOUR, EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = Uuid::new_v4();

        queue.enqueue(id, recording_replay(Arc::clone(&log), "a"));
        queue.enqueue(id, recording_replay(Arc::clone(&log), "a"));

        let report = queue.process_queue(&CancellationToken::new()).await;

        assert_eq!(log.lock().len(), 2);
        assert_eq!(report.replayed, 2);
    }

    #[tokio::test]
    async fn empty_drain_is_a_noop() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let queue = OfflineQueue::new(HOUR, events);

        let report = queue.process_queue(&CancellationToken::new()).await;

        assert!(report.is_noop());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_replay_stays_queued_without_immediate_retry() {
        let queue = OfflineQueue::new(HOUR, EventBus::new());
        let attempts = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));

        queue.enqueue(Uuid::new_v4(), failing_replay(Arc::clone(&attempts)));
        queue.enqueue(Uuid::new_v4(), recording_replay(Arc::clone(&log), "ok"));

        let report = queue.process_queue(&CancellationToken::new()).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(report, DrainReport { replayed: 1, failed: 1, expired: 0, remaining: 1 });
        assert_eq!(queue.len(), 1);

        queue.process_queue(&CancellationToken::new()).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn item_past_max_age_is_dropped_and_reported() {
        let clock = MockClock::new();
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let queue = OfflineQueue::with_clock(HOUR, events, Arc::new(clock.clone()));
        let log = Arc::new(Mutex::new(Vec::new()));

        queue.enqueue(Uuid::new_v4(), recording_replay(Arc::clone(&log), "stale"));
        clock.advance(HOUR + Duration::from_millis(1));

        let report = queue.process_queue(&CancellationToken::new()).await;

        assert!(log.lock().is_empty());
        assert_eq!(report.expired, 1);
        assert!(queue.is_empty());
        assert!(matches!(rx.try_recv().unwrap(), ClientEvent::WorkExpired { count: 1 }));
    }

    #[tokio::test]
    async fn item_just_under_max_age_is_replayed() {
        let clock = MockClock::new();
        let queue = OfflineQueue::with_clock(HOUR, EventBus::new(), Arc::new(clock.clone()));
        let log = Arc::new(Mutex::new(Vec::new()));

        queue.enqueue(Uuid::new_v4(), recording_replay(Arc::clone(&log), "fresh"));
        clock.advance(HOUR - Duration::from_millis(1));

        let report = queue.process_queue(&CancellationToken::new()).await;

        assert_eq!(*log.lock(), vec!["fresh"]);
        assert_eq!(report.expired, 0);
    }

    #[tokio::test]
    async fn expiry_only_drops_stale_items() {
        let clock = MockClock::new();
        let queue = OfflineQueue::with_clock(HOUR, EventBus::new(), Arc::new(clock.clone()));
        let log = Arc::new(Mutex::new(Vec::new()));

        queue.enqueue(Uuid::new_v4(), recording_replay(Arc::clone(&log), "old"));
        clock.advance(Duration::from_secs(1800));
        queue.enqueue(Uuid::new_v4(), recording_replay(Arc::clone(&log), "new"));
        clock.advance(Duration::from_secs(1801));

        let report = queue.process_queue(&CancellationToken::new()).await;

        assert_eq!(*log.lock(), vec!["new"]);
        assert_eq!(report.expired, 1);
        assert_eq!(report.replayed, 1);
    }

    #[tokio::test]
    async fn cancelled_drain_leaves_items_queued() {
        let queue = OfflineQueue::new(HOUR, EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.enqueue(Uuid::new_v4(), recording_replay(Arc::clone(&log), "kept"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = queue.process_queue(&cancel).await;

        assert!(log.lock().is_empty());
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn concurrent_drains_replay_each_item_once() {
        let queue = Arc::new(OfflineQueue::new(HOUR, EventBus::new()));
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["a", "b", "c"] {
            queue.enqueue(Uuid::new_v4(), recording_replay(Arc::clone(&log), name));
        }

        let cancel = CancellationToken::new();
        let (first, second) =
            tokio::join!(queue.process_queue(&cancel), queue.process_queue(&cancel));

        assert_eq!(first.replayed + second.replayed, 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }
}
