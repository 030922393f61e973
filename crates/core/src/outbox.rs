//! Best-effort identity notifications.
//!
//! A notification is attempted inline once. On failure it is retried in the
//! background with exponential backoff and finally parked as a dead letter.
//! The operation that produced it never sees the failure.
//!
//! Notifications about the same (subject, poll) pair are applied in the order
//! they were produced. While one is still being retried, later ones wait
//! behind it instead of being delivered inline, so a `RemovePoll` can never be
//! overtaken by the retry of the `AddPoll` it follows.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ballotbox_common::IdGenerator;
use tracing::{debug, error, info, warn};

use crate::retry::{DeadLetterEntry, RetryConfig};
use crate::services::SharedIdentityGateway;

/// Dead letters kept for inspection. The oldest is dropped beyond this.
pub const MAX_DEAD_LETTERS: usize = 1024;

/// Bookkeeping sent from a poll to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The identity created the poll.
    AddPoll {
        /// Owner subject.
        subject: String,
        /// Poll id.
        poll_id: String,
    },
    /// The poll was deleted.
    RemovePoll {
        /// Owner subject.
        subject: String,
        /// Poll id.
        poll_id: String,
    },
    /// Release a vote claim whose counter write did not land.
    RemoveVote {
        /// Voter subject.
        subject: String,
        /// Poll id.
        poll_id: String,
    },
}

impl Notification {
    /// Subject of the identity this notification targets.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::AddPoll { subject, .. }
            | Self::RemovePoll { subject, .. }
            | Self::RemoveVote { subject, .. } => subject,
        }
    }

    /// Poll the notification is about.
    #[must_use]
    pub fn poll_id(&self) -> &str {
        match self {
            Self::AddPoll { poll_id, .. }
            | Self::RemovePoll { poll_id, .. }
            | Self::RemoveVote { poll_id, .. } => poll_id,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AddPoll { .. } => "add-poll",
            Self::RemovePoll { .. } => "remove-poll",
            Self::RemoveVote { .. } => "remove-vote",
        }
    }

    fn lane(&self) -> Lane {
        (self.subject().to_string(), self.poll_id().to_string())
    }
}

/// Ordering key: (subject, poll id).
type Lane = (String, String);

/// A notification waiting for its turn, with the attempts already spent on it.
struct Pending {
    notification: Notification,
    delivery_id: String,
    attempts: u32,
    last_error: String,
}

/// Delivers notifications with retry.
#[derive(Clone)]
pub struct Outbox {
    gateway: SharedIdentityGateway,
    retry: RetryConfig,
    // A lane present in the map has a delivery in flight; its queue holds
    // the notifications that arrived meanwhile.
    lanes: Arc<Mutex<HashMap<Lane, VecDeque<Pending>>>>,
    dead_letters: Arc<Mutex<VecDeque<DeadLetterEntry<Notification>>>>,
    id_gen: IdGenerator,
}

impl Outbox {
    /// Create an outbox delivering through `gateway`.
    #[must_use]
    pub fn new(gateway: SharedIdentityGateway, retry: RetryConfig) -> Self {
        Self {
            gateway,
            retry,
            lanes: Arc::new(Mutex::new(HashMap::new())),
            dead_letters: Arc::new(Mutex::new(VecDeque::new())),
            id_gen: IdGenerator::new(),
        }
    }

    /// Deliver a notification, falling back to background retries.
    ///
    /// Returns once the inline attempt finished, or immediately when an
    /// earlier notification for the same pair is still pending.
    pub async fn deliver(&self, notification: Notification) {
        let delivery_id = self.id_gen.generate_uuid_v4();
        let lane = notification.lane();

        {
            let mut lanes = self.lock_lanes();
            if let Some(queue) = lanes.get_mut(&lane) {
                debug!(
                    delivery_id = %delivery_id,
                    kind = notification.kind(),
                    subject = %notification.subject(),
                    queued = queue.len() + 1,
                    "Notification queued behind pending delivery"
                );
                queue.push_back(Pending {
                    notification,
                    delivery_id,
                    attempts: 0,
                    last_error: String::new(),
                });
                return;
            }
            lanes.insert(lane.clone(), VecDeque::new());
        }

        let result = self.gateway.apply(&notification).await;

        let mut lanes = self.lock_lanes();
        match result {
            Ok(()) => {
                debug!(
                    delivery_id = %delivery_id,
                    kind = notification.kind(),
                    subject = %notification.subject(),
                    "Notification delivered"
                );
                if lanes.get(&lane).is_none_or(VecDeque::is_empty) {
                    lanes.remove(&lane);
                    return;
                }
            }
            Err(e) => {
                warn!(
                    delivery_id = %delivery_id,
                    kind = notification.kind(),
                    subject = %notification.subject(),
                    error = %e,
                    "Notification failed, scheduling retry"
                );
                lanes.entry(lane.clone()).or_default().push_front(Pending {
                    notification,
                    delivery_id,
                    attempts: 1,
                    last_error: e.to_string(),
                });
            }
        }
        drop(lanes);

        let outbox = self.clone();
        tokio::spawn(async move { outbox.drain_lane(lane).await });
    }

    /// Notifications that exhausted their retries, oldest first.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetterEntry<Notification>> {
        self.lock_dead_letters().iter().cloned().collect()
    }

    /// Take every parked dead letter, leaving the queue empty.
    pub fn drain_dead_letters(&self) -> Vec<DeadLetterEntry<Notification>> {
        self.lock_dead_letters().drain(..).collect()
    }

    /// Number of (subject, poll) pairs with a delivery still in flight.
    #[must_use]
    pub fn pending_lanes(&self) -> usize {
        self.lock_lanes().len()
    }

    async fn drain_lane(&self, lane: Lane) {
        loop {
            let next = {
                let mut lanes = self.lock_lanes();
                match lanes.get_mut(&lane).and_then(VecDeque::pop_front) {
                    Some(pending) => pending,
                    None => {
                        lanes.remove(&lane);
                        return;
                    }
                }
            };
            self.deliver_with_retry(next).await;
        }
    }

    async fn deliver_with_retry(&self, pending: Pending) {
        let Pending {
            notification,
            delivery_id,
            mut attempts,
            mut last_error,
        } = pending;

        loop {
            if attempts > 0 {
                let retry = attempts - 1;
                if !self.retry.should_retry(retry) {
                    self.park(notification, &delivery_id, attempts, last_error);
                    return;
                }
                tokio::time::sleep(self.retry.delay_for_attempt(retry)).await;
            }

            match self.gateway.apply(&notification).await {
                Ok(()) => {
                    if attempts > 0 {
                        info!(
                            delivery_id = %delivery_id,
                            kind = notification.kind(),
                            retries = attempts,
                            "Notification delivered after retry"
                        );
                    }
                    return;
                }
                Err(e) => {
                    debug!(delivery_id = %delivery_id, error = %e, "Notification retry failed");
                    attempts += 1;
                    last_error = e.to_string();
                }
            }
        }
    }

    fn park(&self, notification: Notification, delivery_id: &str, attempts: u32, error: String) {
        error!(
            delivery_id = %delivery_id,
            kind = notification.kind(),
            subject = %notification.subject(),
            attempts,
            error = %error,
            "Notification dead-lettered"
        );
        let mut dead_letters = self.lock_dead_letters();
        if dead_letters.len() >= MAX_DEAD_LETTERS {
            dead_letters.pop_front();
        }
        dead_letters.push_back(DeadLetterEntry::new(notification, attempts, error));
    }

    fn lock_lanes(&self) -> MutexGuard<'_, HashMap<Lane, VecDeque<Pending>>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dead_letters(&self) -> MutexGuard<'_, VecDeque<DeadLetterEntry<Notification>>> {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actors::VoteClaim;
    use crate::services::IdentityGateway;
    use async_trait::async_trait;
    use ballotbox_common::{AppError, AppResult};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` deliveries, then records what it applies.
    struct FlakyGateway {
        failures: u32,
        calls: AtomicU32,
        applied: Mutex<Vec<Notification>>,
    }

    impl FlakyGateway {
        fn failing(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                applied: Mutex::new(Vec::new()),
            })
        }

        fn applied(&self) -> Vec<Notification> {
            self.applied.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityGateway for FlakyGateway {
        async fn claim_vote(&self, _: &str, _: &str, _: u32) -> AppResult<VoteClaim> {
            Ok(VoteClaim::Admitted)
        }

        async fn apply(&self, notification: &Notification) -> AppResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(AppError::Storage("identity store down".to_string()));
            }
            self.applied.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn add(poll_id: &str) -> Notification {
        Notification::AddPoll {
            subject: "u1".to_string(),
            poll_id: poll_id.to_string(),
        }
    }

    fn remove(poll_id: &str) -> Notification {
        Notification::RemovePoll {
            subject: "u1".to_string(),
            poll_id: poll_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let gateway = FlakyGateway::failing(2);
        let outbox = Outbox::new(gateway.clone(), fast_retry(5));

        outbox.deliver(add("p1")).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
        assert_eq!(gateway.applied(), vec![add("p1")]);
        assert!(outbox.dead_letters().is_empty());
        assert_eq!(outbox.pending_lanes(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_notification_is_dead_lettered() {
        let gateway = FlakyGateway::failing(u32::MAX);
        let outbox = Outbox::new(gateway.clone(), fast_retry(2));

        outbox.deliver(add("p1")).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let dead = outbox.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].payload, add("p1"));
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(dead[0].last_error, "Storage error: identity store down");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_removal_waits_for_pending_add() {
        let gateway = FlakyGateway::failing(1);
        let outbox = Outbox::new(gateway.clone(), fast_retry(5));

        outbox.deliver(add("p1")).await;
        outbox.deliver(remove("p1")).await;

        // The removal is held back while the add is still retrying.
        assert!(gateway.applied().is_empty());
        assert_eq!(outbox.pending_lanes(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(gateway.applied(), vec![add("p1"), remove("p1")]);
        assert_eq!(outbox.pending_lanes(), 0);
    }

    #[tokio::test]
    async fn test_removal_follows_dead_lettered_add() {
        let gateway = FlakyGateway::failing(3);
        let outbox = Outbox::new(gateway.clone(), fast_retry(2));

        outbox.deliver(add("p1")).await;
        outbox.deliver(remove("p1")).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(gateway.applied(), vec![remove("p1")]);
        let dead = outbox.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].payload, add("p1"));
    }

    #[tokio::test]
    async fn test_other_polls_are_not_held_back() {
        let gateway = FlakyGateway::failing(1);
        let outbox = Outbox::new(gateway.clone(), fast_retry(5));

        outbox.deliver(add("p1")).await;
        outbox.deliver(add("p2")).await;

        assert_eq!(gateway.applied(), vec![add("p2")]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(gateway.applied(), vec![add("p2"), add("p1")]);
    }

    #[tokio::test]
    async fn test_dead_letters_are_capped_and_drained() {
        let gateway = FlakyGateway::failing(u32::MAX);
        let outbox = Outbox::new(gateway, fast_retry(0));

        for i in 0..MAX_DEAD_LETTERS + 3 {
            outbox.deliver(add(&format!("p{i}"))).await;
            // Let the lane park its dead letter before the next one.
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        let dead = outbox.dead_letters();
        assert_eq!(dead.len(), MAX_DEAD_LETTERS);
        assert_eq!(dead[0].payload, add("p3"));
        assert_eq!(dead[0].attempts, 1);

        let drained = outbox.drain_dead_letters();
        assert_eq!(drained.len(), MAX_DEAD_LETTERS);
        assert!(outbox.dead_letters().is_empty());
    }
}
