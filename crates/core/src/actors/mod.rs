//! Per-key actors.
//!
//! Every key (a poll id or an identity subject) is served by at most one
//! live actor task. The task drains its mailbox strictly one message at a
//! time, so a handler's load-mutate-persist sequence cannot interleave with
//! another operation on the same key. Different keys run fully in parallel.
//!
//! Actors activate lazily on their first message and retire after an idle
//! period. Senders and the retiring task use the same registry lock, and a
//! task only retires after seeing an empty mailbox under that lock, so a
//! replacement actor for the key can never overlap with the old one.

pub mod identity;
pub mod poll;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ballotbox_common::{AppError, AppResult};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub use identity::{IdentityActor, IdentityMessage, VoteClaim, VoteStatus};
pub use poll::{PollActor, PollMessage, VoteOutcome};

/// Reply channel carried by request messages.
pub type Reply<T> = oneshot::Sender<AppResult<T>>;

/// A unit of state that handles its messages one at a time.
#[async_trait]
pub trait Actor: Send + 'static {
    /// Message type accepted by this actor.
    type Message: Send + 'static;

    /// Handle one message to completion.
    async fn handle(&mut self, message: Self::Message);
}

type Mailboxes<M> = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<M>>>>;
type Factory<A> = Arc<dyn Fn(&str) -> A + Send + Sync>;

fn lock<M>(mailboxes: &Mutex<HashMap<String, M>>) -> MutexGuard<'_, HashMap<String, M>> {
    mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes messages to the single live actor for each key.
pub struct ActorRegistry<A: Actor> {
    kind: &'static str,
    mailboxes: Mailboxes<A::Message>,
    factory: Factory<A>,
    idle_timeout: Duration,
}

impl<A: Actor> Clone for ActorRegistry<A> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            mailboxes: Arc::clone(&self.mailboxes),
            factory: Arc::clone(&self.factory),
            idle_timeout: self.idle_timeout,
        }
    }
}

impl<A: Actor> ActorRegistry<A> {
    /// Create a registry that builds actors with `factory` on first use.
    pub fn new<F>(kind: &'static str, idle_timeout: Duration, factory: F) -> Self
    where
        F: Fn(&str) -> A + Send + Sync + 'static,
    {
        Self {
            kind,
            mailboxes: Arc::new(Mutex::new(HashMap::new())),
            factory: Arc::new(factory),
            idle_timeout,
        }
    }

    /// Enqueue a message for the actor owning `key`, activating it if needed.
    pub fn send(&self, key: &str, message: A::Message) -> AppResult<()> {
        let mut mailboxes = lock(&self.mailboxes);

        let message = match mailboxes.get(key) {
            Some(sender) => match sender.send(message) {
                Ok(()) => return Ok(()),
                // The task ended without retiring (it panicked); replace it.
                Err(mpsc::error::SendError(message)) => {
                    warn!(kind = self.kind, key = %key, "Actor stopped unexpectedly, restarting");
                    message
                }
            },
            None => message,
        };

        let sender = self.activate(key);
        sender
            .send(message)
            .map_err(|_| AppError::Internal(format!("{} actor {key} failed to start", self.kind)))?;
        mailboxes.insert(key.to_string(), sender);
        Ok(())
    }

    /// Send a request and wait for the actor's reply.
    pub async fn ask<R, F>(&self, key: &str, build: F) -> AppResult<R>
    where
        F: FnOnce(Reply<R>) -> A::Message,
    {
        let (reply, response) = oneshot::channel();
        self.send(key, build(reply))?;
        response.await.map_err(|_| {
            AppError::Internal(format!("{} actor {key} dropped the request", self.kind))
        })?
    }

    /// Number of currently live actors.
    #[must_use]
    pub fn active_count(&self) -> usize {
        lock(&self.mailboxes).len()
    }

    fn activate(&self, key: &str) -> mpsc::UnboundedSender<A::Message> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = (self.factory)(key);
        debug!(kind = self.kind, key = %key, "Activating actor");

        tokio::spawn(run_actor(
            actor,
            receiver,
            key.to_string(),
            self.kind,
            Arc::clone(&self.mailboxes),
            self.idle_timeout,
        ));

        sender
    }
}

async fn run_actor<A: Actor>(
    mut actor: A,
    mut receiver: mpsc::UnboundedReceiver<A::Message>,
    key: String,
    kind: &'static str,
    mailboxes: Mailboxes<A::Message>,
    idle_timeout: Duration,
) {
    loop {
        let message = match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(_) => match retire_if_idle(&mailboxes, &key, &mut receiver) {
                Some(message) => message,
                None => {
                    debug!(kind = kind, key = %key, "Retiring idle actor");
                    break;
                }
            },
        };

        actor.handle(message).await;
    }
}

/// Remove this actor's mailbox unless a message slipped in before the lock.
fn retire_if_idle<M>(
    mailboxes: &Mutex<HashMap<String, mpsc::UnboundedSender<M>>>,
    key: &str,
    receiver: &mut mpsc::UnboundedReceiver<M>,
) -> Option<M> {
    let mut mailboxes = lock(mailboxes);
    match receiver.try_recv() {
        Ok(message) => Some(message),
        Err(_) => {
            mailboxes.remove(key);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Shared = Arc<tokio::sync::Mutex<HashMap<String, u64>>>;

    /// Increments a shared counter with a yield between read and write, so
    /// any interleaving on one key would lose updates.
    struct Counter {
        key: String,
        values: Shared,
    }

    enum CounterMessage {
        Increment { reply: Reply<u64> },
        Read { reply: Reply<u64> },
    }

    #[async_trait]
    impl Actor for Counter {
        type Message = CounterMessage;

        async fn handle(&mut self, message: CounterMessage) {
            match message {
                CounterMessage::Increment { reply } => {
                    let current = self.values.lock().await.get(&self.key).copied().unwrap_or(0);
                    tokio::task::yield_now().await;
                    self.values.lock().await.insert(self.key.clone(), current + 1);
                    let _ = reply.send(Ok(current + 1));
                }
                CounterMessage::Read { reply } => {
                    let value = self.values.lock().await.get(&self.key).copied().unwrap_or(0);
                    let _ = reply.send(Ok(value));
                }
            }
        }
    }

    fn registry(idle_timeout: Duration) -> (ActorRegistry<Counter>, Arc<AtomicUsize>) {
        let values: Shared = Arc::default();
        let activations = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&activations);
        let registry = ActorRegistry::new("counter", idle_timeout, move |key| {
            counted.fetch_add(1, Ordering::SeqCst);
            Counter {
                key: key.to_string(),
                values: Arc::clone(&values),
            }
        });
        (registry, activations)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_messages_are_serialized() {
        let (registry, _) = registry(Duration::from_secs(60));

        let tasks = (0..100).map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .ask("k", |reply| CounterMessage::Increment { reply })
                    .await
            })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let value = registry
            .ask("k", |reply| CounterMessage::Read { reply })
            .await
            .unwrap();
        assert_eq!(value, 100);
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_actors() {
        let (registry, activations) = registry(Duration::from_secs(60));

        registry
            .ask("a", |reply| CounterMessage::Increment { reply })
            .await
            .unwrap();
        registry
            .ask("b", |reply| CounterMessage::Increment { reply })
            .await
            .unwrap();
        registry
            .ask("a", |reply| CounterMessage::Increment { reply })
            .await
            .unwrap();

        assert_eq!(registry.active_count(), 2);
        assert_eq!(activations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_idle_actor_retires_and_reactivates() {
        let (registry, activations) = registry(Duration::from_millis(20));

        registry
            .ask("k", |reply| CounterMessage::Increment { reply })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(registry.active_count(), 0);

        let value = registry
            .ask("k", |reply| CounterMessage::Increment { reply })
            .await
            .unwrap();
        assert_eq!(value, 2);
        assert_eq!(activations.load(Ordering::SeqCst), 2);
    }
}
