//! Identity service: the client side of the identity actors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ballotbox_common::AppResult;
use ballotbox_db::{IdentityRecord, IdentityRepository, SharedStore};

use crate::actors::{ActorRegistry, IdentityActor, IdentityMessage, VoteClaim, VoteStatus};
use crate::outbox::Notification;

/// What a poll actor needs from identities.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Atomically check for a prior vote by `subject` and record this one.
    async fn claim_vote(
        &self,
        subject: &str,
        poll_id: &str,
        option_index: u32,
    ) -> AppResult<VoteClaim>;

    /// Apply a bookkeeping notification. Must be idempotent.
    async fn apply(&self, notification: &Notification) -> AppResult<()>;
}

/// Shared handle to an [`IdentityGateway`].
pub type SharedIdentityGateway = Arc<dyn IdentityGateway>;

/// Routes identity operations to the actor for each subject.
#[derive(Clone)]
pub struct IdentityService {
    registry: ActorRegistry<IdentityActor>,
}

impl IdentityService {
    /// Create a new identity service.
    #[must_use]
    pub fn new(store: SharedStore, idle_timeout: Duration) -> Self {
        let repo = IdentityRepository::new(store);
        let registry = ActorRegistry::new("identity", idle_timeout, move |subject| {
            IdentityActor::new(subject, repo.clone())
        });
        Self { registry }
    }

    /// Read an identity's record. Unknown subjects get an empty record.
    pub async fn get_state(&self, subject: &str) -> AppResult<IdentityRecord> {
        self.registry
            .ask(subject, |reply| IdentityMessage::GetState { reply })
            .await
    }

    /// Record that `subject` owns a poll. Idempotent.
    pub async fn add_poll(&self, subject: &str, poll_id: &str) -> AppResult<()> {
        let poll_id = poll_id.to_string();
        self.registry
            .ask(subject, |reply| IdentityMessage::AddPoll { poll_id, reply })
            .await
    }

    /// Forget a deleted poll. Idempotent.
    pub async fn remove_poll(&self, subject: &str, poll_id: &str) -> AppResult<()> {
        let poll_id = poll_id.to_string();
        self.registry
            .ask(subject, |reply| IdentityMessage::RemovePoll { poll_id, reply })
            .await
    }

    /// Record a vote, last writer wins.
    pub async fn add_vote(&self, subject: &str, poll_id: &str, option_index: u32) -> AppResult<()> {
        let poll_id = poll_id.to_string();
        self.registry
            .ask(subject, |reply| IdentityMessage::AddVote {
                poll_id,
                option_index,
                reply,
            })
            .await
    }

    /// Erase a vote entry. Idempotent.
    pub async fn remove_vote(&self, subject: &str, poll_id: &str) -> AppResult<()> {
        let poll_id = poll_id.to_string();
        self.registry
            .ask(subject, |reply| IdentityMessage::RemoveVote { poll_id, reply })
            .await
    }

    /// Whether `subject` has voted on a poll, and for what.
    pub async fn has_voted(&self, subject: &str, poll_id: &str) -> AppResult<VoteStatus> {
        let poll_id = poll_id.to_string();
        self.registry
            .ask(subject, |reply| IdentityMessage::HasVoted { poll_id, reply })
            .await
    }

    /// Number of live identity actors.
    #[must_use]
    pub fn active_actors(&self) -> usize {
        self.registry.active_count()
    }
}

#[async_trait]
impl IdentityGateway for IdentityService {
    async fn claim_vote(
        &self,
        subject: &str,
        poll_id: &str,
        option_index: u32,
    ) -> AppResult<VoteClaim> {
        let poll_id = poll_id.to_string();
        self.registry
            .ask(subject, |reply| IdentityMessage::ClaimVote {
                poll_id,
                option_index,
                reply,
            })
            .await
    }

    async fn apply(&self, notification: &Notification) -> AppResult<()> {
        match notification {
            Notification::AddPoll { subject, poll_id } => self.add_poll(subject, poll_id).await,
            Notification::RemovePoll { subject, poll_id } => {
                self.remove_poll(subject, poll_id).await
            }
            Notification::RemoveVote { subject, poll_id } => {
                self.remove_vote(subject, poll_id).await
            }
        }
    }
}
