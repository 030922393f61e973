//! Poll service: the client side of the poll actors.

use std::time::Duration;

use ballotbox_common::AppResult;
use ballotbox_db::{PollRecord, PollRepository, SharedStore};

use crate::actors::{ActorRegistry, PollActor, PollMessage, VoteOutcome};
use crate::auth::AuthClaim;
use crate::outbox::Outbox;
use crate::services::SharedIdentityGateway;
use crate::validation::{CreatePollInput, UpdatePollInput};

/// Routes poll operations to the actor for each poll id.
#[derive(Clone)]
pub struct PollService {
    registry: ActorRegistry<PollActor>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub fn new(
        store: SharedStore,
        identities: SharedIdentityGateway,
        outbox: Outbox,
        idle_timeout: Duration,
    ) -> Self {
        let repo = PollRepository::new(store);
        let registry = ActorRegistry::new("poll", idle_timeout, move |poll_id| {
            PollActor::new(poll_id, repo.clone(), identities.clone(), outbox.clone())
        });
        Self { registry }
    }

    /// Read a poll. No authentication required.
    pub async fn get_state(&self, poll_id: &str) -> AppResult<PollRecord> {
        self.registry
            .ask(poll_id, |reply| PollMessage::GetState { reply })
            .await
    }

    /// Create (or overwrite) a poll owned by the caller.
    pub async fn create(
        &self,
        poll_id: &str,
        claim: Option<AuthClaim>,
        input: CreatePollInput,
    ) -> AppResult<PollRecord> {
        self.registry
            .ask(poll_id, |reply| PollMessage::Create {
                claim,
                input,
                reply,
            })
            .await
    }

    /// Apply an owner's partial update.
    pub async fn update(
        &self,
        poll_id: &str,
        claim: Option<AuthClaim>,
        patch: UpdatePollInput,
    ) -> AppResult<PollRecord> {
        self.registry
            .ask(poll_id, |reply| PollMessage::Update {
                claim,
                patch,
                reply,
            })
            .await
    }

    /// Delete a poll on behalf of its owner.
    pub async fn delete(&self, poll_id: &str, claim: Option<AuthClaim>) -> AppResult<()> {
        self.registry
            .ask(poll_id, |reply| PollMessage::Delete { claim, reply })
            .await
    }

    /// Cast the caller's vote.
    pub async fn vote(
        &self,
        poll_id: &str,
        claim: Option<AuthClaim>,
        option_index: i64,
    ) -> AppResult<VoteOutcome> {
        self.registry
            .ask(poll_id, |reply| PollMessage::Vote {
                claim,
                option_index,
                reply,
            })
            .await
    }

    /// Number of live poll actors.
    #[must_use]
    pub fn active_actors(&self) -> usize {
        self.registry.active_count()
    }
}
