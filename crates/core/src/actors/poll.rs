//! Poll actor: sole authority over one poll record.

use async_trait::async_trait;
use ballotbox_common::{AppError, AppResult};
use ballotbox_db::{PollRecord, PollRepository};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Actor, Reply, VoteClaim};
use crate::auth::{AuthClaim, authorize_owner, require_claim};
use crate::outbox::{Notification, Outbox};
use crate::services::SharedIdentityGateway;
use crate::validation::{
    CreatePollInput, UpdatePollInput, parse_option_index, validate_option_index,
};

/// Requests accepted by a [`PollActor`].
#[derive(Debug)]
pub enum PollMessage {
    /// Read the record.
    GetState {
        /// Reply channel.
        reply: Reply<PollRecord>,
    },
    /// Create or overwrite the record.
    Create {
        /// Caller, if authenticated.
        claim: Option<AuthClaim>,
        /// Submitted document.
        input: CreatePollInput,
        /// Reply channel.
        reply: Reply<PollRecord>,
    },
    /// Owner-only partial update.
    Update {
        /// Caller, if authenticated.
        claim: Option<AuthClaim>,
        /// Fields to change.
        patch: UpdatePollInput,
        /// Reply channel.
        reply: Reply<PollRecord>,
    },
    /// Owner-only delete.
    Delete {
        /// Caller, if authenticated.
        claim: Option<AuthClaim>,
        /// Reply channel.
        reply: Reply<()>,
    },
    /// Cast a vote.
    Vote {
        /// Caller, if authenticated.
        claim: Option<AuthClaim>,
        /// Submitted option index, unchecked.
        option_index: i64,
        /// Reply channel.
        reply: Reply<VoteOutcome>,
    },
}

/// A successful vote: the updated record plus the caller's choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    /// Record after the increment.
    #[serde(flatten)]
    pub poll: PollRecord,
    /// The option the caller voted for.
    pub user_vote: u32,
}

/// Serializes every operation on one poll.
///
/// Each handler loads the record from the store, so an actor that retired
/// and reactivated sees exactly what was persisted.
pub struct PollActor {
    poll_id: String,
    repo: PollRepository,
    identities: SharedIdentityGateway,
    outbox: Outbox,
}

impl PollActor {
    /// Create the actor for `poll_id`.
    #[must_use]
    pub fn new(
        poll_id: &str,
        repo: PollRepository,
        identities: SharedIdentityGateway,
        outbox: Outbox,
    ) -> Self {
        Self {
            poll_id: poll_id.to_string(),
            repo,
            identities,
            outbox,
        }
    }

    async fn load(&self) -> AppResult<PollRecord> {
        let mut poll = self.repo.get(&self.poll_id).await?;
        poll.align_votes();
        Ok(poll)
    }

    async fn create(
        &self,
        claim: Option<&AuthClaim>,
        input: CreatePollInput,
    ) -> AppResult<PollRecord> {
        let claim = require_claim(claim)?;
        input.check()?;
        if input.id != self.poll_id {
            return Err(AppError::Validation(format!(
                "Poll id {} does not match {}",
                input.id, self.poll_id
            )));
        }
        if input.owner_id != claim.subject {
            return Err(AppError::Forbidden(
                "ownerId must match the authenticated identity".to_string(),
            ));
        }

        let poll = input.into_record();
        self.repo.save(&poll).await?;
        info!(
            poll_id = %poll.id,
            owner_id = %poll.owner_id,
            options = poll.options.len(),
            "Poll created"
        );

        self.outbox
            .deliver(Notification::AddPoll {
                subject: poll.owner_id.clone(),
                poll_id: poll.id.clone(),
            })
            .await;

        Ok(poll)
    }

    async fn update(
        &self,
        claim: Option<&AuthClaim>,
        patch: UpdatePollInput,
    ) -> AppResult<PollRecord> {
        let claim = require_claim(claim)?;
        let mut poll = self.load().await?;
        authorize_owner(claim, &poll.owner_id)?;
        patch.check()?;

        patch.apply_to(&mut poll);
        self.repo.save(&poll).await?;
        debug!(poll_id = %poll.id, "Poll updated");

        Ok(poll)
    }

    async fn delete(&self, claim: Option<&AuthClaim>) -> AppResult<()> {
        let claim = require_claim(claim)?;
        let poll = self.load().await?;
        authorize_owner(claim, &poll.owner_id)?;

        self.repo.delete(&poll.id).await?;
        info!(poll_id = %poll.id, total_votes = poll.total_votes(), "Poll deleted");

        self.outbox
            .deliver(Notification::RemovePoll {
                subject: poll.owner_id,
                poll_id: poll.id,
            })
            .await;

        Ok(())
    }

    async fn vote(&self, claim: Option<&AuthClaim>, raw_index: i64) -> AppResult<VoteOutcome> {
        let claim = require_claim(claim)?;
        parse_option_index(raw_index)?;
        let mut poll = self.load().await?;
        let option_index = validate_option_index(raw_index, poll.options.len())?;

        // The identity is the gate: its check-and-record is one step on its own key.
        let verdict = self
            .identities
            .claim_vote(&claim.subject, &self.poll_id, option_index)
            .await?;
        if let VoteClaim::AlreadyVoted { option_index: prior } = verdict {
            debug!(poll_id = %self.poll_id, subject = %claim.subject, "Duplicate vote rejected");
            return Err(AppError::AlreadyVoted {
                poll_id: self.poll_id.clone(),
                option_index: prior,
            });
        }

        if let Some(count) = poll.votes.get_mut(option_index as usize) {
            *count = count.saturating_add(1);
        }
        if let Err(e) = self.repo.save(&poll).await {
            warn!(
                poll_id = %self.poll_id,
                subject = %claim.subject,
                error = %e,
                "Vote counter write failed, releasing vote claim"
            );
            self.outbox
                .deliver(Notification::RemoveVote {
                    subject: claim.subject.clone(),
                    poll_id: self.poll_id.clone(),
                })
                .await;
            return Err(e);
        }

        debug!(poll_id = %self.poll_id, option_index, "Vote counted");
        Ok(VoteOutcome {
            poll,
            user_vote: option_index,
        })
    }
}

#[async_trait]
impl Actor for PollActor {
    type Message = PollMessage;

    async fn handle(&mut self, message: PollMessage) {
        match message {
            PollMessage::GetState { reply } => {
                let _ = reply.send(self.load().await);
            }
            PollMessage::Create {
                claim,
                input,
                reply,
            } => {
                let _ = reply.send(self.create(claim.as_ref(), input).await);
            }
            PollMessage::Update {
                claim,
                patch,
                reply,
            } => {
                let _ = reply.send(self.update(claim.as_ref(), patch).await);
            }
            PollMessage::Delete { claim, reply } => {
                let _ = reply.send(self.delete(claim.as_ref()).await);
            }
            PollMessage::Vote {
                claim,
                option_index,
                reply,
            } => {
                let _ = reply.send(self.vote(claim.as_ref(), option_index).await);
            }
        }
    }
}
