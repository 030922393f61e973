//! Identity actor: ownership ledger and double-vote guard for one subject.

use async_trait::async_trait;
use ballotbox_common::AppResult;
use ballotbox_db::{IdentityRecord, IdentityRepository};
use serde::Serialize;
use tracing::{debug, info};

use super::{Actor, Reply};

/// Requests accepted by an [`IdentityActor`].
#[derive(Debug)]
pub enum IdentityMessage {
    /// Read the record, defaults included.
    GetState {
        /// Reply channel.
        reply: Reply<IdentityRecord>,
    },
    /// Append a poll id to the owned list unless present.
    AddPoll {
        /// Poll id.
        poll_id: String,
        /// Reply channel.
        reply: Reply<()>,
    },
    /// Forget an owned poll and any vote entry for it.
    RemovePoll {
        /// Poll id.
        poll_id: String,
        /// Reply channel.
        reply: Reply<()>,
    },
    /// Record a vote, overwriting any prior entry.
    AddVote {
        /// Poll id.
        poll_id: String,
        /// Chosen option.
        option_index: u32,
        /// Reply channel.
        reply: Reply<()>,
    },
    /// Erase a vote entry.
    RemoveVote {
        /// Poll id.
        poll_id: String,
        /// Reply channel.
        reply: Reply<()>,
    },
    /// Look up the vote entry for a poll.
    HasVoted {
        /// Poll id.
        poll_id: String,
        /// Reply channel.
        reply: Reply<VoteStatus>,
    },
    /// Check for a prior vote and record this one in a single step.
    ClaimVote {
        /// Poll id.
        poll_id: String,
        /// Chosen option.
        option_index: u32,
        /// Reply channel.
        reply: Reply<VoteClaim>,
    },
}

/// Whether an identity has voted on a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    /// True when a vote entry exists.
    pub has_voted: bool,
    /// The recorded option, `null` when not voted.
    pub user_vote: Option<u32>,
}

/// Outcome of a vote claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteClaim {
    /// No prior vote; this one is now recorded.
    Admitted,
    /// A vote was already recorded; nothing changed.
    AlreadyVoted {
        /// The previously recorded option.
        option_index: u32,
    },
}

/// Serializes all reads and writes of one identity's record.
pub struct IdentityActor {
    subject: String,
    repo: IdentityRepository,
}

impl IdentityActor {
    /// Create the actor for `subject`.
    #[must_use]
    pub fn new(subject: &str, repo: IdentityRepository) -> Self {
        Self {
            subject: subject.to_string(),
            repo,
        }
    }

    async fn add_poll(&self, poll_id: &str) -> AppResult<()> {
        let mut identity = self.repo.load(&self.subject).await?;
        if identity.add_owned_poll(poll_id) {
            self.repo.save(&self.subject, &identity).await?;
            debug!(subject = %self.subject, poll_id = %poll_id, "Recorded owned poll");
        }
        Ok(())
    }

    async fn remove_poll(&self, poll_id: &str) -> AppResult<()> {
        let mut identity = self.repo.load(&self.subject).await?;
        let owned = identity.remove_owned_poll(poll_id);
        let voted = identity.remove_vote(poll_id).is_some();
        if owned || voted {
            self.repo.save(&self.subject, &identity).await?;
            info!(
                subject = %self.subject,
                poll_id = %poll_id,
                "Removed deleted poll from identity"
            );
        }
        Ok(())
    }

    async fn add_vote(&self, poll_id: &str, option_index: u32) -> AppResult<()> {
        let mut identity = self.repo.load(&self.subject).await?;
        identity.record_vote(poll_id, option_index);
        self.repo.save(&self.subject, &identity).await
    }

    async fn remove_vote(&self, poll_id: &str) -> AppResult<()> {
        let mut identity = self.repo.load(&self.subject).await?;
        if identity.remove_vote(poll_id).is_some() {
            self.repo.save(&self.subject, &identity).await?;
            debug!(subject = %self.subject, poll_id = %poll_id, "Released vote entry");
        }
        Ok(())
    }

    async fn has_voted(&self, poll_id: &str) -> AppResult<VoteStatus> {
        let identity = self.repo.load(&self.subject).await?;
        let user_vote = identity.vote_for(poll_id);
        Ok(VoteStatus {
            has_voted: user_vote.is_some(),
            user_vote,
        })
    }

    async fn claim_vote(&self, poll_id: &str, option_index: u32) -> AppResult<VoteClaim> {
        let mut identity = self.repo.load(&self.subject).await?;
        if let Some(prior) = identity.vote_for(poll_id) {
            return Ok(VoteClaim::AlreadyVoted {
                option_index: prior,
            });
        }

        identity.record_vote(poll_id, option_index);
        self.repo.save(&self.subject, &identity).await?;
        Ok(VoteClaim::Admitted)
    }
}

#[async_trait]
impl Actor for IdentityActor {
    type Message = IdentityMessage;

    async fn handle(&mut self, message: IdentityMessage) {
        // A closed reply channel only means the caller stopped waiting.
        match message {
            IdentityMessage::GetState { reply } => {
                let _ = reply.send(self.repo.load(&self.subject).await);
            }
            IdentityMessage::AddPoll { poll_id, reply } => {
                let _ = reply.send(self.add_poll(&poll_id).await);
            }
            IdentityMessage::RemovePoll { poll_id, reply } => {
                let _ = reply.send(self.remove_poll(&poll_id).await);
            }
            IdentityMessage::AddVote {
                poll_id,
                option_index,
                reply,
            } => {
                let _ = reply.send(self.add_vote(&poll_id, option_index).await);
            }
            IdentityMessage::RemoveVote { poll_id, reply } => {
                let _ = reply.send(self.remove_vote(&poll_id).await);
            }
            IdentityMessage::HasVoted { poll_id, reply } => {
                let _ = reply.send(self.has_voted(&poll_id).await);
            }
            IdentityMessage::ClaimVote {
                poll_id,
                option_index,
                reply,
            } => {
                let _ = reply.send(self.claim_vote(&poll_id, option_index).await);
            }
        }
    }
}
