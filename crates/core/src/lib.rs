//! Core logic for ballotbox.
//!
//! Polls and identities are each owned by a per-key actor that processes its
//! requests one at a time. Poll actors gate votes on the voter's identity
//! actor and keep identities informed through a retrying [`Outbox`].

pub mod actors;
pub mod auth;
pub mod outbox;
pub mod retry;
pub mod services;
pub mod validation;

use std::sync::Arc;

use ballotbox_common::Config;
use ballotbox_db::SharedStore;

pub use actors::{VoteClaim, VoteOutcome, VoteStatus};
pub use auth::{AuthClaim, CredentialVerifier, JwtVerifier};
pub use outbox::{Notification, Outbox};
pub use retry::RetryConfig;
pub use services::{IdentityGateway, IdentityService, PollService, SharedIdentityGateway};
pub use validation::{CreatePollInput, UpdatePollInput};

/// The wired-up poll and identity services.
#[derive(Clone)]
pub struct ActorSystem {
    /// Poll client.
    pub polls: PollService,
    /// Identity client.
    pub identities: IdentityService,
    /// Notification outbox shared by all poll actors.
    pub outbox: Outbox,
}

impl ActorSystem {
    /// Build identities first, then the outbox, then polls on top of both.
    #[must_use]
    pub fn new(store: SharedStore, config: &Config) -> Self {
        let idle_timeout = config.actors.idle_timeout();
        let identities = IdentityService::new(store.clone(), idle_timeout);
        let gateway: SharedIdentityGateway = Arc::new(identities.clone());
        let outbox = Outbox::new(gateway.clone(), RetryConfig::from(&config.outbox));
        let polls = PollService::new(store, gateway, outbox.clone(), idle_timeout);

        Self {
            polls,
            identities,
            outbox,
        }
    }
}
