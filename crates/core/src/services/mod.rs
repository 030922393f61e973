//! Cloneable clients for the poll and identity actors.

pub mod identity;
pub mod poll;

pub use identity::{IdentityGateway, IdentityService, SharedIdentityGateway};
pub use poll::PollService;
