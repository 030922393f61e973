//! Persisted record shapes.

pub mod identity;
pub mod poll;

pub use identity::IdentityRecord;
pub use poll::PollRecord;
