//! Typed repositories over the keyed store.

mod identity;
mod poll;

pub use identity::IdentityRepository;
pub use poll::PollRepository;
