//! Finite-state machines for the conference lifecycle.
//!
//! The engine is a plain transition table: (current state, transition name)
//! resolves to a target state plus guard and hook functions. Applying a
//! transition never mutates storage; callers persist the returned state and
//! run their own side effects afterwards.

mod conference;
mod machine;
mod moderation;

pub use conference::{
    conference_machine, ConferenceFacts, BACK_TO_SUBMITTED, TO_ARCHIVED, TO_SCHEDULED,
    TO_VALIDATION,
};
pub use machine::{Blocker, Guard, Hook, Machine, Rejection, TransitionDef};
pub use moderation::{moderation_machine, ModerationFacts, ACCEPT, REJECT};
