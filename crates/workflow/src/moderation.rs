use shared::domain::RequestStatus;
use tracing::info;

use crate::machine::{Machine, TransitionDef};

pub const ACCEPT: &str = "accept";
pub const REJECT: &str = "reject";

/// Snapshot of the moderation request fields the machine inspects.
#[derive(Debug, Clone)]
pub struct ModerationFacts {
    pub conference_title: String,
}

fn log_accepted(facts: &ModerationFacts) {
    info!(conference = %facts.conference_title, "moderation request accepted");
}

fn log_rejected(facts: &ModerationFacts) {
    info!(conference = %facts.conference_title, "moderation request rejected");
}

/// pending -> accepted or pending -> rejected. A resolved request is deleted
/// by the services rather than kept in a terminal state.
pub fn moderation_machine() -> Machine<RequestStatus, ModerationFacts> {
    Machine::new(vec![
        TransitionDef {
            name: ACCEPT,
            from: RequestStatus::Pending,
            to: RequestStatus::Accepted,
            guards: vec![],
            hooks: vec![log_accepted],
        },
        TransitionDef {
            name: REJECT,
            from: RequestStatus::Pending,
            to: RequestStatus::Rejected,
            guards: vec![],
            hooks: vec![log_rejected],
        },
    ])
}
