use chrono::{DateTime, Utc};
use shared::domain::ConferenceStatus;
use tracing::info;

use crate::machine::{Blocker, Machine, TransitionDef};

pub const TO_VALIDATION: &str = "to_validation";
pub const TO_SCHEDULED: &str = "to_scheduled";
pub const TO_ARCHIVED: &str = "to_archived";
pub const BACK_TO_SUBMITTED: &str = "back_to_submitted";

/// Snapshot of the conference fields the machine inspects.
#[derive(Debug, Clone)]
pub struct ConferenceFacts {
    pub title: String,
    pub scheduled_at: Option<DateTime<Utc>>,
}

fn no_date_set(facts: &ConferenceFacts) -> Option<Blocker> {
    if facts.scheduled_at.is_none() {
        Some(Blocker {
            code: "no_date_set",
            message: "cannot schedule a conference without a date",
        })
    } else {
        None
    }
}

fn log_to_validation(facts: &ConferenceFacts) {
    info!(title = %facts.title, "conference entered validation");
}

fn log_to_scheduled(facts: &ConferenceFacts) {
    info!(title = %facts.title, "conference scheduled");
}

fn log_to_archived(facts: &ConferenceFacts) {
    info!(title = %facts.title, "conference archived");
}

fn log_back_to_submitted(facts: &ConferenceFacts) {
    info!(title = %facts.title, "conference sent back to submitted");
}

/// submitted -> under_validation -> scheduled -> archived, with
/// under_validation -> submitted on rejection. There is no way back out of
/// scheduled or archived.
pub fn conference_machine() -> Machine<ConferenceStatus, ConferenceFacts> {
    Machine::new(vec![
        TransitionDef {
            name: TO_VALIDATION,
            from: ConferenceStatus::Submitted,
            to: ConferenceStatus::UnderValidation,
            guards: vec![],
            hooks: vec![log_to_validation],
        },
        TransitionDef {
            name: TO_SCHEDULED,
            from: ConferenceStatus::UnderValidation,
            to: ConferenceStatus::Scheduled,
            guards: vec![no_date_set],
            hooks: vec![log_to_scheduled],
        },
        TransitionDef {
            name: TO_ARCHIVED,
            from: ConferenceStatus::Scheduled,
            to: ConferenceStatus::Archived,
            guards: vec![],
            hooks: vec![log_to_archived],
        },
        TransitionDef {
            name: BACK_TO_SUBMITTED,
            from: ConferenceStatus::UnderValidation,
            to: ConferenceStatus::Submitted,
            guards: vec![],
            hooks: vec![log_back_to_submitted],
        },
    ])
}

#[cfg(test)]
#[path = "tests/conference_tests.rs"]
mod tests;
