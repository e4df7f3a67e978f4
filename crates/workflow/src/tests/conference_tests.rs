use chrono::Utc;
use shared::domain::ConferenceStatus;

use super::*;
use crate::{BACK_TO_SUBMITTED, TO_ARCHIVED, TO_SCHEDULED, TO_VALIDATION};

fn facts(scheduled: bool) -> ConferenceFacts {
    ConferenceFacts {
        title: "Rust in Production".to_string(),
        scheduled_at: scheduled.then(Utc::now),
    }
}

#[test]
fn happy_path_reaches_archived() {
    let m = conference_machine();
    let f = facts(true);

    let s = m
        .apply(ConferenceStatus::Submitted, &f, TO_VALIDATION)
        .unwrap();
    assert_eq!(s, ConferenceStatus::UnderValidation);
    let s = m.apply(s, &f, TO_SCHEDULED).unwrap();
    assert_eq!(s, ConferenceStatus::Scheduled);
    let s = m.apply(s, &f, TO_ARCHIVED).unwrap();
    assert_eq!(s, ConferenceStatus::Archived);
}

#[test]
fn scheduling_requires_a_date() {
    let m = conference_machine();
    let f = facts(false);

    assert!(!m.can(ConferenceStatus::UnderValidation, &f, TO_SCHEDULED));
    let rejection = m
        .apply(ConferenceStatus::UnderValidation, &f, TO_SCHEDULED)
        .unwrap_err();
    assert_eq!(rejection.blockers[0].code, "no_date_set");
}

#[test]
fn rejection_returns_to_submitted() {
    let m = conference_machine();
    let f = facts(false);
    let s = m
        .apply(ConferenceStatus::UnderValidation, &f, BACK_TO_SUBMITTED)
        .unwrap();
    assert_eq!(s, ConferenceStatus::Submitted);
}

#[test]
fn no_way_back_from_scheduled() {
    let m = conference_machine();
    let f = facts(true);
    assert!(!m.can(ConferenceStatus::Scheduled, &f, BACK_TO_SUBMITTED));
    assert_eq!(m.enabled(ConferenceStatus::Scheduled, &f), vec![TO_ARCHIVED]);
    assert!(m.enabled(ConferenceStatus::Archived, &f).is_empty());
}

#[test]
fn validation_only_from_submitted() {
    let m = conference_machine();
    let f = facts(true);
    assert!(m.can(ConferenceStatus::Submitted, &f, TO_VALIDATION));
    assert!(!m.can(ConferenceStatus::Scheduled, &f, TO_VALIDATION));
    assert!(!m.can(ConferenceStatus::Archived, &f, TO_VALIDATION));
}
