use super::*;
use chrono::{DateTime, TimeZone, Utc};
use shared::domain::Role;
use shared::error::ErrorCode;
use storage::Storage;

use crate::{conferences, registrations};

async fn ctx() -> ApiContext {
    ApiContext::new(Storage::new("sqlite::memory:").await.expect("db"))
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, hour, 0, 0).unwrap()
}

async fn scheduled_conference(ctx: &ApiContext) -> ConferenceId {
    let presenter = ctx
        .storage
        .create_user("presenter", &[Role::Presenter])
        .await
        .expect("user");
    ctx.storage
        .create_user("mod", &[Role::Moderator])
        .await
        .expect("user");
    let conference = conferences::create_conference(ctx, "Rust Conf", "d", presenter.user_id)
        .await
        .expect("create");
    conferences::submit_for_validation(ctx, conference.conference_id)
        .await
        .expect("submit");
    conferences::schedule_conference(ctx, conference.conference_id, at(9))
        .await
        .expect("schedule");
    conference.conference_id
}

async fn attendee(ctx: &ApiContext, conference_id: ConferenceId, name: &str) -> RegistrationId {
    let user = ctx
        .storage
        .create_user(name, &[Role::Participant])
        .await
        .expect("user");
    let registration = registrations::register(ctx, user.user_id, conference_id)
        .await
        .expect("register")
        .expect("created");
    registrations::check_in(ctx, registration.registration_id, None)
        .await
        .expect("check in");
    registration.registration_id
}

#[tokio::test]
async fn rating_must_be_one_to_five() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    let registration_id = attendee(&ctx, conference_id, "ana").await;

    for rating in [0, 6, -1] {
        let err = submit_feedback(&ctx, registration_id, rating, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }
}

#[tokio::test]
async fn absentees_cannot_leave_feedback() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    let user = ctx
        .storage
        .create_user("ana", &[Role::Participant])
        .await
        .expect("user");
    let registration = registrations::register(&ctx, user.user_id, conference_id)
        .await
        .expect("register")
        .expect("created");

    assert!(
        submit_feedback(&ctx, registration.registration_id, 4, None, None)
            .await
            .expect("submit")
            .is_none()
    );
}

#[tokio::test]
async fn one_feedback_per_registration() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    let registration_id = attendee(&ctx, conference_id, "ana").await;

    let first = submit_feedback(&ctx, registration_id, 5, Some("great talks"), None)
        .await
        .expect("submit");
    assert!(first.is_some());
    let second = submit_feedback(&ctx, registration_id, 1, None, None)
        .await
        .expect("submit");
    assert!(second.is_none());

    let stored = feedback_for_registration(&ctx, registration_id)
        .await
        .expect("query")
        .expect("present");
    assert_eq!(stored.rating, 5);
}

#[tokio::test]
async fn stats_round_the_average_and_fill_all_buckets() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    for (name, rating) in [("ana", 5), ("ben", 5), ("cyd", 3)] {
        let registration_id = attendee(&ctx, conference_id, name).await;
        submit_feedback(&ctx, registration_id, rating, None, None)
            .await
            .expect("submit")
            .expect("created");
    }

    let stats = conference_stats(&ctx, conference_id).await.expect("stats");
    // 13 / 3 = 4.333..
    assert_eq!(stats.avg_rating, 4.3);
    assert_eq!(stats.count, 3);
    assert_eq!(stats.distribution.len(), 5);
    assert_eq!(stats.distribution[&5], 2);
    assert_eq!(stats.distribution[&3], 1);
    assert_eq!(stats.distribution[&1], 0);
}

#[tokio::test]
async fn empty_stats_are_zeroed() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    let stats = conference_stats(&ctx, conference_id).await.expect("stats");
    assert_eq!(stats.avg_rating, 0.0);
    assert_eq!(stats.count, 0);
    assert_eq!(stats.distribution.values().sum::<i64>(), 0);
}

#[tokio::test]
async fn latest_comments_skip_blank_ones_and_cap_at_limit() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    for (name, comment) in [
        ("ana", Some("loved it")),
        ("ben", None),
        ("cyd", Some("could be longer")),
    ] {
        let registration_id = attendee(&ctx, conference_id, name).await;
        submit_feedback(&ctx, registration_id, 4, comment, None)
            .await
            .expect("submit")
            .expect("created");
    }

    let comments = latest_comments(&ctx, conference_id, 10)
        .await
        .expect("comments");
    assert_eq!(comments.len(), 2);
    let capped = latest_comments(&ctx, conference_id, 1)
        .await
        .expect("comments");
    assert_eq!(capped.len(), 1);
}
