use super::*;
use chrono::TimeZone;
use shared::domain::Role;
use shared::error::ErrorCode;
use storage::Storage;

use crate::conferences;

async fn ctx() -> ApiContext {
    ApiContext::new(Storage::new("sqlite::memory:").await.expect("db"))
}

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, hour, minute, 0).unwrap()
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
    assert!(conferences::submit_for_validation(ctx, conference.conference_id)
        .await
        .expect("submit"));
    assert!(
        conferences::schedule_conference(ctx, conference.conference_id, at(10, 9, 0))
            .await
            .expect("schedule")
    );
    conference.conference_id
}

#[tokio::test]
async fn validates_room_and_interval() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;

    let backwards = create_session(&ctx, conference_id, "Room A", at(10, 11, 0), at(10, 10, 0))
        .await
        .unwrap_err();
    assert_eq!(backwards.code, ErrorCode::Validation);

    let bad_room = create_session(&ctx, conference_id, "Broom Closet", at(10, 10, 0), at(10, 11, 0))
        .await
        .unwrap_err();
    assert_eq!(bad_room.code, ErrorCode::Validation);
}

#[tokio::test]
async fn refuses_sessions_outside_a_scheduled_conference() {
    let ctx = ctx().await;
    let presenter = ctx
        .storage
        .create_user("presenter", &[Role::Presenter])
        .await
        .expect("user");
    let conference = ctx
        .storage
        .create_conference("Rust Conf", "d", presenter.user_id, None)
        .await
        .expect("conference");

    let err = create_session(
        &ctx,
        conference.conference_id,
        "Room A",
        at(10, 10, 0),
        at(10, 11, 0),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn conflicting_slot_is_refused_touching_slot_is_not() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;

    let first = create_session(&ctx, conference_id, "Room A", at(10, 10, 0), at(10, 11, 0))
        .await
        .expect("create");
    assert!(first.is_some());

    let overlapping = create_session(&ctx, conference_id, "Room A", at(10, 10, 30), at(10, 11, 30))
        .await
        .expect("create");
    assert!(overlapping.is_none());

    let adjacent = create_session(&ctx, conference_id, "Room A", at(10, 11, 0), at(10, 12, 0))
        .await
        .expect("create");
    assert!(adjacent.is_some());

    let other_room = create_session(&ctx, conference_id, "Room B", at(10, 10, 30), at(10, 11, 30))
        .await
        .expect("create");
    assert!(other_room.is_some());
}

#[tokio::test]
async fn first_session_pins_an_undated_conference() {
    let ctx = ctx().await;
    let presenter = ctx
        .storage
        .create_user("presenter", &[Role::Presenter])
        .await
        .expect("user");
    let conference = ctx
        .storage
        .create_conference("Backfill Conf", "d", presenter.user_id, None)
        .await
        .expect("conference");
    ctx.storage
        .update_conference_status(conference.conference_id, ConferenceStatus::Scheduled)
        .await
        .expect("status");

    create_session(
        &ctx,
        conference.conference_id,
        "Room C",
        at(12, 9, 30),
        at(12, 10, 30),
    )
    .await
    .expect("create")
    .expect("free");
    let conference = conferences::find_conference(&ctx, conference.conference_id)
        .await
        .expect("find");
    assert_eq!(conference.scheduled_at, Some(at(12, 9, 30)));
}

#[tokio::test]
async fn update_ignores_the_sessions_own_slot() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    let session = create_session(&ctx, conference_id, "Room A", at(10, 10, 0), at(10, 11, 0))
        .await
        .expect("create")
        .expect("free");
    create_session(&ctx, conference_id, "Room A", at(10, 12, 0), at(10, 13, 0))
        .await
        .expect("create")
        .expect("free");

    assert!(
        update_session(&ctx, session.session_id, "Room A", at(10, 10, 15), at(10, 11, 0))
            .await
            .expect("update")
    );
    assert!(
        !update_session(&ctx, session.session_id, "Room A", at(10, 12, 30), at(10, 13, 30))
            .await
            .expect("update")
    );

    let err = update_session(&ctx, SessionId::new(), "Room A", at(10, 14, 0), at(10, 15, 0))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn available_rooms_keeps_inventory_order() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    create_session(&ctx, conference_id, "Room B", at(10, 10, 0), at(10, 11, 0))
        .await
        .expect("create")
        .expect("free");
    create_session(&ctx, conference_id, "Room D", at(10, 10, 30), at(10, 11, 30))
        .await
        .expect("create")
        .expect("free");

    let free = available_rooms(&ctx, at(10, 10, 45), at(10, 11, 15))
        .await
        .expect("rooms");
    assert_eq!(free, vec!["Room A", "Room C", "Room E"]);

    // Touching intervals leave the room available.
    let free = available_rooms(&ctx, at(10, 11, 30), at(10, 12, 30))
        .await
        .expect("rooms");
    assert_eq!(free.len(), 5);
}

#[tokio::test]
async fn reports_conflicts_and_groups_by_day() {
    let ctx = ctx().await;
    let conference_id = scheduled_conference(&ctx).await;
    let morning = create_session(&ctx, conference_id, "Room A", at(10, 10, 0), at(10, 11, 0))
        .await
        .expect("create")
        .expect("free");
    create_session(&ctx, conference_id, "Room A", at(11, 10, 0), at(11, 11, 0))
        .await
        .expect("create")
        .expect("free");

    let conflicts = find_conflicts(&ctx, "Room A", at(10, 10, 30), at(10, 11, 30), None)
        .await
        .expect("conflicts");
    assert_eq!(conflicts.len(), 1);
    let conflicts = find_conflicts(
        &ctx,
        "Room A",
        at(10, 10, 30),
        at(10, 11, 30),
        Some(morning.session_id),
    )
    .await
    .expect("conflicts");
    assert!(conflicts.is_empty());

    let by_date = sessions_by_date(&ctx, conference_id).await.expect("group");
    assert_eq!(by_date.len(), 2);
    assert_eq!(
        by_date[&at(10, 10, 0).date_naive()][0].session_id,
        morning.session_id
    );

    assert!(delete_session(&ctx, morning.session_id).await.expect("delete"));
    assert!(!delete_session(&ctx, morning.session_id).await.expect("delete"));
}
