use super::*;
use chrono::TimeZone;
use chrono::{DateTime, Utc};
use shared::domain::{ConferenceStatus, Role};
use shared::error::ErrorCode;
use storage::Storage;

use crate::conferences;

async fn ctx() -> ApiContext {
    ApiContext::new(Storage::new("sqlite::memory:").await.expect("db"))
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, hour, 0, 0).unwrap()
}

/// A conference under validation with an open request, plus its moderator.
async fn under_validation(ctx: &ApiContext) -> (ConferenceId, RequestId, UserId) {
    let presenter = ctx
        .storage
        .create_user("presenter", &[Role::Presenter])
        .await
        .expect("user");
    let moderator = ctx
        .storage
        .create_user("mod", &[Role::Moderator])
        .await
        .expect("user");
    let conference = conferences::create_conference(ctx, "Rust Conf", "d", presenter.user_id)
        .await
        .expect("create");
    assert!(conferences::submit_for_validation(ctx, conference.conference_id)
        .await
        .expect("submit"));
    let request = ctx
        .storage
        .pending_request_for_conference(conference.conference_id)
        .await
        .expect("query")
        .expect("pending");
    (conference.conference_id, request.request_id, moderator.user_id)
}

#[tokio::test]
async fn create_is_idempotent_on_the_pending_request() {
    let ctx = ctx().await;
    let (conference_id, request_id, _) = under_validation(&ctx).await;

    let again = create_moderation_request(&ctx, conference_id)
        .await
        .expect("create")
        .expect("request");
    assert_eq!(again.request_id, request_id);
}

#[tokio::test]
async fn create_refused_without_a_moderator() {
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

    assert!(create_moderation_request(&ctx, conference.conference_id)
        .await
        .expect("create")
        .is_none());
}

#[tokio::test]
async fn only_the_assigned_moderator_may_resolve() {
    let ctx = ctx().await;
    let (_, request_id, _) = under_validation(&ctx).await;
    let stranger = ctx
        .storage
        .create_user("stranger", &[Role::Moderator])
        .await
        .expect("user");

    let err = accept_request(&ctx, request_id, stranger.user_id)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
    let err = reject_request(&ctx, request_id, stranger.user_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[tokio::test]
async fn acceptance_schedules_a_dated_conference() {
    let ctx = ctx().await;
    let (conference_id, request_id, moderator_id) = under_validation(&ctx).await;
    ctx.storage
        .set_conference_schedule(conference_id, at(9))
        .await
        .expect("date");

    assert!(accept_request(&ctx, request_id, moderator_id)
        .await
        .expect("accept"));
    let conference = conferences::find_conference(&ctx, conference_id)
        .await
        .expect("find");
    assert_eq!(conference.status, ConferenceStatus::Scheduled);
    assert!(ctx
        .storage
        .request_by_id(request_id)
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn acceptance_without_a_date_resolves_the_request_only() {
    let ctx = ctx().await;
    let (conference_id, request_id, moderator_id) = under_validation(&ctx).await;

    assert!(accept_request(&ctx, request_id, moderator_id)
        .await
        .expect("accept"));
    let conference = conferences::find_conference(&ctx, conference_id)
        .await
        .expect("find");
    assert_eq!(conference.status, ConferenceStatus::UnderValidation);
    assert!(ctx
        .storage
        .request_by_id(request_id)
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn rejection_sends_the_conference_back() {
    let ctx = ctx().await;
    let (conference_id, request_id, moderator_id) = under_validation(&ctx).await;

    assert!(
        reject_request(&ctx, request_id, moderator_id, Some("needs a clearer abstract"))
            .await
            .expect("reject")
    );
    let conference = conferences::find_conference(&ctx, conference_id)
        .await
        .expect("find");
    assert_eq!(conference.status, ConferenceStatus::Submitted);
    assert!(ctx
        .storage
        .request_by_id(request_id)
        .await
        .expect("query")
        .is_none());

    // The request is gone, resolving again is a plain not-found.
    let err = reject_request(&ctx, request_id, moderator_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn lists_a_moderators_pending_requests() {
    let ctx = ctx().await;
    let (conference_id, request_id, moderator_id) = under_validation(&ctx).await;

    let pending = pending_requests_for_moderator(&ctx, moderator_id)
        .await
        .expect("query");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request_id, request_id);
    assert_eq!(pending[0].conference_id, conference_id);

    let by_conference = pending_request_for_conference(&ctx, conference_id)
        .await
        .expect("query")
        .expect("pending");
    assert_eq!(by_conference.request_id, request_id);
}
