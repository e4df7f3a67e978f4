use std::sync::Mutex;

use super::*;
use anyhow::anyhow;
use chrono::TimeZone;
use shared::domain::{ConferenceId, ConferenceStatus, Role};
use storage::Storage;

async fn ctx() -> ApiContext {
    ApiContext::new(Storage::new("sqlite::memory:").await.expect("db"))
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap()
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: UserId, subject: &str, _message: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient, subject.to_string()));
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _: UserId, _: &str, _: &str) -> anyhow::Result<()> {
        Err(anyhow!("smtp down"))
    }
}

/// A scheduled conference on the given day with `registered` participants,
/// the first `attended` of them checked in.
async fn seed_conference(
    ctx: &ApiContext,
    title: &str,
    scheduled_at: DateTime<Utc>,
    registered: usize,
    attended: usize,
) -> ConferenceId {
    let presenter = ctx
        .storage
        .create_user(&format!("{title}-presenter"), &[Role::Presenter])
        .await
        .expect("user");
    let conference = ctx
        .storage
        .create_conference(title, "d", presenter.user_id, None)
        .await
        .expect("conference");
    ctx.storage
        .update_conference_status(conference.conference_id, ConferenceStatus::Scheduled)
        .await
        .expect("status");
    ctx.storage
        .set_conference_schedule(conference.conference_id, scheduled_at)
        .await
        .expect("date");
    for index in 0..registered {
        let user = ctx
            .storage
            .create_user(&format!("{title}-user-{index}"), &[Role::Participant])
            .await
            .expect("user");
        let registration = crate::registrations::register(ctx, user.user_id, conference.conference_id)
            .await
            .expect("register")
            .expect("created");
        if index < attended {
            crate::registrations::check_in(ctx, registration.registration_id, None)
                .await
                .expect("check in");
        }
    }
    conference.conference_id
}

#[tokio::test]
async fn reminds_participants_and_presenter_the_day_before() {
    let ctx = ctx().await;
    let tomorrow = now() + Duration::days(1) + Duration::hours(2);
    seed_conference(&ctx, "Tomorrow Conf", tomorrow, 2, 0).await;
    // Same day as the run, not part of tomorrow's batch.
    seed_conference(&ctx, "Today Conf", now() + Duration::hours(3), 1, 0).await;

    let notifier = RecordingNotifier::default();
    let report = process_reminders(&ctx, &notifier, now())
        .await
        .expect("reminders");
    assert_eq!(report.conferences_tomorrow, 1);
    assert_eq!(report.participant_reminders, 2);
    assert_eq!(report.presenter_reminders, 1);

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 3);
    assert!(sent
        .iter()
        .all(|(_, subject)| subject.contains("Tomorrow Conf")));
}

#[tokio::test]
async fn asks_attendees_for_feedback_the_day_after() {
    let ctx = ctx().await;
    let yesterday = now() - Duration::days(1) + Duration::hours(2);
    seed_conference(&ctx, "Yesterday Conf", yesterday, 3, 2).await;

    let notifier = RecordingNotifier::default();
    let report = process_feedback_requests(&ctx, &notifier, now())
        .await
        .expect("requests");
    assert_eq!(report.conferences_ended_yesterday, 1);
    // Only checked-in attendees are asked.
    assert_eq!(report.feedback_requests, 2);
}

#[tokio::test]
async fn a_failing_channel_never_fails_the_batch() {
    let ctx = ctx().await;
    let tomorrow = now() + Duration::days(1) + Duration::hours(2);
    seed_conference(&ctx, "Tomorrow Conf", tomorrow, 2, 0).await;

    let report = process_reminders(&ctx, &FailingNotifier, now())
        .await
        .expect("reminders");
    assert_eq!(report.conferences_tomorrow, 1);
    assert_eq!(report.participant_reminders, 0);
    assert_eq!(report.presenter_reminders, 0);
}

#[tokio::test]
async fn quiet_days_produce_empty_reports() {
    let ctx = ctx().await;
    let report = process_reminders(&ctx, &LogNotifier, now())
        .await
        .expect("reminders");
    assert_eq!(report.conferences_tomorrow, 0);

    let report = process_feedback_requests(&ctx, &LogNotifier, now())
        .await
        .expect("requests");
    assert_eq!(report.conferences_ended_yesterday, 0);
}
