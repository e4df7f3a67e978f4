//! Reminder and feedback-request batches. Notifications are fire-and-forget:
//! a failed send is logged and skipped, never retried, and never fails the
//! batch.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use shared::domain::UserId;
use shared::error::ApiError;
use shared::protocol::{FeedbackRequestReport, ReminderReport};
use tracing::{info, warn};

use crate::{internal, ApiContext};

/// Outbound notification channel. Message rendering and actual delivery
/// (mail, push) live behind this seam.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: UserId, subject: &str, message: &str) -> anyhow::Result<()>;
}

/// Default channel: writes every notification to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: UserId, subject: &str, message: &str) -> anyhow::Result<()> {
        info!(%recipient, subject, message, "notification dispatched");
        Ok(())
    }
}

// [midnight, 23:59:59] of the given day; the schedule window query is
// inclusive on both ends.
fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1) - Duration::seconds(1))
}

/// Remind everyone involved in a conference happening tomorrow: every
/// registered participant plus the presenter.
pub async fn process_reminders(
    ctx: &ApiContext,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> Result<ReminderReport, ApiError> {
    let (from, to) = day_window(now.date_naive() + Duration::days(1));
    let conferences = ctx
        .storage
        .scheduled_between(from, to)
        .await
        .map_err(internal)?;

    let mut report = ReminderReport {
        conferences_tomorrow: conferences.len() as u64,
        ..ReminderReport::default()
    };
    for conference in &conferences {
        let subject = format!("Reminder: {} is tomorrow", conference.title);
        let registrations = ctx
            .storage
            .registrations_for_conference(conference.conference_id)
            .await
            .map_err(internal)?;
        for registration in registrations {
            match notifier
                .notify(registration.user_id, &subject, "See you tomorrow!")
                .await
            {
                Ok(()) => report.participant_reminders += 1,
                Err(err) => warn!(error = ?err, recipient = %registration.user_id, "reminder failed"),
            }
        }
        match notifier
            .notify(
                conference.presenter_id,
                &subject,
                "Your conference runs tomorrow.",
            )
            .await
        {
            Ok(()) => report.presenter_reminders += 1,
            Err(err) => warn!(error = ?err, recipient = %conference.presenter_id, "presenter reminder failed"),
        }
    }
    info!(
        conferences = report.conferences_tomorrow,
        participants = report.participant_reminders,
        presenters = report.presenter_reminders,
        "reminder batch done"
    );
    Ok(report)
}

/// Ask every attendee of a conference that ran yesterday for feedback.
pub async fn process_feedback_requests(
    ctx: &ApiContext,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> Result<FeedbackRequestReport, ApiError> {
    let (from, to) = day_window(now.date_naive() - Duration::days(1));
    let conferences = ctx
        .storage
        .scheduled_between(from, to)
        .await
        .map_err(internal)?;

    let mut report = FeedbackRequestReport {
        conferences_ended_yesterday: conferences.len() as u64,
        ..FeedbackRequestReport::default()
    };
    for conference in &conferences {
        let subject = format!("How was {}?", conference.title);
        let attendees = ctx
            .storage
            .attendees_for_conference(conference.conference_id)
            .await
            .map_err(internal)?;
        for attendee in attendees {
            match notifier
                .notify(attendee.user_id, &subject, "Tell us how it went.")
                .await
            {
                Ok(()) => report.feedback_requests += 1,
                Err(err) => warn!(error = ?err, recipient = %attendee.user_id, "feedback request failed"),
            }
        }
    }
    info!(
        conferences = report.conferences_ended_yesterday,
        requests = report.feedback_requests,
        "feedback request batch done"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
