//! Attendee feedback: one submission per registration, ratings 1 to 5,
//! aggregated per conference.

use std::collections::BTreeMap;

use chrono::Utc;
use shared::domain::{ConferenceId, RegistrationId};
use shared::error::ApiError;
use shared::protocol::{CommentEntry, FeedbackStats, FeedbackSummary};
use storage::StoredFeedback;
use tracing::debug;

use crate::{internal, require_conference, ApiContext};

fn summarize(feedback: StoredFeedback) -> FeedbackSummary {
    FeedbackSummary {
        feedback_id: feedback.feedback_id,
        registration_id: feedback.registration_id,
        rating: feedback.rating,
        comment: feedback.comment,
        aspect_rated: feedback.aspect_rated,
        submitted_at: feedback.submitted_at,
    }
}

/// Record feedback for an attended registration. `Ok(None)` when the
/// attendee never checked in or already submitted feedback.
pub async fn submit_feedback(
    ctx: &ApiContext,
    registration_id: RegistrationId,
    rating: i64,
    comment: Option<&str>,
    aspect_rated: Option<&str>,
) -> Result<Option<FeedbackSummary>, ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::validation("rating must be between 1 and 5"));
    }
    let registration = ctx
        .storage
        .registration_by_id(registration_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("registration {registration_id} not found")))?;
    if !registration.attended {
        debug!(%registration_id, "feedback refused for absent attendee");
        return Ok(None);
    }

    let inserted = ctx
        .storage
        .insert_feedback(registration_id, rating, comment, aspect_rated, Utc::now())
        .await
        .map_err(internal)?;
    Ok(inserted.map(summarize))
}

pub async fn feedback_for_registration(
    ctx: &ApiContext,
    registration_id: RegistrationId,
) -> Result<Option<FeedbackSummary>, ApiError> {
    let feedback = ctx
        .storage
        .feedback_for_registration(registration_id)
        .await
        .map_err(internal)?;
    Ok(feedback.map(summarize))
}

/// Average rating (one decimal, zero when no feedback exists), submission
/// count, and the full five-bucket rating distribution.
pub async fn conference_stats(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<FeedbackStats, ApiError> {
    require_conference(ctx, conference_id).await?;
    let aggregate = ctx
        .storage
        .feedback_aggregate(conference_id)
        .await
        .map_err(internal)?;

    let mut distribution: BTreeMap<i64, i64> = (1..=5).map(|rating| (rating, 0)).collect();
    for (rating, count) in aggregate.per_rating {
        distribution.insert(rating, count);
    }
    let avg_rating = aggregate
        .avg_rating
        .map(|avg| (avg * 10.0).round() / 10.0)
        .unwrap_or(0.0);
    Ok(FeedbackStats {
        avg_rating,
        count: aggregate.count,
        distribution,
    })
}

/// Newest non-empty comments, capped at `limit`.
pub async fn latest_comments(
    ctx: &ApiContext,
    conference_id: ConferenceId,
    limit: i64,
) -> Result<Vec<CommentEntry>, ApiError> {
    let comments = ctx
        .storage
        .latest_comments(conference_id, limit)
        .await
        .map_err(internal)?;
    Ok(comments
        .into_iter()
        .map(|comment| CommentEntry {
            rating: comment.rating,
            comment: comment.comment,
            submitted_at: comment.submitted_at,
        })
        .collect())
}

#[cfg(test)]
#[path = "tests/feedback_tests.rs"]
mod tests;
