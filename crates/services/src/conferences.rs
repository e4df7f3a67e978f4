//! Conference lifecycle: submission, validation, scheduling, archival.

use chrono::{DateTime, Utc};
use shared::domain::{ConferenceId, ConferenceStatus, UserId};
use shared::error::ApiError;
use shared::protocol::ConferenceSummary;
use storage::StoredConference;
use tracing::{debug, info};
use workflow::{ConferenceFacts, BACK_TO_SUBMITTED, TO_ARCHIVED, TO_SCHEDULED, TO_VALIDATION};

use crate::{conference_facts, internal, require_conference, ApiContext};

const TITLE_MIN: usize = 5;
const TITLE_MAX: usize = 255;

pub(crate) fn summarize(conference: StoredConference) -> ConferenceSummary {
    ConferenceSummary {
        conference_id: conference.conference_id,
        title: conference.title,
        description: conference.description,
        status: conference.status,
        presenter_id: conference.presenter_id,
        moderator_id: conference.moderator_id,
        scheduled_at: conference.scheduled_at,
        created_at: conference.created_at,
        updated_at: conference.updated_at,
    }
}

/// Create a submitted conference and assign the least-loaded moderator if
/// one exists. The title must be unique across all conferences.
pub async fn create_conference(
    ctx: &ApiContext,
    title: &str,
    description: &str,
    presenter_id: UserId,
) -> Result<ConferenceSummary, ApiError> {
    let title = title.trim();
    let length = title.chars().count();
    if length < TITLE_MIN || length > TITLE_MAX {
        return Err(ApiError::validation(format!(
            "title must be between {TITLE_MIN} and {TITLE_MAX} characters"
        )));
    }
    if description.trim().is_empty() {
        return Err(ApiError::validation("description must not be empty"));
    }

    ctx.storage
        .user_by_id(presenter_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("presenter {presenter_id} not found")))?;

    if ctx
        .storage
        .conference_by_title(title)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::validation(format!(
            "a conference titled {title:?} already exists"
        )));
    }

    let moderator = ctx
        .storage
        .least_loaded_moderator()
        .await
        .map_err(internal)?;
    let conference = ctx
        .storage
        .create_conference(title, description, presenter_id, moderator.map(|m| m.user_id))
        .await
        .map_err(internal)?;
    info!(conference_id = %conference.conference_id, title, "conference submitted");
    Ok(summarize(conference))
}

/// Hand the conference over to moderation. A moderator is assigned on the
/// spot when the conference has none; without any moderator in the system
/// the handover is refused. Idempotent on the pending moderation request.
pub async fn submit_for_validation(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<bool, ApiError> {
    let conference = require_conference(ctx, conference_id).await?;
    let facts = conference_facts(&conference);
    if !ctx.conferences.can(conference.status, &facts, TO_VALIDATION) {
        debug!(%conference_id, status = %conference.status, "validation handover refused");
        return Ok(false);
    }

    let moderator_id = match conference.moderator_id {
        Some(id) => id,
        None => match ctx
            .storage
            .least_loaded_moderator()
            .await
            .map_err(internal)?
        {
            Some(moderator) => {
                ctx.storage
                    .assign_moderator(conference_id, moderator.user_id)
                    .await
                    .map_err(internal)?;
                moderator.user_id
            }
            None => {
                debug!(%conference_id, "no moderator available for validation");
                return Ok(false);
            }
        },
    };

    if ctx
        .storage
        .pending_request_for_conference(conference_id)
        .await
        .map_err(internal)?
        .is_none()
    {
        ctx.storage
            .create_moderation_request(conference_id, moderator_id)
            .await
            .map_err(internal)?;
    }

    let next = match ctx.conferences.apply(conference.status, &facts, TO_VALIDATION) {
        Ok(next) => next,
        Err(_) => return Ok(false),
    };
    ctx.storage
        .update_conference_status(conference_id, next)
        .await
        .map_err(internal)?;
    Ok(true)
}

/// Pin a date on the conference and move it to scheduled, clearing any live
/// moderation requests. Refused outside validation.
pub async fn schedule_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
    scheduled_at: DateTime<Utc>,
) -> Result<bool, ApiError> {
    let conference = require_conference(ctx, conference_id).await?;
    let facts = ConferenceFacts {
        title: conference.title.clone(),
        scheduled_at: Some(scheduled_at),
    };
    let next = match ctx.conferences.apply(conference.status, &facts, TO_SCHEDULED) {
        Ok(next) => next,
        Err(rejection) => {
            debug!(%conference_id, %rejection, "scheduling refused");
            return Ok(false);
        }
    };
    ctx.storage
        .set_conference_schedule(conference_id, scheduled_at)
        .await
        .map_err(internal)?;
    ctx.storage
        .update_status_and_clear_requests(conference_id, next)
        .await
        .map_err(internal)?;
    Ok(true)
}

pub async fn archive_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<bool, ApiError> {
    let conference = require_conference(ctx, conference_id).await?;
    let facts = conference_facts(&conference);
    let next = match ctx.conferences.apply(conference.status, &facts, TO_ARCHIVED) {
        Ok(next) => next,
        Err(rejection) => {
            debug!(%conference_id, %rejection, "archiving refused");
            return Ok(false);
        }
    };
    ctx.storage
        .update_conference_status(conference_id, next)
        .await
        .map_err(internal)?;
    Ok(true)
}

/// Send a conference under validation back to its presenter, dropping its
/// moderation requests.
pub async fn return_to_submitted(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<bool, ApiError> {
    let conference = require_conference(ctx, conference_id).await?;
    let facts = conference_facts(&conference);
    let next = match ctx
        .conferences
        .apply(conference.status, &facts, BACK_TO_SUBMITTED)
    {
        Ok(next) => next,
        Err(rejection) => {
            debug!(%conference_id, %rejection, "return to submitted refused");
            return Ok(false);
        }
    };
    ctx.storage
        .update_status_and_clear_requests(conference_id, next)
        .await
        .map_err(internal)?;
    Ok(true)
}

pub async fn can_transition(
    ctx: &ApiContext,
    conference_id: ConferenceId,
    name: &str,
) -> Result<bool, ApiError> {
    let conference = require_conference(ctx, conference_id).await?;
    let facts = conference_facts(&conference);
    Ok(ctx.conferences.can(conference.status, &facts, name))
}

pub async fn enabled_transitions(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<Vec<&'static str>, ApiError> {
    let conference = require_conference(ctx, conference_id).await?;
    let facts = conference_facts(&conference);
    Ok(ctx.conferences.enabled(conference.status, &facts))
}

pub async fn find_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<ConferenceSummary, ApiError> {
    require_conference(ctx, conference_id).await.map(summarize)
}

pub async fn list_conferences(ctx: &ApiContext) -> Result<Vec<ConferenceSummary>, ApiError> {
    let conferences = ctx.storage.list_conferences().await.map_err(internal)?;
    Ok(conferences.into_iter().map(summarize).collect())
}

pub async fn conferences_by_status(
    ctx: &ApiContext,
    status: ConferenceStatus,
) -> Result<Vec<ConferenceSummary>, ApiError> {
    let conferences = ctx
        .storage
        .conferences_by_status(status)
        .await
        .map_err(internal)?;
    Ok(conferences.into_iter().map(summarize).collect())
}

pub async fn upcoming_conferences(
    ctx: &ApiContext,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<ConferenceSummary>, ApiError> {
    let conferences = ctx
        .storage
        .upcoming_conferences(now, limit)
        .await
        .map_err(internal)?;
    Ok(conferences.into_iter().map(summarize).collect())
}

pub async fn count_conferences(ctx: &ApiContext) -> Result<i64, ApiError> {
    ctx.storage.count_conferences().await.map_err(internal)
}

#[cfg(test)]
#[path = "tests/conferences_tests.rs"]
mod tests;
