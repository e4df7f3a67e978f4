//! Moderation requests: one live request per conference, resolved by the
//! assigned moderator. Deleting the request is what completes it; resolved
//! requests are never kept around in a terminal state.

use shared::domain::{ConferenceId, RequestId, UserId};
use shared::error::ApiError;
use shared::protocol::ModerationRequestSummary;
use storage::StoredModerationRequest;
use tracing::{debug, info, warn};
use workflow::{ModerationFacts, ACCEPT, BACK_TO_SUBMITTED, REJECT, TO_SCHEDULED};

use crate::{conference_facts, internal, require_conference, ApiContext};

fn summarize(request: StoredModerationRequest) -> ModerationRequestSummary {
    ModerationRequestSummary {
        request_id: request.request_id,
        conference_id: request.conference_id,
        moderator_id: request.moderator_id,
        status: request.status,
        created_at: request.created_at,
    }
}

async fn require_request(
    ctx: &ApiContext,
    request_id: RequestId,
) -> Result<StoredModerationRequest, ApiError> {
    ctx.storage
        .request_by_id(request_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("moderation request {request_id} not found")))
}

/// Open a moderation request for the conference's moderator, assigning the
/// least-loaded one when the conference has none. Returns the existing
/// pending request unchanged when one is already open; `Ok(None)` when no
/// moderator exists to assign.
pub async fn create_moderation_request(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<Option<ModerationRequestSummary>, ApiError> {
    let conference = require_conference(ctx, conference_id).await?;

    if let Some(pending) = ctx
        .storage
        .pending_request_for_conference(conference_id)
        .await
        .map_err(internal)?
    {
        return Ok(Some(summarize(pending)));
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
                debug!(%conference_id, "no moderator available for request");
                return Ok(None);
            }
        },
    };

    let request = ctx
        .storage
        .create_moderation_request(conference_id, moderator_id)
        .await
        .map_err(internal)?;
    Ok(Some(summarize(request)))
}

/// Accept a pending request. Only the assigned moderator may resolve it.
/// The conference advances to scheduled when its machine permits (a date
/// must be set); either way the request is deleted.
pub async fn accept_request(
    ctx: &ApiContext,
    request_id: RequestId,
    moderator_id: UserId,
) -> Result<bool, ApiError> {
    let request = require_request(ctx, request_id).await?;
    if request.moderator_id != moderator_id {
        return Err(ApiError::forbidden(
            "request is assigned to another moderator",
        ));
    }

    let conference = require_conference(ctx, request.conference_id).await?;
    let moderation_facts = ModerationFacts {
        conference_title: conference.title.clone(),
    };
    if ctx
        .moderation
        .apply(request.status, &moderation_facts, ACCEPT)
        .is_err()
    {
        debug!(%request_id, status = %request.status, "accept refused");
        return Ok(false);
    }

    let facts = conference_facts(&conference);
    match ctx.conferences.apply(conference.status, &facts, TO_SCHEDULED) {
        Ok(next) => {
            ctx.storage
                .update_status_and_clear_requests(conference.conference_id, next)
                .await
                .map_err(internal)?;
        }
        Err(rejection) => {
            warn!(
                conference_id = %conference.conference_id,
                %rejection,
                "request accepted but conference could not advance"
            );
            ctx.storage
                .delete_request(request.request_id)
                .await
                .map_err(internal)?;
        }
    }
    Ok(true)
}

/// Reject a pending request, sending the conference back to its presenter.
/// The moderator's comments end up in the rejection log; the request row is
/// deleted, not kept.
pub async fn reject_request(
    ctx: &ApiContext,
    request_id: RequestId,
    moderator_id: UserId,
    comments: Option<&str>,
) -> Result<bool, ApiError> {
    let request = require_request(ctx, request_id).await?;
    if request.moderator_id != moderator_id {
        return Err(ApiError::forbidden(
            "request is assigned to another moderator",
        ));
    }

    let conference = require_conference(ctx, request.conference_id).await?;
    let moderation_facts = ModerationFacts {
        conference_title: conference.title.clone(),
    };
    if ctx
        .moderation
        .apply(request.status, &moderation_facts, REJECT)
        .is_err()
    {
        debug!(%request_id, status = %request.status, "reject refused");
        return Ok(false);
    }
    info!(
        conference_id = %conference.conference_id,
        comments = comments.unwrap_or(""),
        "moderation rejection recorded"
    );

    let facts = conference_facts(&conference);
    match ctx
        .conferences
        .apply(conference.status, &facts, BACK_TO_SUBMITTED)
    {
        Ok(next) => {
            ctx.storage
                .update_status_and_clear_requests(conference.conference_id, next)
                .await
                .map_err(internal)?;
        }
        Err(rejection) => {
            warn!(
                conference_id = %conference.conference_id,
                %rejection,
                "request rejected but conference could not return to submitted"
            );
            ctx.storage
                .delete_request(request.request_id)
                .await
                .map_err(internal)?;
        }
    }
    Ok(true)
}

pub async fn pending_request_for_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<Option<ModerationRequestSummary>, ApiError> {
    let pending = ctx
        .storage
        .pending_request_for_conference(conference_id)
        .await
        .map_err(internal)?;
    Ok(pending.map(summarize))
}

pub async fn pending_requests_for_moderator(
    ctx: &ApiContext,
    moderator_id: UserId,
) -> Result<Vec<ModerationRequestSummary>, ApiError> {
    let requests = ctx
        .storage
        .pending_requests_for_moderator(moderator_id)
        .await
        .map_err(internal)?;
    Ok(requests.into_iter().map(summarize).collect())
}

#[cfg(test)]
#[path = "tests/moderation_tests.rs"]
mod tests;
