//! The registration ledger: who signed up, who showed up. Registrations are
//! idempotent per (user, conference); check-in flips `attended` exactly
//! once and an attended registration can no longer be cancelled.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use shared::domain::{ConferenceId, ConferenceStatus, RegistrationId, UserId};
use shared::error::ApiError;
use shared::protocol::{RegistrationStats, RegistrationSummary};
use storage::StoredRegistration;
use tracing::{debug, info};

use crate::{internal, require_conference, ApiContext};

fn summarize(registration: StoredRegistration) -> RegistrationSummary {
    RegistrationSummary {
        registration_id: registration.registration_id,
        user_id: registration.user_id,
        conference_id: registration.conference_id,
        qr_code: registration.qr_code,
        attended: registration.attended,
        registered_at: registration.registered_at,
    }
}

/// Check-in token: sha256 over the registration identity and its creation
/// instant, hex encoded. Opaque to callers; compared by exact equality.
fn qr_token(
    registration_id: RegistrationId,
    user_id: UserId,
    conference_id: ConferenceId,
    registered_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(registration_id.0.as_bytes());
    hasher.update(user_id.0.as_bytes());
    hasher.update(conference_id.0.as_bytes());
    hasher.update(registered_at.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

async fn require_registration(
    ctx: &ApiContext,
    registration_id: RegistrationId,
) -> Result<StoredRegistration, ApiError> {
    ctx.storage
        .registration_by_id(registration_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("registration {registration_id} not found")))
}

/// Register a user for a scheduled conference. Registering twice returns
/// the existing registration; an unscheduled conference takes no
/// registrations at all.
pub async fn register(
    ctx: &ApiContext,
    user_id: UserId,
    conference_id: ConferenceId,
) -> Result<Option<RegistrationSummary>, ApiError> {
    ctx.storage
        .user_by_id(user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;
    let conference = require_conference(ctx, conference_id).await?;
    if conference.status != ConferenceStatus::Scheduled {
        debug!(%conference_id, status = %conference.status, "registration refused");
        return Ok(None);
    }

    if let Some(existing) = ctx
        .storage
        .registration_by_user_and_conference(user_id, conference_id)
        .await
        .map_err(internal)?
    {
        return Ok(Some(summarize(existing)));
    }

    let registration_id = RegistrationId::new();
    let registered_at = Utc::now();
    let qr_code = qr_token(registration_id, user_id, conference_id, registered_at);
    let inserted = ctx
        .storage
        .insert_registration(registration_id, user_id, conference_id, &qr_code, registered_at)
        .await
        .map_err(internal)?;
    match inserted {
        Some(registration) => {
            info!(%user_id, %conference_id, "registration created");
            Ok(Some(summarize(registration)))
        }
        // Lost the race against a concurrent registration for the same pair.
        None => {
            let existing = ctx
                .storage
                .registration_by_user_and_conference(user_id, conference_id)
                .await
                .map_err(internal)?;
            Ok(existing.map(summarize))
        }
    }
}

/// Cancel a registration. `Ok(false)` once the attendee has checked in.
pub async fn cancel(
    ctx: &ApiContext,
    registration_id: RegistrationId,
) -> Result<bool, ApiError> {
    require_registration(ctx, registration_id).await?;
    ctx.storage
        .delete_registration_if_unattended(registration_id)
        .await
        .map_err(internal)
}

/// Mark the attendee present. When a code is supplied it must match the
/// stored token exactly; a mismatch is a refused scan, not an error.
/// `Ok(false)` on a mismatch or a repeated check-in.
pub async fn check_in(
    ctx: &ApiContext,
    registration_id: RegistrationId,
    code: Option<&str>,
) -> Result<bool, ApiError> {
    let registration = require_registration(ctx, registration_id).await?;
    if let Some(code) = code {
        if code != registration.qr_code {
            debug!(%registration_id, "check-in code mismatch");
            return Ok(false);
        }
    }
    let checked_in = ctx
        .storage
        .mark_attended(registration_id)
        .await
        .map_err(internal)?;
    if checked_in {
        info!(%registration_id, "attendee checked in");
    }
    Ok(checked_in)
}

pub async fn find_by_qr_code(
    ctx: &ApiContext,
    qr_code: &str,
) -> Result<Option<RegistrationSummary>, ApiError> {
    let registration = ctx
        .storage
        .registration_by_qr_code(qr_code)
        .await
        .map_err(internal)?;
    Ok(registration.map(summarize))
}

pub async fn registrations_for_user(
    ctx: &ApiContext,
    user_id: UserId,
) -> Result<Vec<RegistrationSummary>, ApiError> {
    let registrations = ctx
        .storage
        .registrations_for_user(user_id)
        .await
        .map_err(internal)?;
    Ok(registrations.into_iter().map(summarize).collect())
}

pub async fn registrations_for_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<Vec<RegistrationSummary>, ApiError> {
    let registrations = ctx
        .storage
        .registrations_for_conference(conference_id)
        .await
        .map_err(internal)?;
    Ok(registrations.into_iter().map(summarize).collect())
}

pub async fn attendees_for_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<Vec<RegistrationSummary>, ApiError> {
    let attendees = ctx
        .storage
        .attendees_for_conference(conference_id)
        .await
        .map_err(internal)?;
    Ok(attendees.into_iter().map(summarize).collect())
}

/// Head counts and the attendance rate as a percentage rounded to two
/// decimals; a conference nobody registered for reports a rate of zero.
pub async fn conference_statistics(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<RegistrationStats, ApiError> {
    require_conference(ctx, conference_id).await?;
    let total_registrations = ctx
        .storage
        .count_registrations_for_conference(conference_id)
        .await
        .map_err(internal)?;
    let total_attendees = ctx
        .storage
        .count_attendees_for_conference(conference_id)
        .await
        .map_err(internal)?;
    let attendance_rate = if total_registrations > 0 {
        let rate = total_attendees as f64 * 100.0 / total_registrations as f64;
        (rate * 100.0).round() / 100.0
    } else {
        0.0
    };
    Ok(RegistrationStats {
        total_registrations,
        total_attendees,
        attendance_rate,
    })
}

pub async fn total_participants(ctx: &ApiContext) -> Result<i64, ApiError> {
    ctx.storage.count_registrations().await.map_err(internal)
}

#[cfg(test)]
#[path = "tests/registrations_tests.rs"]
mod tests;
