//! Session planning across the fixed room inventory. The overlap guard
//! lives in storage as a single atomic statement; this layer owns the room
//! list and the conference-state preconditions.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use shared::domain::{ConferenceId, ConferenceStatus, SessionId};
use shared::error::ApiError;
use shared::protocol::SessionSummary;
use storage::StoredSession;
use tracing::{debug, info};

use crate::{internal, require_conference, ApiContext};

/// The venue's rooms. Sessions only ever live in one of these.
pub const ROOMS: [&str; 5] = ["Room A", "Room B", "Room C", "Room D", "Room E"];

fn summarize(session: StoredSession) -> SessionSummary {
    SessionSummary {
        session_id: session.session_id,
        conference_id: session.conference_id,
        room: session.room,
        start_time: session.start_time,
        end_time: session.end_time,
    }
}

fn check_slot(room: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<(), ApiError> {
    if end_time <= start_time {
        return Err(ApiError::validation("session must end after it starts"));
    }
    if !ROOMS.contains(&room) {
        return Err(ApiError::validation(format!("unknown room {room:?}")));
    }
    Ok(())
}

/// Book a slot for a scheduled conference. `Ok(None)` means the room is
/// taken for part of the interval. The first session booked also pins the
/// conference date when none was set yet.
pub async fn create_session(
    ctx: &ApiContext,
    conference_id: ConferenceId,
    room: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Option<SessionSummary>, ApiError> {
    check_slot(room, start_time, end_time)?;
    let conference = require_conference(ctx, conference_id).await?;
    if conference.status != ConferenceStatus::Scheduled {
        return Err(ApiError::validation(
            "sessions can only be planned for a scheduled conference",
        ));
    }

    let inserted = ctx
        .storage
        .insert_session_if_free(conference_id, room, start_time, end_time)
        .await
        .map_err(internal)?;
    match inserted {
        Some(session) => {
            if conference.scheduled_at.is_none() {
                ctx.storage
                    .set_conference_schedule(conference_id, start_time)
                    .await
                    .map_err(internal)?;
            }
            info!(%conference_id, room, %start_time, "session booked");
            Ok(Some(summarize(session)))
        }
        None => {
            debug!(room, %start_time, %end_time, "slot conflict");
            Ok(None)
        }
    }
}

/// Move or resize a session. `Ok(false)` when the target slot conflicts
/// with another session.
pub async fn update_session(
    ctx: &ApiContext,
    session_id: SessionId,
    room: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<bool, ApiError> {
    check_slot(room, start_time, end_time)?;
    ctx.storage
        .session_by_id(session_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("session {session_id} not found")))?;
    ctx.storage
        .update_session_if_free(session_id, room, start_time, end_time)
        .await
        .map_err(internal)
}

pub async fn delete_session(ctx: &ApiContext, session_id: SessionId) -> Result<bool, ApiError> {
    let deleted = ctx
        .storage
        .delete_session(session_id)
        .await
        .map_err(internal)?;
    Ok(deleted > 0)
}

/// Sessions colliding with [start, end) in `room`; touching endpoints do
/// not collide. `exclude` ignores the session being moved.
pub async fn find_conflicts(
    ctx: &ApiContext,
    room: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    exclude: Option<SessionId>,
) -> Result<Vec<SessionSummary>, ApiError> {
    check_slot(room, start_time, end_time)?;
    let conflicts = ctx
        .storage
        .find_conflicting(room, start_time, end_time, exclude)
        .await
        .map_err(internal)?;
    Ok(conflicts.into_iter().map(summarize).collect())
}

/// Rooms free for the whole of [start, end), in inventory order.
pub async fn available_rooms(
    ctx: &ApiContext,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Vec<String>, ApiError> {
    if end_time <= start_time {
        return Err(ApiError::validation("interval must end after it starts"));
    }
    let occupied = ctx
        .storage
        .occupied_rooms(start_time, end_time)
        .await
        .map_err(internal)?;
    Ok(ROOMS
        .iter()
        .filter(|room| !occupied.iter().any(|taken| taken == *room))
        .map(|room| room.to_string())
        .collect())
}

pub async fn sessions_for_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<Vec<SessionSummary>, ApiError> {
    let sessions = ctx
        .storage
        .sessions_for_conference(conference_id)
        .await
        .map_err(internal)?;
    Ok(sessions.into_iter().map(summarize).collect())
}

/// A conference's sessions grouped by calendar day, days and sessions both
/// in chronological order.
pub async fn sessions_by_date(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<BTreeMap<NaiveDate, Vec<SessionSummary>>, ApiError> {
    let sessions = ctx
        .storage
        .sessions_for_conference(conference_id)
        .await
        .map_err(internal)?;
    let mut by_date: BTreeMap<NaiveDate, Vec<SessionSummary>> = BTreeMap::new();
    for session in sessions {
        by_date
            .entry(session.start_time.date_naive())
            .or_default()
            .push(summarize(session));
    }
    Ok(by_date)
}

#[cfg(test)]
#[path = "tests/sessions_tests.rs"]
mod tests;
