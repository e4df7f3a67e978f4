//! Wire-facing payloads returned by the service layer.
//!
//! Identifiers serialize as canonical hyphenated lowercase hex strings;
//! enums serialize as their snake_case wire names.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ConferenceId, ConferenceStatus, FeedbackId, MediaId, MediaType, RegistrationId, RequestId,
    RequestStatus, SessionId, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConferenceSummary {
    pub conference_id: ConferenceId,
    pub title: String,
    pub description: String,
    pub status: ConferenceStatus,
    pub presenter_id: UserId,
    pub moderator_id: Option<UserId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRequestSummary {
    pub request_id: RequestId,
    pub conference_id: ConferenceId,
    pub moderator_id: UserId,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub conference_id: ConferenceId,
    pub room: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationSummary {
    pub registration_id: RegistrationId,
    pub user_id: UserId,
    pub conference_id: ConferenceId,
    pub qr_code: String,
    pub attended: bool,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationStats {
    pub total_registrations: i64,
    pub total_attendees: i64,
    /// Percentage rounded to two decimals, 0 when nobody registered.
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub feedback_id: FeedbackId,
    pub registration_id: RegistrationId,
    pub rating: i64,
    pub comment: Option<String>,
    pub aspect_rated: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackStats {
    /// Average rating rounded to one decimal, 0 when no feedback exists.
    pub avg_rating: f64,
    pub count: i64,
    /// Always carries all five rating buckets, absent ratings count 0.
    pub distribution: BTreeMap<i64, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentEntry {
    pub rating: i64,
    pub comment: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSummary {
    pub media_id: MediaId,
    pub conference_id: ConferenceId,
    pub media_type: MediaType,
    pub url: String,
    pub title: String,
    pub filename: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderReport {
    pub conferences_tomorrow: u64,
    pub participant_reminders: u64,
    pub presenter_reminders: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackRequestReport {
    pub conferences_ended_yesterday: u64,
    pub feedback_requests: u64,
}
