//! Coordination layer tying the workflow machines to storage.
//!
//! Every operation reads the subject, consults the relevant machine or
//! predicate, and persists the outcome. Expected business rejections
//! (scheduling conflicts, duplicate registrations, disallowed transitions)
//! come back as `Ok(None)` / `Ok(false)`; `ApiError` is reserved for caller
//! mistakes and infrastructure failures.

pub mod conferences;
pub mod feedback;
pub mod media;
pub mod moderation;
pub mod notifications;
pub mod registrations;
pub mod sessions;

use shared::domain::{ConferenceId, ConferenceStatus, RequestStatus};
use shared::error::{ApiError, ErrorCode};
use storage::{Storage, StoredConference};
use workflow::{
    conference_machine, moderation_machine, ConferenceFacts, Machine, ModerationFacts,
};

pub struct ApiContext {
    pub storage: Storage,
    pub conferences: Machine<ConferenceStatus, ConferenceFacts>,
    pub moderation: Machine<RequestStatus, ModerationFacts>,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            conferences: conference_machine(),
            moderation: moderation_machine(),
        }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        Ok(Self::new(Storage::new(database_url).await?))
    }
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = ?err, "storage operation failed");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

pub(crate) async fn require_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<StoredConference, ApiError> {
    ctx.storage
        .conference_by_id(conference_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("conference {conference_id} not found")))
}

pub(crate) fn conference_facts(conference: &StoredConference) -> ConferenceFacts {
    ConferenceFacts {
        title: conference.title.clone(),
        scheduled_at: conference.scheduled_at,
    }
}

#[cfg(test)]
#[path = "tests/scenario_tests.rs"]
mod scenario_tests;
