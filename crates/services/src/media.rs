//! Conference media metadata. The bytes themselves live with the external
//! file store; only the descriptive record is kept here, and it goes away
//! with the conference.

use shared::domain::{ConferenceId, MediaId, MediaType};
use shared::error::ApiError;
use shared::protocol::MediaSummary;
use storage::StoredMedia;

use crate::{internal, require_conference, ApiContext};

fn summarize(media: StoredMedia) -> MediaSummary {
    MediaSummary {
        media_id: media.media_id,
        conference_id: media.conference_id,
        media_type: media.media_type,
        url: media.url,
        title: media.title,
        filename: media.filename,
        file_size: media.file_size,
        uploaded_at: media.uploaded_at,
    }
}

pub async fn add_media(
    ctx: &ApiContext,
    conference_id: ConferenceId,
    media_type: MediaType,
    url: &str,
    title: &str,
    filename: &str,
    file_size: i64,
) -> Result<MediaSummary, ApiError> {
    if url.trim().is_empty() {
        return Err(ApiError::validation("media url must not be empty"));
    }
    if title.trim().is_empty() {
        return Err(ApiError::validation("media title must not be empty"));
    }
    if file_size < 0 {
        return Err(ApiError::validation("media size must not be negative"));
    }
    require_conference(ctx, conference_id).await?;
    let media = ctx
        .storage
        .insert_media(conference_id, media_type, url, title, filename, file_size)
        .await
        .map_err(internal)?;
    Ok(summarize(media))
}

pub async fn media_for_conference(
    ctx: &ApiContext,
    conference_id: ConferenceId,
) -> Result<Vec<MediaSummary>, ApiError> {
    let media = ctx
        .storage
        .media_for_conference(conference_id)
        .await
        .map_err(internal)?;
    Ok(media.into_iter().map(summarize).collect())
}

pub async fn remove_media(ctx: &ApiContext, media_id: MediaId) -> Result<bool, ApiError> {
    let deleted = ctx.storage.delete_media(media_id).await.map_err(internal)?;
    Ok(deleted > 0)
}
