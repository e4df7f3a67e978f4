use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{fs, path::Path, str::FromStr};
use uuid::Uuid;

use shared::domain::{
    ConferenceId, ConferenceStatus, FeedbackId, MediaId, MediaType, RegistrationId, RequestId,
    RequestStatus, Role, SessionId, UserId,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredConference {
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

#[derive(Debug, Clone)]
pub struct StoredModerationRequest {
    pub request_id: RequestId,
    pub conference_id: ConferenceId,
    pub moderator_id: UserId,
    pub status: RequestStatus,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session_id: SessionId,
    pub conference_id: ConferenceId,
    pub room: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredRegistration {
    pub registration_id: RegistrationId,
    pub user_id: UserId,
    pub conference_id: ConferenceId,
    pub qr_code: String,
    pub attended: bool,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredFeedback {
    pub feedback_id: FeedbackId,
    pub registration_id: RegistrationId,
    pub rating: i64,
    pub comment: Option<String>,
    pub aspect_rated: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub media_id: MediaId,
    pub conference_id: ConferenceId,
    pub media_type: MediaType,
    pub url: String,
    pub title: String,
    pub filename: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Raw feedback aggregate for one conference. Presentation rounding happens
/// in the services layer.
#[derive(Debug, Clone, Default)]
pub struct FeedbackAggregate {
    pub avg_rating: Option<f64>,
    pub count: i64,
    pub per_rating: Vec<(i64, i64)>,
}

#[derive(Debug, Clone)]
pub struct StoredComment {
    pub rating: i64,
    pub comment: String,
    pub submitted_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // An in-memory database exists per connection; a second pooled
        // connection would see an empty schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id         BLOB PRIMARY KEY,
                username   TEXT NOT NULL UNIQUE,
                roles      TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS conferences (
                id           BLOB PRIMARY KEY,
                title        TEXT NOT NULL UNIQUE,
                description  TEXT NOT NULL,
                status       TEXT NOT NULL,
                presenter_id BLOB NOT NULL REFERENCES users(id),
                moderator_id BLOB REFERENCES users(id),
                scheduled_at TEXT,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS moderation_requests (
                id            BLOB PRIMARY KEY,
                conference_id BLOB NOT NULL REFERENCES conferences(id) ON DELETE CASCADE,
                moderator_id  BLOB NOT NULL REFERENCES users(id),
                status        TEXT NOT NULL,
                comments      TEXT,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id            BLOB PRIMARY KEY,
                conference_id BLOB NOT NULL REFERENCES conferences(id) ON DELETE CASCADE,
                room          TEXT NOT NULL,
                start_time    TEXT NOT NULL,
                end_time      TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS registrations (
                id            BLOB PRIMARY KEY,
                user_id       BLOB NOT NULL REFERENCES users(id),
                conference_id BLOB NOT NULL REFERENCES conferences(id) ON DELETE CASCADE,
                qr_code       TEXT NOT NULL,
                attended      INTEGER NOT NULL DEFAULT 0,
                registered_at TEXT NOT NULL,
                UNIQUE (user_id, conference_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id              BLOB PRIMARY KEY,
                registration_id BLOB NOT NULL UNIQUE REFERENCES registrations(id) ON DELETE CASCADE,
                rating          INTEGER NOT NULL,
                comment         TEXT,
                aspect_rated    TEXT,
                submitted_at    TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id            BLOB PRIMARY KEY,
                conference_id BLOB NOT NULL REFERENCES conferences(id) ON DELETE CASCADE,
                media_type    TEXT NOT NULL,
                url           TEXT NOT NULL,
                title         TEXT NOT NULL,
                filename      TEXT NOT NULL,
                file_size     INTEGER NOT NULL,
                uploaded_at   TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_sessions_room_time ON sessions (room, start_time, end_time)",
            "CREATE INDEX IF NOT EXISTS idx_requests_conference ON moderation_requests (conference_id)",
            "CREATE INDEX IF NOT EXISTS idx_registrations_conference ON registrations (conference_id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("failed to ensure schema")?;
        }
        Ok(())
    }

    // --- users ---

    pub async fn create_user(&self, username: &str, roles: &[Role]) -> Result<StoredUser> {
        let user_id = UserId::new();
        let now = Utc::now();
        sqlx::query("INSERT INTO users (id, username, roles, created_at) VALUES (?, ?, ?, ?)")
            .bind(user_id.0)
            .bind(username)
            .bind(encode_roles(roles))
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(StoredUser {
            user_id,
            username: username.to_string(),
            roles: roles.to_vec(),
            created_at: now,
        })
    }

    pub async fn user_by_id(&self, user_id: UserId) -> Result<Option<StoredUser>> {
        let row = sqlx::query("SELECT id, username, roles, created_at FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(map_user).transpose()
    }

    /// The moderator currently moderating the fewest conferences. Ties break
    /// on the smallest id so assignment is deterministic.
    pub async fn least_loaded_moderator(&self) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT u.id, u.username, u.roles, u.created_at
             FROM users u
             LEFT JOIN conferences c ON c.moderator_id = u.id
             WHERE u.roles LIKE '%moderator%'
             GROUP BY u.id, u.username, u.roles, u.created_at
             ORDER BY COUNT(c.id) ASC, u.id ASC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_user).transpose()
    }

    // --- conferences ---

    pub async fn create_conference(
        &self,
        title: &str,
        description: &str,
        presenter_id: UserId,
        moderator_id: Option<UserId>,
    ) -> Result<StoredConference> {
        let conference_id = ConferenceId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO conferences
             (id, title, description, status, presenter_id, moderator_id, scheduled_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(conference_id.0)
        .bind(title)
        .bind(description)
        .bind(ConferenceStatus::Submitted.as_str())
        .bind(presenter_id.0)
        .bind(moderator_id.map(|id| id.0))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(StoredConference {
            conference_id,
            title: title.to_string(),
            description: description.to_string(),
            status: ConferenceStatus::Submitted,
            presenter_id,
            moderator_id,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn conference_by_id(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Option<StoredConference>> {
        let row = sqlx::query(&format!(
            "{CONFERENCE_COLUMNS} FROM conferences WHERE id = ?"
        ))
        .bind(conference_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_conference).transpose()
    }

    pub async fn conference_by_title(&self, title: &str) -> Result<Option<StoredConference>> {
        let row = sqlx::query(&format!(
            "{CONFERENCE_COLUMNS} FROM conferences WHERE title = ?"
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_conference).transpose()
    }

    pub async fn list_conferences(&self) -> Result<Vec<StoredConference>> {
        let rows = sqlx::query(&format!(
            "{CONFERENCE_COLUMNS} FROM conferences ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_conference).collect()
    }

    pub async fn conferences_by_status(
        &self,
        status: ConferenceStatus,
    ) -> Result<Vec<StoredConference>> {
        let rows = sqlx::query(&format!(
            "{CONFERENCE_COLUMNS} FROM conferences WHERE status = ? ORDER BY created_at DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_conference).collect()
    }

    /// Scheduled conferences whose date falls inside [from, to], ordered by
    /// date. Feeds the reminder and feedback-request batch reads.
    pub async fn scheduled_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredConference>> {
        let rows = sqlx::query(&format!(
            "{CONFERENCE_COLUMNS} FROM conferences
             WHERE status = 'scheduled' AND scheduled_at IS NOT NULL
               AND scheduled_at >= ? AND scheduled_at <= ?
             ORDER BY scheduled_at ASC"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_conference).collect()
    }

    pub async fn upcoming_conferences(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StoredConference>> {
        let rows = sqlx::query(&format!(
            "{CONFERENCE_COLUMNS} FROM conferences
             WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at >= ?
             ORDER BY scheduled_at ASC
             LIMIT ?"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_conference).collect()
    }

    pub async fn count_conferences(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conferences")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn update_conference_status(
        &self,
        conference_id: ConferenceId,
        status: ConferenceStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE conferences SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(conference_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_conference_schedule(
        &self,
        conference_id: ConferenceId,
        scheduled_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE conferences SET scheduled_at = ?, updated_at = ? WHERE id = ?")
            .bind(scheduled_at)
            .bind(Utc::now())
            .bind(conference_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn assign_moderator(
        &self,
        conference_id: ConferenceId,
        moderator_id: UserId,
    ) -> Result<()> {
        sqlx::query("UPDATE conferences SET moderator_id = ?, updated_at = ? WHERE id = ?")
            .bind(moderator_id.0)
            .bind(Utc::now())
            .bind(conference_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Status change plus cleanup of the conference's moderation requests in
    /// one transaction, so a scheduled conference can never keep a live
    /// request behind.
    pub async fn update_status_and_clear_requests(
        &self,
        conference_id: ConferenceId,
        status: ConferenceStatus,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE conferences SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(conference_id.0)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM moderation_requests WHERE conference_id = ?")
            .bind(conference_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted)
    }

    pub async fn delete_conference(&self, conference_id: ConferenceId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM conferences WHERE id = ?")
            .bind(conference_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // --- moderation requests ---

    pub async fn create_moderation_request(
        &self,
        conference_id: ConferenceId,
        moderator_id: UserId,
    ) -> Result<StoredModerationRequest> {
        let request_id = RequestId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO moderation_requests
             (id, conference_id, moderator_id, status, comments, created_at, updated_at)
             VALUES (?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(request_id.0)
        .bind(conference_id.0)
        .bind(moderator_id.0)
        .bind(RequestStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(StoredModerationRequest {
            request_id,
            conference_id,
            moderator_id,
            status: RequestStatus::Pending,
            comments: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn request_by_id(
        &self,
        request_id: RequestId,
    ) -> Result<Option<StoredModerationRequest>> {
        let row = sqlx::query(&format!(
            "{REQUEST_COLUMNS} FROM moderation_requests WHERE id = ?"
        ))
        .bind(request_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_request).transpose()
    }

    pub async fn pending_request_for_conference(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Option<StoredModerationRequest>> {
        let row = sqlx::query(&format!(
            "{REQUEST_COLUMNS} FROM moderation_requests
             WHERE conference_id = ? AND status = 'pending'
             ORDER BY created_at ASC
             LIMIT 1"
        ))
        .bind(conference_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_request).transpose()
    }

    pub async fn pending_requests_for_moderator(
        &self,
        moderator_id: UserId,
    ) -> Result<Vec<StoredModerationRequest>> {
        let rows = sqlx::query(&format!(
            "{REQUEST_COLUMNS} FROM moderation_requests
             WHERE moderator_id = ? AND status = 'pending'
             ORDER BY created_at ASC"
        ))
        .bind(moderator_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_request).collect()
    }

    pub async fn delete_request(&self, request_id: RequestId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM moderation_requests WHERE id = ?")
            .bind(request_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // --- sessions ---

    /// Insert a session only if no session in the same room overlaps the
    /// half-open interval [start, end). The overlap check and the insert are
    /// a single statement, so concurrent writers cannot both pass the check.
    pub async fn insert_session_if_free(
        &self,
        conference_id: ConferenceId,
        room: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Option<StoredSession>> {
        let session_id = SessionId::new();
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO sessions (id, conference_id, room, start_time, end_time, created_at, updated_at)
             SELECT ?, ?, ?, ?, ?, ?, ?
             WHERE NOT EXISTS (
                 SELECT 1 FROM sessions
                 WHERE room = ? AND start_time < ? AND end_time > ?
             )
             RETURNING id",
        )
        .bind(session_id.0)
        .bind(conference_id.0)
        .bind(room)
        .bind(start_time)
        .bind(end_time)
        .bind(now)
        .bind(now)
        .bind(room)
        .bind(end_time)
        .bind(start_time)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|_| StoredSession {
            session_id,
            conference_id,
            room: room.to_string(),
            start_time,
            end_time,
            created_at: now,
            updated_at: now,
        }))
    }

    /// Move a session, ignoring itself in the overlap check. Returns false
    /// when the target slot conflicts or the session does not exist.
    pub async fn update_session_if_free(
        &self,
        session_id: SessionId,
        room: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sessions
             SET room = ?, start_time = ?, end_time = ?, updated_at = ?
             WHERE id = ?
               AND NOT EXISTS (
                   SELECT 1 FROM sessions other
                   WHERE other.room = ? AND other.id != ?
                     AND other.start_time < ? AND other.end_time > ?
               )",
        )
        .bind(room)
        .bind(start_time)
        .bind(end_time)
        .bind(Utc::now())
        .bind(session_id.0)
        .bind(room)
        .bind(session_id.0)
        .bind(end_time)
        .bind(start_time)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sessions in `room` overlapping [start, end); touching endpoints do not
    /// overlap. `exclude` ignores the session being updated.
    pub async fn find_conflicting(
        &self,
        room: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude: Option<SessionId>,
    ) -> Result<Vec<StoredSession>> {
        let rows = match exclude {
            Some(session_id) => {
                sqlx::query(&format!(
                    "{SESSION_COLUMNS} FROM sessions
                     WHERE room = ? AND start_time < ? AND end_time > ? AND id != ?
                     ORDER BY start_time ASC"
                ))
                .bind(room)
                .bind(end_time)
                .bind(start_time)
                .bind(session_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{SESSION_COLUMNS} FROM sessions
                     WHERE room = ? AND start_time < ? AND end_time > ?
                     ORDER BY start_time ASC"
                ))
                .bind(room)
                .bind(end_time)
                .bind(start_time)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(map_session).collect()
    }

    /// Rooms holding at least one session overlapping [start, end).
    pub async fn occupied_rooms(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT room FROM sessions WHERE start_time < ? AND end_time > ?",
        )
        .bind(end_time)
        .bind(start_time)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>(0))
            .collect())
    }

    pub async fn session_by_id(&self, session_id: SessionId) -> Result<Option<StoredSession>> {
        let row = sqlx::query(&format!("{SESSION_COLUMNS} FROM sessions WHERE id = ?"))
            .bind(session_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(map_session).transpose()
    }

    pub async fn sessions_for_conference(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Vec<StoredSession>> {
        let rows = sqlx::query(&format!(
            "{SESSION_COLUMNS} FROM sessions WHERE conference_id = ? ORDER BY start_time ASC"
        ))
        .bind(conference_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_session).collect()
    }

    pub async fn delete_session(&self, session_id: SessionId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // --- registrations ---

    /// Insert a registration; the UNIQUE(user_id, conference_id) constraint
    /// backstops concurrent duplicates. Returns None when the pair already
    /// exists.
    pub async fn insert_registration(
        &self,
        registration_id: RegistrationId,
        user_id: UserId,
        conference_id: ConferenceId,
        qr_code: &str,
        registered_at: DateTime<Utc>,
    ) -> Result<Option<StoredRegistration>> {
        let row = sqlx::query(
            "INSERT INTO registrations (id, user_id, conference_id, qr_code, attended, registered_at)
             VALUES (?, ?, ?, ?, 0, ?)
             ON CONFLICT (user_id, conference_id) DO NOTHING
             RETURNING id",
        )
        .bind(registration_id.0)
        .bind(user_id.0)
        .bind(conference_id.0)
        .bind(qr_code)
        .bind(registered_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|_| StoredRegistration {
            registration_id,
            user_id,
            conference_id,
            qr_code: qr_code.to_string(),
            attended: false,
            registered_at,
        }))
    }

    pub async fn registration_by_id(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Option<StoredRegistration>> {
        let row = sqlx::query(&format!(
            "{REGISTRATION_COLUMNS} FROM registrations WHERE id = ?"
        ))
        .bind(registration_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_registration).transpose()
    }

    pub async fn registration_by_user_and_conference(
        &self,
        user_id: UserId,
        conference_id: ConferenceId,
    ) -> Result<Option<StoredRegistration>> {
        let row = sqlx::query(&format!(
            "{REGISTRATION_COLUMNS} FROM registrations WHERE user_id = ? AND conference_id = ?"
        ))
        .bind(user_id.0)
        .bind(conference_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_registration).transpose()
    }

    pub async fn registration_by_qr_code(
        &self,
        qr_code: &str,
    ) -> Result<Option<StoredRegistration>> {
        let row = sqlx::query(&format!(
            "{REGISTRATION_COLUMNS} FROM registrations WHERE qr_code = ?"
        ))
        .bind(qr_code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_registration).transpose()
    }

    pub async fn registrations_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<StoredRegistration>> {
        let rows = sqlx::query(&format!(
            "{REGISTRATION_COLUMNS} FROM registrations WHERE user_id = ? ORDER BY registered_at DESC"
        ))
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_registration).collect()
    }

    pub async fn registrations_for_conference(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Vec<StoredRegistration>> {
        let rows = sqlx::query(&format!(
            "{REGISTRATION_COLUMNS} FROM registrations WHERE conference_id = ? ORDER BY registered_at ASC"
        ))
        .bind(conference_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_registration).collect()
    }

    pub async fn attendees_for_conference(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Vec<StoredRegistration>> {
        let rows = sqlx::query(&format!(
            "{REGISTRATION_COLUMNS} FROM registrations
             WHERE conference_id = ? AND attended = 1
             ORDER BY registered_at ASC"
        ))
        .bind(conference_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_registration).collect()
    }

    /// Delete only while unattended; an attended registration stays put.
    pub async fn delete_registration_if_unattended(
        &self,
        registration_id: RegistrationId,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM registrations WHERE id = ? AND attended = 0")
            .bind(registration_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip attended exactly once; a second check-in affects no rows.
    pub async fn mark_attended(&self, registration_id: RegistrationId) -> Result<bool> {
        let result = sqlx::query("UPDATE registrations SET attended = 1 WHERE id = ? AND attended = 0")
            .bind(registration_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_registrations_for_conference(
        &self,
        conference_id: ConferenceId,
    ) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE conference_id = ?")
                .bind(conference_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn count_attendees_for_conference(
        &self,
        conference_id: ConferenceId,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE conference_id = ? AND attended = 1",
        )
        .bind(conference_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn count_registrations(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registrations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- feedback ---

    /// One feedback per registration; the UNIQUE constraint backstops
    /// duplicates. Returns None when feedback already exists.
    pub async fn insert_feedback(
        &self,
        registration_id: RegistrationId,
        rating: i64,
        comment: Option<&str>,
        aspect_rated: Option<&str>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Option<StoredFeedback>> {
        let feedback_id = FeedbackId::new();
        let row = sqlx::query(
            "INSERT INTO feedback (id, registration_id, rating, comment, aspect_rated, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (registration_id) DO NOTHING
             RETURNING id",
        )
        .bind(feedback_id.0)
        .bind(registration_id.0)
        .bind(rating)
        .bind(comment)
        .bind(aspect_rated)
        .bind(submitted_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|_| StoredFeedback {
            feedback_id,
            registration_id,
            rating,
            comment: comment.map(str::to_string),
            aspect_rated: aspect_rated.map(str::to_string),
            submitted_at,
        }))
    }

    pub async fn feedback_for_registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Option<StoredFeedback>> {
        let row = sqlx::query(&format!(
            "{FEEDBACK_COLUMNS} FROM feedback WHERE registration_id = ?"
        ))
        .bind(registration_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(map_feedback).transpose()
    }

    pub async fn feedback_aggregate(
        &self,
        conference_id: ConferenceId,
    ) -> Result<FeedbackAggregate> {
        let summary = sqlx::query(
            "SELECT AVG(f.rating) AS avg_rating, COUNT(f.id) AS count
             FROM feedback f
             INNER JOIN registrations r ON f.registration_id = r.id
             WHERE r.conference_id = ?",
        )
        .bind(conference_id.0)
        .fetch_one(&self.pool)
        .await?;

        let per_rating = sqlx::query(
            "SELECT f.rating, COUNT(f.id) AS count
             FROM feedback f
             INNER JOIN registrations r ON f.registration_id = r.id
             WHERE r.conference_id = ?
             GROUP BY f.rating
             ORDER BY f.rating ASC",
        )
        .bind(conference_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(FeedbackAggregate {
            avg_rating: summary.try_get("avg_rating")?,
            count: summary.try_get("count")?,
            per_rating: per_rating
                .into_iter()
                .map(|row| {
                    Ok((
                        row.try_get::<i64, _>("rating")?,
                        row.try_get::<i64, _>("count")?,
                    ))
                })
                .collect::<Result<Vec<_>>>()?,
        })
    }

    pub async fn latest_comments(
        &self,
        conference_id: ConferenceId,
        limit: i64,
    ) -> Result<Vec<StoredComment>> {
        let rows = sqlx::query(
            "SELECT f.rating, f.comment, f.submitted_at
             FROM feedback f
             INNER JOIN registrations r ON f.registration_id = r.id
             WHERE r.conference_id = ? AND f.comment IS NOT NULL AND f.comment != ''
             ORDER BY f.submitted_at DESC
             LIMIT ?",
        )
        .bind(conference_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StoredComment {
                    rating: row.try_get("rating")?,
                    comment: row.try_get("comment")?,
                    submitted_at: row.try_get("submitted_at")?,
                })
            })
            .collect()
    }

    // --- media ---

    pub async fn insert_media(
        &self,
        conference_id: ConferenceId,
        media_type: MediaType,
        url: &str,
        title: &str,
        filename: &str,
        file_size: i64,
    ) -> Result<StoredMedia> {
        let media_id = MediaId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO media (id, conference_id, media_type, url, title, filename, file_size, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(media_id.0)
        .bind(conference_id.0)
        .bind(media_type.as_str())
        .bind(url)
        .bind(title)
        .bind(filename)
        .bind(file_size)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(StoredMedia {
            media_id,
            conference_id,
            media_type,
            url: url.to_string(),
            title: title.to_string(),
            filename: filename.to_string(),
            file_size,
            uploaded_at: now,
        })
    }

    pub async fn media_for_conference(
        &self,
        conference_id: ConferenceId,
    ) -> Result<Vec<StoredMedia>> {
        let rows = sqlx::query(&format!(
            "{MEDIA_COLUMNS} FROM media WHERE conference_id = ? ORDER BY uploaded_at DESC"
        ))
        .bind(conference_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(map_media).collect()
    }

    pub async fn delete_media(&self, media_id: MediaId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM media WHERE id = ?")
            .bind(media_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

const CONFERENCE_COLUMNS: &str = "SELECT id, title, description, status, presenter_id, \
     moderator_id, scheduled_at, created_at, updated_at";
const REQUEST_COLUMNS: &str =
    "SELECT id, conference_id, moderator_id, status, comments, created_at, updated_at";
const SESSION_COLUMNS: &str =
    "SELECT id, conference_id, room, start_time, end_time, created_at, updated_at";
const REGISTRATION_COLUMNS: &str =
    "SELECT id, user_id, conference_id, qr_code, attended, registered_at";
const FEEDBACK_COLUMNS: &str =
    "SELECT id, registration_id, rating, comment, aspect_rated, submitted_at";
const MEDIA_COLUMNS: &str =
    "SELECT id, conference_id, media_type, url, title, filename, file_size, uploaded_at";

fn encode_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_roles(raw: &str) -> Result<Vec<Role>> {
    raw.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| Role::parse(part).map_err(Into::into))
        .collect()
}

fn map_user(row: SqliteRow) -> Result<StoredUser> {
    Ok(StoredUser {
        user_id: UserId(row.try_get::<Uuid, _>("id")?),
        username: row.try_get("username")?,
        roles: decode_roles(&row.try_get::<String, _>("roles")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_conference(row: SqliteRow) -> Result<StoredConference> {
    Ok(StoredConference {
        conference_id: ConferenceId(row.try_get::<Uuid, _>("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: ConferenceStatus::parse(&row.try_get::<String, _>("status")?)?,
        presenter_id: UserId(row.try_get::<Uuid, _>("presenter_id")?),
        moderator_id: row.try_get::<Option<Uuid>, _>("moderator_id")?.map(UserId),
        scheduled_at: row.try_get("scheduled_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_request(row: SqliteRow) -> Result<StoredModerationRequest> {
    Ok(StoredModerationRequest {
        request_id: RequestId(row.try_get::<Uuid, _>("id")?),
        conference_id: ConferenceId(row.try_get::<Uuid, _>("conference_id")?),
        moderator_id: UserId(row.try_get::<Uuid, _>("moderator_id")?),
        status: RequestStatus::parse(&row.try_get::<String, _>("status")?)?,
        comments: row.try_get("comments")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_session(row: SqliteRow) -> Result<StoredSession> {
    Ok(StoredSession {
        session_id: SessionId(row.try_get::<Uuid, _>("id")?),
        conference_id: ConferenceId(row.try_get::<Uuid, _>("conference_id")?),
        room: row.try_get("room")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_registration(row: SqliteRow) -> Result<StoredRegistration> {
    Ok(StoredRegistration {
        registration_id: RegistrationId(row.try_get::<Uuid, _>("id")?),
        user_id: UserId(row.try_get::<Uuid, _>("user_id")?),
        conference_id: ConferenceId(row.try_get::<Uuid, _>("conference_id")?),
        qr_code: row.try_get("qr_code")?,
        attended: row.try_get("attended")?,
        registered_at: row.try_get("registered_at")?,
    })
}

fn map_feedback(row: SqliteRow) -> Result<StoredFeedback> {
    Ok(StoredFeedback {
        feedback_id: FeedbackId(row.try_get::<Uuid, _>("id")?),
        registration_id: RegistrationId(row.try_get::<Uuid, _>("registration_id")?),
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
        aspect_rated: row.try_get("aspect_rated")?,
        submitted_at: row.try_get("submitted_at")?,
    })
}

fn map_media(row: SqliteRow) -> Result<StoredMedia> {
    Ok(StoredMedia {
        media_id: MediaId(row.try_get::<Uuid, _>("id")?),
        conference_id: ConferenceId(row.try_get::<Uuid, _>("conference_id")?),
        media_type: MediaType::parse(&row.try_get::<String, _>("media_type")?)?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        filename: row.try_get("filename")?,
        file_size: row.try_get("file_size")?,
        uploaded_at: row.try_get("uploaded_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    if path.contains(":memory:") || path.is_empty() {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {parent:?}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
