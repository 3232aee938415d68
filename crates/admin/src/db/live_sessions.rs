//! Live session and phase repository.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use liveshop_core::{LivePhaseId, LiveSessionId, LiveSessionStatus};

use super::{RepositoryError, parse_column};
use crate::models::live::phase_slots;
use crate::models::{LivePhase, LiveSession, LiveSessionDetail};

#[derive(Debug, sqlx::FromRow)]
struct LiveSessionRow {
    id: i32,
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LiveSessionRow> for LiveSession {
    type Error = RepositoryError;

    fn try_from(row: LiveSessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: LiveSessionId::new(row.id),
            name: row.name,
            start_date: row.start_date,
            end_date: row.end_date,
            status: parse_column(&row.status, "live session status")?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LivePhaseRow {
    id: i32,
    session_id: i32,
    phase_date: NaiveDate,
    kind: String,
    facebook_video_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LivePhaseRow> for LivePhase {
    type Error = RepositoryError;

    fn try_from(row: LivePhaseRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: LivePhaseId::new(row.id),
            session_id: LiveSessionId::new(row.session_id),
            phase_date: row.phase_date,
            kind: parse_column(&row.kind, "phase kind")?,
            facebook_video_id: row.facebook_video_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SESSION_COLUMNS: &str =
    "id, name, start_date, end_date, status, notes, created_at, updated_at";
const PHASE_COLUMNS: &str =
    "id, session_id, phase_date, kind, facebook_video_id, created_at, updated_at";

/// Repository for live sessions and their phases.
pub struct LiveSessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LiveSessionRepository<'a> {
    /// Create a new live session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a session and one morning and one afternoon phase per day.
    ///
    /// Runs in a single transaction so a session never exists without its
    /// phases. Callers validate `end_date >= start_date` first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create_with_phases(
        &self,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<LiveSessionDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let session: LiveSession = sqlx::query_as::<_, LiveSessionRow>(&format!(
            r"
            INSERT INTO liveshop.live_session (name, start_date, end_date, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING {SESSION_COLUMNS}
            "
        ))
        .bind(name.trim())
        .bind(start_date)
        .bind(end_date)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        let mut phases = Vec::new();
        for (date, kind) in phase_slots(start_date, end_date) {
            let phase: LivePhase = sqlx::query_as::<_, LivePhaseRow>(&format!(
                r"
                INSERT INTO liveshop.live_phase (session_id, phase_date, kind)
                VALUES ($1, $2, $3)
                RETURNING {PHASE_COLUMNS}
                "
            ))
            .bind(session.id.as_i32())
            .bind(date)
            .bind(kind.as_str())
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;
            phases.push(phase);
        }

        tx.commit().await?;

        Ok(LiveSessionDetail { session, phases })
    }

    /// List sessions, most recent start date first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<LiveSession>, RepositoryError> {
        let rows = sqlx::query_as::<_, LiveSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM liveshop.live_session ORDER BY start_date DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a session with its phases in date order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_detail(
        &self,
        id: LiveSessionId,
    ) -> Result<Option<LiveSessionDetail>, RepositoryError> {
        let Some(row) = sqlx::query_as::<_, LiveSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM liveshop.live_session WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let phases = sqlx::query_as::<_, LivePhaseRow>(&format!(
            r"
            SELECT {PHASE_COLUMNS} FROM liveshop.live_phase
            WHERE session_id = $1
            ORDER BY phase_date, CASE kind WHEN 'morning' THEN 0 ELSE 1 END
            "
        ))
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(LiveSessionDetail {
            session: row.try_into()?,
            phases,
        }))
    }

    /// Update a session's name, status and notes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session doesn't exist.
    pub async fn update(
        &self,
        id: LiveSessionId,
        name: &str,
        status: LiveSessionStatus,
        notes: Option<&str>,
    ) -> Result<LiveSession, RepositoryError> {
        sqlx::query_as::<_, LiveSessionRow>(&format!(
            r"
            UPDATE liveshop.live_session
            SET name = $2, status = $3, notes = $4, updated_at = now()
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(name.trim())
        .bind(status.as_str())
        .bind(notes)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Delete a session together with its phases, products and orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session doesn't exist.
    pub async fn delete(&self, id: LiveSessionId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Orders reference products with RESTRICT, so they go first.
        sqlx::query(
            r"
            DELETE FROM liveshop.live_order
            WHERE phase_id IN (SELECT id FROM liveshop.live_phase WHERE session_id = $1)
            ",
        )
        .bind(id.as_i32())
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM liveshop.live_session WHERE id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a phase by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_phase(&self, id: LivePhaseId) -> Result<Option<LivePhase>, RepositoryError> {
        let row = sqlx::query_as::<_, LivePhaseRow>(&format!(
            "SELECT {PHASE_COLUMNS} FROM liveshop.live_phase WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Attach (`Some`) or detach (`None`) the Facebook video of a phase.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the phase doesn't exist.
    pub async fn set_phase_video(
        &self,
        id: LivePhaseId,
        video_id: Option<&str>,
    ) -> Result<LivePhase, RepositoryError> {
        sqlx::query_as::<_, LivePhaseRow>(&format!(
            r"
            UPDATE liveshop.live_phase SET facebook_video_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING {PHASE_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(video_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Phases streaming a given Facebook video.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn phases_for_video(
        &self,
        video_id: &str,
    ) -> Result<Vec<LivePhase>, RepositoryError> {
        sqlx::query_as::<_, LivePhaseRow>(&format!(
            "SELECT {PHASE_COLUMNS} FROM liveshop.live_phase WHERE facebook_video_id = $1"
        ))
        .bind(video_id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
    }
}
