//! Staff user repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use liveshop_core::{Email, StaffRole, StaffUserId};

use super::{RepositoryError, parse_column};
use crate::models::StaffUser;

/// Internal row type for staff user queries.
#[derive(Debug, sqlx::FromRow)]
struct StaffUserRow {
    id: i32,
    email: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StaffUserRow> for StaffUser {
    type Error = RepositoryError;

    fn try_from(row: StaffUserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: StaffUserId::new(row.id),
            email,
            name: row.name,
            role: parse_column(&row.role, "staff role")?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row with the password hash, used only for login.
#[derive(Debug, sqlx::FromRow)]
struct StaffCredentialRow {
    #[sqlx(flatten)]
    user: StaffUserRow,
    password_hash: String,
}

const STAFF_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

/// Repository for staff user database operations.
pub struct StaffUserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StaffUserRepository<'a> {
    /// Create a new staff user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all staff users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<StaffUser>, RepositoryError> {
        let rows = sqlx::query_as::<_, StaffUserRow>(&format!(
            "SELECT {STAFF_COLUMNS} FROM liveshop.staff_user ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a staff user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(StaffUser, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, StaffCredentialRow>(&format!(
            "SELECT {STAFF_COLUMNS}, password_hash FROM liveshop.staff_user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((r.user.try_into()?, r.password_hash)))
            .transpose()
    }

    /// Create a staff user with an already-hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        role: StaffRole,
        password_hash: &str,
    ) -> Result<StaffUser, RepositoryError> {
        let row = sqlx::query_as::<_, StaffUserRow>(&format!(
            r"
            INSERT INTO liveshop.staff_user (email, name, role, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {STAFF_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(name)
        .bind(role.as_str())
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_or(e, "email already exists"))?;

        row.try_into()
    }

    /// Replace a staff user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_password_hash(
        &self,
        id: StaffUserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE liveshop.staff_user SET password_hash = $1, updated_at = now() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
