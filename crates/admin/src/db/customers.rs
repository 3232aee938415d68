//! Customer repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use liveshop_core::{CustomerId, CustomerStatus, Phone};

use super::{RepositoryError, parse_column};
use crate::models::{Customer, CustomerFields, CustomerFilter, NewCustomer};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    name: String,
    phone: Option<String>,
    facebook_id: Option<String>,
    address: Option<String>,
    status: String,
    info_complete: bool,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let phone = row
            .phone
            .as_deref()
            .map(Phone::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
            })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            name: row.name,
            phone,
            facebook_id: row.facebook_id,
            address: row.address,
            status: parse_column(&row.status, "customer status")?,
            info_complete: row.info_complete,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CUSTOMER_COLUMNS: &str = "id, name, phone, facebook_id, address, status, info_complete, \
                                notes, created_at, updated_at";

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the Facebook ID is already taken.
    pub async fn create(&self, customer: &NewCustomer) -> Result<Customer, RepositoryError> {
        let fields = &customer.fields;
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO liveshop.customer (name, phone, facebook_id, address, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(fields.name.trim())
        .bind(fields.phone.as_ref().map(Phone::as_str))
        .bind(customer.facebook_id.as_deref())
        .bind(fields.address.as_deref())
        .bind(customer.status.as_str())
        .bind(fields.notes.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_or(e, "facebook id already linked to a customer"))?;

        row.try_into()
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM liveshop.customer WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List customers matching a filter, most recently updated first.
    ///
    /// The search term matches the name case-insensitively, or the phone when
    /// it contains digits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, RepositoryError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let digits = search
            .map(|s| s.chars().filter(char::is_ascii_digit).collect::<String>())
            .filter(|d| !d.is_empty());

        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS}
            FROM liveshop.customer
            WHERE ($1::text IS NULL
                   OR strpos(lower(name), lower($1)) > 0
                   OR ($2::text IS NOT NULL AND strpos(phone, $2) > 0))
              AND ($3::text IS NULL OR status = $3)
            ORDER BY updated_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(search)
        .bind(digits)
        .bind(filter.status.map(CustomerStatus::as_str))
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Replace a customer's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer doesn't exist.
    pub async fn update(
        &self,
        id: CustomerId,
        fields: &CustomerFields,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE liveshop.customer
            SET name = $2, phone = $3, address = $4, notes = $5, updated_at = now()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(fields.name.trim())
        .bind(fields.phone.as_ref().map(Phone::as_str))
        .bind(fields.address.as_deref())
        .bind(fields.notes.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Change a customer's status tag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer doesn't exist.
    pub async fn set_status(
        &self,
        id: CustomerId,
        status: CustomerStatus,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE liveshop.customer SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(status.as_str())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a customer. Their orders keep existing without a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer doesn't exist.
    pub async fn delete(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM liveshop.customer WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Insert or refresh the customer behind a Facebook commenter.
    ///
    /// The display name always follows Facebook. A phone is only stored when
    /// the existing row has none, so a number staff typed in is never
    /// overwritten by one guessed from a comment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_by_facebook_id(
        &self,
        facebook_id: &str,
        name: &str,
        phone: Option<&Phone>,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            INSERT INTO liveshop.customer (name, phone, facebook_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (facebook_id) DO UPDATE
            SET name = EXCLUDED.name,
                phone = COALESCE(customer.phone, EXCLUDED.phone),
                updated_at = now()
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(name.trim())
        .bind(phone.map(Phone::as_str))
        .bind(facebook_id)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Statuses of the customers behind the given Facebook IDs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn statuses_by_facebook_id(
        &self,
        facebook_ids: &[String],
    ) -> Result<HashMap<String, CustomerStatus>, RepositoryError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"
            SELECT facebook_id, status FROM liveshop.customer
            WHERE facebook_id = ANY($1)
            ",
        )
        .bind(facebook_ids)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, status)| Ok((id, parse_column(&status, "customer status")?)))
            .collect()
    }
}
