//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `catalog.rs` - Loan types, terms, products and document types
//! - `contracts.rs` - Contract lifecycle and the capacity/quota counters
//! - `documents.rs` - Per-contract document records
//! - `loans.rs` - Loans and installment payments
//! - `queue.rs` - Durable deferred evaluations

mod catalog;
mod contracts;
mod documents;
mod loans;
mod queue;

pub use contracts::ConsentUpdate;
pub use queue::{QueueEntry, QueueState};

use crate::domain::{Decimal, SponsorEligibility, TimeMs, User, UserId};
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // User operations
    // =========================================================================

    /// Insert or update a user account.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_user(&self, user: &User) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, sponsor_eligibility, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                sponsor_eligibility = excluded.sponsor_eligibility
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.name)
        .bind(user.email.as_deref())
        .bind(user.sponsor_eligibility.as_str())
        .bind(TimeMs::now().as_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a user by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, name, email, sponsor_eligibility FROM users WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| User {
            id: UserId::new(r.get::<String, _>("id")),
            name: r.get("name"),
            email: r.get("email"),
            sponsor_eligibility: SponsorEligibility::parse(&r.get::<String, _>("sponsor_eligibility")),
        }))
    }
}

pub(crate) fn decode_err(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("invalid value for {}: {:?}", column, value).into())
}

pub(crate) fn decimal_col(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|_| decode_err(column, &raw))
}

pub(crate) fn uuid_col(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Uuid, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|_| decode_err(column, &raw))
}

pub(crate) fn date_col(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<NaiveDate, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| decode_err(column, &raw))
}

pub(crate) fn months_col(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<u32, sqlx::Error> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| decode_err(column, &raw.to_string()))
}
