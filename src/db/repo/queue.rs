//! Durable evaluation queue: one entry per contract with a not-before time.

use crate::domain::{ContractId, TimeMs};
use sqlx::Row;

use super::{decode_err, uuid_col, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Scheduled,
    Running,
    Done,
    Failed,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Scheduled => "scheduled",
            QueueState::Running => "running",
            QueueState::Done => "done",
            QueueState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(QueueState::Scheduled),
            "running" => Some(QueueState::Running),
            "done" => Some(QueueState::Done),
            "failed" => Some(QueueState::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub contract_id: ContractId,
    pub not_before: TimeMs,
    pub state: QueueState,
    pub claimed_at: Option<TimeMs>,
    pub attempts: i64,
    pub last_error: Option<String>,
}

impl Repository {
    /// Schedule an evaluation. An existing entry is left untouched, so a
    /// committed not-before time is never moved.
    ///
    /// Returns true if a new entry was created.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn enqueue_evaluation(
        &self,
        contract_id: &ContractId,
        not_before: TimeMs,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO evaluation_queue (contract_id, not_before_ms, state, updated_at_ms)
            VALUES (?, ?, 'scheduled', ?)
            ON CONFLICT(contract_id) DO NOTHING
            "#,
        )
        .bind(contract_id.to_string())
        .bind(not_before.as_ms())
        .bind(now.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Claim up to `limit` due entries, moving them from `scheduled` to `running`.
    ///
    /// Each claim is a conditional update, so two workers never claim the same entry.
    ///
    /// # Errors
    /// Returns an error if a query fails.
    pub async fn claim_due_evaluations(
        &self,
        now: TimeMs,
        limit: i64,
    ) -> Result<Vec<ContractId>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT contract_id FROM evaluation_queue
            WHERE state = 'scheduled' AND not_before_ms <= ?
            ORDER BY not_before_ms ASC, contract_id ASC
            LIMIT ?
            "#,
        )
        .bind(now.as_ms())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in &rows {
            let contract_id = ContractId(uuid_col(row, "contract_id")?);
            let result = sqlx::query(
                r#"
                UPDATE evaluation_queue
                SET state = 'running', claimed_at_ms = ?, attempts = attempts + 1, updated_at_ms = ?
                WHERE contract_id = ? AND state = 'scheduled'
                "#,
            )
            .bind(now.as_ms())
            .bind(now.as_ms())
            .bind(contract_id.to_string())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                claimed.push(contract_id);
            }
        }

        Ok(claimed)
    }

    /// Close a running entry as `done` or `failed`.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn finish_evaluation(
        &self,
        contract_id: &ContractId,
        state: QueueState,
        error: Option<&str>,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE evaluation_queue SET state = ?, last_error = ?, updated_at_ms = ? WHERE contract_id = ?",
        )
        .bind(state.as_str())
        .bind(error)
        .bind(now.as_ms())
        .bind(contract_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Return entries whose claim is older than `lease_ms` to `scheduled`.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn release_stale_claims(&self, now: TimeMs, lease_ms: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE evaluation_queue
            SET state = 'scheduled', claimed_at_ms = NULL, updated_at_ms = ?
            WHERE state = 'running' AND claimed_at_ms < ?
            "#,
        )
        .bind(now.as_ms())
        .bind(now.as_ms().saturating_sub(lease_ms))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Pending contracts with no queue entry, with their pending-since time.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_unscheduled_pending(
        &self,
    ) -> Result<Vec<(ContractId, Option<TimeMs>)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.pending_at FROM contracts c
            WHERE c.status = 'pending'
              AND NOT EXISTS (SELECT 1 FROM evaluation_queue q WHERE q.contract_id = c.id)
            ORDER BY c.pending_at ASC, c.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok((
                    ContractId(uuid_col(row, "id")?),
                    row.try_get::<Option<i64>, _>("pending_at")?.map(TimeMs::new),
                ))
            })
            .collect()
    }

    /// Get the queue entry of a contract.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_queue_entry(
        &self,
        contract_id: &ContractId,
    ) -> Result<Option<QueueEntry>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT contract_id, not_before_ms, state, claimed_at_ms, attempts, last_error
            FROM evaluation_queue WHERE contract_id = ?
            "#,
        )
        .bind(contract_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let state_raw: String = row.try_get("state")?;
        Ok(Some(QueueEntry {
            contract_id: ContractId(uuid_col(&row, "contract_id")?),
            not_before: TimeMs::new(row.try_get("not_before_ms")?),
            state: QueueState::parse(&state_raw).ok_or_else(|| decode_err("state", &state_raw))?,
            claimed_at: row.try_get::<Option<i64>, _>("claimed_at_ms")?.map(TimeMs::new),
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
        }))
    }
}
