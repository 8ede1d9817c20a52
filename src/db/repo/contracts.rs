//! Contract lifecycle operations and the counters the evaluator re-checks.
//!
//! Status changes are conditional updates on the expected current status so
//! that racing writers cannot both win.

use crate::domain::{
    Contract, ContractId, ContractStatus, DocumentRecord, EmploymentStatus, Loan, LoanId,
    Payment, PriorityClass, SponsorConsent, TimeMs, UserId,
};
use crate::engine::PriorityInput;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decimal_col, decode_err, months_col, uuid_col, Repository};

/// Consent transition persisted by `apply_consent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentUpdate<'a> {
    pub expected: SponsorConsent,
    pub next: SponsorConsent,
    pub status: ContractStatus,
    pub pending_at: Option<TimeMs>,
    pub rejection_reason: Option<&'a str>,
}

const CONTRACT_COLUMNS: &str = r#"
    id, borrower_id, sponsor1_id, sponsor2_id, product_id, loan_type_id, amount,
    term_months, employment_status, status, consent, rejection_reason, priority_weight,
    created_at, pending_at, approved_at, loan_id
"#;

fn contract_from_row(row: &SqliteRow) -> Result<Contract, sqlx::Error> {
    let status_raw: String = row.try_get("status")?;
    let consent_raw: String = row.try_get("consent")?;
    let employment_raw: String = row.try_get("employment_status")?;
    let loan_id: Option<String> = row.try_get("loan_id")?;

    Ok(Contract {
        id: ContractId(uuid_col(row, "id")?),
        borrower_id: UserId::new(row.try_get::<String, _>("borrower_id")?),
        sponsor1_id: UserId::new(row.try_get::<String, _>("sponsor1_id")?),
        sponsor2_id: UserId::new(row.try_get::<String, _>("sponsor2_id")?),
        product_id: row.try_get("product_id")?,
        loan_type_id: row.try_get("loan_type_id")?,
        amount: decimal_col(row, "amount")?,
        term_months: months_col(row, "term_months")?,
        employment_status: EmploymentStatus::parse(&employment_raw)
            .ok_or_else(|| decode_err("employment_status", &employment_raw))?,
        status: ContractStatus::parse(&status_raw).ok_or_else(|| decode_err("status", &status_raw))?,
        consent: SponsorConsent::parse(&consent_raw)
            .ok_or_else(|| decode_err("consent", &consent_raw))?,
        rejection_reason: row.try_get("rejection_reason")?,
        priority_weight: row.try_get("priority_weight")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        pending_at: row.try_get::<Option<i64>, _>("pending_at")?.map(TimeMs::new),
        approved_at: row.try_get::<Option<i64>, _>("approved_at")?.map(TimeMs::new),
        loan_id: loan_id
            .map(|raw| {
                uuid::Uuid::parse_str(&raw)
                    .map(LoanId)
                    .map_err(|_| decode_err("loan_id", &raw))
            })
            .transpose()?,
    })
}

fn priority_input_from_row(row: &SqliteRow) -> Result<PriorityInput, sqlx::Error> {
    Ok(PriorityInput {
        contract_id: ContractId(uuid_col(row, "id")?),
        priority_class: PriorityClass::parse(&row.try_get::<String, _>("priority_class")?),
        borrower_prior_approved: row.try_get("prior_approved")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

const PRIORITY_INPUT_SQL: &str = r#"
    SELECT c.id, c.created_at, lt.priority_class,
           (SELECT COUNT(*) FROM contracts p
            WHERE p.borrower_id = c.borrower_id AND p.status = 'approved') AS prior_approved
    FROM contracts c
    JOIN loan_types lt ON lt.id = c.loan_type_id
"#;

impl Repository {
    /// Insert a new contract together with the documents uploaded at submission.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_contract(
        &self,
        contract: &Contract,
        documents: &[DocumentRecord],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO contracts (
                id, borrower_id, sponsor1_id, sponsor2_id, product_id, loan_type_id, amount,
                term_months, employment_status, status, consent, rejection_reason,
                priority_weight, created_at, pending_at, approved_at, loan_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(contract.id.to_string())
        .bind(contract.borrower_id.as_str())
        .bind(contract.sponsor1_id.as_str())
        .bind(contract.sponsor2_id.as_str())
        .bind(contract.product_id)
        .bind(contract.loan_type_id)
        .bind(contract.amount.to_canonical_string())
        .bind(i64::from(contract.term_months))
        .bind(contract.employment_status.as_str())
        .bind(contract.status.as_str())
        .bind(contract.consent.as_str())
        .bind(contract.rejection_reason.as_deref())
        .bind(contract.priority_weight)
        .bind(contract.created_at.as_ms())
        .bind(contract.pending_at.map(|t| t.as_ms()))
        .bind(contract.approved_at.map(|t| t.as_ms()))
        .bind(contract.loan_id.map(|id| id.to_string()))
        .execute(&mut *tx)
        .await?;

        for document in documents {
            Self::insert_document_tx(&mut tx, document).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a contract by id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value cannot be decoded.
    pub async fn get_contract(&self, id: &ContractId) -> Result<Option<Contract>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM contracts WHERE id = ?", CONTRACT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(contract_from_row).transpose()
    }

    /// Contracts in `status`, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_contracts_by_status(
        &self,
        status: ContractStatus,
    ) -> Result<Vec<Contract>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM contracts WHERE status = ? ORDER BY created_at ASC, id ASC",
            CONTRACT_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(contract_from_row).collect()
    }

    /// Persist a sponsor consent transition.
    ///
    /// Applies only while the contract still awaits sponsors and its consent
    /// matches `update.expected`. Returns false if another writer got there first.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn apply_consent(
        &self,
        id: &ContractId,
        update: &ConsentUpdate<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE contracts
            SET consent = ?, status = ?, pending_at = ?, rejection_reason = ?
            WHERE id = ? AND status = 'pending_sponsor_approval' AND consent = ?
            "#,
        )
        .bind(update.next.as_str())
        .bind(update.status.as_str())
        .bind(update.pending_at.map(|t| t.as_ms()))
        .bind(update.rejection_reason)
        .bind(id.to_string())
        .bind(update.expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reject a contract that is still `pending`.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn reject_pending(&self, id: &ContractId, reason: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE contracts SET status = 'rejected', rejection_reason = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(reason)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Approve a `pending` contract and store its loan and payment schedule atomically.
    ///
    /// Returns false (and writes nothing) if the contract was no longer pending.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn approve_with_loan(
        &self,
        id: &ContractId,
        approved_at: TimeMs,
        loan: &Loan,
        payments: &[Payment],
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // The guarded update must be the first statement so the write lock is
        // taken before anything is read inside this transaction.
        let result = sqlx::query(
            r#"
            UPDATE contracts SET status = 'approved', approved_at = ?, loan_id = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(approved_at.as_ms())
        .bind(loan.id.to_string())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        Self::insert_loan_tx(&mut tx, loan, payments).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Live guarantees a sponsor holds for one loan type.
    ///
    /// Live means the contract is approved and its loan (if generated) is not completed.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_live_guarantees(
        &self,
        sponsor: &UserId,
        loan_type_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM contracts c
            LEFT JOIN loans l ON l.contract_id = c.id
            WHERE (c.sponsor1_id = ? OR c.sponsor2_id = ?)
              AND c.loan_type_id = ?
              AND c.status = 'approved'
              AND (l.id IS NULL OR l.status = 'active')
            "#,
        )
        .bind(sponsor.as_str())
        .bind(sponsor.as_str())
        .bind(loan_type_id)
        .fetch_one(&self.pool)
        .await?;

        row.try_get("n")
    }

    /// Contracts approved within `[from, to)`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_approved_between(&self, from: TimeMs, to: TimeMs) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM contracts
            WHERE status = 'approved' AND approved_at >= ? AND approved_at < ?
            "#,
        )
        .bind(from.as_ms())
        .bind(to.as_ms())
        .fetch_one(&self.pool)
        .await?;

        row.try_get("n")
    }

    /// Scoring inputs for one contract.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_priority_input(
        &self,
        id: &ContractId,
    ) -> Result<Option<PriorityInput>, sqlx::Error> {
        let row = sqlx::query(&format!("{} WHERE c.id = ?", PRIORITY_INPUT_SQL))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(priority_input_from_row).transpose()
    }

    /// Scoring inputs for every contract currently `pending`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_pending_priority_inputs(&self) -> Result<Vec<PriorityInput>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.status = 'pending' ORDER BY c.created_at ASC",
            PRIORITY_INPUT_SQL
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(priority_input_from_row).collect()
    }
}
