//! Loan and payment operations for the repository.

use crate::domain::{
    ContractId, Loan, LoanId, LoanStatus, Payment, PaymentId, PaymentStatus, TimeMs,
};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use super::{date_col, decimal_col, decode_err, months_col, uuid_col, Repository};

const DATE_FORMAT: &str = "%Y-%m-%d";

const LOAN_COLUMNS: &str = r#"
    id, contract_id, amount, term_months, interest_rate, monthly_payment,
    start_date, end_date, status, created_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, loan_id, installment, due_date, amount, principal, interest, status, paid_at
"#;

fn loan_from_row(row: &SqliteRow) -> Result<Loan, sqlx::Error> {
    let status_raw: String = row.try_get("status")?;
    Ok(Loan {
        id: LoanId(uuid_col(row, "id")?),
        contract_id: ContractId(uuid_col(row, "contract_id")?),
        amount: decimal_col(row, "amount")?,
        term_months: months_col(row, "term_months")?,
        interest_rate: decimal_col(row, "interest_rate")?,
        monthly_payment: decimal_col(row, "monthly_payment")?,
        start_date: date_col(row, "start_date")?,
        end_date: date_col(row, "end_date")?,
        status: LoanStatus::parse(&status_raw).ok_or_else(|| decode_err("status", &status_raw))?,
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

fn payment_from_row(row: &SqliteRow) -> Result<Payment, sqlx::Error> {
    let status_raw: String = row.try_get("status")?;
    Ok(Payment {
        id: PaymentId(uuid_col(row, "id")?),
        loan_id: LoanId(uuid_col(row, "loan_id")?),
        installment: months_col(row, "installment")?,
        due_date: date_col(row, "due_date")?,
        amount: decimal_col(row, "amount")?,
        principal: decimal_col(row, "principal")?,
        interest: decimal_col(row, "interest")?,
        status: PaymentStatus::parse(&status_raw)
            .ok_or_else(|| decode_err("status", &status_raw))?,
        paid_at: row.try_get::<Option<i64>, _>("paid_at")?.map(TimeMs::new),
    })
}

impl Repository {
    pub(super) async fn insert_loan_tx(
        tx: &mut Transaction<'_, Sqlite>,
        loan: &Loan,
        payments: &[Payment],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO loans (
                id, contract_id, amount, term_months, interest_rate, monthly_payment,
                start_date, end_date, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(loan.id.to_string())
        .bind(loan.contract_id.to_string())
        .bind(loan.amount.to_canonical_string())
        .bind(i64::from(loan.term_months))
        .bind(loan.interest_rate.to_canonical_string())
        .bind(loan.monthly_payment.to_canonical_string())
        .bind(loan.start_date.format(DATE_FORMAT).to_string())
        .bind(loan.end_date.format(DATE_FORMAT).to_string())
        .bind(loan.status.as_str())
        .bind(loan.created_at.as_ms())
        .execute(&mut **tx)
        .await?;

        for payment in payments {
            sqlx::query(
                r#"
                INSERT INTO payments (
                    id, loan_id, installment, due_date, amount, principal, interest, status, paid_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(payment.id.to_string())
            .bind(payment.loan_id.to_string())
            .bind(i64::from(payment.installment))
            .bind(payment.due_date.format(DATE_FORMAT).to_string())
            .bind(payment.amount.to_canonical_string())
            .bind(payment.principal.to_canonical_string())
            .bind(payment.interest.to_canonical_string())
            .bind(payment.status.as_str())
            .bind(payment.paid_at.map(|t| t.as_ms()))
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Get a loan by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_loan(&self, id: &LoanId) -> Result<Option<Loan>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM loans WHERE id = ?", LOAN_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(loan_from_row).transpose()
    }

    /// Loans generated for a contract (zero or one).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_loans_for_contract(
        &self,
        contract_id: &ContractId,
    ) -> Result<Vec<Loan>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM loans WHERE contract_id = ?",
            LOAN_COLUMNS
        ))
        .bind(contract_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(loan_from_row).collect()
    }

    /// Payment schedule of a loan, in installment order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_payments(&self, loan_id: &LoanId) -> Result<Vec<Payment>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE loan_id = ? ORDER BY installment ASC",
            PAYMENT_COLUMNS
        ))
        .bind(loan_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payment_from_row).collect()
    }

    /// Get a payment by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    /// Mark an outstanding (pending or late) payment as paid, completing the
    /// loan once nothing remains outstanding.
    ///
    /// Returns false if the payment was already paid.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn mark_payment_paid(
        &self,
        id: &PaymentId,
        loan_id: &LoanId,
        paid_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE payments SET status = 'paid', paid_at = ? WHERE id = ? AND status IN ('pending', 'late')",
        )
        .bind(paid_at.as_ms())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE loans SET status = 'completed'
            WHERE id = ? AND status = 'active'
              AND NOT EXISTS (SELECT 1 FROM payments WHERE loan_id = ? AND status <> 'paid')
            "#,
        )
        .bind(loan_id.to_string())
        .bind(loan_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Flag pending payments due before `today` as late. Returns the number flagged.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_overdue_payments(&self, today: NaiveDate) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE payments SET status = 'late' WHERE status = 'pending' AND due_date < ?")
            .bind(today.format(DATE_FORMAT).to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
