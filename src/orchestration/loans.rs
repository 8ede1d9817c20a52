//! Loan generation on approval, and repayment tracking afterwards.

use crate::db::Repository;
use crate::domain::{
    Contract, Decimal, Loan, LoanId, LoanStatus, Payment, PaymentId, PaymentStatus, TimeMs,
};
use crate::engine::{build_schedule, LoanTerms, ScheduleError};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{Caller, WorkflowError};

/// Builds the loan record and its payment schedule for an approved contract.
pub struct LoanGenerator;

impl LoanGenerator {
    /// Generate the loan for `contract` starting on `start_date`.
    ///
    /// The interest rate is the product's rate at approval time.
    pub fn generate(
        contract: &Contract,
        annual_rate: Decimal,
        start_date: NaiveDate,
        now: TimeMs,
    ) -> Result<(Loan, Vec<Payment>), ScheduleError> {
        let terms = LoanTerms::new(contract.amount, annual_rate, contract.term_months)?;
        let schedule = build_schedule(&terms, start_date)?;

        let loan_id = LoanId::generate();
        let payments = schedule
            .installments
            .iter()
            .map(|i| Payment {
                id: PaymentId::generate(),
                loan_id,
                installment: i.number,
                due_date: i.due_date,
                amount: i.amount,
                principal: i.principal,
                interest: i.interest,
                status: PaymentStatus::Pending,
                paid_at: None,
            })
            .collect();

        let loan = Loan {
            id: loan_id,
            contract_id: contract.id,
            amount: terms.principal,
            term_months: terms.term_months,
            interest_rate: terms.annual_rate,
            monthly_payment: schedule.monthly_payment,
            start_date: schedule.start_date,
            end_date: schedule.end_date,
            status: LoanStatus::Active,
            created_at: now,
        };

        Ok((loan, payments))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanView {
    pub loan: Loan,
    pub payments: Vec<Payment>,
}

#[derive(Clone)]
pub struct PaymentService {
    repo: Arc<Repository>,
}

impl PaymentService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// A loan with its schedule. Visible to the borrower, both sponsors and admins.
    pub async fn get_loan(&self, caller: &Caller, loan_id: &LoanId) -> Result<LoanView, WorkflowError> {
        let loan = self.load_loan(loan_id).await?;
        let contract = self.load_contract_of(&loan).await?;
        let involved = contract.borrower_id == caller.user_id
            || contract.sponsor_slot(&caller.user_id).is_some();
        if !involved && !caller.is_admin() {
            return Err(WorkflowError::Forbidden(format!(
                "loan {} belongs to another borrower",
                loan_id
            )));
        }

        let payments = self.repo.list_payments(loan_id).await?;
        Ok(LoanView { loan, payments })
    }

    /// Mark a pending or late installment paid. The loan completes with its last payment.
    pub async fn record_payment(
        &self,
        caller: &Caller,
        payment_id: &PaymentId,
        now: TimeMs,
    ) -> Result<Payment, WorkflowError> {
        let payment = self
            .repo
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("payment {} not found", payment_id)))?;
        let loan = self.load_loan(&payment.loan_id).await?;
        let contract = self.load_contract_of(&loan).await?;
        if contract.borrower_id != caller.user_id && !caller.is_admin() {
            return Err(WorkflowError::Forbidden(
                "only the borrower may record payments".into(),
            ));
        }
        if payment.status == PaymentStatus::Paid {
            return Err(WorkflowError::Conflict(format!(
                "payment {} is already paid",
                payment_id
            )));
        }

        if !self.repo.mark_payment_paid(payment_id, &loan.id, now).await? {
            return Err(WorkflowError::Conflict(format!(
                "payment {} is already paid",
                payment_id
            )));
        }

        info!(loan_id = %loan.id, payment_id = %payment_id, installment = payment.installment, "payment recorded");
        Ok(Payment {
            status: PaymentStatus::Paid,
            paid_at: Some(now),
            ..payment
        })
    }

    /// Flag pending installments due before `today` as late.
    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, WorkflowError> {
        let flagged = self.repo.mark_overdue_payments(today).await?;
        if flagged > 0 {
            info!(flagged, %today, "payments marked late");
        }
        Ok(flagged)
    }

    async fn load_loan(&self, id: &LoanId) -> Result<Loan, WorkflowError> {
        self.repo
            .get_loan(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("loan {} not found", id)))
    }

    async fn load_contract_of(&self, loan: &Loan) -> Result<Contract, WorkflowError> {
        self.repo
            .get_contract(&loan.contract_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("contract {} not found", loan.contract_id)))
    }
}
