//! Terminal decision for a pending contract.
//!
//! Every check re-reads persisted state. The approval itself is a single
//! transaction guarded on `status = 'pending'`, so concurrent evaluations of
//! one contract produce at most one loan.

use crate::db::Repository;
use crate::domain::{Contract, ContractId, ContractStatus, LoanId, TimeMs};
use crate::engine::document_gate;
use crate::gateway::{dispatch, Notification, NotificationKind, Notifier};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use super::{CatalogLookup, LoanGenerator, Policy, SponsorChecker, WorkflowError};

pub const REASON_MISSING_DOCUMENTS: &str = "Missing required documents";
pub const REASON_SPONSOR_UNAVAILABLE: &str = "Sponsor unavailable";
pub const REASON_MONTHLY_LIMIT: &str = "Monthly approval limit reached";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Approved { loan_id: LoanId },
    Rejected { reason: String },
    /// The contract was not pending, or another evaluation settled it first.
    Skipped,
}

#[derive(Clone)]
pub struct ApprovalEvaluator {
    repo: Arc<Repository>,
    catalog: CatalogLookup,
    sponsors: SponsorChecker,
    notifier: Arc<dyn Notifier>,
    policy: Policy,
}

impl ApprovalEvaluator {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn Notifier>, policy: Policy) -> Self {
        Self {
            catalog: CatalogLookup::new(repo.clone()),
            sponsors: SponsorChecker::new(repo.clone(), policy.sponsor_guarantee_limit),
            repo,
            notifier,
            policy,
        }
    }

    /// Evaluate a pending contract and commit approval or rejection.
    ///
    /// Checks run in order and the first failure rejects: documents approved,
    /// sponsor capacity, then the monthly approval quota.
    pub async fn evaluate(
        &self,
        contract_id: &ContractId,
        now: TimeMs,
    ) -> Result<EvaluationOutcome, WorkflowError> {
        let Some(contract) = self.repo.get_contract(contract_id).await? else {
            debug!(contract_id = %contract_id, "evaluation for unknown contract");
            return Ok(EvaluationOutcome::Skipped);
        };
        if contract.status != ContractStatus::Pending {
            debug!(contract_id = %contract_id, status = contract.status.as_str(), "evaluation skipped");
            return Ok(EvaluationOutcome::Skipped);
        }

        let product = self.catalog.product(contract.product_id).await?;

        let documents = self.repo.list_documents(contract_id).await?;
        if !document_gate::is_complete(&product.required_document_ids(), &documents) {
            return self.reject(&contract, REASON_MISSING_DOCUMENTS).await;
        }

        match self
            .sponsors
            .check(contract.sponsors(), contract.loan_type_id, false)
            .await
        {
            Ok(()) => {}
            Err(WorkflowError::Sponsor(e)) => {
                debug!(contract_id = %contract_id, error = %e, "sponsor re-check failed");
                return self.reject(&contract, REASON_SPONSOR_UNAVAILABLE).await;
            }
            Err(e) => return Err(e),
        }

        let (month_start, month_end) = now.month_bounds();
        let approved = self.repo.count_approved_between(month_start, month_end).await?;
        if approved >= self.policy.monthly_approval_limit {
            return self.reject(&contract, REASON_MONTHLY_LIMIT).await;
        }

        let (loan, payments) =
            LoanGenerator::generate(&contract, product.loan_type.interest_rate, now.date(), now)?;
        if !self
            .repo
            .approve_with_loan(contract_id, now, &loan, &payments)
            .await?
        {
            debug!(contract_id = %contract_id, "approval lost to a concurrent writer");
            return Ok(EvaluationOutcome::Skipped);
        }

        info!(
            contract_id = %contract_id,
            loan_id = %loan.id,
            monthly_payment = %loan.monthly_payment,
            installments = payments.len(),
            "contract approved, loan generated"
        );

        let payload = json!({
            "contractId": contract_id,
            "loanId": loan.id,
            "monthlyPayment": loan.monthly_payment,
            "startDate": loan.start_date,
            "endDate": loan.end_date,
        });
        self.notify_parties(&contract, NotificationKind::ContractApproved, payload)
            .await;

        Ok(EvaluationOutcome::Approved { loan_id: loan.id })
    }

    async fn reject(
        &self,
        contract: &Contract,
        reason: &str,
    ) -> Result<EvaluationOutcome, WorkflowError> {
        if !self.repo.reject_pending(&contract.id, reason).await? {
            return Ok(EvaluationOutcome::Skipped);
        }

        info!(contract_id = %contract.id, reason, "contract rejected");
        self.notify_parties(
            contract,
            NotificationKind::ContractRejected,
            json!({ "contractId": contract.id, "reason": reason }),
        )
        .await;

        Ok(EvaluationOutcome::Rejected {
            reason: reason.to_string(),
        })
    }

    async fn notify_parties(
        &self,
        contract: &Contract,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) {
        let notifications = [&contract.borrower_id, &contract.sponsor1_id, &contract.sponsor2_id]
            .into_iter()
            .map(|user| Notification::new(user, kind, payload.clone()))
            .collect();
        dispatch(self.notifier.as_ref(), notifications).await;
    }
}
