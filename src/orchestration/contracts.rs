//! Contract creation, sponsor consent and read access.

use crate::db::{ConsentUpdate, Repository};
use crate::domain::{
    parties_are_distinct, Contract, ContractId, ContractStatus, Decimal, DocumentRecord,
    EmploymentStatus, SponsorConsent, SponsorDecision, SponsorSlot, TimeMs, UserId,
};
use crate::engine::{document_gate, priority};
use crate::gateway::{dispatch, DocumentStore, Notification, NotificationKind, Notifier};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::catalog::check_request;
use super::queue::schedule_evaluation;
use super::{CatalogLookup, Caller, DocumentService, Policy, SponsorChecker, Upload, WorkflowError};

/// Rejection reason recorded when a sponsor declines.
pub const REASON_SPONSOR_DECLINED: &str = "Rejected by sponsor";

/// A loan application as submitted by the borrower.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub sponsor1_id: UserId,
    pub sponsor2_id: UserId,
    pub loan_type: String,
    pub loan_term: String,
    pub amount: Decimal,
    pub term_months: u32,
    pub employment_status: EmploymentStatus,
    pub documents: Vec<Upload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractView {
    #[serde(flatten)]
    pub contract: Contract,
    pub sponsor1_approved: bool,
    pub sponsor2_approved: bool,
    pub documents: Vec<DocumentRecord>,
}

impl ContractView {
    fn new(contract: Contract, documents: Vec<DocumentRecord>) -> Self {
        Self {
            sponsor1_approved: contract.consent.sponsor1_approved(),
            sponsor2_approved: contract.consent.sponsor2_approved(),
            contract,
            documents,
        }
    }
}

#[derive(Clone)]
pub struct ContractService {
    repo: Arc<Repository>,
    catalog: CatalogLookup,
    sponsors: SponsorChecker,
    documents: DocumentService,
    notifier: Arc<dyn Notifier>,
}

impl ContractService {
    pub fn new(
        repo: Arc<Repository>,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        policy: Policy,
    ) -> Self {
        Self {
            catalog: CatalogLookup::new(repo.clone()),
            sponsors: SponsorChecker::new(repo.clone(), policy.sponsor_guarantee_limit),
            documents: DocumentService::new(repo.clone(), store),
            repo,
            notifier,
        }
    }

    /// Submit a loan application on behalf of `caller`.
    ///
    /// Nothing is persisted unless every check passes: distinct parties,
    /// a resolvable product with the request inside its bounds, eligible
    /// sponsors with spare capacity, and an upload for every required document.
    pub async fn create(
        &self,
        caller: &Caller,
        request: NewContract,
        now: TimeMs,
    ) -> Result<ContractView, WorkflowError> {
        let borrower = &caller.user_id;
        if &request.sponsor1_id == borrower || &request.sponsor2_id == borrower {
            return Err(WorkflowError::Forbidden(
                "a borrower cannot sponsor their own contract".into(),
            ));
        }
        if !parties_are_distinct(borrower, &request.sponsor1_id, &request.sponsor2_id) {
            return Err(WorkflowError::Validation(
                "the two sponsors must be different people".into(),
            ));
        }

        let product = self
            .catalog
            .resolve(&request.loan_type, &request.loan_term)
            .await?;
        check_request(&product, request.amount, request.term_months)?;

        self.sponsors
            .check(
                [&request.sponsor1_id, &request.sponsor2_id],
                product.loan_type.id,
                true,
            )
            .await?;

        let contract_id = ContractId::generate();
        let documents = self
            .documents
            .store_submission(&contract_id, &request.documents, now)
            .await?;

        let missing = document_gate::missing_uploads(&product.required_document_ids(), &documents);
        if !missing.is_empty() {
            self.documents.discard(&documents).await;
            let names: Vec<&str> = product
                .required_documents
                .iter()
                .filter(|d| missing.contains(&d.id))
                .map(|d| d.name.as_str())
                .collect();
            return Err(WorkflowError::Validation(format!(
                "Missing required documents: {}",
                names.join(", ")
            )));
        }

        let contract = Contract {
            id: contract_id,
            borrower_id: borrower.clone(),
            sponsor1_id: request.sponsor1_id,
            sponsor2_id: request.sponsor2_id,
            product_id: product.id,
            loan_type_id: product.loan_type.id,
            amount: request.amount,
            term_months: request.term_months,
            employment_status: request.employment_status,
            status: ContractStatus::PendingSponsorApproval,
            consent: SponsorConsent::AwaitingBoth,
            rejection_reason: None,
            priority_weight: priority::type_weight(product.loan_type.priority_class),
            created_at: now,
            pending_at: None,
            approved_at: None,
            loan_id: None,
        };

        if let Err(e) = self.repo.insert_contract(&contract, &documents).await {
            self.documents.discard(&documents).await;
            return Err(e.into());
        }

        info!(
            contract_id = %contract.id,
            borrower = %contract.borrower_id,
            product_id = product.id,
            amount = %contract.amount,
            "contract created"
        );

        let payload = json!({
            "contractId": contract.id,
            "borrowerId": contract.borrower_id,
            "loanType": product.loan_type.name,
            "amount": contract.amount,
        });
        dispatch(
            self.notifier.as_ref(),
            contract
                .sponsors()
                .iter()
                .map(|s| Notification::new(s, NotificationKind::SponsorRequested, payload.clone()))
                .collect(),
        )
        .await;

        Ok(ContractView::new(contract, documents))
    }

    /// Record a sponsor's approval or rejection.
    ///
    /// The second approval moves the contract to `pending` and schedules its
    /// evaluation; any rejection rejects the contract.
    pub async fn sponsor_decide(
        &self,
        caller: &Caller,
        contract_id: &ContractId,
        decision: SponsorDecision,
        now: TimeMs,
    ) -> Result<ContractView, WorkflowError> {
        let contract = self.load(contract_id).await?;
        let slot = contract.sponsor_slot(&caller.user_id).ok_or_else(|| {
            WorkflowError::Forbidden(format!(
                "{} is not a sponsor of contract {}",
                caller.user_id, contract_id
            ))
        })?;
        if contract.status != ContractStatus::PendingSponsorApproval {
            return Err(WorkflowError::Conflict(format!(
                "contract {} is {}, not awaiting sponsors",
                contract_id, contract.status
            )));
        }

        let next = contract.consent.apply(slot, decision)?;
        let (status, pending_at, reason) = match next {
            SponsorConsent::BothApproved => (ContractStatus::Pending, Some(now), None),
            SponsorConsent::Rejected { .. } => {
                (ContractStatus::Rejected, None, Some(REASON_SPONSOR_DECLINED))
            }
            _ => (ContractStatus::PendingSponsorApproval, None, None),
        };

        let update = ConsentUpdate {
            expected: contract.consent,
            next,
            status,
            pending_at,
            rejection_reason: reason,
        };
        if !self.repo.apply_consent(contract_id, &update).await? {
            return Err(WorkflowError::Conflict(format!(
                "contract {} changed while recording the decision",
                contract_id
            )));
        }

        info!(
            contract_id = %contract_id,
            slot = slot_label(slot),
            decision = ?decision,
            consent = next.as_str(),
            status = status.as_str(),
            "sponsor decision recorded"
        );

        // The consent is committed; a failed enqueue is picked up by the
        // worker's next recovery pass.
        if status == ContractStatus::Pending {
            if let Err(e) = schedule_evaluation(&self.repo, contract_id, now, now).await {
                warn!(contract_id = %contract_id, error = %e, "scheduling evaluation failed");
            }
        }

        let mut notifications = vec![Notification::new(
            &contract.borrower_id,
            NotificationKind::SponsorResponded,
            json!({
                "contractId": contract_id,
                "sponsorId": caller.user_id,
                "decision": decision,
            }),
        )];
        if status == ContractStatus::Rejected {
            notifications.push(Notification::new(
                &contract.borrower_id,
                NotificationKind::ContractRejected,
                json!({ "contractId": contract_id, "reason": REASON_SPONSOR_DECLINED }),
            ));
        }
        dispatch(self.notifier.as_ref(), notifications).await;

        let updated = self.load(contract_id).await?;
        let documents = self.repo.list_documents(contract_id).await?;
        Ok(ContractView::new(updated, documents))
    }

    /// A contract with its documents. Visible to its parties and admins.
    pub async fn get(&self, caller: &Caller, contract_id: &ContractId) -> Result<ContractView, WorkflowError> {
        let contract = self.load(contract_id).await?;
        let involved = contract.borrower_id == caller.user_id
            || contract.sponsor_slot(&caller.user_id).is_some();
        if !involved && !caller.is_admin() {
            return Err(WorkflowError::Forbidden(format!(
                "contract {} belongs to another borrower",
                contract_id
            )));
        }

        let documents = self.repo.list_documents(contract_id).await?;
        Ok(ContractView::new(contract, documents))
    }

    pub fn documents(&self) -> &DocumentService {
        &self.documents
    }

    async fn load(&self, id: &ContractId) -> Result<Contract, WorkflowError> {
        self.repo
            .get_contract(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("contract {} not found", id)))
    }
}

fn slot_label(slot: SponsorSlot) -> &'static str {
    match slot {
        SponsorSlot::First => "sponsor_1",
        SponsorSlot::Second => "sponsor_2",
    }
}
