#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use loanflow::db::init_db;
use loanflow::domain::{
    ContractId, Decimal, DocumentStatus, EmploymentStatus, LoanTerm, LoanType, PriorityClass,
    SponsorDecision, SponsorEligibility, TimeMs, User, UserId,
};
use loanflow::gateway::{DocumentStore, MockDocumentStore, MockNotifier, Notifier};
use loanflow::orchestration::{
    ApprovalEvaluator, Caller, ContractService, EvaluationOutcome, NewContract, PaymentService,
    Policy, QueueWorker, ReviewDecision, Upload,
};
use loanflow::Repository;
use std::sync::Arc;
use tempfile::TempDir;

pub const LEASE_MS: i64 = 60_000;

pub struct TestEnv {
    pub repo: Arc<Repository>,
    pub store: Arc<MockDocumentStore>,
    pub notifier: Arc<MockNotifier>,
    pub contracts: ContractService,
    pub evaluator: ApprovalEvaluator,
    pub payments: PaymentService,
    pub worker: QueueWorker,
    pub db_path: String,
    pub _temp: TempDir,
}

/// Mid-month, so offsets of a few hours stay in the same UTC month.
pub fn t0() -> TimeMs {
    TimeMs::from(Utc.with_ymd_and_hms(2026, 5, 15, 12, 0, 0).unwrap())
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

pub async fn setup() -> TestEnv {
    setup_with(Policy::default()).await
}

pub async fn setup_with(policy: Policy) -> TestEnv {
    let temp = TempDir::new().unwrap();
    let db_path = temp
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    seed_catalog(&repo).await;
    seed_users(&repo).await;

    build_env(repo, policy, db_path, temp)
}

pub fn build_env(repo: Arc<Repository>, policy: Policy, db_path: String, temp: TempDir) -> TestEnv {
    let store = Arc::new(MockDocumentStore::new());
    let notifier = Arc::new(MockNotifier::new());
    let dyn_store: Arc<dyn DocumentStore> = store.clone();
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();

    let contracts = ContractService::new(repo.clone(), dyn_store, dyn_notifier.clone(), policy);
    let evaluator = ApprovalEvaluator::new(repo.clone(), dyn_notifier, policy);
    let payments = PaymentService::new(repo.clone());
    let worker = QueueWorker::new(repo.clone(), evaluator.clone(), payments.clone(), LEASE_MS);

    TestEnv {
        repo,
        store,
        notifier,
        contracts,
        evaluator,
        payments,
        worker,
        db_path,
        _temp: temp,
    }
}

async fn seed_catalog(repo: &Repository) {
    let short = repo
        .upsert_loan_term(&LoanTerm {
            id: 0,
            name: "Short".into(),
            min_months: 6,
            max_months: 24,
        })
        .await
        .unwrap();
    let id_card = repo.upsert_document_type("ID Card").await.unwrap();
    let medical_report = repo.upsert_document_type("Medical Report").await.unwrap();
    repo.upsert_document_type("Payslip").await.unwrap();

    for (name, rate, min, max, class, docs) in [
        ("Medical", "12", "1000", "50000", PriorityClass::Medical, vec![id_card, medical_report]),
        ("Education", "8", "500", "20000", PriorityClass::Educational, vec![id_card]),
        ("Project", "10", "1000", "100000", PriorityClass::Project, vec![id_card]),
        ("Interest Free", "0", "100", "20000", PriorityClass::Standard, vec![]),
    ] {
        let type_id = repo
            .upsert_loan_type(&LoanType {
                id: 0,
                name: name.into(),
                interest_rate: dec(rate),
                min_amount: dec(min),
                max_amount: dec(max),
                priority_class: class,
            })
            .await
            .unwrap();
        repo.upsert_product(type_id, short, &docs).await.unwrap();
    }
}

async fn seed_users(repo: &Repository) {
    let mut users: Vec<(String, SponsorEligibility)> = Vec::new();
    for i in 1..=12 {
        users.push((format!("borrower{}", i), SponsorEligibility::Eligible));
        users.push((format!("sponsor{}", i), SponsorEligibility::Eligible));
    }
    users.push(("blocked".into(), SponsorEligibility::Ineligible));

    for (id, eligibility) in users {
        repo.upsert_user(&User {
            id: UserId::new(id.clone()),
            name: id.clone(),
            email: Some(format!("{}@example.com", id)),
            sponsor_eligibility: eligibility,
        })
        .await
        .unwrap();
    }
}

pub fn upload(document_type: &str) -> Upload {
    Upload {
        document_type: document_type.into(),
        file_name: format!("{}.txt", document_type.to_lowercase().replace(' ', "-")),
        bytes: format!("contents of {}", document_type).into_bytes(),
    }
}

pub fn documents_for(loan_type: &str) -> Vec<Upload> {
    match loan_type {
        "Medical" => vec![upload("ID Card"), upload("Medical Report")],
        "Interest Free" => vec![],
        _ => vec![upload("ID Card")],
    }
}

pub fn request(s1: &str, s2: &str, loan_type: &str, amount: &str, term_months: u32) -> NewContract {
    NewContract {
        sponsor1_id: UserId::new(s1),
        sponsor2_id: UserId::new(s2),
        loan_type: loan_type.into(),
        loan_term: "Short".into(),
        amount: dec(amount),
        term_months,
        employment_status: EmploymentStatus::Employed,
        documents: documents_for(loan_type),
    }
}

pub fn admin() -> Caller {
    Caller::admin("ops")
}

impl TestEnv {
    pub async fn create(&self, borrower: &str, s1: &str, s2: &str, loan_type: &str, now: TimeMs) -> ContractId {
        self.contracts
            .create(&Caller::user(borrower), request(s1, s2, loan_type, "12000", 12), now)
            .await
            .expect("create failed")
            .contract
            .id
    }

    pub async fn approve_documents(&self, contract_id: &ContractId, now: TimeMs) {
        for doc in self.repo.list_documents(contract_id).await.unwrap() {
            if doc.status != DocumentStatus::Approved {
                self.contracts
                    .documents()
                    .review(&admin(), &doc.id, ReviewDecision::Approve, None, now)
                    .await
                    .unwrap();
            }
        }
    }

    pub async fn consent(&self, contract_id: &ContractId, s1: &str, s2: &str, now: TimeMs) {
        for sponsor in [s1, s2] {
            self.contracts
                .sponsor_decide(&Caller::user(sponsor), contract_id, SponsorDecision::Approve, now)
                .await
                .expect("sponsor approval failed");
        }
    }

    /// Create a contract, approve its documents and collect both consents.
    pub async fn pending(&self, borrower: &str, s1: &str, s2: &str, loan_type: &str, now: TimeMs) -> ContractId {
        let id = self.create(borrower, s1, s2, loan_type, now).await;
        self.approve_documents(&id, now).await;
        self.consent(&id, s1, s2, now).await;
        id
    }

    /// Run a contract all the way to an approved loan.
    pub async fn approved(&self, borrower: &str, s1: &str, s2: &str, loan_type: &str, now: TimeMs) -> ContractId {
        let id = self.pending(borrower, s1, s2, loan_type, now).await;
        let outcome = self.evaluator.evaluate(&id, now).await.unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Approved { .. }), "got {:?}", outcome);
        id
    }
}
