//! The contract approval workflow.
//!
//! Services here load state through the [`Repository`](crate::db::Repository),
//! run the pure checks in [`engine`](crate::engine), persist the outcome with
//! conditional updates, and dispatch notifications after the write commits.

pub mod catalog;
pub mod contracts;
pub mod documents;
pub mod evaluator;
pub mod loans;
pub mod queue;
pub mod sponsors;

pub use catalog::{
    check_request, parse_catalog_csv, seed_catalog_csv, CatalogError, CatalogLookup, CatalogRow,
    SeedError,
};
pub use contracts::{ContractService, ContractView, NewContract};
pub use documents::{DocumentService, ReviewDecision, Upload};
pub use evaluator::{ApprovalEvaluator, EvaluationOutcome};
pub use loans::{LoanGenerator, LoanView, PaymentService};
pub use queue::{schedule_evaluation, QueueWorker, TickSummary};
pub use sponsors::{SponsorChecker, SponsorError, SponsorIssue};

use crate::config::Config;
use crate::domain::{ConsentError, UserId};
use crate::engine::ScheduleError;
use crate::gateway::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Sponsor(#[from] SponsorError),
    #[error(transparent)]
    Consent(#[from] ConsentError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Limits re-checked at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Contracts approved per UTC calendar month, across all borrowers.
    pub monthly_approval_limit: i64,
    /// Live guarantees one sponsor may hold per loan type.
    pub sponsor_guarantee_limit: i64,
}

impl Policy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            monthly_approval_limit: config.monthly_approval_limit,
            sponsor_guarantee_limit: config.sponsor_guarantee_limit,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            monthly_approval_limit: 5,
            sponsor_guarantee_limit: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Authenticated identity on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(id),
            role: Role::User,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(id),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
