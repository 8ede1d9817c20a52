pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Contract, ContractId, ContractStatus, Decimal, Loan, LoanId, Payment, PaymentId, TimeMs,
    UserId,
};
pub use error::AppError;
pub use gateway::{DocumentStore, Notifier};
pub use orchestration::{ApprovalEvaluator, Caller, ContractService, Policy, QueueWorker};
