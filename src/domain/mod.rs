//! Domain types for the loan-origination workflow.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Identifiers and millisecond timestamps
//! - Catalog, contract, document, loan and user records
//! - The two-sponsor consent state machine

pub mod catalog;
pub mod contract;
pub mod decimal;
pub mod document;
pub mod loan;
pub mod primitives;
pub mod user;

pub use catalog::{DocumentType, LoanTerm, LoanType, PriorityClass, Product};
pub use contract::{
    parties_are_distinct, ConsentError, Contract, ContractStatus, EmploymentStatus,
    SponsorConsent, SponsorDecision, SponsorSlot,
};
pub use decimal::Decimal;
pub use document::{DocumentRecord, DocumentStatus, StoredFile};
pub use loan::{Loan, LoanStatus, Payment, PaymentStatus};
pub use primitives::{ContractId, DocumentId, IdParseError, LoanId, PaymentId, TimeMs, UserId};
pub use user::{SponsorEligibility, User};
