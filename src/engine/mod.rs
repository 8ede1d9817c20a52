//! Pure computation for the approval workflow.
//!
//! Nothing here touches the database; the orchestration layer loads state,
//! calls these functions, and persists the outcome.

pub mod amortization;
pub mod document_gate;
pub mod priority;

pub use amortization::{build_schedule, monthly_payment, Installment, LoanTerms, Schedule, ScheduleError};
pub use priority::{PriorityInput, PriorityPlan};
