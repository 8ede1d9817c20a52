//! Admission scoring for contracts waiting in the pending queue.
//!
//! A contract's score is compared against every other pending contract; the
//! number of peers scoring strictly higher stretches its evaluation delay.

use crate::domain::{ContractId, Decimal, PriorityClass, TimeMs};

/// Delay added per pending peer that outscores the contract.
pub const RANK_STEP_MS: i64 = 5 * TimeMs::SECOND;

const FIRST_LOAN_BONUS: i64 = 75;
const RECENCY_BONUS: i64 = 50;
const RECENCY_DECAY_PER_HOUR: i64 = 2;

/// Everything the scorer needs to know about one pending contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityInput {
    pub contract_id: ContractId,
    pub priority_class: PriorityClass,
    /// Approved contracts the borrower already holds.
    pub borrower_prior_approved: i64,
    pub created_at: TimeMs,
}

/// Scheduling decision for one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityPlan {
    pub score: Decimal,
    pub higher_count: usize,
    pub delay_ms: i64,
}

pub fn type_weight(class: PriorityClass) -> i64 {
    match class {
        PriorityClass::Medical => 100,
        PriorityClass::Educational => 50,
        PriorityClass::Project | PriorityClass::Standard => 0,
    }
}

pub fn base_delay_ms(class: PriorityClass) -> i64 {
    match class {
        PriorityClass::Medical => 5 * TimeMs::SECOND,
        PriorityClass::Educational => 10 * TimeMs::SECOND,
        PriorityClass::Project | PriorityClass::Standard => 15 * TimeMs::SECOND,
    }
}

/// Recency decays continuously, so contracts minutes apart still rank apart.
pub fn score(input: &PriorityInput, now: TimeMs) -> Decimal {
    let first_loan = if input.borrower_prior_approved == 0 {
        FIRST_LOAN_BONUS
    } else {
        0
    };
    let decay = Decimal::from(RECENCY_DECAY_PER_HOUR) * now.hours_since(input.created_at);
    let recency = (Decimal::from(RECENCY_BONUS) - decay).max(Decimal::zero());
    Decimal::from(type_weight(input.priority_class) + first_loan) + recency
}

pub fn delay_ms(class: PriorityClass, higher_count: usize) -> i64 {
    base_delay_ms(class) + RANK_STEP_MS * higher_count as i64
}

/// Rank `target` against the pending set and derive its delay.
///
/// `pending` may include `target` itself; it is skipped by id.
pub fn plan(target: &PriorityInput, pending: &[PriorityInput], now: TimeMs) -> PriorityPlan {
    let own = score(target, now);
    let higher_count = pending
        .iter()
        .filter(|p| p.contract_id != target.contract_id)
        .filter(|p| score(p, now) > own)
        .count();

    PriorityPlan {
        score: own,
        higher_count,
        delay_ms: delay_ms(target.priority_class, higher_count),
    }
}
