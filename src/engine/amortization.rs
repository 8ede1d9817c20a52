//! Fixed-rate amortization schedule generation.

use crate::domain::Decimal;
use chrono::{Months, NaiveDate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid loan input: {0}")]
    InvalidLoanInput(String),
    #[error("schedule arithmetic overflow")]
    Overflow,
}

/// Validated inputs for schedule generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanTerms {
    pub principal: Decimal,
    /// Annual percentage rate, e.g. `12` for 12%.
    pub annual_rate: Decimal,
    pub term_months: u32,
}

impl LoanTerms {
    pub fn new(
        principal: Decimal,
        annual_rate: Decimal,
        term_months: u32,
    ) -> Result<Self, ScheduleError> {
        if !principal.is_positive() {
            return Err(ScheduleError::InvalidLoanInput(format!(
                "amount must be positive, got {}",
                principal
            )));
        }
        if annual_rate.is_negative() {
            return Err(ScheduleError::InvalidLoanInput(format!(
                "interest rate must not be negative, got {}",
                annual_rate
            )));
        }
        if term_months == 0 {
            return Err(ScheduleError::InvalidLoanInput(
                "term must be at least one month".to_string(),
            ));
        }
        Ok(Self {
            principal,
            annual_rate,
            term_months,
        })
    }

    pub fn monthly_rate(&self) -> Decimal {
        self.annual_rate / Decimal::hundred() / Decimal::from_u32(12)
    }
}

/// One scheduled installment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    /// Outstanding principal after this installment.
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_payment: Decimal,
    pub installments: Vec<Installment>,
}

/// Level monthly payment, rounded to cents.
///
/// A zero rate falls back to straight-line `principal / n`.
pub fn monthly_payment(terms: &LoanTerms) -> Result<Decimal, ScheduleError> {
    let n = Decimal::from_u32(terms.term_months);
    let rate = terms.monthly_rate();

    if rate.is_zero() {
        return terms
            .principal
            .checked_div(n)
            .map(|p| p.round_money())
            .ok_or(ScheduleError::Overflow);
    }

    let growth = (Decimal::one() + rate)
        .checked_powu(u64::from(terms.term_months))
        .ok_or(ScheduleError::Overflow)?;
    let numerator = terms
        .principal
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(growth))
        .ok_or(ScheduleError::Overflow)?;
    numerator
        .checked_div(growth - Decimal::one())
        .map(|p| p.round_money())
        .ok_or(ScheduleError::Overflow)
}

/// Generate `n` installments due monthly, the first one month after `start_date`.
pub fn build_schedule(terms: &LoanTerms, start_date: NaiveDate) -> Result<Schedule, ScheduleError> {
    let payment = monthly_payment(terms)?;
    let rate = terms.monthly_rate();
    let end_date = start_date
        .checked_add_months(Months::new(terms.term_months))
        .ok_or(ScheduleError::Overflow)?;

    let mut balance = terms.principal;
    let mut installments = Vec::with_capacity(terms.term_months as usize);
    for number in 1..=terms.term_months {
        let due_date = start_date
            .checked_add_months(Months::new(number))
            .ok_or(ScheduleError::Overflow)?;
        let interest = (balance * rate).round_money();
        let principal = payment - interest;
        balance = balance - principal;
        installments.push(Installment {
            number,
            due_date,
            amount: payment,
            principal,
            interest,
            balance,
        });
    }

    Ok(Schedule {
        start_date,
        end_date,
        monthly_payment: payment,
        installments,
    })
}
