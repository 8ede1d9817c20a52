//! Contract (loan application) records and the two-sponsor consent machine.

use super::{ContractId, Decimal, LoanId, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Contract lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    PendingSponsorApproval,
    Pending,
    Approved,
    Rejected,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::PendingSponsorApproval => "pending_sponsor_approval",
            ContractStatus::Pending => "pending",
            ContractStatus::Approved => "approved",
            ContractStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_sponsor_approval" => Some(ContractStatus::PendingSponsorApproval),
            "pending" => Some(ContractStatus::Pending),
            "approved" => Some(ContractStatus::Approved),
            "rejected" => Some(ContractStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Approved | ContractStatus::Rejected)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Unemployed,
    Student,
    Retired,
}

impl EmploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentStatus::Employed => "employed",
            EmploymentStatus::SelfEmployed => "self_employed",
            EmploymentStatus::Unemployed => "unemployed",
            EmploymentStatus::Student => "student",
            EmploymentStatus::Retired => "retired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "employed" => Some(EmploymentStatus::Employed),
            "self_employed" => Some(EmploymentStatus::SelfEmployed),
            "unemployed" => Some(EmploymentStatus::Unemployed),
            "student" => Some(EmploymentStatus::Student),
            "retired" => Some(EmploymentStatus::Retired),
            _ => None,
        }
    }
}

/// Which of the two sponsor positions an action refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorSlot {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SponsorDecision {
    Approve,
    Reject,
}

/// Consent collected from the two sponsors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorConsent {
    AwaitingBoth,
    /// Sponsor 2 approved; sponsor 1 has not decided.
    AwaitingSponsor1,
    /// Sponsor 1 approved; sponsor 2 has not decided.
    AwaitingSponsor2,
    BothApproved,
    Rejected { by: SponsorSlot },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsentError {
    #[error("sponsor has already approved this contract")]
    AlreadyDecided,
    #[error("sponsor consent is already settled")]
    Settled,
}

impl SponsorConsent {
    /// Apply one sponsor's decision, returning the next state.
    pub fn apply(self, slot: SponsorSlot, decision: SponsorDecision) -> Result<Self, ConsentError> {
        use SponsorConsent::*;
        use SponsorSlot::*;

        match (self, slot, decision) {
            (BothApproved, _, _) | (Rejected { .. }, _, _) => Err(ConsentError::Settled),
            (AwaitingSponsor2, First, _) | (AwaitingSponsor1, Second, _) => {
                Err(ConsentError::AlreadyDecided)
            }
            (_, slot, SponsorDecision::Reject) => Ok(Rejected { by: slot }),
            (AwaitingBoth, First, SponsorDecision::Approve) => Ok(AwaitingSponsor2),
            (AwaitingBoth, Second, SponsorDecision::Approve) => Ok(AwaitingSponsor1),
            (AwaitingSponsor1, First, SponsorDecision::Approve)
            | (AwaitingSponsor2, Second, SponsorDecision::Approve) => Ok(BothApproved),
        }
    }

    pub fn sponsor1_approved(&self) -> bool {
        matches!(
            self,
            SponsorConsent::AwaitingSponsor2 | SponsorConsent::BothApproved
        )
    }

    pub fn sponsor2_approved(&self) -> bool {
        matches!(
            self,
            SponsorConsent::AwaitingSponsor1 | SponsorConsent::BothApproved
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SponsorConsent::AwaitingBoth => "awaiting_both",
            SponsorConsent::AwaitingSponsor1 => "awaiting_sponsor_1",
            SponsorConsent::AwaitingSponsor2 => "awaiting_sponsor_2",
            SponsorConsent::BothApproved => "both_approved",
            SponsorConsent::Rejected {
                by: SponsorSlot::First,
            } => "rejected_by_sponsor_1",
            SponsorConsent::Rejected {
                by: SponsorSlot::Second,
            } => "rejected_by_sponsor_2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "awaiting_both" => Some(SponsorConsent::AwaitingBoth),
            "awaiting_sponsor_1" => Some(SponsorConsent::AwaitingSponsor1),
            "awaiting_sponsor_2" => Some(SponsorConsent::AwaitingSponsor2),
            "both_approved" => Some(SponsorConsent::BothApproved),
            "rejected_by_sponsor_1" => Some(SponsorConsent::Rejected {
                by: SponsorSlot::First,
            }),
            "rejected_by_sponsor_2" => Some(SponsorConsent::Rejected {
                by: SponsorSlot::Second,
            }),
            _ => None,
        }
    }
}

/// A loan application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: ContractId,
    pub borrower_id: UserId,
    pub sponsor1_id: UserId,
    pub sponsor2_id: UserId,
    pub product_id: i64,
    pub loan_type_id: i64,
    pub amount: Decimal,
    pub term_months: u32,
    pub employment_status: EmploymentStatus,
    pub status: ContractStatus,
    pub consent: SponsorConsent,
    pub rejection_reason: Option<String>,
    pub priority_weight: i64,
    pub created_at: TimeMs,
    pub pending_at: Option<TimeMs>,
    pub approved_at: Option<TimeMs>,
    pub loan_id: Option<LoanId>,
}

impl Contract {
    /// The slot `user` occupies on this contract, if any.
    pub fn sponsor_slot(&self, user: &UserId) -> Option<SponsorSlot> {
        if &self.sponsor1_id == user {
            Some(SponsorSlot::First)
        } else if &self.sponsor2_id == user {
            Some(SponsorSlot::Second)
        } else {
            None
        }
    }

    pub fn sponsors(&self) -> [&UserId; 2] {
        [&self.sponsor1_id, &self.sponsor2_id]
    }
}

/// Borrower and sponsors must be three distinct parties.
pub fn parties_are_distinct(borrower: &UserId, sponsor1: &UserId, sponsor2: &UserId) -> bool {
    sponsor1 != sponsor2 && sponsor1 != borrower && sponsor2 != borrower
}

#[cfg(test)]
mod tests {
    use super::*;
    use SponsorDecision::*;
    use SponsorSlot::*;

    #[test]
    fn test_both_approve_in_either_order() {
        let a = SponsorConsent::AwaitingBoth
            .apply(First, Approve)
            .and_then(|s| s.apply(Second, Approve))
            .unwrap();
        let b = SponsorConsent::AwaitingBoth
            .apply(Second, Approve)
            .and_then(|s| s.apply(First, Approve))
            .unwrap();
        assert_eq!(a, SponsorConsent::BothApproved);
        assert_eq!(b, SponsorConsent::BothApproved);
        assert!(a.sponsor1_approved() && a.sponsor2_approved());
    }

    #[test]
    fn test_single_rejection_settles() {
        let s = SponsorConsent::AwaitingSponsor2.apply(Second, Reject).unwrap();
        assert_eq!(s, SponsorConsent::Rejected { by: Second });
        assert_eq!(s.apply(First, Approve), Err(ConsentError::Settled));
    }

    #[test]
    fn test_repeat_decision_is_rejected() {
        let s = SponsorConsent::AwaitingBoth.apply(First, Approve).unwrap();
        assert_eq!(s.apply(First, Approve), Err(ConsentError::AlreadyDecided));
        assert_eq!(s.apply(First, Reject), Err(ConsentError::AlreadyDecided));
    }

    #[test]
    fn test_flags_follow_state() {
        assert!(!SponsorConsent::AwaitingBoth.sponsor1_approved());
        assert!(SponsorConsent::AwaitingSponsor2.sponsor1_approved());
        assert!(!SponsorConsent::AwaitingSponsor2.sponsor2_approved());
        assert!(SponsorConsent::AwaitingSponsor1.sponsor2_approved());
        assert!(!SponsorConsent::Rejected { by: First }.sponsor1_approved());
    }

    #[test]
    fn test_consent_string_roundtrip() {
        for s in [
            SponsorConsent::AwaitingBoth,
            SponsorConsent::AwaitingSponsor1,
            SponsorConsent::AwaitingSponsor2,
            SponsorConsent::BothApproved,
            SponsorConsent::Rejected { by: First },
            SponsorConsent::Rejected { by: Second },
        ] {
            assert_eq!(SponsorConsent::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_parties_are_distinct() {
        let b = UserId::new("b");
        let s1 = UserId::new("s1");
        let s2 = UserId::new("s2");
        assert!(parties_are_distinct(&b, &s1, &s2));
        assert!(!parties_are_distinct(&b, &s1, &s1));
        assert!(!parties_are_distinct(&b, &b, &s2));
        assert!(!parties_are_distinct(&b, &s1, &b));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ContractStatus::Approved.is_terminal());
        assert!(ContractStatus::Rejected.is_terminal());
        assert!(!ContractStatus::Pending.is_terminal());
        assert!(!ContractStatus::PendingSponsorApproval.is_terminal());
    }
}
