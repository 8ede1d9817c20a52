//! Sponsor eligibility and guarantee capacity.

use crate::db::Repository;
use crate::domain::{SponsorEligibility, UserId};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::WorkflowError;

/// Why a sponsor cannot back a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SponsorIssue {
    Unknown,
    NotEligible,
    AtCapacity { live: i64, limit: i64 },
}

impl fmt::Display for SponsorIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SponsorIssue::Unknown => f.write_str("no such account"),
            SponsorIssue::NotEligible => f.write_str("not eligible to sponsor"),
            SponsorIssue::AtCapacity { live, limit } => {
                write!(f, "already guarantees {} of {} allowed for this loan type", live, limit)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SponsorError {
    #[error("sponsor ineligible: {}", describe(.issues))]
    Ineligible { issues: Vec<(UserId, SponsorIssue)> },
}

fn describe(issues: &[(UserId, SponsorIssue)]) -> String {
    issues
        .iter()
        .map(|(user, issue)| format!("{} ({})", user, issue))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SponsorError {
    pub fn issues(&self) -> &[(UserId, SponsorIssue)] {
        match self {
            SponsorError::Ineligible { issues } => issues,
        }
    }

    pub fn has_capacity_issue(&self) -> bool {
        self.issues()
            .iter()
            .any(|(_, issue)| matches!(issue, SponsorIssue::AtCapacity { .. }))
    }

    pub fn has_unknown_sponsor(&self) -> bool {
        self.issues()
            .iter()
            .any(|(_, issue)| *issue == SponsorIssue::Unknown)
    }
}

#[derive(Clone)]
pub struct SponsorChecker {
    repo: Arc<Repository>,
    guarantee_limit: i64,
}

impl SponsorChecker {
    pub fn new(repo: Arc<Repository>, guarantee_limit: i64) -> Self {
        Self {
            repo,
            guarantee_limit,
        }
    }

    /// Check both sponsors for a loan type.
    ///
    /// Each sponsor is checked for an account (only when `require_accounts`),
    /// then eligibility, then live guarantees below the limit. The first issue
    /// per sponsor is reported; any issue fails the whole check.
    pub async fn check(
        &self,
        sponsors: [&UserId; 2],
        loan_type_id: i64,
        require_accounts: bool,
    ) -> Result<(), WorkflowError> {
        let mut issues = Vec::new();
        for sponsor in sponsors {
            if let Some(issue) = self.issue_for(sponsor, loan_type_id, require_accounts).await? {
                issues.push((sponsor.clone(), issue));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SponsorError::Ineligible { issues }.into())
        }
    }

    async fn issue_for(
        &self,
        sponsor: &UserId,
        loan_type_id: i64,
        require_accounts: bool,
    ) -> Result<Option<SponsorIssue>, sqlx::Error> {
        match self.repo.get_user(sponsor).await? {
            None if require_accounts => return Ok(Some(SponsorIssue::Unknown)),
            Some(user) if user.sponsor_eligibility != SponsorEligibility::Eligible => {
                return Ok(Some(SponsorIssue::NotEligible))
            }
            _ => {}
        }

        let live = self.repo.count_live_guarantees(sponsor, loan_type_id).await?;
        if live >= self.guarantee_limit {
            return Ok(Some(SponsorIssue::AtCapacity {
                live,
                limit: self.guarantee_limit,
            }));
        }
        Ok(None)
    }
}
