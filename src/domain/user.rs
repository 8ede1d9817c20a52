//! User accounts as seen by the approval workflow.

use super::UserId;
use serde::{Deserialize, Serialize};

/// Whether an account may back other people's contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SponsorEligibility {
    Eligible,
    Ineligible,
}

impl SponsorEligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            SponsorEligibility::Eligible => "eligible",
            SponsorEligibility::Ineligible => "ineligible",
        }
    }

    /// Anything other than `eligible` is treated as ineligible.
    pub fn parse(s: &str) -> Self {
        match s {
            "eligible" => SponsorEligibility::Eligible,
            _ => SponsorEligibility::Ineligible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub sponsor_eligibility: SponsorEligibility,
}
