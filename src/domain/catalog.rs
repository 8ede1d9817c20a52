//! Catalog records: loan types, loan terms and the products combining them.

use super::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Admission priority class carried by a loan type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Medical,
    Educational,
    Project,
    Standard,
}

impl PriorityClass {
    /// Parse a stored class name; unknown names fall back to `Standard`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "medical" => PriorityClass::Medical,
            "educational" => PriorityClass::Educational,
            "project" => PriorityClass::Project,
            _ => PriorityClass::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityClass::Medical => "medical",
            PriorityClass::Educational => "educational",
            PriorityClass::Project => "project",
            PriorityClass::Standard => "standard",
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanType {
    pub id: i64,
    pub name: String,
    /// Annual percentage rate, e.g. `12` for 12%.
    pub interest_rate: Decimal,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub priority_class: PriorityClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerm {
    pub id: i64,
    pub name: String,
    pub min_months: u32,
    pub max_months: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    pub id: i64,
    pub name: String,
}

/// A loan type paired with a loan term, plus its required documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub loan_type: LoanType,
    pub loan_term: LoanTerm,
    pub required_documents: Vec<DocumentType>,
}

impl Product {
    pub fn required_document_ids(&self) -> Vec<i64> {
        self.required_documents.iter().map(|d| d.id).collect()
    }

    pub fn amount_in_bounds(&self, amount: Decimal) -> bool {
        amount >= self.loan_type.min_amount && amount <= self.loan_type.max_amount
    }

    pub fn term_in_bounds(&self, months: u32) -> bool {
        months >= self.loan_term.min_months && months <= self.loan_term.max_months
    }
}
