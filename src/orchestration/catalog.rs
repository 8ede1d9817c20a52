//! Catalog lookup and CSV seeding.

use crate::db::Repository;
use crate::domain::{Decimal, LoanTerm, LoanType, PriorityClass, Product};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::WorkflowError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },
    #[error("{0}")]
    OutOfBounds(String),
}

/// Resolves user-supplied type and term names to a product.
#[derive(Clone)]
pub struct CatalogLookup {
    repo: Arc<Repository>,
}

impl CatalogLookup {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Resolve a loan type and term by name into their combined product.
    ///
    /// Fails with `CatalogError::NotFound` if either name is unknown or no
    /// product pairs them.
    pub async fn resolve(&self, type_name: &str, term_name: &str) -> Result<Product, WorkflowError> {
        let loan_type = self
            .repo
            .find_loan_type_by_name(type_name)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                kind: "loan type",
                name: type_name.to_string(),
            })?;
        let loan_term = self
            .repo
            .find_loan_term_by_name(term_name)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                kind: "loan term",
                name: term_name.to_string(),
            })?;
        let product_id = self
            .repo
            .find_product_id(loan_type.id, loan_term.id)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                kind: "product",
                name: format!("{} / {}", loan_type.name, loan_term.name),
            })?;

        self.product(product_id).await
    }

    pub async fn product(&self, product_id: i64) -> Result<Product, WorkflowError> {
        let product = self
            .repo
            .get_product(product_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                kind: "product",
                name: product_id.to_string(),
            })?;
        Ok(product)
    }
}

/// Check a requested amount and term against the product bounds.
pub fn check_request(product: &Product, amount: Decimal, term_months: u32) -> Result<(), CatalogError> {
    if !product.amount_in_bounds(amount) {
        return Err(CatalogError::OutOfBounds(format!(
            "amount {} is outside [{}, {}] for {}",
            amount, product.loan_type.min_amount, product.loan_type.max_amount, product.loan_type.name
        )));
    }
    if !product.term_in_bounds(term_months) {
        return Err(CatalogError::OutOfBounds(format!(
            "term of {} months is outside [{}, {}] for {}",
            term_months, product.loan_term.min_months, product.loan_term.max_months, product.loan_term.name
        )));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog CSV error: {0}")]
    Csv(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// One catalog CSV line: a product with its type, term and required documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub loan_type: LoanType,
    pub loan_term: LoanTerm,
    pub required_documents: Vec<String>,
}

pub fn parse_catalog_csv(csv_bytes: &[u8]) -> Result<Vec<CatalogRow>, SeedError> {
    #[derive(Debug, serde::Deserialize)]
    struct Row {
        loan_type: String,
        interest_rate: String,
        min_amount: String,
        max_amount: String,
        priority_class: String,
        loan_term: String,
        min_months: u32,
        max_months: u32,
        #[serde(default)]
        required_documents: String,
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_bytes);

    let mut rows = Vec::new();
    for record in reader.deserialize::<Row>() {
        let row = record.map_err(|e| SeedError::Csv(e.to_string()))?;
        let decimal = |field: &str, raw: &str| {
            Decimal::from_str_canonical(raw)
                .map_err(|e| SeedError::Csv(format!("invalid {} {:?}: {}", field, raw, e)))
        };

        let interest_rate = decimal("interest_rate", &row.interest_rate)?;
        let min_amount = decimal("min_amount", &row.min_amount)?;
        let max_amount = decimal("max_amount", &row.max_amount)?;
        if interest_rate.is_negative() {
            return Err(SeedError::Csv(format!(
                "negative interest rate for {}",
                row.loan_type
            )));
        }
        if min_amount > max_amount {
            return Err(SeedError::Csv(format!("inverted amount bounds for {}", row.loan_type)));
        }
        if row.min_months == 0 || row.min_months > row.max_months {
            return Err(SeedError::Csv(format!("invalid month bounds for {}", row.loan_term)));
        }

        rows.push(CatalogRow {
            loan_type: LoanType {
                id: 0,
                name: row.loan_type,
                interest_rate,
                min_amount,
                max_amount,
                priority_class: PriorityClass::parse(&row.priority_class),
            },
            loan_term: LoanTerm {
                id: 0,
                name: row.loan_term,
                min_months: row.min_months,
                max_months: row.max_months,
            },
            required_documents: row
                .required_documents
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        });
    }

    Ok(rows)
}

/// Upsert every row of a catalog file. Returns the number of products written.
pub async fn seed_catalog_csv(repo: &Repository, path: impl AsRef<Path>) -> Result<usize, SeedError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    let rows = parse_catalog_csv(&bytes)?;

    for row in &rows {
        let type_id = repo.upsert_loan_type(&row.loan_type).await?;
        let term_id = repo.upsert_loan_term(&row.loan_term).await?;
        let mut doc_ids = Vec::with_capacity(row.required_documents.len());
        for name in &row.required_documents {
            doc_ids.push(repo.upsert_document_type(name).await?);
        }
        repo.upsert_product(type_id, term_id, &doc_ids).await?;
    }

    info!(products = rows.len(), path = %path.as_ref().display(), "catalog seeded");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    const CATALOG: &str = "\
loan_type,interest_rate,min_amount,max_amount,priority_class,loan_term,min_months,max_months,required_documents
Medical,12,1000,50000,medical,Short,6,24,ID Card;Medical Report
Education,8.5,500,20000,educational,Long,12,60,ID Card
";

    #[test]
    fn test_parse_catalog_rows() {
        let rows = parse_catalog_csv(CATALOG.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].loan_type.priority_class, PriorityClass::Medical);
        assert_eq!(rows[0].required_documents, vec!["ID Card", "Medical Report"]);
        assert_eq!(rows[1].loan_type.interest_rate.to_canonical_string(), "8.5");
        assert_eq!(rows[1].loan_term.max_months, 60);
    }

    #[test]
    fn test_parse_rejects_inverted_bounds() {
        let csv = "\
loan_type,interest_rate,min_amount,max_amount,priority_class,loan_term,min_months,max_months,required_documents
Bad,5,9000,100,project,Short,6,24,
";
        assert!(matches!(parse_catalog_csv(csv.as_bytes()), Err(SeedError::Csv(_))));
    }

    #[tokio::test]
    async fn test_seed_then_resolve() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db").to_string_lossy().to_string();
        let repo = Arc::new(Repository::new(init_db(&db_path).await.unwrap()));
        let csv_path = dir.path().join("catalog.csv");
        std::fs::write(&csv_path, CATALOG).unwrap();

        assert_eq!(seed_catalog_csv(&repo, &csv_path).await.unwrap(), 2);
        // Seeding is idempotent.
        assert_eq!(seed_catalog_csv(&repo, &csv_path).await.unwrap(), 2);

        let lookup = CatalogLookup::new(repo);
        let product = lookup.resolve("medical", "short").await.unwrap();
        assert_eq!(product.loan_type.name, "Medical");
        assert_eq!(product.required_documents.len(), 2);

        let missing = lookup.resolve("Medical", "Long").await.unwrap_err();
        assert!(matches!(
            missing,
            WorkflowError::Catalog(CatalogError::NotFound { kind: "product", .. })
        ));
        let unknown = lookup.resolve("Housing", "Short").await.unwrap_err();
        assert!(matches!(
            unknown,
            WorkflowError::Catalog(CatalogError::NotFound { kind: "loan type", .. })
        ));
    }

    #[test]
    fn test_check_request_bounds() {
        let rows = parse_catalog_csv(CATALOG.as_bytes()).unwrap();
        let product = Product {
            id: 1,
            loan_type: rows[0].loan_type.clone(),
            loan_term: rows[0].loan_term.clone(),
            required_documents: vec![],
        };
        let amount = |s: &str| Decimal::from_str_canonical(s).unwrap();
        assert!(check_request(&product, amount("5000"), 12).is_ok());
        assert!(check_request(&product, amount("999"), 12).is_err());
        assert!(check_request(&product, amount("5000"), 36).is_err());
    }
}
