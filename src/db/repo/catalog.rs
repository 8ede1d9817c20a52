//! Catalog lookups and seeding for the repository.

use crate::domain::{DocumentType, LoanTerm, LoanType, PriorityClass, Product};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decimal_col, months_col, Repository};

fn loan_type_from_row(row: &SqliteRow) -> Result<LoanType, sqlx::Error> {
    Ok(LoanType {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        interest_rate: decimal_col(row, "interest_rate")?,
        min_amount: decimal_col(row, "min_amount")?,
        max_amount: decimal_col(row, "max_amount")?,
        priority_class: PriorityClass::parse(&row.try_get::<String, _>("priority_class")?),
    })
}

fn loan_term_from_row(row: &SqliteRow) -> Result<LoanTerm, sqlx::Error> {
    Ok(LoanTerm {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        min_months: months_col(row, "min_months")?,
        max_months: months_col(row, "max_months")?,
    })
}

impl Repository {
    /// Insert or update a loan type by name, returning its id. `loan_type.id` is ignored.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_loan_type(&self, loan_type: &LoanType) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO loan_types (name, interest_rate, min_amount, max_amount, priority_class)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                interest_rate = excluded.interest_rate,
                min_amount = excluded.min_amount,
                max_amount = excluded.max_amount,
                priority_class = excluded.priority_class
            RETURNING id
            "#,
        )
        .bind(&loan_type.name)
        .bind(loan_type.interest_rate.to_canonical_string())
        .bind(loan_type.min_amount.to_canonical_string())
        .bind(loan_type.max_amount.to_canonical_string())
        .bind(loan_type.priority_class.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_get("id")
    }

    /// Insert or update a loan term by name, returning its id. `loan_term.id` is ignored.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_loan_term(&self, loan_term: &LoanTerm) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO loan_terms (name, min_months, max_months)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                min_months = excluded.min_months,
                max_months = excluded.max_months
            RETURNING id
            "#,
        )
        .bind(&loan_term.name)
        .bind(i64::from(loan_term.min_months))
        .bind(i64::from(loan_term.max_months))
        .fetch_one(&self.pool)
        .await?;

        row.try_get("id")
    }

    /// Insert a document type if absent, returning its id.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_document_type(&self, name: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO document_types (name) VALUES (?)
            ON CONFLICT(name) DO UPDATE SET name = excluded.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        row.try_get("id")
    }

    /// Insert a product for (type, term) if absent and replace its required documents.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_product(
        &self,
        loan_type_id: i64,
        loan_term_id: i64,
        required_document_type_ids: &[i64],
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO products (loan_type_id, loan_term_id) VALUES (?, ?)
            ON CONFLICT(loan_type_id, loan_term_id) DO UPDATE SET loan_type_id = excluded.loan_type_id
            RETURNING id
            "#,
        )
        .bind(loan_type_id)
        .bind(loan_term_id)
        .fetch_one(&mut *tx)
        .await?;
        let product_id: i64 = row.try_get("id")?;

        sqlx::query("DELETE FROM product_required_documents WHERE product_id = ?")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        for document_type_id in required_document_type_ids {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO product_required_documents (product_id, document_type_id)
                VALUES (?, ?)
                "#,
            )
            .bind(product_id)
            .bind(document_type_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(product_id)
    }

    /// Find a loan type by name (case-insensitive).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_loan_type_by_name(&self, name: &str) -> Result<Option<LoanType>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, interest_rate, min_amount, max_amount, priority_class
            FROM loan_types
            WHERE name = ? COLLATE NOCASE
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(loan_type_from_row).transpose()
    }

    /// Find a loan term by name (case-insensitive).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_loan_term_by_name(&self, name: &str) -> Result<Option<LoanTerm>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, name, min_months, max_months FROM loan_terms WHERE name = ? COLLATE NOCASE",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(loan_term_from_row).transpose()
    }

    /// Find a document type by name (case-insensitive).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_document_type_by_name(
        &self,
        name: &str,
    ) -> Result<Option<DocumentType>, sqlx::Error> {
        let row = sqlx::query("SELECT id, name FROM document_types WHERE name = ? COLLATE NOCASE")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            Ok(DocumentType {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
            })
        })
        .transpose()
    }

    /// Id of the product combining a loan type and term, if one exists.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_product_id(
        &self,
        loan_type_id: i64,
        loan_term_id: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query("SELECT id FROM products WHERE loan_type_id = ? AND loan_term_id = ?")
            .bind(loan_type_id)
            .bind(loan_term_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get("id")).transpose()
    }

    /// Load a product with its loan type, term and required documents.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_product(&self, product_id: i64) -> Result<Option<Product>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT p.id AS product_id,
                   lt.id AS type_id, lt.name AS type_name, lt.interest_rate, lt.min_amount,
                   lt.max_amount, lt.priority_class,
                   tm.id AS term_id, tm.name AS term_name, tm.min_months, tm.max_months
            FROM products p
            JOIN loan_types lt ON lt.id = p.loan_type_id
            JOIN loan_terms tm ON tm.id = p.loan_term_id
            WHERE p.id = ?
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let loan_type = LoanType {
            id: row.try_get("type_id")?,
            name: row.try_get("type_name")?,
            interest_rate: decimal_col(&row, "interest_rate")?,
            min_amount: decimal_col(&row, "min_amount")?,
            max_amount: decimal_col(&row, "max_amount")?,
            priority_class: PriorityClass::parse(&row.try_get::<String, _>("priority_class")?),
        };
        let loan_term = LoanTerm {
            id: row.try_get("term_id")?,
            name: row.try_get("term_name")?,
            min_months: months_col(&row, "min_months")?,
            max_months: months_col(&row, "max_months")?,
        };

        let docs = sqlx::query(
            r#"
            SELECT dt.id, dt.name
            FROM product_required_documents prd
            JOIN document_types dt ON dt.id = prd.document_type_id
            WHERE prd.product_id = ?
            ORDER BY dt.id ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        let required_documents = docs
            .iter()
            .map(|r| {
                Ok(DocumentType {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Some(Product {
            id: row.try_get("product_id")?,
            loan_type,
            loan_term,
            required_documents,
        }))
    }
}
