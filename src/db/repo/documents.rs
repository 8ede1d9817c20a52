//! Document record operations for the repository.

use crate::domain::{
    ContractId, DocumentId, DocumentRecord, DocumentStatus, StoredFile, TimeMs,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use super::{decode_err, uuid_col, Repository};

const DOCUMENT_COLUMNS: &str = r#"
    id, contract_id, document_type_id, file_name, url, external_id, status,
    review_note, uploaded_at, reviewed_at
"#;

fn document_from_row(row: &SqliteRow) -> Result<DocumentRecord, sqlx::Error> {
    let status_raw: String = row.try_get("status")?;
    Ok(DocumentRecord {
        id: DocumentId(uuid_col(row, "id")?),
        contract_id: ContractId(uuid_col(row, "contract_id")?),
        document_type_id: row.try_get("document_type_id")?,
        file_name: row.try_get("file_name")?,
        stored: StoredFile {
            url: row.try_get("url")?,
            external_id: row.try_get("external_id")?,
        },
        status: DocumentStatus::parse(&status_raw).ok_or_else(|| decode_err("status", &status_raw))?,
        review_note: row.try_get("review_note")?,
        uploaded_at: TimeMs::new(row.try_get("uploaded_at")?),
        reviewed_at: row.try_get::<Option<i64>, _>("reviewed_at")?.map(TimeMs::new),
    })
}

impl Repository {
    pub(super) async fn insert_document_tx(
        tx: &mut Transaction<'_, Sqlite>,
        document: &DocumentRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO documents (
                id, contract_id, document_type_id, file_name, url, external_id, status,
                review_note, uploaded_at, reviewed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(document.id.to_string())
        .bind(document.contract_id.to_string())
        .bind(document.document_type_id)
        .bind(&document.file_name)
        .bind(&document.stored.url)
        .bind(&document.stored.external_id)
        .bind(document.status.as_str())
        .bind(document.review_note.as_deref())
        .bind(document.uploaded_at.as_ms())
        .bind(document.reviewed_at.map(|t| t.as_ms()))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Insert a document record. A second record for the same contract and type
    /// violates the unique constraint.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_document(&self, document: &DocumentRecord) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        Self::insert_document_tx(&mut tx, document).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Replace a rejected document with a fresh upload.
    ///
    /// Returns false if the existing record is no longer rejected.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn replace_rejected_document(
        &self,
        existing: &DocumentId,
        replacement: &DocumentRecord,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET id = ?, file_name = ?, url = ?, external_id = ?, status = 'pending',
                review_note = NULL, uploaded_at = ?, reviewed_at = NULL
            WHERE id = ? AND status = 'rejected'
            "#,
        )
        .bind(replacement.id.to_string())
        .bind(&replacement.file_name)
        .bind(&replacement.stored.url)
        .bind(&replacement.stored.external_id)
        .bind(replacement.uploaded_at.as_ms())
        .bind(existing.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a document by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM documents WHERE id = ?", DOCUMENT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    /// Document of a given type on a contract, if uploaded.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_document(
        &self,
        contract_id: &ContractId,
        document_type_id: i64,
    ) -> Result<Option<DocumentRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE contract_id = ? AND document_type_id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(contract_id.to_string())
        .bind(document_type_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    /// All documents on a contract, ordered by type.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_documents(
        &self,
        contract_id: &ContractId,
    ) -> Result<Vec<DocumentRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE contract_id = ? ORDER BY document_type_id ASC",
            DOCUMENT_COLUMNS
        ))
        .bind(contract_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    /// Record a review outcome.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_document_status(
        &self,
        id: &DocumentId,
        status: DocumentStatus,
        note: Option<&str>,
        reviewed_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE documents SET status = ?, review_note = ?, reviewed_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(note)
        .bind(reviewed_at.as_ms())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
