//! Document uploads, re-uploads and admin review.

use crate::db::Repository;
use crate::domain::{
    Contract, ContractId, DocumentId, DocumentRecord, DocumentStatus, TimeMs,
};
use crate::engine::document_gate;
use crate::gateway::DocumentStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::{CatalogError, Caller, WorkflowError};

/// A file submitted for one document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub document_type: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Clone)]
pub struct DocumentService {
    repo: Arc<Repository>,
    store: Arc<dyn DocumentStore>,
}

impl DocumentService {
    pub fn new(repo: Arc<Repository>, store: Arc<dyn DocumentStore>) -> Self {
        Self { repo, store }
    }

    /// Store the files submitted with a new contract and build their records.
    ///
    /// Nothing is persisted in the database; if any file fails, blobs already
    /// stored are removed again.
    pub async fn store_submission(
        &self,
        contract_id: &ContractId,
        uploads: &[Upload],
        now: TimeMs,
    ) -> Result<Vec<DocumentRecord>, WorkflowError> {
        let mut records: Vec<DocumentRecord> = Vec::with_capacity(uploads.len());
        let mut seen = HashSet::new();

        for upload in uploads {
            let result = async {
                let type_id = self.document_type_id(&upload.document_type).await?;
                if !seen.insert(type_id) {
                    return Err(WorkflowError::Conflict(format!(
                        "document type {} submitted more than once",
                        upload.document_type
                    )));
                }
                self.store_new(contract_id, type_id, upload, now).await
            }
            .await;

            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    self.discard(&records).await;
                    return Err(e);
                }
            }
        }

        Ok(records)
    }

    /// Remove the blobs behind records that were never persisted.
    pub async fn discard(&self, records: &[DocumentRecord]) {
        for record in records {
            if let Err(e) = self.store.delete(&record.stored.external_id).await {
                warn!(external_id = %record.stored.external_id, error = %e, "orphaned document blob");
            }
        }
    }

    /// Upload a document to an existing contract.
    ///
    /// A second upload for the same type is a conflict unless the existing
    /// record was rejected, in which case it is replaced.
    pub async fn upload(
        &self,
        caller: &Caller,
        contract_id: &ContractId,
        upload: Upload,
        now: TimeMs,
    ) -> Result<DocumentRecord, WorkflowError> {
        let contract = self.load_contract(contract_id).await?;
        if contract.borrower_id != caller.user_id && !caller.is_admin() {
            return Err(WorkflowError::Forbidden(
                "only the borrower may upload documents".into(),
            ));
        }
        if contract.status.is_terminal() {
            return Err(WorkflowError::Conflict(format!(
                "contract {} is already {}",
                contract.id, contract.status
            )));
        }

        let type_id = self.document_type_id(&upload.document_type).await?;
        let existing = self.repo.find_document(contract_id, type_id).await?;
        if let Some(existing) = &existing {
            if existing.status != DocumentStatus::Rejected {
                return Err(WorkflowError::Conflict(format!(
                    "a {} document is already on file",
                    upload.document_type
                )));
            }
        }

        let record = self.store_new(contract_id, type_id, &upload, now).await?;
        let persisted = match &existing {
            Some(old) => self.repo.replace_rejected_document(&old.id, &record).await,
            None => self.repo.insert_document(&record).await.map(|_| true),
        };

        match persisted {
            Ok(true) => {}
            Ok(false) => {
                self.discard(std::slice::from_ref(&record)).await;
                return Err(WorkflowError::Conflict(
                    "document changed while uploading".into(),
                ));
            }
            Err(e) => {
                self.discard(std::slice::from_ref(&record)).await;
                return Err(e.into());
            }
        }

        if let Some(old) = existing {
            if let Err(e) = self.store.delete(&old.stored.external_id).await {
                warn!(external_id = %old.stored.external_id, error = %e, "failed to delete replaced document");
            }
        }

        info!(
            contract_id = %contract_id,
            document_id = %record.id,
            document_type = %upload.document_type,
            "document uploaded"
        );
        Ok(record)
    }

    /// Approve or reject a document. Admin only.
    pub async fn review(
        &self,
        caller: &Caller,
        document_id: &DocumentId,
        decision: ReviewDecision,
        note: Option<String>,
        now: TimeMs,
    ) -> Result<DocumentRecord, WorkflowError> {
        if !caller.is_admin() {
            return Err(WorkflowError::Forbidden(
                "document review requires the admin role".into(),
            ));
        }

        let document = self
            .repo
            .get_document(document_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {} not found", document_id)))?;
        let contract = self.load_contract(&document.contract_id).await?;
        if contract.status.is_terminal() {
            return Err(WorkflowError::Conflict(format!(
                "contract {} is already {}",
                contract.id, contract.status
            )));
        }

        let status = match decision {
            ReviewDecision::Approve => DocumentStatus::Approved,
            ReviewDecision::Reject => DocumentStatus::Rejected,
        };
        self.repo
            .set_document_status(document_id, status, note.as_deref(), now)
            .await?;

        info!(document_id = %document_id, status = status.as_str(), "document reviewed");
        Ok(DocumentRecord {
            status,
            review_note: note,
            reviewed_at: Some(now),
            ..document
        })
    }

    /// Whether every required type has an approved record on the contract.
    pub async fn is_complete(
        &self,
        contract_id: &ContractId,
        required: &[i64],
    ) -> Result<bool, WorkflowError> {
        let records = self.repo.list_documents(contract_id).await?;
        Ok(document_gate::is_complete(required, &records))
    }

    pub async fn list(&self, contract_id: &ContractId) -> Result<Vec<DocumentRecord>, WorkflowError> {
        Ok(self.repo.list_documents(contract_id).await?)
    }

    async fn load_contract(&self, id: &ContractId) -> Result<Contract, WorkflowError> {
        self.repo
            .get_contract(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("contract {} not found", id)))
    }

    async fn document_type_id(&self, name: &str) -> Result<i64, WorkflowError> {
        let document_type = self
            .repo
            .find_document_type_by_name(name)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                kind: "document type",
                name: name.to_string(),
            })?;
        Ok(document_type.id)
    }

    async fn store_new(
        &self,
        contract_id: &ContractId,
        document_type_id: i64,
        upload: &Upload,
        now: TimeMs,
    ) -> Result<DocumentRecord, WorkflowError> {
        if upload.bytes.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "{} is empty",
                upload.file_name
            )));
        }
        let stored = self
            .store
            .store(contract_id, &upload.file_name, &upload.bytes)
            .await?;

        Ok(DocumentRecord {
            id: DocumentId::generate(),
            contract_id: *contract_id,
            document_type_id,
            file_name: upload.file_name.clone(),
            stored,
            status: DocumentStatus::Pending,
            review_note: None,
            uploaded_at: now,
            reviewed_at: None,
        })
    }
}
