//! Completeness checks over a contract's documents.

use crate::domain::{DocumentRecord, DocumentStatus};
use std::collections::HashSet;

/// Required document types with no usable upload (missing or rejected).
pub fn missing_uploads(required: &[i64], records: &[DocumentRecord]) -> Vec<i64> {
    let uploaded: HashSet<i64> = records
        .iter()
        .filter(|r| r.status != DocumentStatus::Rejected)
        .map(|r| r.document_type_id)
        .collect();
    required
        .iter()
        .copied()
        .filter(|t| !uploaded.contains(t))
        .collect()
}

/// Required document types lacking an approved record.
pub fn unapproved(required: &[i64], records: &[DocumentRecord]) -> Vec<i64> {
    let approved: HashSet<i64> = records
        .iter()
        .filter(|r| r.status == DocumentStatus::Approved)
        .map(|r| r.document_type_id)
        .collect();
    required
        .iter()
        .copied()
        .filter(|t| !approved.contains(t))
        .collect()
}

/// True iff every required type has an approved record.
pub fn is_complete(required: &[i64], records: &[DocumentRecord]) -> bool {
    unapproved(required, records).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContractId, DocumentId, StoredFile, TimeMs};

    fn record(contract_id: ContractId, type_id: i64, status: DocumentStatus) -> DocumentRecord {
        DocumentRecord {
            id: DocumentId::generate(),
            contract_id,
            document_type_id: type_id,
            file_name: format!("doc-{}.pdf", type_id),
            stored: StoredFile {
                url: "file:///tmp/x".into(),
                external_id: "x".into(),
            },
            status,
            review_note: None,
            uploaded_at: TimeMs::new(0),
            reviewed_at: None,
        }
    }

    #[test]
    fn test_complete_when_all_required_approved() {
        let c = ContractId::generate();
        let records = vec![
            record(c, 1, DocumentStatus::Approved),
            record(c, 2, DocumentStatus::Approved),
        ];
        assert!(is_complete(&[1, 2], &records));
    }

    #[test]
    fn test_pending_or_rejected_keeps_gate_closed() {
        let c = ContractId::generate();
        let pending = vec![
            record(c, 1, DocumentStatus::Approved),
            record(c, 2, DocumentStatus::Pending),
        ];
        assert!(!is_complete(&[1, 2], &pending));
        assert_eq!(unapproved(&[1, 2], &pending), vec![2]);

        let rejected = vec![
            record(c, 1, DocumentStatus::Approved),
            record(c, 2, DocumentStatus::Rejected),
        ];
        assert!(!is_complete(&[1, 2], &rejected));
    }

    #[test]
    fn test_extra_documents_do_not_matter() {
        let c = ContractId::generate();
        let records = vec![
            record(c, 1, DocumentStatus::Approved),
            record(c, 9, DocumentStatus::Rejected),
        ];
        assert!(is_complete(&[1], &records));
        assert!(!is_complete(&[1, 2], &records));
    }

    #[test]
    fn test_no_requirements_is_complete() {
        assert!(is_complete(&[], &[]));
    }

    #[test]
    fn test_missing_uploads_ignores_review_state_except_rejection() {
        let c = ContractId::generate();
        let records = vec![
            record(c, 1, DocumentStatus::Pending),
            record(c, 2, DocumentStatus::Rejected),
        ];
        assert_eq!(missing_uploads(&[1, 2, 3], &records), vec![2, 3]);
    }
}
