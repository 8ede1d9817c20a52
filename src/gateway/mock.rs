//! In-memory collaborators for tests.

use super::{DocumentStore, Notification, Notifier, NotifyError, StorageError};
use crate::domain::{ContractId, StoredFile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Keeps stored files in memory.
#[derive(Debug, Default)]
pub struct MockDocumentStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    counter: AtomicUsize,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.files
            .lock()
            .map(|f| f.contains_key(external_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn store(
        &self,
        contract_id: &ContractId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let external_id = format!("{}/{}-{}", contract_id, n, file_name);
        self.files
            .lock()
            .map_err(|_| StorageError::NotFound("store poisoned".into()))?
            .insert(external_id.clone(), bytes.to_vec());
        Ok(StoredFile {
            url: format!("mem://{}", external_id),
            external_id,
        })
    }

    async fn delete(&self, external_id: &str) -> Result<(), StorageError> {
        self.files
            .lock()
            .map_err(|_| StorageError::NotFound("store poisoned".into()))?
            .remove(external_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(external_id.to_string()))
    }
}

/// Records notifications; optionally fails every send.
#[derive(Debug, Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<Notification>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::Unavailable("mock failure".into()));
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError::Unavailable("mock poisoned".into()))?
            .push(notification.clone());
        Ok(())
    }
}
