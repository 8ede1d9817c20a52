//! Collaborators outside the approval core: document storage and notification delivery.

use crate::domain::{ContractId, StoredFile, UserId};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub mod mock;
pub mod storage;
pub mod webhook;

pub use mock::{MockDocumentStore, MockNotifier};
pub use storage::LocalDocumentStore;
pub use webhook::{LogNotifier, WebhookNotifier};

/// Blob storage for uploaded documents.
///
/// The core persists only the returned reference.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Store a file for a contract.
    async fn store(
        &self,
        contract_id: &ContractId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError>;

    /// Delete a previously stored file.
    async fn delete(&self, external_id: &str) -> Result<(), StorageError>;
}

/// Delivery of user-facing notifications.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SponsorRequested,
    SponsorResponded,
    ContractApproved,
    ContractRejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn new(user_id: &UserId, kind: NotificationKind, payload: serde_json::Value) -> Self {
        Self {
            user_id: user_id.clone(),
            kind,
            payload,
        }
    }
}

/// Send every notification, logging failures instead of returning them.
pub async fn dispatch(notifier: &dyn Notifier, notifications: Vec<Notification>) {
    for notification in notifications {
        if let Err(e) = notifier.notify(&notification).await {
            warn!(
                user_id = %notification.user_id,
                kind = ?notification.kind,
                error = %e,
                "notification dropped"
            );
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored file not found: {0}")]
    NotFound(String),
    #[error("invalid file name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error {status}")]
    Http { status: u16 },
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}
