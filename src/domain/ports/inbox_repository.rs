//! Storage port for pending records.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::PendingRecord;

/// Whole-document storage for the inbox of pending records, newest first
#[async_trait]
pub trait InboxRepository: Send + Sync {
    /// All pending records, newest first. An absent inbox is empty.
    async fn list(&self) -> DomainResult<Vec<PendingRecord>>;

    /// Insert at the front.
    async fn push(&self, record: PendingRecord) -> DomainResult<()>;

    /// Remove records by id, returning how many were removed.
    async fn remove(&self, ids: &[String]) -> DomainResult<usize>;

    /// Find one record by id.
    async fn get(&self, id: &str) -> DomainResult<Option<PendingRecord>> {
        Ok(self.list().await?.into_iter().find(|r| r.id == id))
    }
}
