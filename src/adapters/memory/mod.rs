//! In-process stores for tests and dry runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PendingRecord, Taxonomy};
use crate::domain::ports::{InboxRepository, TaxonomyRepository};

/// In-memory taxonomy store for tests. Writes can be made to fail.
#[derive(Default)]
pub struct MemoryTaxonomyRepository {
    documents: RwLock<BTreeMap<String, Taxonomy>>,
    fail_writes: AtomicBool,
}

impl MemoryTaxonomyRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding one document.
    pub fn with_domain(domain: impl Into<String>, taxonomy: Taxonomy) -> Self {
        let mut documents = BTreeMap::new();
        documents.insert(domain.into(), taxonomy);
        Self {
            documents: RwLock::new(documents),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `save` fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaxonomyRepository for MemoryTaxonomyRepository {
    async fn try_load(&self, domain: &str) -> DomainResult<Option<Taxonomy>> {
        Ok(self.documents.read().await.get(domain).cloned())
    }

    async fn save(&self, domain: &str, taxonomy: &Taxonomy) -> DomainResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::Storage(format!(
                "write refused for domain '{domain}'"
            )));
        }
        self.documents
            .write()
            .await
            .insert(domain.to_string(), taxonomy.clone());
        Ok(())
    }

    async fn list_domains(&self) -> DomainResult<Vec<String>> {
        Ok(self.documents.read().await.keys().cloned().collect())
    }
}

/// In-memory inbox for tests.
#[derive(Default)]
pub struct MemoryInboxRepository {
    records: RwLock<Vec<PendingRecord>>,
}

impl MemoryInboxRepository {
    /// Empty inbox.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InboxRepository for MemoryInboxRepository {
    async fn list(&self) -> DomainResult<Vec<PendingRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn push(&self, record: PendingRecord) -> DomainResult<()> {
        self.records.write().await.insert(0, record);
        Ok(())
    }

    async fn remove(&self, ids: &[String]) -> DomainResult<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !ids.contains(&r.id));
        Ok(before - records.len())
    }
}
