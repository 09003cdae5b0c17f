//! JSON file implementation of the InboxRepository.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{read_document, write_document};
use crate::domain::errors::DomainResult;
use crate::domain::models::PendingRecord;
use crate::domain::ports::InboxRepository;

/// The inbox document at `<root>/inbox.json`, newest first.
pub struct JsonInboxRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonInboxRepository {
    /// Inbox under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("inbox.json"),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the inbox document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> DomainResult<Vec<PendingRecord>> {
        Ok(read_document(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl InboxRepository for JsonInboxRepository {
    async fn list(&self) -> DomainResult<Vec<PendingRecord>> {
        self.read_all().await
    }

    async fn push(&self, record: PendingRecord) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        records.insert(0, record);
        write_document(&self.path, &records).await
    }

    async fn remove(&self, ids: &[String]) -> DomainResult<usize> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        let before = records.len();
        records.retain(|r| !ids.contains(&r.id));
        let removed = before - records.len();
        if removed > 0 {
            write_document(&self.path, &records).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str) -> PendingRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "timestamp": Utc::now(),
            "domain": "hr",
            "query": format!("query {id}"),
            "ai_prediction": "Executive Search",
            "ground_truth": "Executive Search",
            "category": "Recruitment & Talent Acquisition",
            "confidence": 0.8
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_absent_inbox_is_empty() {
        let dir = TempDir::new().unwrap();
        let repo = JsonInboxRepository::new(dir.path());
        assert!(repo.list().await.unwrap().is_empty());
        assert_eq!(repo.remove(&["sim_1".to_string()]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_push_keeps_newest_first() {
        let dir = TempDir::new().unwrap();
        let repo = JsonInboxRepository::new(dir.path());

        repo.push(record("sim_1")).await.unwrap();
        repo.push(record("sim_2")).await.unwrap();

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["sim_2", "sim_1"]);
        assert!(repo.get("sim_1").await.unwrap().is_some());
        assert!(repo.get("sim_9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let dir = TempDir::new().unwrap();
        let repo = JsonInboxRepository::new(dir.path());
        for id in ["sim_1", "sim_2", "sim_3"] {
            repo.push(record(id)).await.unwrap();
        }

        let removed = repo
            .remove(&["sim_1".to_string(), "sim_3".to_string(), "sim_x".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 2);
        let remaining = repo.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "sim_2");
    }
}
