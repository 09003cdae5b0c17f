//! Serialized taxonomy and inbox mutations.
//!
//! All read-modify-write cycles on taxonomy documents and the inbox go
//! through one async mutex, so in-process callers never lose updates. The
//! taxonomy is saved before records leave the inbox; a failed save leaves
//! the record pending.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Category, DedupReport, MutationOutcome, PendingRecord, Taxonomy};
use crate::domain::ports::{InboxRepository, TaxonomyRepository};
use crate::services::ingestion_matcher::{self, IngestOutcome};

/// Result of ingesting one inbox record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// The inbox record.
    pub record_id: String,
    /// Taxonomy it was matched against.
    pub domain: String,
    /// Where it landed.
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

/// Result of folding a whole inbox into one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIngestReport {
    /// Taxonomy ingested into.
    pub domain: String,
    /// Records stored as traces.
    pub matched: usize,
    /// Records dropped as duplicates.
    pub duplicates: usize,
    /// Records left in the inbox.
    pub unmatched: usize,
    /// Per record, oldest first.
    pub reports: Vec<IngestReport>,
}

/// Owns every write to taxonomy documents and the inbox.
pub struct KnowledgeStore {
    taxonomies: Arc<dyn TaxonomyRepository>,
    inbox: Arc<dyn InboxRepository>,
    write_lock: Mutex<()>,
}

impl KnowledgeStore {
    /// Store over the given repositories.
    pub fn new(taxonomies: Arc<dyn TaxonomyRepository>, inbox: Arc<dyn InboxRepository>) -> Self {
        Self {
            taxonomies,
            inbox,
            write_lock: Mutex::new(()),
        }
    }

    /// Fail-soft read for display and simulation.
    pub async fn taxonomy(&self, domain: &str) -> Taxonomy {
        self.taxonomies.load(domain).await
    }

    /// Domains with a stored taxonomy.
    pub async fn domains(&self) -> DomainResult<Vec<String>> {
        self.taxonomies.list_domains().await
    }

    /// Pending records, newest first.
    pub async fn inbox(&self) -> DomainResult<Vec<PendingRecord>> {
        self.inbox.list().await
    }

    /// Strict read for mutation. A missing document starts empty; a
    /// malformed one is an error so it is never overwritten.
    async fn load_for_update(&self, domain: &str) -> DomainResult<Taxonomy> {
        match self.taxonomies.try_load(domain).await? {
            Some(taxonomy) => Ok(taxonomy),
            None => {
                warn!(domain, "No taxonomy document yet, starting from empty");
                Ok(Taxonomy::default())
            }
        }
    }

    /// Ingest one inbox record into `domain`. Matched and duplicate records
    /// leave the inbox; unmatched ones stay.
    #[instrument(skip(self))]
    pub async fn ingest(&self, record_id: &str, domain: &str) -> DomainResult<IngestReport> {
        let _guard = self.write_lock.lock().await;

        let record = self
            .inbox
            .get(record_id)
            .await?
            .ok_or_else(|| DomainError::RecordNotFound(record_id.to_string()))?;

        let mut taxonomy = self.load_for_update(domain).await?;
        let outcome = ingestion_matcher::ingest(&record, &mut taxonomy);

        if outcome.is_mutation() {
            self.taxonomies.save(domain, &taxonomy).await?;
        }
        if outcome.is_resolved() {
            self.inbox.remove(&[record.id.clone()]).await?;
        }

        info!(status = outcome.status().as_str(), "Ingested record");
        Ok(IngestReport {
            record_id: record.id,
            domain: domain.to_string(),
            outcome,
        })
    }

    /// Fold a record into `domain` without touching the inbox.
    pub async fn ingest_record(&self, record: &PendingRecord, domain: &str) -> DomainResult<IngestOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut taxonomy = self.load_for_update(domain).await?;
        let outcome = ingestion_matcher::ingest(record, &mut taxonomy);
        if outcome.is_mutation() {
            self.taxonomies.save(domain, &taxonomy).await?;
        }
        Ok(outcome)
    }

    /// Ingest every inbox record whose domain is `domain`, with a single
    /// taxonomy write.
    #[instrument(skip(self))]
    pub async fn ingest_all(&self, domain: &str) -> DomainResult<BulkIngestReport> {
        let _guard = self.write_lock.lock().await;

        let records: Vec<PendingRecord> = self
            .inbox
            .list()
            .await?
            .into_iter()
            .filter(|r| r.domain == domain)
            .collect();
        let mut taxonomy = self.load_for_update(domain).await?;

        let mut report = BulkIngestReport {
            domain: domain.to_string(),
            ..BulkIngestReport::default()
        };
        let mut resolved = Vec::new();
        let mut mutated = false;

        // Oldest first, so traces keep the order records were produced in.
        for record in records.into_iter().rev() {
            let outcome = ingestion_matcher::ingest(&record, &mut taxonomy);
            match &outcome {
                IngestOutcome::Matched { .. } => report.matched += 1,
                IngestOutcome::Duplicate { .. } => report.duplicates += 1,
                IngestOutcome::Unmatched => report.unmatched += 1,
            }
            mutated |= outcome.is_mutation();
            if outcome.is_resolved() {
                resolved.push(record.id.clone());
            }
            report.reports.push(IngestReport {
                record_id: record.id,
                domain: domain.to_string(),
                outcome,
            });
        }

        if mutated {
            self.taxonomies.save(domain, &taxonomy).await?;
        }
        if !resolved.is_empty() {
            self.inbox.remove(&resolved).await?;
        }

        info!(
            matched = report.matched,
            duplicates = report.duplicates,
            unmatched = report.unmatched,
            "Bulk ingestion finished"
        );
        Ok(report)
    }

    /// Drop a record from the inbox without ingesting it.
    pub async fn reject(&self, record_id: &str) -> DomainResult<PendingRecord> {
        let _guard = self.write_lock.lock().await;
        let record = self
            .inbox
            .get(record_id)
            .await?
            .ok_or_else(|| DomainError::RecordNotFound(record_id.to_string()))?;
        self.inbox.remove(&[record.id.clone()]).await?;
        info!(record_id, "Rejected pending record");
        Ok(record)
    }

    /// Add a category and save. Skips without writing if it exists.
    pub async fn add_category(
        &self,
        domain: &str,
        name: &str,
        description: Option<String>,
    ) -> DomainResult<MutationOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut taxonomy = self.load_for_update(domain).await?;
        let outcome = taxonomy.add_category(name, description)?;
        if outcome == MutationOutcome::Added {
            self.taxonomies.save(domain, &taxonomy).await?;
        }
        Ok(outcome)
    }

    /// Add a service to a category and save.
    pub async fn add_service(
        &self,
        domain: &str,
        category: &str,
        service: &str,
    ) -> DomainResult<MutationOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut taxonomy = self.load_for_update(domain).await?;
        let outcome = taxonomy.add_service(category, service)?;
        if outcome == MutationOutcome::Added {
            self.taxonomies.save(domain, &taxonomy).await?;
        }
        Ok(outcome)
    }

    /// Rename a category and save.
    pub async fn rename_category(&self, domain: &str, from: &str, to: &str) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut taxonomy = self.load_for_update(domain).await?;
        taxonomy.rename_category(from, to)?;
        self.taxonomies.save(domain, &taxonomy).await
    }

    /// Permanently remove a category with its services and traces.
    pub async fn delete_category(&self, domain: &str, name: &str) -> DomainResult<Category> {
        let _guard = self.write_lock.lock().await;
        let mut taxonomy = self.load_for_update(domain).await?;
        let removed = taxonomy.delete_category(name)?;
        self.taxonomies.save(domain, &taxonomy).await?;
        warn!(
            domain,
            category = name,
            services = removed.services.len(),
            traces = removed.trace_count(),
            "Deleted category"
        );
        Ok(removed)
    }

    /// Drop duplicate categories and services.
    pub async fn clean(&self, domain: &str) -> DomainResult<DedupReport> {
        let _guard = self.write_lock.lock().await;
        let mut taxonomy = self.load_for_update(domain).await?;
        let report = taxonomy.deduplicate();
        if !report.is_clean() {
            self.taxonomies.save(domain, &taxonomy).await?;
        }
        Ok(report)
    }

    /// Write a whole taxonomy, replacing any existing document.
    pub async fn replace_taxonomy(&self, domain: &str, taxonomy: &Taxonomy) -> DomainResult<()> {
        let _guard = self.write_lock.lock().await;
        self.taxonomies.save(domain, taxonomy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryInboxRepository, MemoryTaxonomyRepository};
    use chrono::Utc;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(vec![Category::new("Termination & Compliance")
            .with_services(["Termination Compliance Advisory"])])
    }

    fn record(id: &str, prediction: &str) -> PendingRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "timestamp": Utc::now(),
            "domain": "hr",
            "query": format!("query for {id}"),
            "ai_prediction": prediction,
            "ground_truth": "Termination Compliance Advisory",
            "category": "Termination & Compliance",
            "confidence": 0.8
        }))
        .unwrap()
    }

    fn store() -> (KnowledgeStore, Arc<MemoryTaxonomyRepository>, Arc<MemoryInboxRepository>) {
        let taxonomies = Arc::new(MemoryTaxonomyRepository::with_domain("hr", taxonomy()));
        let inbox = Arc::new(MemoryInboxRepository::new());
        let store = KnowledgeStore::new(taxonomies.clone(), inbox.clone());
        (store, taxonomies, inbox)
    }

    #[tokio::test]
    async fn test_ingest_moves_record_out_of_inbox() {
        let (store, _, inbox) = store();
        inbox.push(record("sim_1", "Termination Compliance Advisory")).await.unwrap();

        let report = store.ingest("sim_1", "hr").await.unwrap();

        assert_eq!(report.outcome.status().as_str(), "matched");
        assert!(inbox.list().await.unwrap().is_empty());
        assert_eq!(store.taxonomy("hr").await.trace_count(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_record_stays() {
        let (store, _, inbox) = store();
        let mut rec = record("sim_1", "Flexible Staffing");
        rec.category = "Staffing".to_string();
        inbox.push(rec).await.unwrap();

        let report = store.ingest("sim_1", "hr").await.unwrap();

        assert_eq!(report.outcome, IngestOutcome::Unmatched);
        assert_eq!(inbox.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let (store, _, _) = store();
        let err = store.ingest("sim_404", "hr").await.unwrap_err();
        assert!(matches!(err, DomainError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_record_pending() {
        let (store, taxonomies, inbox) = store();
        inbox.push(record("sim_1", "Termination Compliance Advisory")).await.unwrap();
        taxonomies.set_fail_writes(true);

        assert!(store.ingest("sim_1", "hr").await.is_err());
        assert_eq!(inbox.list().await.unwrap().len(), 1);
        assert_eq!(store.taxonomy("hr").await.trace_count(), 0);
    }

    #[tokio::test]
    async fn test_ingest_all_counts_outcomes() {
        let (store, _, inbox) = store();
        inbox.push(record("sim_1", "Termination Compliance Advisory")).await.unwrap();
        let mut dup = record("sim_2", "Termination Compliance Advisory");
        dup.query = "query for sim_1".to_string();
        inbox.push(dup).await.unwrap();
        let mut stray = record("sim_3", "Flexible Staffing");
        stray.category = "Staffing".to_string();
        inbox.push(stray).await.unwrap();
        let mut other_domain = record("sim_4", "Termination Compliance Advisory");
        other_domain.domain = "tax".to_string();
        inbox.push(other_domain).await.unwrap();

        let report = store.ingest_all("hr").await.unwrap();

        assert_eq!((report.matched, report.duplicates, report.unmatched), (1, 1, 1));
        let remaining: Vec<String> = inbox.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec!["sim_4", "sim_3"]);
        assert_eq!(store.taxonomy("hr").await.trace_count(), 1);
    }

    #[tokio::test]
    async fn test_reject_removes_without_ingesting() {
        let (store, _, inbox) = store();
        inbox.push(record("sim_1", "Termination Compliance Advisory")).await.unwrap();

        let rejected = store.reject("sim_1").await.unwrap();

        assert_eq!(rejected.id, "sim_1");
        assert!(inbox.list().await.unwrap().is_empty());
        assert_eq!(store.taxonomy("hr").await.trace_count(), 0);
    }

    #[tokio::test]
    async fn test_taxonomy_mutations_persist() {
        let (store, _, _) = store();

        assert_eq!(
            store.add_category("hr", "Payroll", None).await.unwrap(),
            MutationOutcome::Added
        );
        assert_eq!(
            store.add_service("hr", "Payroll", "Payroll Outsourcing").await.unwrap(),
            MutationOutcome::Added
        );
        assert_eq!(
            store.add_service("hr", "Payroll", "Payroll Outsourcing").await.unwrap(),
            MutationOutcome::Skipped
        );
        store.rename_category("hr", "Payroll", "Payroll & Tax").await.unwrap();
        assert!(matches!(
            store.rename_category("hr", "Payroll & Tax", "Termination & Compliance").await,
            Err(DomainError::CategoryExists(_))
        ));

        let removed = store.delete_category("hr", "Payroll & Tax").await.unwrap();
        assert_eq!(removed.services, vec!["Payroll Outsourcing"]);
        assert!(store.taxonomy("hr").await.category("Payroll & Tax").is_none());
    }

    #[tokio::test]
    async fn test_clean_reports_removed_duplicates() {
        let taxonomies = Arc::new(MemoryTaxonomyRepository::with_domain(
            "hr",
            Taxonomy::new(vec![
                Category::new("A").with_services(["x", "y"]),
                Category::new("A").with_services(["y", "z"]),
            ]),
        ));
        let store = KnowledgeStore::new(taxonomies, Arc::new(MemoryInboxRepository::new()));

        let report = store.clean("hr").await.unwrap();

        assert_eq!(report.removed_categories, 1);
        assert_eq!(report.removed_services, 1);
        let cleaned = store.taxonomy("hr").await;
        assert_eq!(cleaned.categories.len(), 1);
        assert_eq!(cleaned.categories[0].services, vec!["x", "y", "z"]);
    }
}
