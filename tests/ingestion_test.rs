//! Ingestion and taxonomy maintenance over the JSON stores.

mod common;

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

use common::{read_json, sample_taxonomy, seed_taxonomy, temp_dir, DOMAIN};
use dialogue_miner::adapters::json_store::{JsonInboxRepository, JsonTaxonomyRepository};
use dialogue_miner::domain::errors::DomainError;
use dialogue_miner::domain::models::{Category, MutationOutcome, PendingRecord, Taxonomy};
use dialogue_miner::domain::ports::{InboxRepository, TaxonomyRepository};
use dialogue_miner::services::{coverage_report, IngestOutcome, KnowledgeStore};

struct Fixture {
    _dir: tempfile::TempDir,
    data_dir: std::path::PathBuf,
    inbox: Arc<JsonInboxRepository>,
    taxonomies: Arc<JsonTaxonomyRepository>,
    store: KnowledgeStore,
}

async fn fixture(taxonomy: Option<Taxonomy>) -> Fixture {
    let dir = temp_dir();
    let data_dir = dir.path().to_path_buf();
    if let Some(taxonomy) = taxonomy {
        seed_taxonomy(&data_dir, &taxonomy).await;
    }
    let inbox = Arc::new(JsonInboxRepository::new(&data_dir));
    let taxonomies = Arc::new(JsonTaxonomyRepository::new(&data_dir));
    let store = KnowledgeStore::new(taxonomies.clone(), inbox.clone());
    Fixture {
        _dir: dir,
        data_dir,
        inbox,
        taxonomies,
        store,
    }
}

fn record(id: &str, query: &str, prediction: &str, category: &str, age_secs: i64) -> PendingRecord {
    serde_json::from_value(json!({
        "id": id,
        "timestamp": Utc::now() - Duration::seconds(age_secs),
        "domain": DOMAIN,
        "query": query,
        "ai_prediction": prediction,
        "ground_truth": prediction,
        "category": category,
        "confidence": 0.85,
        "total_turns": 3,
        "diagnosis_correct": true
    }))
    .unwrap()
}

#[tokio::test]
async fn test_unrelated_taxonomy_leaves_record_pending() {
    let fx = fixture(Some(Taxonomy::new(vec![
        Category::new("Facilities").with_services(["Office Cleaning"]),
    ])))
    .await;
    fx.inbox
        .push(record("sim_00000001", "My boss is unfair", "Executive Search", "Recruitment", 0))
        .await
        .unwrap();
    let path = fx.taxonomies.path_for(DOMAIN);
    let before = std::fs::read_to_string(&path).unwrap();

    let report = fx.store.ingest("sim_00000001", DOMAIN).await.unwrap();

    assert_eq!(report.outcome, IngestOutcome::Unmatched);
    assert_eq!(fx.inbox.list().await.unwrap().len(), 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn test_identical_record_is_a_duplicate_and_leaves_inbox() {
    let fx = fixture(Some(sample_taxonomy())).await;
    let first = record("sim_00000001", "Hiring a CFO", "Executive Search", "", 10);
    let mut second = first.clone();
    second.id = "sim_00000002".to_string();
    fx.inbox.push(first).await.unwrap();
    fx.inbox.push(second).await.unwrap();

    let matched = fx.store.ingest("sim_00000001", DOMAIN).await.unwrap();
    let duplicate = fx.store.ingest("sim_00000002", DOMAIN).await.unwrap();

    assert!(matches!(matched.outcome, IngestOutcome::Matched { .. }));
    assert_eq!(
        duplicate.outcome,
        IngestOutcome::Duplicate {
            category: "Recruitment & Talent Acquisition".to_string(),
            service: "Executive Search".to_string(),
        }
    );
    assert!(fx.inbox.list().await.unwrap().is_empty());
    let taxonomy = fx.store.taxonomy(DOMAIN).await;
    assert_eq!(taxonomy.trace_count(), 1);
}

#[tokio::test]
async fn test_category_fallback_creates_service_on_disk() {
    let fx = fixture(Some(sample_taxonomy())).await;
    fx.inbox
        .push(record(
            "sim_00000001",
            "Our managers don't know how to lead",
            "Manager Coaching Program",
            "Organization Development",
            0,
        ))
        .await
        .unwrap();

    let report = fx.store.ingest("sim_00000001", DOMAIN).await.unwrap();

    assert_eq!(
        report.outcome,
        IngestOutcome::Matched {
            category: "Organization Development & Training".to_string(),
            service: "Manager Coaching Program".to_string(),
            created_service: true,
        }
    );
    let document = read_json(&fx.data_dir.join("domains").join("hr.json"));
    let services = document["taxonomy"][3]["services"].as_array().unwrap();
    assert_eq!(services.last().unwrap(), "Manager Coaching Program");
    let traces = &document["taxonomy"][3]["trace_records"]["Manager Coaching Program"];
    assert_eq!(traces[0]["id"], "sim_00000001");
    assert_eq!(traces[0]["query"], "Our managers don't know how to lead");
}

#[tokio::test]
async fn test_ingest_all_is_oldest_first_and_keeps_unmatched() {
    let fx = fixture(Some(sample_taxonomy())).await;
    // Pushed newest first: the inbox lists sim_3, sim_2, sim_1.
    fx.inbox
        .push(record("sim_00000001", "Need a headhunter", "Executive Search", "", 30))
        .await
        .unwrap();
    fx.inbox
        .push(record("sim_00000002", "Need seasonal staff", "Flexible Staffing", "", 20))
        .await
        .unwrap();
    fx.inbox
        .push(record("sim_00000003", "Lost my keys", "Locksmith Services", "Household", 10))
        .await
        .unwrap();
    let mut other_domain = record("sim_00000004", "Need a headhunter", "Executive Search", "", 5);
    other_domain.domain = "legal".to_string();
    fx.inbox.push(other_domain).await.unwrap();

    let report = fx.store.ingest_all(DOMAIN).await.unwrap();

    assert_eq!(report.matched, 2);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.unmatched, 1);
    let order: Vec<&str> = report.reports.iter().map(|r| r.record_id.as_str()).collect();
    assert_eq!(order, vec!["sim_00000001", "sim_00000002", "sim_00000003"]);

    let remaining: Vec<String> = fx.inbox.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec!["sim_00000004", "sim_00000003"]);
    assert_eq!(fx.store.taxonomy(DOMAIN).await.trace_count(), 2);
}

#[tokio::test]
async fn test_reject_removes_without_ingesting() {
    let fx = fixture(Some(sample_taxonomy())).await;
    fx.inbox
        .push(record("sim_00000001", "Hiring a CFO", "Executive Search", "", 0))
        .await
        .unwrap();

    let rejected = fx.store.reject("sim_00000001").await.unwrap();

    assert_eq!(rejected.ai_prediction, "Executive Search");
    assert!(fx.inbox.list().await.unwrap().is_empty());
    assert_eq!(fx.store.taxonomy(DOMAIN).await.trace_count(), 0);
    assert!(matches!(
        fx.store.reject("sim_00000001").await,
        Err(DomainError::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn test_taxonomy_mutations_persist() {
    let fx = fixture(None).await;

    assert_eq!(
        fx.store
            .add_category(DOMAIN, "Payroll", Some("Pay and payslips".to_string()))
            .await
            .unwrap(),
        MutationOutcome::Added
    );
    assert_eq!(
        fx.store.add_category(DOMAIN, "Payroll", None).await.unwrap(),
        MutationOutcome::Skipped
    );
    assert_eq!(
        fx.store.add_service(DOMAIN, "Payroll", "Payslip Audit").await.unwrap(),
        MutationOutcome::Added
    );
    fx.store.add_category(DOMAIN, "Benefits", None).await.unwrap();
    assert!(matches!(
        fx.store.add_service(DOMAIN, "Benefits", "Payslip Audit").await,
        Err(DomainError::ServiceConflict { .. })
    ));
    assert!(matches!(
        fx.store.rename_category(DOMAIN, "Payroll", "Benefits").await,
        Err(DomainError::CategoryExists(_))
    ));

    fx.store.rename_category(DOMAIN, "Payroll", "Payroll & Tax").await.unwrap();
    let removed = fx.store.delete_category(DOMAIN, "Benefits").await.unwrap();
    assert_eq!(removed.name, "Benefits");

    let reloaded = JsonTaxonomyRepository::new(&fx.data_dir).load(DOMAIN).await;
    assert_eq!(reloaded.categories.len(), 1);
    let payroll = reloaded.category("Payroll & Tax").unwrap();
    assert_eq!(payroll.description.as_deref(), Some("Pay and payslips"));
    assert!(payroll.has_service("Payslip Audit"));
    assert_eq!(fx.store.domains().await.unwrap(), vec![DOMAIN.to_string()]);
}

#[tokio::test]
async fn test_clean_merges_duplicate_categories() {
    let fx = fixture(Some(Taxonomy::new(vec![
        Category::new("Payroll").with_services(["Payslip Audit"]),
        Category::new("Payroll").with_services(["Payslip Audit", "Payroll Outsourcing"]),
    ])))
    .await;

    let report = fx.store.clean(DOMAIN).await.unwrap();

    assert_eq!(report.removed_categories, 1);
    assert_eq!(report.removed_services, 1);
    let taxonomy = fx.store.taxonomy(DOMAIN).await;
    assert_eq!(taxonomy.categories.len(), 1);
    assert_eq!(
        taxonomy.categories[0].services,
        vec!["Payslip Audit".to_string(), "Payroll Outsourcing".to_string()]
    );
    assert!(fx.store.clean(DOMAIN).await.unwrap().is_clean());
}

#[tokio::test]
async fn test_mutation_refuses_malformed_document() {
    let fx = fixture(None).await;
    let path = fx.taxonomies.path_for(DOMAIN);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let result = fx.store.add_category(DOMAIN, "Payroll", None).await;

    assert!(matches!(result, Err(DomainError::Serialization(_))));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[tokio::test]
async fn test_unknown_document_keys_survive_ingestion() {
    let fx = fixture(None).await;
    let path = fx.taxonomies.path_for(DOMAIN);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let document = json!({
        "version": 3,
        "taxonomy": [{"name": "Recruitment", "services": ["Executive Search"]}]
    });
    std::fs::write(&path, document.to_string()).unwrap();
    fx.inbox
        .push(record("sim_00000001", "Hiring a CFO", "Executive Search", "", 0))
        .await
        .unwrap();

    fx.store.ingest("sim_00000001", DOMAIN).await.unwrap();

    let saved = read_json(&path);
    assert_eq!(saved["version"], 3);
    assert_eq!(
        saved["taxonomy"][0]["trace_records"]["Executive Search"]
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_coverage_follows_ingestion() {
    let fx = fixture(Some(sample_taxonomy())).await;
    let empty = coverage_report(DOMAIN, &fx.store.taxonomy(DOMAIN).await);
    assert_eq!(empty.summary.total_services, 6);
    assert_eq!(empty.summary.covered_services, 0);
    assert_eq!(empty.uncovered.len(), 6);

    fx.inbox
        .push(record("sim_00000001", "Hiring a CFO", "Executive Search", "", 0))
        .await
        .unwrap();
    fx.store.ingest("sim_00000001", DOMAIN).await.unwrap();

    let report = coverage_report(DOMAIN, &fx.store.taxonomy(DOMAIN).await);
    assert_eq!(report.summary.covered_services, 1);
    assert_eq!(report.summary.total_traces, 1);
    assert!((report.categories[0].coverage_rate - 0.5).abs() < 1e-9);
    assert_eq!(report.priority_queue.last().unwrap().service, "Executive Search");
    assert!(!report
        .uncovered
        .contains(&("Recruitment & Talent Acquisition".to_string(), "Executive Search".to_string())));
}

#[tokio::test]
async fn test_documents_from_older_tooling_load_and_ingest() {
    let fx = fixture(None).await;
    let path = fx.taxonomies.path_for(DOMAIN);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let document = json!({
        "taxonomy": [{
            "name": "Recruitment",
            "services": ["Executive Search"],
            "trace_records": {
                "Executive Search": [{
                    "id": "sim_0ld0ld01",
                    "timestamp": "2024-11-02T14:03:55.481920",
                    "query": "need a new CFO fast",
                    "ai_prediction": "Executive Search",
                    "confidence": 0.85,
                    "source": "batch_ai_battle_v6",
                    "dialogue_path": [
                        {"step": 1, "role": "human", "content": "need a new CFO fast"},
                        {"step": 2, "role": "ai", "content": "Which seniority?"}
                    ],
                    "total_turns": 2,
                    "diagnosis_correct": null,
                    "ground_truth": "Executive Search"
                }]
            }
        }]
    });
    std::fs::write(&path, document.to_string()).unwrap();
    let inbox = json!([{
        "id": "sim_0ld0ld02",
        "timestamp": "2024-11-03 09:12:00",
        "status": "pending",
        "domain": DOMAIN,
        "query": "looking for a head of sales",
        "ground_truth": "Executive Search",
        "category": "Recruitment",
        "ai_prediction": "Executive Search",
        "confidence": 0.7,
        "diagnosis_correct": null,
        "dialogue_path": [{"role": "human", "content": "looking for a head of sales"}],
        "source": "batch_ai_battle_v6"
    }]);
    std::fs::write(fx.inbox.path(), inbox.to_string()).unwrap();

    let loaded = fx.taxonomies.load(DOMAIN).await;
    assert_eq!(loaded.trace_count(), 1);
    assert_eq!(fx.inbox.list().await.unwrap().len(), 1);

    let report = fx.store.ingest("sim_0ld0ld02", DOMAIN).await.unwrap();

    assert!(matches!(report.outcome, IngestOutcome::Matched { .. }));
    assert!(fx.inbox.list().await.unwrap().is_empty());
    let saved = read_json(&path);
    let traces = saved["taxonomy"][0]["trace_records"]["Executive Search"]
        .as_array()
        .unwrap();
    assert_eq!(traces.len(), 2);
    assert!(traces
        .iter()
        .any(|t| t["id"] == "sim_0ld0ld01" && t["diagnosis_correct"] == false));
    assert!(traces.iter().any(|t| t["id"] == "sim_0ld0ld02"));
}
