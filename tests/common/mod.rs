//! Common test utilities for integration tests
//!
//! Shared fixtures: temp data directories, a small sample taxonomy,
//! scripted generators and a miner wired to JSON stores.

#![allow(dead_code)]

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use dialogue_miner::adapters::generators::mock::{expert_json, MockTurnGenerator};
use dialogue_miner::adapters::json_store::{JsonInboxRepository, JsonTaxonomyRepository};
use dialogue_miner::domain::models::{Category, Config, Taxonomy};
use dialogue_miner::domain::ports::{GeneratorRole, TaxonomyRepository};
use dialogue_miner::KnowledgeMiner;

pub const DOMAIN: &str = "hr";

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Initializes a tracing subscriber that writes through the test harness.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Poll `predicate` every 20ms until it holds or `timeout_ms` elapses.
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    false
}

/// Same category names as the built-in scenario library, fewer services.
pub fn sample_taxonomy() -> Taxonomy {
    Taxonomy::new(vec![
        Category::new("Recruitment & Talent Acquisition")
            .with_services(["Executive Search", "Flexible Staffing"]),
        Category::new("Termination & Compliance")
            .with_services(["Termination Compliance Advisory", "Non-Compete Management"]),
        Category::new("Compensation, Benefits & Tax").with_services(["Payroll Tax Optimization"]),
        Category::new("Organization Development & Training")
            .with_services(["Leadership Training"]),
    ])
}

/// Config rooted at `data_dir` with the scripted generator and no batch delay.
pub fn test_config(data_dir: &Path) -> Config {
    let mut config = Config {
        data_dir: data_dir.display().to_string(),
        ..Config::default()
    };
    config.generator.provider = "mock".to_string();
    config.batch.inter_run_delay_ms = 0;
    config
}

/// Opens, asks two questions and concludes with `service` on the third expert turn.
pub fn concluding_generator(service: &str) -> MockTurnGenerator {
    MockTurnGenerator::new()
        .with_texts(
            GeneratorRole::Opening,
            [json!({"response": "Something at work is going wrong and I don't know who to ask."})
                .to_string()],
        )
        .with_texts(
            GeneratorRole::Expert,
            [
                expert_json("active", "", 0.3, "Is this about someone already on your team?"),
                expert_json("active", "", 0.6, "Would you like to change how they are employed?"),
                expert_json("concluded", service, 0.9, "That sounds like a clear case."),
            ],
        )
        .with_texts(
            GeneratorRole::Novice,
            [json!({"response": "Yes, someone already here. It is getting worse."}).to_string()],
        )
}

/// Expert never concludes.
pub fn stalling_generator() -> MockTurnGenerator {
    MockTurnGenerator::new()
        .with_texts(GeneratorRole::Opening, ["I have a problem with a colleague."])
        .with_texts(
            GeneratorRole::Expert,
            [expert_json(
                "active",
                "Labor Relations Compliance",
                0.4,
                "Can you tell me more?",
            )],
        )
        .with_texts(GeneratorRole::Novice, ["It's complicated."])
}

/// Expert calls always fail.
pub fn failing_generator() -> MockTurnGenerator {
    MockTurnGenerator::new()
        .with_texts(GeneratorRole::Opening, ["Hello?"])
        .with_failure(GeneratorRole::Expert, "upstream unavailable")
}

pub async fn seed_taxonomy(data_dir: &Path, taxonomy: &Taxonomy) {
    JsonTaxonomyRepository::new(data_dir)
        .save(DOMAIN, taxonomy)
        .await
        .expect("Failed to seed taxonomy");
}

/// Miner over JSON stores in `config.data_dir`, using `generator`.
pub fn json_miner(config: Config, generator: MockTurnGenerator) -> KnowledgeMiner {
    let data_dir = config.data_dir.clone();
    KnowledgeMiner::with_parts(
        config,
        Arc::new(JsonTaxonomyRepository::new(&data_dir)),
        Arc::new(JsonInboxRepository::new(&data_dir)),
        Arc::new(generator),
    )
}

/// JSON-backed miner over a seeded sample taxonomy.
pub async fn seeded_miner(dir: &TempDir, generator: MockTurnGenerator) -> KnowledgeMiner {
    seed_taxonomy(dir.path(), &sample_taxonomy()).await;
    json_miner(test_config(dir.path()), generator)
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).expect("Failed to read document");
    serde_json::from_str(&text).expect("Document is not JSON")
}
