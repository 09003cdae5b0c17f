//! Control surface over simulation, batch execution and ingestion.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::adapters::generators::build_generator;
use crate::adapters::json_store::{JsonInboxRepository, JsonTaxonomyRepository};
use crate::domain::errors::DomainResult;
use crate::domain::models::{BatchStatus, Config, PendingRecord, Taxonomy};
use crate::domain::ports::{InboxRepository, TaxonomyRepository, TurnGenerator};
use crate::services::{
    coverage_report, BatchController, BatchJobHandle, BatchRejection, ControlAck, CoverageReport,
    IngestReport, KnowledgeStore, ScenarioGenerator, ScenarioLibrary, SimulationEngine,
    SimulationPipeline, SimulationRun,
};

/// A successful response body: `{"status": "success", ...data}`.
#[derive(Debug, Clone, Serialize)]
pub struct Success<T: Serialize> {
    status: &'static str,
    /// Payload fields, flattened into the envelope.
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Success<T> {
    /// Wrap `data`.
    pub fn new(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}

/// Facade wiring the stores, the simulation pipeline and the batch controller.
pub struct KnowledgeMiner {
    config: Config,
    knowledge: Arc<KnowledgeStore>,
    pipeline: Arc<SimulationPipeline>,
    batch: BatchController,
}

impl KnowledgeMiner {
    /// JSON stores under `config.data_dir` and the configured generator.
    pub fn from_config(config: Config) -> DomainResult<Self> {
        let data_dir = PathBuf::from(&config.data_dir);
        let taxonomies = Arc::new(JsonTaxonomyRepository::new(&data_dir));
        let inbox = Arc::new(JsonInboxRepository::new(&data_dir));
        let generator = build_generator(&config.generator)?;
        Ok(Self::with_parts(config, taxonomies, inbox, generator))
    }

    /// Assemble from explicit parts, with the built-in scenario library.
    pub fn with_parts(
        config: Config,
        taxonomies: Arc<dyn TaxonomyRepository>,
        inbox: Arc<dyn InboxRepository>,
        generator: Arc<dyn TurnGenerator>,
    ) -> Self {
        let scenarios = ScenarioGenerator::new(config.scenario.clone(), ScenarioLibrary::builtin_hr());
        Self::with_scenarios(config, taxonomies, inbox, generator, scenarios)
    }

    /// Like [`KnowledgeMiner::with_parts`] with a caller-supplied scenario generator.
    pub fn with_scenarios(
        config: Config,
        taxonomies: Arc<dyn TaxonomyRepository>,
        inbox: Arc<dyn InboxRepository>,
        generator: Arc<dyn TurnGenerator>,
        scenarios: ScenarioGenerator,
    ) -> Self {
        let engine = SimulationEngine::new(generator, config.simulation.clone());
        let pipeline = Arc::new(SimulationPipeline::new(
            engine,
            scenarios,
            Arc::clone(&taxonomies),
            Arc::clone(&inbox),
        ));
        let knowledge = Arc::new(KnowledgeStore::new(taxonomies, inbox));
        let batch = BatchController::new(
            Arc::clone(&pipeline),
            Arc::clone(&knowledge),
            config.batch.clone(),
        );
        info!(
            generator = pipeline.engine().generator_name(),
            data_dir = %config.data_dir,
            "Knowledge miner ready"
        );
        Self {
            config,
            knowledge,
            pipeline,
            batch,
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Taxonomy and inbox operations.
    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    /// Single-simulation pipeline.
    pub fn pipeline(&self) -> &SimulationPipeline {
        &self.pipeline
    }

    /// `domain`, or the configured default when absent.
    pub fn resolve_domain<'a>(&'a self, domain: Option<&'a str>) -> &'a str {
        domain
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&self.config.default_domain)
    }

    /// Start a batch of `count` simulations (default from config) against `domain`.
    pub fn start_batch(
        &self,
        count: Option<usize>,
        domain: Option<&str>,
    ) -> Result<ControlAck, BatchRejection> {
        let handle = self.start_batch_job(count, domain)?;
        let status = handle.status();
        Ok(ControlAck::Started {
            job_id: handle.id(),
            domain: status.domain,
            total: status.total,
        })
    }

    /// Start a batch and keep the handle for waiting or subscribing.
    pub fn start_batch_job(
        &self,
        count: Option<usize>,
        domain: Option<&str>,
    ) -> Result<BatchJobHandle, BatchRejection> {
        let count = count.unwrap_or(self.config.batch.default_count);
        let domain = self.resolve_domain(domain).to_string();
        self.batch.start(count, &domain)
    }

    /// Pause the running batch.
    pub fn pause_batch(&self) -> Result<ControlAck, BatchRejection> {
        self.batch.pause()
    }

    /// Resume a paused batch.
    pub fn resume_batch(&self) -> Result<ControlAck, BatchRejection> {
        self.batch.resume()
    }

    /// Cancel the running or paused batch.
    pub fn cancel_batch(&self) -> Result<ControlAck, BatchRejection> {
        self.batch.cancel()
    }

    /// Status of the most recent batch, or idle.
    pub fn get_batch_status(&self) -> BatchStatus {
        self.batch.status()
    }

    /// Handle of the most recent batch job, if one was started.
    pub fn batch_handle(&self) -> Option<BatchJobHandle> {
        self.batch.current()
    }

    /// Run one simulation and push its record to the inbox.
    pub async fn run_single_simulation(&self, domain: Option<&str>) -> DomainResult<PendingRecord> {
        Ok(self.run_simulation(domain).await?.record)
    }

    /// Like [`KnowledgeMiner::run_single_simulation`], keeping the full simulation.
    pub async fn run_simulation(&self, domain: Option<&str>) -> DomainResult<SimulationRun> {
        let domain = self.resolve_domain(domain).to_string();
        self.pipeline.run_single(&domain).await
    }

    /// Ingest one inbox record into `domain`.
    pub async fn ingest(&self, record_id: &str, domain: Option<&str>) -> DomainResult<IngestReport> {
        let domain = self.resolve_domain(domain).to_string();
        self.knowledge.ingest(record_id, &domain).await
    }

    /// Pending records, newest first.
    pub async fn inbox(&self) -> DomainResult<Vec<PendingRecord>> {
        self.knowledge.inbox().await
    }

    /// Fail-soft taxonomy read.
    pub async fn taxonomy(&self, domain: Option<&str>) -> Taxonomy {
        let domain = self.resolve_domain(domain).to_string();
        self.knowledge.taxonomy(&domain).await
    }

    /// Coverage report for `domain`.
    pub async fn coverage(&self, domain: Option<&str>) -> CoverageReport {
        let domain = self.resolve_domain(domain).to_string();
        let taxonomy = self.knowledge.taxonomy(&domain).await;
        coverage_report(&domain, &taxonomy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::generators::MockTurnGenerator;
    use crate::adapters::memory::{MemoryInboxRepository, MemoryTaxonomyRepository};
    use crate::domain::models::{BatchState, Category};

    fn miner() -> KnowledgeMiner {
        let mut config = Config::default();
        config.batch.inter_run_delay_ms = 0;
        let taxonomy = Taxonomy::new(vec![Category::new("Termination & Compliance")
            .with_services(["Termination Compliance Advisory"])]);
        KnowledgeMiner::with_parts(
            config,
            Arc::new(MemoryTaxonomyRepository::with_domain("hr", taxonomy)),
            Arc::new(MemoryInboxRepository::new()),
            Arc::new(MockTurnGenerator::dry_run()),
        )
    }

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(Success::new(serde_json::json!({"record_id": "sim_1"})))
            .unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["record_id"], "sim_1");
    }

    #[tokio::test]
    async fn test_resolve_domain_defaults() {
        let miner = miner();
        assert_eq!(miner.resolve_domain(None), "hr");
        assert_eq!(miner.resolve_domain(Some("")), "hr");
        assert_eq!(miner.resolve_domain(Some("tax")), "tax");
    }

    #[tokio::test]
    async fn test_single_simulation_then_ingest() {
        let miner = miner();
        let record = miner.run_single_simulation(None).await.unwrap();
        assert_eq!(miner.inbox().await.unwrap().len(), 1);

        let report = miner.ingest(&record.id, None).await.unwrap();

        assert!(report.outcome.is_resolved());
        assert!(miner.inbox().await.unwrap().is_empty());
        assert_eq!(miner.coverage(None).await.summary.total_traces, 1);
    }

    #[tokio::test]
    async fn test_batch_controls_when_idle() {
        let miner = miner();
        assert_eq!(miner.get_batch_status().state, BatchState::Idle);
        assert!(miner.pause_batch().is_err());
        assert!(miner.resume_batch().is_err());
        assert!(miner.cancel_batch().is_err());
    }
}
