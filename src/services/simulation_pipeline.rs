//! One end-to-end simulation: draw a scenario, run the dialogue, save the
//! record to the inbox.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::{PendingRecord, Taxonomy};
use crate::domain::ports::{InboxRepository, TaxonomyRepository};
use crate::services::scenario_generator::{ScenarioGenerator, ScenarioStats};
use crate::services::simulation_engine::{Simulation, SimulationEngine};

/// A finished simulation and the record written for it.
pub struct SimulationRun {
    /// The terminal simulation.
    pub simulation: Simulation,
    /// The record pushed to the inbox.
    pub record: PendingRecord,
}

/// Draws a scenario, runs it to completion and queues the record.
pub struct SimulationPipeline {
    engine: SimulationEngine,
    scenarios: Mutex<ScenarioGenerator>,
    taxonomies: Arc<dyn TaxonomyRepository>,
    inbox: Arc<dyn InboxRepository>,
}

impl SimulationPipeline {
    /// Pipeline over the given parts.
    pub fn new(
        engine: SimulationEngine,
        scenarios: ScenarioGenerator,
        taxonomies: Arc<dyn TaxonomyRepository>,
        inbox: Arc<dyn InboxRepository>,
    ) -> Self {
        Self {
            engine,
            scenarios: Mutex::new(scenarios),
            taxonomies,
            inbox,
        }
    }

    /// The simulation engine.
    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Load the taxonomy and draw a scenario, returning a simulation in the
    /// Opening phase for callers that want to step it themselves.
    pub async fn prepare(&self, domain: &str) -> DomainResult<Simulation> {
        let taxonomy = self.taxonomies.load(domain).await;
        self.prepare_with(domain, &taxonomy).await
    }

    async fn prepare_with(&self, domain: &str, taxonomy: &Taxonomy) -> DomainResult<Simulation> {
        let scenario = self.scenarios.lock().await.generate(taxonomy)?;
        debug!(
            domain,
            category = %scenario.category,
            expert_term = %scenario.expert_term,
            persona = %scenario.persona,
            "Drew scenario"
        );
        Ok(self.engine.start(domain, scenario, taxonomy))
    }

    /// Convert a terminal simulation to a pending record and push it to the inbox.
    pub async fn persist(&self, simulation: &Simulation) -> DomainResult<PendingRecord> {
        let record = simulation.to_pending_record();
        self.inbox.push(record.clone()).await?;
        info!(
            record_id = %record.id,
            domain = %record.domain,
            outcome = record.outcome.as_str(),
            correct = record.diagnosis_correct,
            "Saved simulation to inbox"
        );
        Ok(record)
    }

    /// Run one simulation for `domain` and save its record.
    pub async fn run_single(&self, domain: &str) -> DomainResult<SimulationRun> {
        let mut simulation = self.prepare(domain).await?;
        self.engine.run_to_completion(&mut simulation).await?;
        let record = self.persist(&simulation).await?;
        Ok(SimulationRun { simulation, record })
    }

    /// Forget issued scenario fingerprints.
    pub async fn reset_scenarios(&self) {
        self.scenarios.lock().await.reset();
    }

    /// Diversity figures for `domain`.
    pub async fn scenario_stats(&self, domain: &str) -> ScenarioStats {
        let taxonomy = self.taxonomies.load(domain).await;
        self.scenarios.lock().await.stats(&taxonomy)
    }
}
