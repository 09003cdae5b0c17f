//! Turn-based simulation state machine.
//!
//! ```text
//! Opening -> Expert <-> Novice -> Concluded
//!                  \-> Aborted(MaxTurnsExceeded)
//! ```
//!
//! The turn cap is checked before every expert and novice dispatch. An
//! expert conclusion is honored only from `min_conclusion_turn` onward and
//! only with a usable service label; earlier claims are recorded as
//! suppressed and the dialogue continues.

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    new_simulation_id, DiagnosisTraceEntry, ExpertReply, ExpertStatus, FinalDiagnosis,
    NoviceReply, PendingRecord, RecordStatus, Role, Scenario, SimulationConfig,
    SimulationOutcome, Taxonomy, Transcript, SOURCE_BATCH_SIMULATION,
};
use crate::domain::ports::{TurnGenerator, TurnRequest};
use crate::services::{prompts, response_parser};

/// Replacement for a leaked ground-truth label.
const REDACTED: &str = "[redacted]";

/// Trace entries carried into a pending record.
const RECORD_TRACE_ENTRIES: usize = 3;

/// Why a simulation stopped without a conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The turn cap was reached first.
    MaxTurnsExceeded,
}

/// Where a simulation is in its dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPhase {
    /// The novice has not spoken yet.
    Opening,
    /// Waiting on the expert.
    Expert,
    /// Waiting on the novice.
    Novice,
    /// The expert concluded and the conclusion was accepted.
    Concluded,
    /// Stopped without an accepted conclusion.
    Aborted(AbortReason),
}

impl SimulationPhase {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Expert => "expert",
            Self::Novice => "novice",
            Self::Concluded => "concluded",
            Self::Aborted(_) => "aborted",
        }
    }

    /// Concluded or aborted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Concluded | Self::Aborted(_))
    }
}

/// One running or finished dialogue. Owns its transcript exclusively.
#[derive(Debug, Clone, Serialize)]
pub struct Simulation {
    /// `sim_<8 hex>`, reused as the pending record id.
    pub id: String,
    /// Taxonomy the simulation runs against.
    pub domain: String,
    /// The secret mission. The expert never sees it.
    pub scenario: Scenario,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    taxonomy_context: String,
    phase: SimulationPhase,
    transcript: Transcript,
    diagnosis_trace: Vec<DiagnosisTraceEntry>,
    confidence_history: Vec<f64>,
    eliminated: BTreeSet<String>,
    final_diagnosis: Option<FinalDiagnosis>,
    expert_turns: u32,
}

impl Simulation {
    /// Current phase.
    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    /// Turns so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Every expert turn's reasoning, oldest first.
    pub fn diagnosis_trace(&self) -> &[DiagnosisTraceEntry] {
        &self.diagnosis_trace
    }

    /// Expert confidence per expert turn.
    pub fn confidence_history(&self) -> &[f64] {
        &self.confidence_history
    }

    /// Union of every category ruled out so far.
    pub fn eliminated_categories(&self) -> &BTreeSet<String> {
        &self.eliminated
    }

    /// Set once a conclusion is accepted.
    pub fn final_diagnosis(&self) -> Option<&FinalDiagnosis> {
        self.final_diagnosis.as_ref()
    }

    /// Number of expert turns taken.
    pub fn expert_turns(&self) -> u32 {
        self.expert_turns
    }

    /// `None` until terminal.
    pub fn outcome(&self) -> Option<SimulationOutcome> {
        match self.phase {
            SimulationPhase::Concluded => Some(SimulationOutcome::Concluded),
            SimulationPhase::Aborted(_) => Some(SimulationOutcome::Aborted),
            _ => None,
        }
    }

    /// The concluded service, or for an unfinished dialogue the latest
    /// matched service or top hypothesis seen in the trace.
    pub fn ai_prediction(&self) -> String {
        if let Some(final_diagnosis) = &self.final_diagnosis {
            return final_diagnosis.predicted_service.clone();
        }
        self.diagnosis_trace
            .iter()
            .rev()
            .find_map(|entry| {
                entry
                    .matched_service
                    .clone()
                    .or_else(|| entry.hypotheses.first().cloned())
            })
            .unwrap_or_default()
    }

    /// True only for a concluded dialogue whose prediction matches the ground truth.
    pub fn diagnosis_correct(&self) -> bool {
        self.final_diagnosis
            .as_ref()
            .is_some_and(|d| labels_match(&d.predicted_service, &self.scenario.expert_term))
    }

    fn key_questions(&self) -> Vec<String> {
        self.diagnosis_trace
            .iter()
            .map(|e| e.question_purpose.clone())
            .filter(|q| !q.is_empty())
            .collect()
    }

    /// Convert into an inbox record. Meaningful once terminal.
    pub fn to_pending_record(&self) -> PendingRecord {
        let confidence = self.final_diagnosis.as_ref().map_or_else(
            || self.confidence_history.last().copied().unwrap_or(0.0),
            |d| d.confidence,
        );
        let key_questions = self
            .final_diagnosis
            .as_ref()
            .map_or_else(|| self.key_questions(), |d| d.key_questions.clone());

        PendingRecord {
            id: self.id.clone(),
            timestamp: Utc::now(),
            domain: self.domain.clone(),
            query: self.scenario.novice_intent.clone(),
            ai_prediction: self.ai_prediction(),
            ground_truth: self.scenario.expert_term.clone(),
            category: self.scenario.category.clone(),
            confidence,
            persona: self.scenario.persona.clone(),
            tone: self.scenario.tone.clone(),
            transcript: self.transcript.turns().to_vec(),
            turn_count: self.expert_turns,
            diagnosis_correct: self.diagnosis_correct(),
            outcome: self.outcome().unwrap_or(SimulationOutcome::Aborted),
            key_questions,
            diagnosis_trace: self
                .diagnosis_trace
                .iter()
                .take(RECORD_TRACE_ENTRIES)
                .cloned()
                .collect(),
            source: SOURCE_BATCH_SIMULATION.to_string(),
            status: RecordStatus::Pending,
        }
    }
}

/// Case-insensitive bidirectional containment, or the ground truth's first
/// `/`-separated segment contained in the prediction.
pub fn labels_match(prediction: &str, ground_truth: &str) -> bool {
    let prediction = prediction.trim().to_lowercase();
    let ground_truth = ground_truth.trim().to_lowercase();
    if prediction.is_empty() || ground_truth.is_empty() {
        return false;
    }
    if prediction.contains(&ground_truth) || ground_truth.contains(&prediction) {
        return true;
    }
    ground_truth
        .split('/')
        .next()
        .map(str::trim)
        .is_some_and(|head| !head.is_empty() && prediction.contains(head))
}

/// Replace case-insensitive occurrences of `label`. Returns whether anything leaked.
pub fn redact_label(text: &str, label: &str) -> (String, bool) {
    let label = label.trim();
    if label.is_empty() {
        return (text.to_string(), false);
    }
    match RegexBuilder::new(&regex::escape(label))
        .case_insensitive(true)
        .build()
    {
        Ok(re) if re.is_match(text) => (re.replace_all(text, REDACTED).into_owned(), true),
        _ => (text.to_string(), false),
    }
}

/// Drives simulations against a turn generator.
pub struct SimulationEngine {
    generator: Arc<dyn TurnGenerator>,
    config: SimulationConfig,
}

impl SimulationEngine {
    /// Engine bound to `generator`.
    pub fn new(generator: Arc<dyn TurnGenerator>, config: SimulationConfig) -> Self {
        Self { generator, config }
    }

    /// Turn limits in effect.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Name of the backing generator, for logs.
    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Create a simulation in the Opening phase.
    pub fn start(&self, domain: &str, scenario: Scenario, taxonomy: &Taxonomy) -> Simulation {
        Simulation {
            id: new_simulation_id(),
            domain: domain.to_string(),
            scenario,
            started_at: Utc::now(),
            taxonomy_context: taxonomy.render_context(),
            phase: SimulationPhase::Opening,
            transcript: Transcript::new(),
            diagnosis_trace: Vec::new(),
            confidence_history: Vec::new(),
            eliminated: BTreeSet::new(),
            final_diagnosis: None,
            expert_turns: 0,
        }
    }

    /// Advance by exactly one dispatch and return the new phase. A generator
    /// failure leaves the simulation in its current phase.
    pub async fn step(&self, sim: &mut Simulation) -> DomainResult<SimulationPhase> {
        match sim.phase {
            SimulationPhase::Opening => self.opening_turn(sim).await?,
            SimulationPhase::Expert | SimulationPhase::Novice
                if sim.expert_turns >= self.config.max_turns =>
            {
                warn!(
                    simulation_id = %sim.id,
                    expert_turns = sim.expert_turns,
                    max_turns = self.config.max_turns,
                    "Turn cap reached without conclusion, aborting"
                );
                sim.phase = SimulationPhase::Aborted(AbortReason::MaxTurnsExceeded);
            }
            SimulationPhase::Expert => self.expert_turn(sim).await?,
            SimulationPhase::Novice => self.novice_turn(sim).await?,
            SimulationPhase::Concluded | SimulationPhase::Aborted(_) => {}
        }
        Ok(sim.phase)
    }

    /// Step until the simulation is terminal.
    #[instrument(skip(self, sim), fields(simulation_id = %sim.id, domain = %sim.domain))]
    pub async fn run_to_completion(&self, sim: &mut Simulation) -> DomainResult<()> {
        while !sim.phase.is_terminal() {
            self.step(sim).await?;
        }
        info!(
            phase = sim.phase.as_str(),
            expert_turns = sim.expert_turns,
            prediction = %sim.ai_prediction(),
            correct = sim.diagnosis_correct(),
            "Simulation finished"
        );
        Ok(())
    }

    /// Start and run a simulation in one call.
    pub async fn run(
        &self,
        domain: &str,
        scenario: Scenario,
        taxonomy: &Taxonomy,
    ) -> DomainResult<Simulation> {
        let mut sim = self.start(domain, scenario, taxonomy);
        self.run_to_completion(&mut sim).await?;
        Ok(sim)
    }

    async fn call(&self, request: TurnRequest) -> DomainResult<String> {
        let secs = self.config.turn_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), self.generator.generate(&request))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    simulation_id = %request.simulation_id,
                    role = %request.role,
                    timeout_secs = secs,
                    "Generator call timed out"
                );
                Err(DomainError::GeneratorTimeout(secs))
            }
        }
    }

    async fn opening_turn(&self, sim: &mut Simulation) -> DomainResult<()> {
        let request = prompts::opening_request(&sim.id, &sim.domain, &sim.scenario);
        let raw = self.call(request).await?;
        let reply = decode_novice(&raw);
        let content = non_empty_or(&reply.response, &sim.scenario.novice_intent);
        let content = guard_label(sim, &content);

        sim.transcript.push(Role::Novice, content, None);
        sim.phase = SimulationPhase::Expert;
        debug!(simulation_id = %sim.id, structured = reply.structured, "Opening produced");
        Ok(())
    }

    async fn expert_turn(&self, sim: &mut Simulation) -> DomainResult<()> {
        let turn = sim.expert_turns + 1;
        let request = prompts::expert_request(
            &sim.id,
            &sim.domain,
            &sim.taxonomy_context,
            &sim.transcript,
            turn,
            self.config.min_conclusion_turn,
        );
        let raw = self.call(request).await?;

        let reply = match response_parser::parse(&raw) {
            Some(record) => ExpertReply::from_record(&record, &raw),
            None => {
                warn!(
                    simulation_id = %sim.id,
                    turn,
                    "Unparseable expert output, using neutral defaults"
                );
                ExpertReply::fallback(&raw)
            }
        };

        let claims_conclusion = reply.analysis.status == ExpertStatus::Concluded;
        let accepted = claims_conclusion
            && turn >= self.config.min_conclusion_turn
            && reply.analysis.matched_service.is_some();
        let suppressed = claims_conclusion && !accepted;
        if suppressed {
            debug!(
                simulation_id = %sim.id,
                turn,
                min_conclusion_turn = self.config.min_conclusion_turn,
                has_service = reply.analysis.matched_service.is_some(),
                "Conclusion not honored, continuing"
            );
        }
        let status = if accepted {
            ExpertStatus::Concluded
        } else {
            ExpertStatus::Active
        };

        sim.diagnosis_trace
            .push(DiagnosisTraceEntry::from_reply(turn, &reply, suppressed));
        sim.confidence_history.push(reply.reasoning.confidence);
        sim.eliminated
            .extend(reply.reasoning.eliminated_categories.iter().cloned());

        let content = if reply.reply_to_user.is_empty() {
            non_empty_or(&reply.analysis.diagnosis, raw.trim())
        } else {
            reply.reply_to_user.clone()
        };
        sim.transcript
            .push(Role::Expert, content, Some(reply.payload(status)));
        sim.expert_turns = turn;

        match (accepted, reply.analysis.matched_service.clone()) {
            (true, Some(predicted_service)) => {
                sim.final_diagnosis = Some(FinalDiagnosis {
                    predicted_service,
                    diagnosis: reply.analysis.diagnosis.clone(),
                    confidence: reply.reasoning.confidence,
                    turn_count: turn,
                    key_questions: sim.key_questions(),
                });
                sim.phase = SimulationPhase::Concluded;
            }
            _ => sim.phase = SimulationPhase::Novice,
        }

        debug!(
            simulation_id = %sim.id,
            turn,
            confidence = reply.reasoning.confidence,
            phase = sim.phase.as_str(),
            "Expert turn"
        );
        Ok(())
    }

    async fn novice_turn(&self, sim: &mut Simulation) -> DomainResult<()> {
        let request = prompts::novice_request(&sim.id, &sim.scenario, &sim.transcript);
        let raw = self.call(request).await?;
        let reply = decode_novice(&raw);
        let content = guard_label(sim, &non_empty_or(&reply.response, "..."));

        sim.transcript.push(Role::Novice, content, None);
        sim.phase = SimulationPhase::Expert;
        Ok(())
    }
}

fn decode_novice(raw: &str) -> NoviceReply {
    response_parser::parse(raw).map_or_else(
        || NoviceReply::fallback(raw),
        |record| NoviceReply::from_record(&record, raw),
    )
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn guard_label(sim: &Simulation, text: &str) -> String {
    let (clean, leaked) = redact_label(text, &sim.scenario.expert_term);
    if leaked {
        warn!(simulation_id = %sim.id, "Novice text named the target service, redacted");
    }
    clean
}
