//! Pending record domain model.
//!
//! A pending record is a completed simulation waiting in the inbox to be
//! matched against the taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::diagnosis::DiagnosisTraceEntry;
use super::lenient;
use super::taxonomy::TraceEntry;
use super::transcript::Turn;

/// Provenance tag for records produced by simulations.
pub const SOURCE_BATCH_SIMULATION: &str = "batch_simulation";

/// How a simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationOutcome {
    /// The expert's conclusion was accepted.
    #[default]
    Concluded,
    /// Hit the turn cap without an accepted conclusion.
    Aborted,
}

impl SimulationOutcome {
    /// Serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concluded => "concluded",
            Self::Aborted => "aborted",
        }
    }
}

/// Inbox status. Records leave the inbox instead of changing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Waiting for ingestion or rejection.
    #[default]
    Pending,
}

/// A completed-but-not-yet-ingested simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    /// `sim_<8 hex>`, see [`new_simulation_id`].
    pub id: String,
    /// When the simulation finished.
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Taxonomy the record will be ingested into.
    pub domain: String,
    /// The novice's opening line.
    pub query: String,
    /// Service the expert settled on. Ingestion matches on this.
    pub ai_prediction: String,
    /// Service the scenario was drawn for.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub ground_truth: String,
    /// Category of the ground truth. Fallback target during ingestion.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub category: String,
    /// Expert confidence at conclusion.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub confidence: f64,
    /// Persona role the novice played.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub persona: String,
    /// Persona tone.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub tone: String,
    /// Full dialogue. Serialized as `dialogue_path`.
    #[serde(rename = "dialogue_path", default, deserialize_with = "lenient::null_as_default")]
    pub transcript: Vec<Turn>,
    /// Transcript length. Serialized as `total_turns`.
    #[serde(rename = "total_turns", default, deserialize_with = "lenient::null_as_default")]
    pub turn_count: u32,
    /// Unknown reads as false.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub diagnosis_correct: bool,
    /// How the simulation ended.
    #[serde(default)]
    pub outcome: SimulationOutcome,
    /// Purposes of the expert's questions, from the final diagnosis.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_questions: Vec<String>,
    /// First few expert turns' reasoning.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnosis_trace: Vec<DiagnosisTraceEntry>,
    /// Provenance tag.
    #[serde(default = "default_source", deserialize_with = "source_or_default")]
    pub source: String,
    /// Always pending while in the inbox.
    #[serde(default)]
    pub status: RecordStatus,
}

pub(crate) fn default_source() -> String {
    SOURCE_BATCH_SIMULATION.to_string()
}

pub(crate) fn source_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_source))
}

/// Fresh simulation id of the form `sim_<8 hex>`.
pub fn new_simulation_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("sim_{}", &uuid[..8])
}

impl PendingRecord {
    /// Project into the immutable entry stored under a service.
    pub fn to_trace_entry(&self) -> TraceEntry {
        TraceEntry {
            id: self.id.clone(),
            timestamp: self.timestamp,
            query: self.query.clone(),
            ai_prediction: self.ai_prediction.clone(),
            confidence: self.confidence,
            source: self.source.clone(),
            persona: self.persona.clone(),
            tone: self.tone.clone(),
            dialogue_path: self.transcript.clone(),
            total_turns: self.turn_count,
            diagnosis_correct: self.diagnosis_correct,
            ground_truth: self.ground_truth.clone(),
        }
    }
}
