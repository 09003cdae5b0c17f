//! Batch job domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::record::SimulationOutcome;

/// Lifecycle of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// No job has run yet.
    #[default]
    Idle,
    /// The worker is executing simulations.
    Running,
    /// The worker is parked at a simulation boundary.
    Paused,
    /// Stopped early on request.
    Cancelled,
    /// Every requested simulation has been attempted.
    Completed,
}

impl BatchState {
    /// Stable lowercase name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Running or paused: the job still owns the controller.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Cancelled or completed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Whether the lifecycle allows moving to `new_state`. Staying put is always allowed.
    pub fn can_transition_to(&self, new_state: Self) -> bool {
        match (self, new_state) {
            (Self::Idle | Self::Cancelled | Self::Completed, Self::Running)
            | (Self::Running, Self::Paused | Self::Cancelled | Self::Completed)
            | (Self::Paused, Self::Running | Self::Cancelled) => true,
            (from, to) => *from == to,
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finished record fared at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    /// Stored as a trace under a service.
    Matched,
    /// The service already held the same query and prediction.
    Duplicate,
    /// No service or category fit. The record stays in the inbox.
    Unmatched,
}

impl IngestionStatus {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Duplicate => "duplicate",
            Self::Unmatched => "unmatched",
        }
    }
}

/// Summary of one successful simulation within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRunSummary {
    /// 1-based position within the batch.
    pub index: usize,
    /// Id of the record the run produced.
    pub record_id: String,
    /// The novice's opening line.
    pub query: String,
    /// Service the expert concluded on.
    pub prediction: String,
    /// Service the scenario was drawn for.
    pub ground_truth: String,
    /// `prediction` equals `ground_truth`.
    pub correct: bool,
    /// Transcript length.
    pub turns: u32,
    /// Expert confidence at conclusion.
    pub confidence: f64,
    /// Concluded or aborted at the turn cap.
    pub outcome: SimulationOutcome,
    /// What happened when the record was ingested.
    pub ingestion: IngestionStatus,
}

/// One simulation that failed within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchErrorEntry {
    /// 1-based position within the batch.
    pub index: usize,
    /// Display form of the error that ended the run.
    pub message: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of a batch job. Cheap to clone, never blocks the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    /// `None` when no job has run.
    pub job_id: Option<Uuid>,
    /// Taxonomy the job simulates against.
    pub domain: String,
    /// Current lifecycle state.
    pub state: BatchState,
    /// Simulations attempted so far, successful or not.
    pub completed: usize,
    /// Requested simulation count.
    pub total: usize,
    /// `completed / total` as a percentage.
    pub progress_percent: f64,
    /// Runs that produced a record.
    pub success_count: usize,
    /// Runs that failed.
    pub error_count: usize,
    /// Seconds since start, frozen once the job finishes.
    pub elapsed_secs: f64,
    /// Set when the job starts.
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the worker exits.
    pub finished_at: Option<DateTime<Utc>>,
    /// Newest first.
    pub recent_results: Vec<BatchRunSummary>,
    /// Newest first.
    pub recent_errors: Vec<BatchErrorEntry>,
    /// The worker task has not yet exited.
    pub worker_active: bool,
}

impl BatchStatus {
    /// Status reported before any job has started.
    pub fn idle() -> Self {
        Self {
            job_id: None,
            domain: String::new(),
            state: BatchState::Idle,
            completed: 0,
            total: 0,
            progress_percent: 0.0,
            success_count: 0,
            error_count: 0,
            elapsed_secs: 0.0,
            started_at: None,
            finished_at: None,
            recent_results: Vec::new(),
            recent_errors: Vec::new(),
            worker_active: false,
        }
    }

    /// Share of correct diagnoses among successful runs in the window.
    pub fn window_accuracy(&self) -> Option<f64> {
        if self.recent_results.is_empty() {
            return None;
        }
        let correct = self.recent_results.iter().filter(|r| r.correct).count();
        #[allow(clippy::cast_precision_loss)]
        Some(correct as f64 / self.recent_results.len() as f64)
    }
}
