//! Domain models.

pub mod batch;
pub mod config;
pub mod diagnosis;
pub mod lenient;
pub mod record;
pub mod scenario;
pub mod taxonomy;
pub mod transcript;

pub use batch::{
    BatchErrorEntry, BatchRunSummary, BatchState, BatchStatus, IngestionStatus,
};
pub use config::{
    BatchConfig, Config, GeneratorConfig, LoggingConfig, ScenarioConfig, SimulationConfig,
};
pub use diagnosis::{
    AnalysisData, DiagnosisReasoning, DiagnosisTraceEntry, ExpertReply, FinalDiagnosis,
    NoviceReply,
};
pub use record::{
    new_simulation_id, PendingRecord, RecordStatus, SimulationOutcome, SOURCE_BATCH_SIMULATION,
};
pub use scenario::{scenario_fingerprint, Persona, Scenario, ScenarioTemplate};
pub use taxonomy::{Category, DedupReport, MutationOutcome, Taxonomy, TraceEntry};
pub use transcript::{ExpertStatus, Role, Transcript, Turn, TurnPayload};
