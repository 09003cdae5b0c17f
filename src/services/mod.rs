//! Core services: parsing, scenario generation, simulation, batch control
//! and ingestion.

pub mod batch_controller;
pub mod coverage;
pub mod ingestion_matcher;
pub mod knowledge_store;
pub mod prompts;
pub mod response_parser;
pub mod scenario_generator;
pub mod scenario_library;
pub mod simulation_engine;
pub mod simulation_pipeline;

pub use batch_controller::{BatchController, BatchJobHandle, BatchRejection, ControlAck};
pub use coverage::{coverage_report, CoverageReport};
pub use ingestion_matcher::IngestOutcome;
pub use knowledge_store::{BulkIngestReport, IngestReport, KnowledgeStore};
pub use scenario_generator::{FingerprintCache, ScenarioGenerator, ScenarioStats};
pub use scenario_library::ScenarioLibrary;
pub use simulation_engine::{AbortReason, Simulation, SimulationEngine, SimulationPhase};
pub use simulation_pipeline::{SimulationPipeline, SimulationRun};
