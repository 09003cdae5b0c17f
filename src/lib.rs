//! Dialogue Miner - synthetic novice/expert dialogue mining
//!
//! Simulates vague novices talking to a domain expert who narrows their
//! request down to one service of a taxonomy, then folds each finished
//! dialogue back into that taxonomy as a labeled trace.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, ports and the domain error type
//! - **Service Layer** (`services`): parsing, scenario generation, simulation,
//!   batch control and ingestion
//! - **Adapter Layer** (`adapters`): JSON document stores, in-memory stores
//!   and turn generators
//! - **Application Layer** (`application`): the `KnowledgeMiner` control surface
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use dialogue_miner::{Config, KnowledgeMiner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let miner = KnowledgeMiner::from_config(Config::default())?;
//!     let record = miner.run_single_simulation(Some("hr")).await?;
//!     miner.ingest(&record.id, Some("hr")).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{KnowledgeMiner, Success};
pub use domain::models::{
    BatchState, BatchStatus, Category, Config, PendingRecord, Scenario, Taxonomy, TraceEntry,
};
pub use domain::ports::{InboxRepository, TaxonomyRepository, TurnGenerator};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    BatchController, BatchRejection, ControlAck, IngestOutcome, KnowledgeStore, ScenarioGenerator,
    SimulationEngine,
};
