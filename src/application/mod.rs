//! Application layer: the control surface consumed by the CLI.

pub mod knowledge_miner;

pub use knowledge_miner::{KnowledgeMiner, Success};
