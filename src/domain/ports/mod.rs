//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - TurnGenerator: text generation for the simulated roles
//! - TaxonomyRepository: per-domain taxonomy documents
//! - InboxRepository: the pending-record inbox

pub mod inbox_repository;
pub mod taxonomy_repository;
pub mod turn_generator;

pub use inbox_repository::InboxRepository;
pub use taxonomy_repository::TaxonomyRepository;
pub use turn_generator::{GeneratorRole, TurnGenerator, TurnRequest};
