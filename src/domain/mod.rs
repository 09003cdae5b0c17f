//! Domain layer for the dialogue miner
//!
//! This module contains the core models, the ports adapters implement, and
//! the domain error type.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
