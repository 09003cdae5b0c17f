//! Turn Generator Port
//!
//! Abstraction over the opaque text-generation service that plays both
//! simulated roles. Output is free text that should, but is not guaranteed
//! to, carry a JSON-like payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DomainResult;

/// Which prompt a generator call is answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorRole {
    /// The novice's first message, written from the scenario.
    Opening,
    /// An expert turn.
    Expert,
    /// A novice reply after the opening.
    Novice,
}

impl GeneratorRole {
    /// Serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Expert => "expert",
            Self::Novice => "novice",
        }
    }
}

impl fmt::Display for GeneratorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role-specific prompt.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Simulation this call belongs to, for log correlation
    pub simulation_id: String,

    /// Which prompt this is.
    pub role: GeneratorRole,

    /// Role framing plus taxonomy context or scenario
    pub system_prompt: String,

    /// Transcript so far and the instruction for this turn
    pub user_prompt: String,

    /// Sampling temperature override
    pub temperature: Option<f32>,
}

/// Text-generation backend for simulated turns
#[async_trait]
pub trait TurnGenerator: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Produce raw text for one turn
    async fn generate(&self, request: &TurnRequest) -> DomainResult<String>;
}
