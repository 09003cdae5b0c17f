//! Turn generator adapters.

pub mod mock;
pub mod openai_compat;

pub use mock::{MockReply, MockTurnGenerator};
pub use openai_compat::OpenAiCompatibleGenerator;

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::GeneratorConfig;
use crate::domain::ports::TurnGenerator;

/// Build the generator named by `config.provider`.
pub fn build_generator(config: &GeneratorConfig) -> DomainResult<Arc<dyn TurnGenerator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompatibleGenerator::new(config.clone())?)),
        "mock" => Ok(Arc::new(MockTurnGenerator::dry_run())),
        other => Err(DomainError::ValidationFailed(format!(
            "unknown generator provider '{other}' (expected 'openai' or 'mock')"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_generator_by_provider() {
        let mock = GeneratorConfig {
            provider: "mock".to_string(),
            ..GeneratorConfig::default()
        };
        assert_eq!(build_generator(&mock).unwrap().name(), "mock");

        let openai = GeneratorConfig::default();
        assert_eq!(build_generator(&openai).unwrap().name(), "openai");

        let unknown = GeneratorConfig {
            provider: "carrier-pigeon".to_string(),
            ..GeneratorConfig::default()
        };
        assert!(build_generator(&unknown).is_err());
    }
}
