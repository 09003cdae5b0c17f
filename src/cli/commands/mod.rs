//! One module per subcommand. Each exposes `execute(args, config, json_mode)`.

pub mod batch;
pub mod coverage;
pub mod inbox;
pub mod ingest;
pub mod init;
pub mod simulate;
pub mod taxonomy;

use anyhow::{Context, Result};

use crate::application::KnowledgeMiner;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Provider name of the scripted offline generator.
pub(crate) const DRY_RUN_PROVIDER: &str = "mock";

/// Switch to the scripted generator when `dry_run` is set.
pub(crate) fn apply_dry_run(config: &mut Config, dry_run: bool) {
    if dry_run {
        config.generator.provider = DRY_RUN_PROVIDER.to_string();
    }
}

pub(crate) fn build_miner(config: Config) -> Result<KnowledgeMiner> {
    ConfigLoader::validate(&config).context("Invalid configuration")?;
    KnowledgeMiner::from_config(config).context("Failed to set up the knowledge miner")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_switches_provider() {
        let mut config = Config::default();
        apply_dry_run(&mut config, false);
        assert_eq!(config.generator.provider, "openai");
        apply_dry_run(&mut config, true);
        assert_eq!(config.generator.provider, "mock");
    }

    #[test]
    fn test_build_miner_rejects_invalid_config() {
        let mut config = Config::default();
        config.simulation.max_turns = 0;
        assert!(build_miner(config).is_err());
    }
}
