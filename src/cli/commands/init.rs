//! Implementation of the `dialogue-miner init` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::adapters::json_store::JsonTaxonomyRepository;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, Taxonomy};
use crate::domain::ports::TaxonomyRepository;
use crate::infrastructure::config::CONFIG_DIR;

/// Sample taxonomy written for the `hr` domain.
const SAMPLE_TAXONOMY: &str = include_str!("../../../assets/hr_taxonomy.json");
const SAMPLE_DOMAIN: &str = "hr";

/// Create the data directory, config and sample taxonomy
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config and sample taxonomy
    #[arg(long, short)]
    pub force: bool,
}

/// Output of `init`.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    /// Init always succeeds when it returns.
    pub success: bool,
    /// Summary line.
    pub message: String,
    /// Resolved data directory.
    pub data_dir: PathBuf,
    /// Directories that did not exist before.
    pub directories_created: Vec<String>,
    /// The config file was (re)written.
    pub config_written: bool,
    /// Categories in the written sample, 0 when skipped.
    pub sample_categories: usize,
    /// Services in the written sample.
    pub sample_services: usize,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.config_written {
            lines.push(format!("\nWrote {CONFIG_DIR}/config.yaml"));
        }
        if self.sample_categories > 0 {
            lines.push(format!(
                "Sample '{SAMPLE_DOMAIN}' taxonomy: {} categories, {} services",
                self.sample_categories, self.sample_services
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// The bundled `hr` taxonomy.
pub fn sample_taxonomy() -> Result<Taxonomy> {
    serde_json::from_str(SAMPLE_TAXONOMY).context("Bundled sample taxonomy is malformed")
}

/// Run the `init` command.
pub async fn execute(args: InitArgs, config: &Config, json_mode: bool) -> Result<()> {
    let result = initialize(Path::new(CONFIG_DIR), config, args.force).await?;
    output(&result, json_mode);
    Ok(())
}

/// Lay out `config_dir` and `config.data_dir`.
pub async fn initialize(config_dir: &Path, config: &Config, force: bool) -> Result<InitOutput> {
    let data_dir = PathBuf::from(&config.data_dir);
    let config_path = config_dir.join("config.yaml");

    if config_path.exists() && !force {
        return Ok(InitOutput {
            success: false,
            message: "Already initialized. Use --force to overwrite.".to_string(),
            data_dir,
            directories_created: vec![],
            config_written: false,
            sample_categories: 0,
            sample_services: 0,
        });
    }

    let mut directories_created = vec![];
    for dir in [config_dir.to_path_buf(), data_dir.join("domains")] {
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            directories_created.push(dir.display().to_string());
        }
    }

    let mut written = config.clone();
    written.generator.api_key = None;
    let yaml = serde_yaml::to_string(&written).context("Failed to serialize default config")?;
    fs::write(&config_path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let taxonomies = JsonTaxonomyRepository::new(&data_dir);
    let existing = taxonomies.try_load(SAMPLE_DOMAIN).await.ok().flatten();
    let (sample_categories, sample_services) = if existing.is_none() || force {
        let taxonomy = sample_taxonomy()?;
        taxonomies
            .save(SAMPLE_DOMAIN, &taxonomy)
            .await
            .context("Failed to write sample taxonomy")?;
        (taxonomy.categories.len(), taxonomy.service_count())
    } else {
        (0, 0)
    };

    Ok(InitOutput {
        success: true,
        message: if force {
            "Reinitialized dialogue miner.".to_string()
        } else {
            "Initialized dialogue miner.".to_string()
        },
        data_dir,
        directories_created,
        config_written: true,
        sample_categories,
        sample_services,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config {
            data_dir: dir.path().join("data").display().to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_sample_taxonomy_matches_builtin_categories() {
        let taxonomy = sample_taxonomy().unwrap();
        assert_eq!(taxonomy.categories.len(), 4);
        assert!(taxonomy.category_of_service("Termination Compliance Advisory").is_some());
        assert_eq!(taxonomy.trace_count(), 0);
    }

    #[tokio::test]
    async fn test_initialize_writes_config_and_taxonomy() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let config_dir = dir.path().join("conf");

        let result = initialize(&config_dir, &config, false).await.unwrap();

        assert!(result.success);
        assert!(config_dir.join("config.yaml").exists());
        assert_eq!(result.sample_categories, 4);
        let stored = JsonTaxonomyRepository::new(&config.data_dir)
            .try_load("hr")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, sample_taxonomy().unwrap());
    }

    #[tokio::test]
    async fn test_initialize_twice_requires_force() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let config_dir = dir.path().join("conf");
        initialize(&config_dir, &config, false).await.unwrap();

        let again = initialize(&config_dir, &config, false).await.unwrap();
        assert!(!again.success);

        let forced = initialize(&config_dir, &config, true).await.unwrap();
        assert!(forced.success);
        assert_eq!(forced.sample_categories, 4);
    }

    #[tokio::test]
    async fn test_written_config_omits_api_key() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.generator.api_key = Some("sk-secret".to_string());
        let config_dir = dir.path().join("conf");

        initialize(&config_dir, &config, false).await.unwrap();

        let yaml = std::fs::read_to_string(config_dir.join("config.yaml")).unwrap();
        assert!(!yaml.contains("sk-secret"));
    }
}
