//! Implementation of the `dialogue-miner taxonomy` commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::build_miner;
use crate::application::Success;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, DedupReport, MutationOutcome, Taxonomy};

/// Inspect and curate a domain taxonomy
#[derive(Args, Debug)]
pub struct TaxonomyArgs {
    /// Taxonomy domain (defaults to the configured domain)
    #[arg(long, short, global = true)]
    pub domain: Option<String>,

    /// Taxonomy action
    #[command(subcommand)]
    pub command: TaxonomyCommands,
}

/// Taxonomy subcommands.
#[derive(Subcommand, Debug)]
pub enum TaxonomyCommands {
    /// List domains with a stored taxonomy
    List,
    /// Show categories, services and trace counts
    Show,
    /// Print the context block given to the simulated expert
    Context,
    /// Add a category
    AddCategory {
        /// Category name
        name: String,

        /// Free-text note for curators
        #[arg(long)]
        description: Option<String>,
    },
    /// Add a service to a category
    AddService {
        /// Owning category
        category: String,
        /// Service name, unique across the taxonomy
        service: String,
    },
    /// Rename a category, keeping its services and traces
    RenameCategory {
        /// Current name
        from: String,
        /// New name
        to: String,
    },
    /// Delete a category with all its services and traces
    DeleteCategory {
        /// Category name
        name: String,
    },
    /// Remove duplicate categories and services
    Clean,
}

/// Output of `taxonomy list`.
#[derive(Debug, Serialize)]
pub struct DomainListOutput {
    /// Domain names, sorted.
    pub domains: Vec<String>,
}

impl CommandOutput for DomainListOutput {
    fn to_human(&self) -> String {
        if self.domains.is_empty() {
            return "No taxonomies stored. Run `dialogue-miner init` to add the sample.".to_string();
        }
        self.domains.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

/// Output of `taxonomy show`.
#[derive(Debug, Serialize)]
pub struct TaxonomyOutput {
    /// Domain shown.
    pub domain: String,
    /// The stored document.
    #[serde(flatten)]
    pub taxonomy: Taxonomy,
}

impl CommandOutput for TaxonomyOutput {
    fn to_human(&self) -> String {
        if self.taxonomy.is_empty() {
            return format!("Taxonomy '{}' is empty.", self.domain);
        }
        format!(
            "{}\n{} categories, {} services, {} traces",
            TableFormatter::new().format_taxonomy(&self.taxonomy),
            self.taxonomy.categories.len(),
            self.taxonomy.service_count(),
            self.taxonomy.trace_count()
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

/// Output of `taxonomy context`.
#[derive(Debug, Serialize)]
pub struct ContextOutput {
    /// Domain rendered.
    pub domain: String,
    /// One line per category.
    pub context: String,
}

impl CommandOutput for ContextOutput {
    fn to_human(&self) -> String {
        self.context.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

/// Output of the add commands and rename/delete.
#[derive(Debug, Serialize)]
pub struct MutationOutput {
    /// Domain changed.
    pub domain: String,
    /// Past-tense verb for the human output.
    pub action: &'static str,
    /// What the action touched.
    pub target: String,
    /// Added or skipped.
    pub outcome: MutationOutcome,
}

impl CommandOutput for MutationOutput {
    fn to_human(&self) -> String {
        match self.outcome {
            MutationOutcome::Added => format!("{} {} in '{}'", self.action, self.target, self.domain),
            MutationOutcome::Skipped => {
                format!("{} already present in '{}', nothing changed", self.target, self.domain)
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

/// Output of `taxonomy clean`.
#[derive(Debug, Serialize)]
pub struct CleanOutput {
    /// Domain cleaned.
    pub domain: String,
    /// What was removed.
    #[serde(flatten)]
    pub report: DedupReport,
}

impl CommandOutput for CleanOutput {
    fn to_human(&self) -> String {
        if self.report.is_clean() {
            return format!("Taxonomy '{}' has no duplicates.", self.domain);
        }
        format!(
            "Removed {} duplicate categor(ies) and {} duplicate service(s) from '{}'",
            self.report.removed_categories, self.report.removed_services, self.domain
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

fn changed(domain: &str, action: &'static str, target: String) -> MutationOutput {
    MutationOutput {
        domain: domain.to_string(),
        action,
        target,
        outcome: MutationOutcome::Added,
    }
}

/// Run a taxonomy subcommand.
pub async fn execute(args: TaxonomyArgs, config: &Config, json_mode: bool) -> Result<()> {
    let miner = build_miner(config.clone())?;
    let domain = miner.resolve_domain(args.domain.as_deref()).to_string();
    let store = miner.knowledge();

    match args.command {
        TaxonomyCommands::List => {
            let domains = store.domains().await?;
            output(&DomainListOutput { domains }, json_mode);
        }
        TaxonomyCommands::Show => {
            let taxonomy = store.taxonomy(&domain).await;
            output(&TaxonomyOutput { domain, taxonomy }, json_mode);
        }
        TaxonomyCommands::Context => {
            let context = store.taxonomy(&domain).await.render_context();
            output(&ContextOutput { domain, context }, json_mode);
        }
        TaxonomyCommands::AddCategory { name, description } => {
            let outcome = store.add_category(&domain, &name, description).await?;
            let result = MutationOutput {
                outcome,
                ..changed(&domain, "Added category", name)
            };
            output(&result, json_mode);
        }
        TaxonomyCommands::AddService { category, service } => {
            let outcome = store.add_service(&domain, &category, &service).await?;
            let result = MutationOutput {
                outcome,
                ..changed(&domain, "Added service", format!("{category} / {service}"))
            };
            output(&result, json_mode);
        }
        TaxonomyCommands::RenameCategory { from, to } => {
            store.rename_category(&domain, &from, &to).await?;
            output(
                &changed(&domain, "Renamed category", format!("{from} -> {to}")),
                json_mode,
            );
        }
        TaxonomyCommands::DeleteCategory { name } => {
            let removed = store.delete_category(&domain, &name).await?;
            output(&changed(&domain, "Deleted category", removed.name), json_mode);
        }
        TaxonomyCommands::Clean => {
            let report = store.clean(&domain).await?;
            output(&CleanOutput { domain, report }, json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_mutation_message() {
        let output = MutationOutput {
            outcome: MutationOutcome::Skipped,
            ..changed("hr", "Added category", "Payroll".to_string())
        };
        assert_eq!(output.to_human(), "Payroll already present in 'hr', nothing changed");
        assert_eq!(output.to_json()["outcome"], "skipped");
    }

    #[test]
    fn test_taxonomy_json_keeps_document_shape() {
        let output = TaxonomyOutput {
            domain: "hr".to_string(),
            taxonomy: Taxonomy::default(),
        };
        let json = output.to_json();
        assert_eq!(json["status"], "success");
        assert!(json["taxonomy"].as_array().unwrap().is_empty());
    }
}
