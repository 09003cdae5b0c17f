//! Implementation of the `dialogue-miner coverage` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::build_miner;
use crate::application::Success;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::Config;
use crate::services::CoverageReport;

/// Report trace coverage
#[derive(Args, Debug)]
pub struct CoverageArgs {
    /// Taxonomy domain (defaults to the configured domain)
    #[arg(long, short)]
    pub domain: Option<String>,

    /// Number of priority services to list
    #[arg(long, default_value = "10")]
    pub top: usize,
}

/// Output of `coverage`.
#[derive(Debug, Serialize)]
pub struct CoverageOutput {
    /// The report.
    #[serde(flatten)]
    pub report: CoverageReport,
    /// Priority rows to print. Human output only.
    #[serde(skip)]
    pub top: usize,
}

impl CommandOutput for CoverageOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        if r.categories.is_empty() {
            return format!("Taxonomy '{}' is empty.", r.domain);
        }
        let formatter = TableFormatter::new();
        let mut lines = vec![
            formatter.format_coverage(r),
            format!(
                "{}: {}/{} services covered ({:.1}%), {} traces",
                r.domain,
                r.summary.covered_services,
                r.summary.total_services,
                r.summary.coverage_rate * 100.0,
                r.summary.total_traces
            ),
        ];
        let queue: Vec<_> = r.priority_queue.iter().take(self.top).cloned().collect();
        if !queue.is_empty() {
            lines.push("\nSimulate next:".to_string());
            lines.push(formatter.format_priority(&queue));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(&self.report)).unwrap_or_default()
    }
}

/// Run the `coverage` command.
pub async fn execute(args: CoverageArgs, config: &Config, json_mode: bool) -> Result<()> {
    let miner = build_miner(config.clone())?;
    let report = miner.coverage(args.domain.as_deref()).await;
    output(
        &CoverageOutput {
            report,
            top: args.top,
        },
        json_mode,
    );
    Ok(())
}
