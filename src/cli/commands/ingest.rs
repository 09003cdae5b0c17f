//! Implementation of the `dialogue-miner ingest` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::build_miner;
use crate::application::Success;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::{BulkIngestReport, IngestOutcome, IngestReport};

/// Fold pending records into a taxonomy
#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["record_id", "all"])))]
pub struct IngestArgs {
    /// Pending record to ingest
    pub record_id: Option<String>,

    /// Ingest every pending record for the domain
    #[arg(long)]
    pub all: bool,

    /// Target taxonomy domain (defaults to the configured domain)
    #[arg(long, short)]
    pub domain: Option<String>,
}

fn describe(report: &IngestReport) -> String {
    match &report.outcome {
        IngestOutcome::Matched {
            category,
            service,
            created_service,
        } => {
            let created = if *created_service { " (new service)" } else { "" };
            format!("{}: matched {category} / {service}{created}", report.record_id)
        }
        IngestOutcome::Duplicate { category, service } => {
            format!("{}: already recorded under {category} / {service}", report.record_id)
        }
        IngestOutcome::Unmatched => {
            format!("{}: no matching category or service, left in inbox", report.record_id)
        }
    }
}

/// Output of `ingest <id>`.
#[derive(Debug, Serialize)]
pub struct IngestOutput {
    /// Where the record landed.
    #[serde(flatten)]
    pub report: IngestReport,
}

impl CommandOutput for IngestOutput {
    fn to_human(&self) -> String {
        describe(&self.report)
    }

    /// Matched and duplicate outcomes carry their own `status` tag.
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.report).unwrap_or_default()
    }
}

/// Output of `ingest --all`.
#[derive(Debug, Serialize)]
pub struct BulkIngestOutput {
    /// Totals and per-record outcomes.
    #[serde(flatten)]
    pub report: BulkIngestReport,
}

impl CommandOutput for BulkIngestOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        if r.reports.is_empty() {
            return format!("No pending records for domain '{}'.", r.domain);
        }
        let mut lines: Vec<String> = r.reports.iter().map(describe).collect();
        lines.push(format!(
            "\n{}: {} matched, {} duplicate, {} unmatched",
            r.domain, r.matched, r.duplicates, r.unmatched
        ));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(&self.report)).unwrap_or_default()
    }
}

/// Run the `ingest` command.
pub async fn execute(args: IngestArgs, config: &Config, json_mode: bool) -> Result<()> {
    let miner = build_miner(config.clone())?;

    if args.all {
        let domain = miner.resolve_domain(args.domain.as_deref()).to_string();
        let report = miner
            .knowledge()
            .ingest_all(&domain)
            .await
            .with_context(|| format!("Failed to ingest inbox into '{domain}'"))?;
        output(&BulkIngestOutput { report }, json_mode);
        return Ok(());
    }

    let record_id = args.record_id.unwrap_or_default();
    let report = miner
        .ingest(&record_id, args.domain.as_deref())
        .await
        .with_context(|| format!("Failed to ingest record {record_id}"))?;
    output(&IngestOutput { report }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: IngestOutcome) -> IngestReport {
        IngestReport {
            record_id: "sim_00000001".to_string(),
            domain: "hr".to_string(),
            outcome,
        }
    }

    #[test]
    fn test_describe_new_service() {
        let text = describe(&report(IngestOutcome::Matched {
            category: "Payroll".to_string(),
            service: "Tax Filing".to_string(),
            created_service: true,
        }));
        assert_eq!(text, "sim_00000001: matched Payroll / Tax Filing (new service)");
    }

    #[test]
    fn test_single_output_json_uses_outcome_status() {
        let output = IngestOutput {
            report: report(IngestOutcome::Unmatched),
        };
        let json = output.to_json();
        assert_eq!(json["status"], "unmatched");
        assert_eq!(json["record_id"], "sim_00000001");
    }
}
