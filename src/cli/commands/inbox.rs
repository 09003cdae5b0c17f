//! Implementation of the `dialogue-miner inbox` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use super::build_miner;
use crate::application::Success;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::commands::simulate::render_turn;
use crate::domain::errors::DomainError;
use crate::domain::models::{Config, PendingRecord};

/// Review simulations waiting for ingestion
#[derive(Args, Debug)]
pub struct InboxArgs {
    /// Inbox action
    #[command(subcommand)]
    pub command: InboxCommands,
}

/// Inbox subcommands.
#[derive(Subcommand, Debug)]
pub enum InboxCommands {
    /// List pending records, newest first
    List {
        /// Only records for this domain
        #[arg(long, short)]
        domain: Option<String>,

        /// Maximum number of records to show
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Show one record with its transcript
    Show {
        /// Record ID
        id: String,
    },
    /// Drop a record without ingesting it
    Reject {
        /// Record ID
        id: String,
    },
}

/// Output of `inbox list`.
#[derive(Debug, Serialize)]
pub struct InboxListOutput {
    /// Records shown, after filtering and limiting.
    pub records: Vec<PendingRecord>,
    /// Matching records before the limit was applied.
    pub total: usize,
}

impl CommandOutput for InboxListOutput {
    fn to_human(&self) -> String {
        if self.records.is_empty() {
            return "Inbox is empty.".to_string();
        }
        let mut lines = vec![TableFormatter::new().format_records(&self.records)];
        if self.total > self.records.len() {
            lines.push(format!("Showing {} of {} record(s)", self.records.len(), self.total));
        } else {
            lines.push(format!("{} pending record(s)", self.total));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

/// Output of `inbox show`.
#[derive(Debug, Serialize)]
pub struct InboxRecordOutput {
    /// The record.
    pub record: PendingRecord,
}

impl CommandOutput for InboxRecordOutput {
    fn to_human(&self) -> String {
        let r = &self.record;
        let mut lines = vec![
            format!("Record:       {}", r.id),
            format!("Domain:       {}", r.domain),
            format!("Created:      {}", r.timestamp.to_rfc3339()),
            format!("Persona:      {} ({})", r.persona, r.tone),
            format!("Query:        {}", r.query),
            format!("Prediction:   {} ({:.2})", r.ai_prediction, r.confidence),
            format!("Ground truth: {} [{}]", r.ground_truth, r.category),
            format!("Outcome:      {}, {} expert turn(s)", r.outcome.as_str(), r.turn_count),
            format!("Correct:      {}", r.diagnosis_correct),
        ];
        if !r.key_questions.is_empty() {
            lines.push("\nKey questions:".to_string());
            lines.extend(r.key_questions.iter().map(|q| format!("  - {q}")));
        }
        if !r.transcript.is_empty() {
            lines.push("\nTranscript:".to_string());
            lines.extend(r.transcript.iter().map(render_turn));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

/// Output of `inbox reject`.
#[derive(Debug, Serialize)]
pub struct RejectOutput {
    /// The rejected record.
    pub record_id: String,
    /// Always true; a missing record is an error.
    pub removed: bool,
}

impl CommandOutput for RejectOutput {
    fn to_human(&self) -> String {
        format!("Rejected record {}", self.record_id)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

/// Run an inbox subcommand.
pub async fn execute(args: InboxArgs, config: &Config, json_mode: bool) -> Result<()> {
    let miner = build_miner(config.clone())?;

    match args.command {
        InboxCommands::List { domain, limit } => {
            let mut records = miner.inbox().await.context("Failed to read inbox")?;
            if let Some(domain) = domain {
                records.retain(|r| r.domain == domain);
            }
            let total = records.len();
            records.truncate(limit);
            output(&InboxListOutput { records, total }, json_mode);
        }
        InboxCommands::Show { id } => {
            let record = miner
                .inbox()
                .await
                .context("Failed to read inbox")?
                .into_iter()
                .find(|r| r.id == id)
                .ok_or(DomainError::RecordNotFound(id))?;
            output(&InboxRecordOutput { record }, json_mode);
        }
        InboxCommands::Reject { id } => {
            let record = miner.knowledge().reject(&id).await?;
            output(
                &RejectOutput {
                    record_id: record.id,
                    removed: true,
                },
                json_mode,
            );
        }
    }

    Ok(())
}
