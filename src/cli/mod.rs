//! Command-line interface: a clap command tree over [`KnowledgeMiner`](crate::application::KnowledgeMiner)
//! with human and JSON output modes.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::services::BatchRejection;
use commands::{
    batch::BatchArgs, coverage::CoverageArgs, inbox::InboxArgs, ingest::IngestArgs,
    init::InitArgs, simulate::SimulateArgs, taxonomy::TaxonomyArgs,
};

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "dialogue-miner")]
#[command(about = "Mine labeled intent data from simulated novice/expert dialogues", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Explicit configuration file instead of .dialogue-miner/*.yaml
    #[arg(long, global = true, env = "DIALOGUE_MINER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Every command the binary accepts.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory, default config and the sample HR taxonomy
    Init(InitArgs),

    /// Run one simulation and save the record to the inbox
    Simulate(SimulateArgs),

    /// Run a batch of simulations in the foreground
    Batch(BatchArgs),

    /// Inspect and prune pending records
    Inbox(InboxArgs),

    /// Fold pending records into a taxonomy
    Ingest(IngestArgs),

    /// View and edit taxonomies
    Taxonomy(TaxonomyArgs),

    /// Trace coverage of a taxonomy
    Coverage(CoverageArgs),
}

/// Report a failed command and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = match err.downcast_ref::<BatchRejection>() {
            Some(rejection) => serde_json::to_value(rejection).unwrap_or_default(),
            None => serde_json::json!({
                "status": "error",
                "message": format!("{err:#}"),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(1);
}
