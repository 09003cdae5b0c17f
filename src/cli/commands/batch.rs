//! Implementation of the `dialogue-miner batch` command.
//!
//! Runs the batch in the foreground, mirroring worker status onto a progress
//! bar. Ctrl-C requests cancellation and the worker stops at the next
//! simulation boundary. A second Ctrl-C returns without waiting for it.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use super::{apply_dry_run, build_miner};
use crate::application::Success;
use crate::cli::output::{create_progress_bar, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::domain::models::{BatchState, BatchStatus, Config};
use crate::services::BatchJobHandle;

/// Run a batch of simulations in the foreground
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Number of simulations (defaults to batch.default_count)
    #[arg(long, short)]
    pub count: Option<usize>,

    /// Domain to simulate (defaults to the configured domain)
    #[arg(long, short)]
    pub domain: Option<String>,

    /// Use the scripted offline generator
    #[arg(long)]
    pub dry_run: bool,
}

/// Output of `batch`: the final status.
#[derive(Debug, Serialize)]
pub struct BatchOutput {
    /// Status when following stopped.
    #[serde(flatten)]
    pub status: BatchStatus,
}

impl CommandOutput for BatchOutput {
    fn to_human(&self) -> String {
        let s = &self.status;
        let mut lines = vec![format!(
            "Batch {} {}: {}/{} done, {} succeeded, {} failed in {:.1}s",
            s.job_id.map(|id| id.to_string()).unwrap_or_default(),
            s.state,
            s.completed,
            s.total,
            s.success_count,
            s.error_count,
            s.elapsed_secs
        )];
        if let Some(accuracy) = s.window_accuracy() {
            lines.push(format!("Diagnosis accuracy: {:.1}%", accuracy * 100.0));
        }
        if !s.recent_results.is_empty() {
            lines.push(TableFormatter::new().format_batch_results(&s.recent_results));
        }
        for error in &s.recent_errors {
            lines.push(format!("  #{} failed: {}", error.index, error.message));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(&self.status)).unwrap_or_default()
    }
}

fn progress_message(status: &BatchStatus) -> String {
    let mut message = format!("ok {} err {}", status.success_count, status.error_count);
    if status.state == BatchState::Cancelled {
        message.push_str(" (cancelling)");
    }
    message
}

/// Follow the job until its worker exits.
///
/// The first Ctrl-C cancels at the next simulation boundary. A second one
/// stops waiting and returns the current status while the in-flight
/// simulation is abandoned.
async fn follow(handle: &BatchJobHandle, json_mode: bool) -> BatchStatus {
    let (tx, mut interrupts) = mpsc::channel(1);
    let forwarder = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    let status = follow_with_interrupts(handle, json_mode, &mut interrupts).await;
    forwarder.abort();
    status
}

async fn follow_with_interrupts(
    handle: &BatchJobHandle,
    json_mode: bool,
    interrupts: &mut mpsc::Receiver<()>,
) -> BatchStatus {
    let mut rx = handle.subscribe();
    let pb = (!json_mode).then(|| create_progress_bar(rx.borrow().total as u64));
    let mut cancel_requested = false;
    let mut interrupts_open = true;

    loop {
        let status = rx.borrow_and_update().clone();
        if let Some(pb) = &pb {
            pb.set_progress(status.completed as u64, progress_message(&status));
        }
        if !status.worker_active {
            break;
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            interrupt = interrupts.recv(), if interrupts_open => match interrupt {
                Some(()) if cancel_requested => {
                    warn!(job_id = %handle.id(), "Second interrupt, leaving the in-flight simulation behind");
                    break;
                }
                Some(()) => {
                    cancel_requested = true;
                    if let Err(rejection) = handle.cancel() {
                        warn!(job_id = %handle.id(), %rejection, "Cancel request ignored");
                    }
                }
                None => interrupts_open = false,
            },
        }
    }

    let status = handle.status();
    if let Some(pb) = pb {
        match status.state {
            BatchState::Completed => pb.finish_success(progress_message(&status)),
            _ => pb.finish_warning(format!("{} {}", status.state, progress_message(&status))),
        }
    }
    status
}

/// Run the `batch` command.
pub async fn execute(args: BatchArgs, config: &Config, json_mode: bool) -> Result<()> {
    let mut config = config.clone();
    apply_dry_run(&mut config, args.dry_run);
    let miner = build_miner(config)?;

    let handle = miner.start_batch_job(args.count, args.domain.as_deref())?;
    let status = follow(&handle, json_mode).await;

    output(&BatchOutput { status }, json_mode);
    Ok(())
}
