//! Implementation of the `dialogue-miner simulate` command.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;

use super::{apply_dry_run, build_miner};
use crate::application::Success;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, PendingRecord, Role, Turn};
use crate::services::Simulation;

/// Run one simulation and save it to the inbox
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Domain to simulate (defaults to the configured domain)
    #[arg(long, short)]
    pub domain: Option<String>,

    /// Use the scripted offline generator
    #[arg(long)]
    pub dry_run: bool,

    /// Override the expert turn cap
    #[arg(long)]
    pub max_turns: Option<u32>,
}

/// Output of `simulate`.
#[derive(Debug, Serialize)]
pub struct SimulateOutput {
    /// Inbox record id.
    pub record_id: String,
    /// Domain simulated.
    pub domain: String,
    /// Terminal phase.
    pub phase: &'static str,
    /// Ground-truth category.
    pub category: String,
    /// Service the scenario targeted.
    pub ground_truth: String,
    /// Service the expert settled on.
    pub ai_prediction: String,
    /// Prediction matched the ground truth.
    pub diagnosis_correct: bool,
    /// Expert turns taken.
    pub expert_turns: u32,
    /// Expert confidence at the end.
    pub confidence: f64,
    /// Full dialogue.
    pub transcript: Vec<Turn>,
}

impl SimulateOutput {
    fn new(simulation: &Simulation, record: &PendingRecord) -> Self {
        Self {
            record_id: record.id.clone(),
            domain: record.domain.clone(),
            phase: simulation.phase().as_str(),
            category: record.category.clone(),
            ground_truth: record.ground_truth.clone(),
            ai_prediction: record.ai_prediction.clone(),
            diagnosis_correct: record.diagnosis_correct,
            expert_turns: simulation.expert_turns(),
            confidence: record.confidence,
            transcript: record.transcript.clone(),
        }
    }
}

impl CommandOutput for SimulateOutput {
    fn to_human(&self) -> String {
        let verdict = if self.diagnosis_correct {
            style("correct").green().to_string()
        } else {
            style("incorrect").red().to_string()
        };
        let prediction = if self.ai_prediction.is_empty() {
            "(none)"
        } else {
            &self.ai_prediction
        };
        [
            String::new(),
            format!("Simulation {} {} after {} expert turn(s)", self.record_id, self.phase, self.expert_turns),
            format!("  Prediction:   {prediction} ({:.2})", self.confidence),
            format!("  Ground truth: {} [{}]", self.ground_truth, self.category),
            format!("  Verdict:      {verdict}"),
            "Saved to inbox.".to_string(),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(Success::new(self)).unwrap_or_default()
    }
}

/// One transcript line for live display.
pub fn render_turn(turn: &Turn) -> String {
    let label = match turn.role {
        Role::Novice => style(turn.role.label()).yellow().bold(),
        Role::Expert => style(turn.role.label()).cyan().bold(),
    };
    let mut line = format!("[{}] {label}: {}", turn.index, turn.content);
    if let Some(payload) = &turn.payload {
        let detail = format!(
            "(confidence {:.2}, {})",
            payload.confidence,
            payload.status.as_str()
        );
        line.push(' ');
        line.push_str(&style(detail).dim().to_string());
    }
    line
}

/// Run the `simulate` command.
pub async fn execute(args: SimulateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let mut config = config.clone();
    apply_dry_run(&mut config, args.dry_run);
    if let Some(max_turns) = args.max_turns {
        config.simulation.max_turns = max_turns;
        config.simulation.min_conclusion_turn = config.simulation.min_conclusion_turn.min(max_turns);
    }

    let miner = build_miner(config)?;
    let domain = miner.resolve_domain(args.domain.as_deref()).to_string();
    let pipeline = miner.pipeline();

    let mut simulation = pipeline
        .prepare(&domain)
        .await
        .context("Failed to draw a scenario")?;

    if !json_mode {
        println!(
            "{} {} as {} ({}), target: {}\n",
            style("Simulating").bold(),
            simulation.id,
            simulation.scenario.persona,
            simulation.scenario.tone,
            simulation.scenario.expert_term
        );
    }

    let mut shown = 0;
    while !simulation.phase().is_terminal() {
        pipeline
            .engine()
            .step(&mut simulation)
            .await
            .with_context(|| format!("Simulation {} failed", simulation.id))?;
        if !json_mode {
            for turn in &simulation.transcript().turns()[shown..] {
                println!("{}", render_turn(turn));
            }
        }
        shown = simulation.transcript().len();
    }

    let record = pipeline
        .persist(&simulation)
        .await
        .context("Failed to save record to inbox")?;
    output(&SimulateOutput::new(&simulation, &record), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ExpertStatus, TurnPayload};

    #[test]
    fn test_render_novice_turn() {
        console::set_colors_enabled(false);
        let turn = Turn {
            index: 0,
            role: Role::Novice,
            content: "My team won't listen.".to_string(),
            payload: None,
        };
        assert_eq!(render_turn(&turn), "[0] Novice: My team won't listen.");
    }

    #[test]
    fn test_render_expert_turn_with_payload() {
        console::set_colors_enabled(false);
        let turn = Turn {
            index: 1,
            role: Role::Expert,
            content: "Are you thinking of letting them go?".to_string(),
            payload: Some(TurnPayload {
                hypotheses: vec![],
                eliminated: vec![],
                confidence: 0.6,
                question_purpose: String::new(),
                status: ExpertStatus::Active,
                matched_service: None,
            }),
        };
        assert_eq!(
            render_turn(&turn),
            "[1] Expert: Are you thinking of letting them go? (confidence 0.60, active)"
        );
    }
}
