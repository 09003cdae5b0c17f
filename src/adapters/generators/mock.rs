//! Scripted turn generator for tests and dry runs.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{GeneratorRole, TurnGenerator, TurnRequest};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text.
    Text(String),
    /// Fail with this message.
    Failure(String),
}

impl MockReply {
    /// Text reply.
    pub fn text(output: impl Into<String>) -> Self {
        Self::Text(output.into())
    }

    /// Failing reply.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure(error.into())
    }
}

/// Call counts shared with the generator after it has been moved into an engine.
#[derive(Debug, Default)]
pub struct MockCounters {
    by_role: Mutex<HashMap<GeneratorRole, usize>>,
    by_simulation: Mutex<HashMap<(String, GeneratorRole), usize>>,
}

impl MockCounters {
    /// Calls made for `role`.
    pub fn count(&self, role: GeneratorRole) -> usize {
        self.by_role
            .lock()
            .map(|m| m.get(&role).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Calls made for any role.
    pub fn total(&self) -> usize {
        self.by_role.lock().map(|m| m.values().sum()).unwrap_or(0)
    }

    /// Increment and return the zero-based position for this simulation and role.
    fn next_position(&self, simulation_id: &str, role: GeneratorRole) -> usize {
        if let Ok(mut by_role) = self.by_role.lock() {
            *by_role.entry(role).or_default() += 1;
        }
        self.by_simulation
            .lock()
            .map(|mut m| {
                let slot = m.entry((simulation_id.to_string(), role)).or_default();
                let position = *slot;
                *slot += 1;
                position
            })
            .unwrap_or(0)
    }
}

/// Replays per-role scripts. Each simulation walks its own copy of the
/// script; once exhausted the last reply repeats.
pub struct MockTurnGenerator {
    scripts: HashMap<GeneratorRole, Vec<MockReply>>,
    latency: Option<Duration>,
    counters: Arc<MockCounters>,
}

impl MockTurnGenerator {
    /// Generator with no scripts. Every call fails until one is added.
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            latency: None,
            counters: Arc::new(MockCounters::default()),
        }
    }

    /// Script that opens, asks two questions and concludes on the third expert turn.
    pub fn dry_run() -> Self {
        Self::new()
            .with_texts(
                GeneratorRole::Opening,
                [json!({"response": "There's a person on my team who just won't listen to me."})
                    .to_string()],
            )
            .with_texts(
                GeneratorRole::Expert,
                [
                    expert_json(
                        "active",
                        "",
                        0.35,
                        "Is this about hiring someone new, or about someone already on your team?",
                    ),
                    expert_json(
                        "active",
                        "",
                        0.6,
                        "Are you thinking about ending their employment?",
                    ),
                    expert_json(
                        "concluded",
                        "Termination Compliance Advisory",
                        0.88,
                        "You should get termination compliance advice before taking any step.",
                    ),
                ],
            )
            .with_texts(
                GeneratorRole::Novice,
                [
                    json!({"response": "Someone already here. They ignore every instruction."})
                        .to_string(),
                    json!({"response": "Honestly, yes. I just don't want it to backfire."})
                        .to_string(),
                ],
            )
    }

    /// Replace the script for `role`.
    pub fn with_script(mut self, role: GeneratorRole, replies: Vec<MockReply>) -> Self {
        self.scripts.insert(role, replies);
        self
    }

    /// Script `role` with plain text replies.
    pub fn with_texts<I, S>(self, role: GeneratorRole, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let replies = texts.into_iter().map(MockReply::text).collect();
        self.with_script(role, replies)
    }

    /// Script `role` to always fail.
    pub fn with_failure(self, role: GeneratorRole, error: impl Into<String>) -> Self {
        self.with_script(role, vec![MockReply::failure(error)])
    }

    /// Sleep this long before every reply.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shared call counters, still readable after the generator is moved.
    pub fn counters(&self) -> Arc<MockCounters> {
        Arc::clone(&self.counters)
    }
}

impl Default for MockTurnGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TurnGenerator for MockTurnGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, request: &TurnRequest) -> DomainResult<String> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let position = self
            .counters
            .next_position(&request.simulation_id, request.role);
        let script = self.scripts.get(&request.role).ok_or_else(|| {
            DomainError::Generator(format!("no mock script for role '{}'", request.role))
        })?;
        let reply = script
            .get(position)
            .or_else(|| script.last())
            .ok_or_else(|| {
                DomainError::Generator(format!("empty mock script for role '{}'", request.role))
            })?;

        match reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Failure(error) => Err(DomainError::Generator(error.clone())),
        }
    }
}

/// Expert reply in the structured format the simulation expects.
pub fn expert_json(status: &str, matched_service: &str, confidence: f64, reply: &str) -> String {
    let hypotheses: Vec<&str> = if matched_service.is_empty() {
        Vec::new()
    } else {
        vec![matched_service]
    };
    json!({
        "diagnosis_reasoning": {
            "current_hypotheses": hypotheses,
            "key_signals": [],
            "eliminated_categories": [],
            "confidence": confidence,
            "next_question_purpose": reply,
        },
        "analysis_data": {
            "status": status,
            "diagnosis": "",
            "matched_service": matched_service,
        },
        "reply_to_user": reply,
    })
    .to_string()
}
