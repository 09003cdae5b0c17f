//! Transcript domain model.
//!
//! A transcript is the append-only record of one simulated dialogue. The
//! novice opens, then expert and novice alternate until the simulation
//! concludes or is aborted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which simulated party produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The domain expert narrowing down the service.
    #[serde(alias = "ai", alias = "assistant")]
    Expert,
    /// The novice describing the problem in vague terms.
    #[serde(alias = "human", alias = "user")]
    Novice,
}

impl Role {
    /// Serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expert => "expert",
            Self::Novice => "novice",
        }
    }

    /// Speaker label used when rendering transcripts into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Expert => "Expert",
            Self::Novice => "Novice",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status an expert turn declares for the diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertStatus {
    /// Still asking clarifying questions.
    #[default]
    Active,
    /// The expert has settled on a service.
    Concluded,
}

impl ExpertStatus {
    /// Serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Concluded => "concluded",
        }
    }

    /// Lenient parse of a generator-supplied status. Anything unrecognized is active.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "concluded" | "conclusion" | "done" | "complete" | "completed" | "final" => {
                Self::Concluded
            }
            _ => Self::Active,
        }
    }
}

/// Structured fields decoded from an expert turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPayload {
    /// Services still in play.
    #[serde(default)]
    pub hypotheses: Vec<String>,
    /// Categories ruled out this turn.
    #[serde(default)]
    pub eliminated: Vec<String>,
    /// Expert confidence in `[0, 1]`.
    pub confidence: f64,
    /// Why the question was asked.
    #[serde(default)]
    pub question_purpose: String,
    /// Status after the engine applied its conclusion rules.
    pub status: ExpertStatus,
    /// Service the expert named, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_service: Option<String>,
}

/// One contribution to a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Position in the transcript, starting at 0 for the opening.
    #[serde(alias = "step", default)]
    pub index: u32,
    /// Who spoke.
    pub role: Role,
    /// What was said.
    #[serde(default)]
    pub content: String,
    /// Structured reasoning. Expert turns only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TurnPayload>,
}

/// Append-only sequence of turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return it. Indices are assigned sequentially.
    pub fn push(
        &mut self,
        role: Role,
        content: impl Into<String>,
        payload: Option<TurnPayload>,
    ) -> &Turn {
        let index = u32::try_from(self.turns.len()).unwrap_or(u32::MAX);
        self.turns.push(Turn {
            index,
            role,
            content: content.into(),
            payload,
        });
        &self.turns[self.turns.len() - 1]
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// No turns yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns produced by the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }

    /// Render as `Speaker: content` lines for prompt context.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Give up the turns.
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_sequential_indices() {
        let mut transcript = Transcript::new();
        transcript.push(Role::Novice, "I have a problem", None);
        transcript.push(Role::Expert, "Tell me more", None);
        transcript.push(Role::Novice, "It's about staff", None);

        let indices: Vec<u32> = transcript.turns().iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(transcript.count_role(Role::Novice), 2);
        assert_eq!(transcript.count_role(Role::Expert), 1);
    }

    #[test]
    fn test_render_uses_speaker_labels() {
        let mut transcript = Transcript::new();
        transcript.push(Role::Novice, "Hello", None);
        transcript.push(Role::Expert, "Hi, what happened?", None);

        assert_eq!(transcript.render(), "Novice: Hello\nExpert: Hi, what happened?");
    }

    #[test]
    fn test_expert_status_lenient_parse() {
        assert_eq!(ExpertStatus::parse_lenient("concluded"), ExpertStatus::Concluded);
        assert_eq!(ExpertStatus::parse_lenient(" Done "), ExpertStatus::Concluded);
        assert_eq!(ExpertStatus::parse_lenient("active"), ExpertStatus::Active);
        assert_eq!(ExpertStatus::parse_lenient("thinking"), ExpertStatus::Active);
    }

    #[test]
    fn test_transcript_serializes_as_plain_list() {
        let mut transcript = Transcript::new();
        transcript.push(Role::Novice, "Hello", None);
        let json = serde_json::to_value(&transcript).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["role"], "novice");
    }
}
