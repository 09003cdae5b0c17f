//! Scenario (secret mission) domain model.
//!
//! A scenario is the hidden ground truth a simulation negotiates toward,
//! together with the surface framing the novice uses to open the dialogue.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A novice persona: who is asking and how they sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Who is asking, e.g. "new hire".
    pub role: String,
    /// How they sound.
    pub tone: String,
    /// Phrase the persona opens with, e.g. "As a small business owner,".
    pub prefix: String,
}

impl Persona {
    /// Persona from its three parts.
    pub fn new(role: impl Into<String>, tone: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            tone: tone.into(),
            prefix: prefix.into(),
        }
    }
}

/// An intent template fixed to exactly one target service.
///
/// `vars` maps `{placeholder}` names in `intent` to candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    /// Intent text, possibly with `{placeholder}`s.
    pub intent: String,
    /// Target service. Older documents call it `term`.
    #[serde(alias = "term", alias = "expert_term")]
    pub service: String,
    /// Placeholder name to candidate values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, Vec<Value>>,
    /// Curator's 1 to 5 rating of how vague the intent is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguity: Option<u8>,
    /// Services a careless expert might pick instead.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confusion_with: Vec<String>,
    /// Detail the novice reveals only when asked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_signal: Option<String>,
}

impl ScenarioTemplate {
    /// Template with no variables.
    pub fn new(intent: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            service: service.into(),
            vars: BTreeMap::new(),
            ambiguity: None,
            confusion_with: Vec::new(),
            hidden_signal: None,
        }
    }

    /// Add a placeholder with string candidates.
    pub fn with_var<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vars.insert(
            name.into(),
            values.into_iter().map(|v| Value::String(v.into())).collect(),
        );
        self
    }

    /// Set the hidden signal.
    pub fn with_hidden_signal(mut self, signal: impl Into<String>) -> Self {
        self.hidden_signal = Some(signal.into());
        self
    }

    /// Add a confusable service.
    pub fn with_confusion(mut self, service: impl Into<String>) -> Self {
        self.confusion_with.push(service.into());
        self
    }

    /// Set the ambiguity rating.
    pub fn with_ambiguity(mut self, level: u8) -> Self {
        self.ambiguity = Some(level);
        self
    }
}

/// Render a template variable value as plain text.
pub fn var_text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string)
}

/// A generated secret mission. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Final intent text, persona framing and modifiers included.
    pub novice_intent: String,
    /// Ground-truth service label.
    pub expert_term: String,
    /// Category owning the ground truth.
    pub category: String,
    /// Persona role.
    pub persona: String,
    /// Persona tone.
    pub tone: String,
    /// Information the novice should not state directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_signal: Option<String>,
    /// Carried over from the template.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confusion_with: Vec<String>,
}

impl Scenario {
    /// See [`scenario_fingerprint`].
    pub fn fingerprint(&self) -> String {
        scenario_fingerprint(&self.novice_intent, &self.expert_term)
    }
}

/// Stable fingerprint of intent text plus target service.
pub fn scenario_fingerprint(intent: &str, term: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(intent.as_bytes());
    hasher.update([0x1f]);
    hasher.update(term.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_distinguishes_term() {
        let a = scenario_fingerprint("I need to let someone go", "Termination Compliance Advisory");
        let b = scenario_fingerprint("I need to let someone go", "Termination Compliance Advisory");
        let c = scenario_fingerprint("I need to let someone go", "Recruitment Process Outsourcing");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_fingerprint_separates_field_boundary() {
        assert_ne!(scenario_fingerprint("ab", "c"), scenario_fingerprint("a", "bc"));
    }

    #[test]
    fn test_template_accepts_legacy_term_key() {
        let template: ScenarioTemplate = serde_json::from_str(
            r#"{"intent": "I need {count} people", "term": "Flexible Staffing", "vars": {"count": [3, "five"]}}"#,
        )
        .unwrap();

        assert_eq!(template.service, "Flexible Staffing");
        let values: Vec<String> = template.vars["count"].iter().map(var_text).collect();
        assert_eq!(values, vec!["3", "five"]);
    }
}
