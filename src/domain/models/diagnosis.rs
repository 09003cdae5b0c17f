//! Decoded generator replies and the diagnosis artifacts a simulation accumulates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::transcript::{ExpertStatus, TurnPayload};

/// Confidence assigned when an expert turn carries no usable structure.
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Placeholder labels generators emit instead of a real service name.
const PLACEHOLDER_SERVICES: &[&str] = &["", "unknown", "none", "null", "n/a", "na", "tbd", "pending"];

/// The expert's reasoning for one turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagnosisReasoning {
    /// Services still under consideration.
    pub current_hypotheses: Vec<String>,
    /// Phrases in the novice's answers that moved the diagnosis.
    pub key_signals: Vec<String>,
    /// Categories ruled out so far.
    pub eliminated_categories: Vec<String>,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Why the expert is asking the next question.
    pub next_question_purpose: String,
}

/// The expert's claim about where the diagnosis stands.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisData {
    /// Active or concluded, as the expert claims.
    pub status: ExpertStatus,
    /// Claimed service, placeholders already stripped.
    pub matched_service: Option<String>,
    /// Free-text diagnosis.
    pub diagnosis: String,
}

/// A decoded expert turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertReply {
    /// How the expert got here.
    pub reasoning: DiagnosisReasoning,
    /// Where the expert thinks the diagnosis stands.
    pub analysis: AnalysisData,
    /// Text the novice sees.
    pub reply_to_user: String,
    /// False when the output could not be decoded and neutral defaults were used.
    pub structured: bool,
}

impl ExpertReply {
    /// Neutral reply wrapping raw generator text.
    pub fn fallback(raw: &str) -> Self {
        Self {
            reasoning: DiagnosisReasoning {
                confidence: NEUTRAL_CONFIDENCE,
                ..DiagnosisReasoning::default()
            },
            analysis: AnalysisData::default(),
            reply_to_user: raw.trim().to_string(),
            structured: false,
        }
    }

    /// Build from a decoded record, tolerating missing or oddly typed fields.
    pub fn from_record(record: &Map<String, Value>, raw: &str) -> Self {
        let empty = Map::new();
        let reasoning_obj = record
            .get("diagnosis_reasoning")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let analysis_obj = record
            .get("analysis_data")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let confidence = reasoning_obj
            .get("confidence")
            .or_else(|| record.get("confidence"))
            .and_then(confidence_value)
            .unwrap_or(NEUTRAL_CONFIDENCE);

        let status = analysis_obj
            .get("status")
            .or_else(|| record.get("status"))
            .and_then(Value::as_str)
            .map(ExpertStatus::parse_lenient)
            .or_else(|| {
                record
                    .get("is_conclusion")
                    .and_then(Value::as_bool)
                    .map(|c| if c { ExpertStatus::Concluded } else { ExpertStatus::Active })
            })
            .unwrap_or_default();

        let matched_service = analysis_obj
            .get("matched_service")
            .or_else(|| record.get("matched_service"))
            .and_then(Value::as_str)
            .and_then(service_label);

        let reply_to_user = ["reply_to_user", "question", "reply", "response"]
            .iter()
            .find_map(|key| record.get(*key).and_then(Value::as_str))
            .map_or_else(|| raw.trim().to_string(), |s| s.trim().to_string());

        Self {
            reasoning: DiagnosisReasoning {
                current_hypotheses: string_list(reasoning_obj.get("current_hypotheses")),
                key_signals: string_list(reasoning_obj.get("key_signals")),
                eliminated_categories: string_list(reasoning_obj.get("eliminated_categories")),
                confidence,
                next_question_purpose: text(reasoning_obj.get("next_question_purpose")),
            },
            analysis: AnalysisData {
                status,
                matched_service,
                diagnosis: text(analysis_obj.get("diagnosis")),
            },
            reply_to_user,
            structured: true,
        }
    }

    /// Structured fields to attach to the transcript turn, under `status`.
    pub fn payload(&self, status: ExpertStatus) -> TurnPayload {
        TurnPayload {
            hypotheses: self.reasoning.current_hypotheses.clone(),
            eliminated: self.reasoning.eliminated_categories.clone(),
            confidence: self.reasoning.confidence,
            question_purpose: self.reasoning.next_question_purpose.clone(),
            status,
            matched_service: self.analysis.matched_service.clone(),
        }
    }
}

/// A decoded novice turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoviceReply {
    /// Text the expert sees.
    pub response: String,
    /// Facts the novice chose to disclose this turn.
    pub revealed_info: Vec<String>,
    /// Facts the novice is still holding back.
    pub hidden_info: Vec<String>,
    /// False when neutral defaults were used.
    pub structured: bool,
}

impl NoviceReply {
    /// Wrap raw generator text when it could not be decoded.
    pub fn fallback(raw: &str) -> Self {
        Self {
            response: raw.trim().to_string(),
            revealed_info: Vec::new(),
            hidden_info: Vec::new(),
            structured: false,
        }
    }

    /// Build from a decoded record. Missing fields become empty.
    pub fn from_record(record: &Map<String, Value>, raw: &str) -> Self {
        let response = ["response", "reply", "message", "opening"]
            .iter()
            .find_map(|key| record.get(*key).and_then(Value::as_str))
            .map_or_else(|| raw.trim().to_string(), |s| s.trim().to_string());

        Self {
            response,
            revealed_info: string_list(record.get("revealed_info")),
            hidden_info: string_list(record.get("hidden_info")),
            structured: true,
        }
    }
}

/// One expert turn's reasoning as recorded in the diagnosis trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisTraceEntry {
    /// 1-based expert turn number.
    #[serde(default)]
    pub turn: u32,
    /// Services still in play.
    #[serde(default)]
    pub hypotheses: Vec<String>,
    /// Signals picked up from the novice.
    #[serde(default)]
    pub key_signals: Vec<String>,
    /// Categories ruled out this turn.
    #[serde(default)]
    pub eliminated: Vec<String>,
    /// Expert confidence, `0.5` when the turn was unstructured.
    #[serde(default, deserialize_with = "super::lenient::null_as_default")]
    pub confidence: f64,
    /// Purpose of the question asked.
    #[serde(default)]
    pub question_purpose: String,
    /// Free-text diagnosis at this turn.
    #[serde(default)]
    pub diagnosis: String,
    /// Service claimed at this turn, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_service: Option<String>,
    /// The expert claimed a conclusion that was not honored.
    #[serde(default)]
    pub conclusion_suppressed: bool,
    /// False when the turn fell back to neutral defaults.
    #[serde(default = "default_true")]
    pub structured: bool,
}

const fn default_true() -> bool {
    true
}

impl DiagnosisTraceEntry {
    /// Record `reply` as the trace entry for expert turn `turn`.
    pub fn from_reply(turn: u32, reply: &ExpertReply, conclusion_suppressed: bool) -> Self {
        Self {
            turn,
            hypotheses: reply.reasoning.current_hypotheses.clone(),
            key_signals: reply.reasoning.key_signals.clone(),
            eliminated: reply.reasoning.eliminated_categories.clone(),
            confidence: reply.reasoning.confidence,
            question_purpose: reply.reasoning.next_question_purpose.clone(),
            diagnosis: reply.analysis.diagnosis.clone(),
            matched_service: reply.analysis.matched_service.clone(),
            conclusion_suppressed,
            structured: reply.structured,
        }
    }
}

/// Snapshot taken when a conclusion is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDiagnosis {
    /// The accepted `matched_service`.
    pub predicted_service: String,
    /// Free-text diagnosis from the concluding turn.
    pub diagnosis: String,
    /// Confidence on the concluding turn.
    pub confidence: f64,
    /// Expert turns taken to reach the conclusion.
    pub turn_count: u32,
    /// Purpose of every question asked along the way.
    pub key_questions: Vec<String>,
}

/// Normalize a generator-supplied service label; placeholders become `None`.
pub fn service_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if PLACEHOLDER_SERVICES.contains(&trimmed.to_lowercase().as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Read a confidence from a number, numeric string or percentage; clamped to [0, 1].
pub fn confidence_value(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
                None => s.parse::<f64>().ok()?,
            }
        }
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    let scaled = if raw > 1.0 && raw <= 100.0 { raw / 100.0 } else { raw };
    Some(scaled.clamp(0.0, 1.0))
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| text(Some(item)))
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_expert_reply_reads_nested_fields() {
        let rec = record(json!({
            "diagnosis_reasoning": {
                "current_hypotheses": ["Termination Compliance Advisory", "Employee Relations"],
                "key_signals": ["won't listen"],
                "eliminated_categories": ["Recruitment"],
                "confidence": 0.82,
                "next_question_purpose": "confirm dismissal intent"
            },
            "analysis_data": {
                "status": "concluded",
                "diagnosis": "Wants to dismiss an employee",
                "matched_service": "Termination Compliance Advisory"
            },
            "reply_to_user": "It sounds like you need termination advice."
        }));

        let reply = ExpertReply::from_record(&rec, "raw");
        assert!(reply.structured);
        assert_eq!(reply.analysis.status, ExpertStatus::Concluded);
        assert_eq!(
            reply.analysis.matched_service.as_deref(),
            Some("Termination Compliance Advisory")
        );
        assert_eq!(reply.reasoning.current_hypotheses.len(), 2);
        assert!((reply.reasoning.confidence - 0.82).abs() < 1e-9);
        assert_eq!(reply.reply_to_user, "It sounds like you need termination advice.");
    }

    #[test]
    fn test_expert_reply_missing_fields_use_neutral_defaults() {
        let rec = record(json!({"question": "What happened?"}));
        let reply = ExpertReply::from_record(&rec, "raw");

        assert_eq!(reply.analysis.status, ExpertStatus::Active);
        assert!(reply.analysis.matched_service.is_none());
        assert!((reply.reasoning.confidence - NEUTRAL_CONFIDENCE).abs() < 1e-9);
        assert_eq!(reply.reply_to_user, "What happened?");
    }

    #[test]
    fn test_expert_reply_legacy_conclusion_flag() {
        let rec = record(json!({"question": "Done.", "is_conclusion": true}));
        let reply = ExpertReply::from_record(&rec, "raw");
        assert_eq!(reply.analysis.status, ExpertStatus::Concluded);
    }

    #[test]
    fn test_fallback_is_neutral() {
        let reply = ExpertReply::fallback("  just text  ");
        assert!(!reply.structured);
        assert_eq!(reply.reply_to_user, "just text");
        assert_eq!(reply.analysis.status, ExpertStatus::Active);
        assert!((reply.reasoning.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_value_variants() {
        assert_eq!(confidence_value(&json!(0.3)), Some(0.3));
        assert_eq!(confidence_value(&json!("85%")), Some(0.85));
        assert_eq!(confidence_value(&json!(90)), Some(0.9));
        assert_eq!(confidence_value(&json!(-2)), Some(0.0));
        assert_eq!(confidence_value(&json!(250)), Some(1.0));
        assert_eq!(confidence_value(&json!("high")), None);
        assert_eq!(confidence_value(&json!(null)), None);
    }

    #[test]
    fn test_placeholder_services_are_inconclusive() {
        assert_eq!(service_label("  "), None);
        assert_eq!(service_label("Unknown"), None);
        assert_eq!(service_label("N/A"), None);
        assert_eq!(service_label(" Payroll Outsourcing "), Some("Payroll Outsourcing".to_string()));
    }

    #[test]
    fn test_novice_reply_reads_response() {
        let rec = record(json!({
            "response": "He keeps ignoring me.",
            "revealed_info": ["insubordination"],
            "hidden_info": "wants to fire"
        }));
        let reply = NoviceReply::from_record(&rec, "raw");
        assert_eq!(reply.response, "He keeps ignoring me.");
        assert_eq!(reply.revealed_info, vec!["insubordination"]);
        assert_eq!(reply.hidden_info, vec!["wants to fire"]);
    }
}
