//! Role prompts for the turn generator.

use crate::domain::models::{Scenario, Transcript};
use crate::domain::ports::{GeneratorRole, TurnRequest};

const EXPERT_OUTPUT_FORMAT: &str = r#"{
  "diagnosis_reasoning": {
    "current_hypotheses": ["most likely service", "runner-up"],
    "key_signals": ["clue from the client's words"],
    "eliminated_categories": ["category ruled out"],
    "confidence": 0.0,
    "next_question_purpose": "what your next question is meant to rule in or out"
  },
  "analysis_data": {
    "status": "active or concluded",
    "diagnosis": "one-sentence summary of the client's real need",
    "matched_service": "exact service name from the catalog, or empty while active"
  },
  "reply_to_user": "your question, or your final recommendation when concluded"
}"#;

const NOVICE_OUTPUT_FORMAT: &str = r#"{
  "response": "what you say to the expert",
  "revealed_info": ["facts you shared this turn"],
  "hidden_info": ["facts you are still holding back"]
}"#;

/// Prompt for the novice's opening message.
pub fn opening_request(simulation_id: &str, domain: &str, scenario: &Scenario) -> TurnRequest {
    let system_prompt = format!(
        "You are a client seeking {domain} advice. You know nothing about professional \
         terminology.\n\n\
         ## Your situation (private)\n\
         - Persona: {persona} ({tone})\n\
         - What is bothering you: \"{intent}\"\n\n\
         ## Rules\n\
         1. Describe your situation in one or two everyday sentences, in your persona's tone.\n\
         2. Never name a professional service or use jargon.\n\n\
         Reply with plain JSON only:\n{NOVICE_OUTPUT_FORMAT}",
        persona = scenario.persona,
        tone = scenario.tone,
        intent = scenario.novice_intent,
    );
    TurnRequest {
        simulation_id: simulation_id.to_string(),
        role: GeneratorRole::Opening,
        system_prompt,
        user_prompt: "Open the conversation.".to_string(),
        temperature: None,
    }
}

/// Prompt for one expert turn. `expert_turn` is 1-based.
pub fn expert_request(
    simulation_id: &str,
    domain: &str,
    taxonomy_context: &str,
    transcript: &Transcript,
    expert_turn: u32,
    min_conclusion_turn: u32,
) -> TurnRequest {
    let conclusion_rule = if expert_turn < min_conclusion_turn {
        format!(
            "This is question {expert_turn}. You may not conclude before question \
             {min_conclusion_turn}; keep status \"active\" and keep narrowing down."
        )
    } else {
        format!(
            "This is question {expert_turn}. If one catalog service clearly fits, set status \
             \"concluded\", put its exact name in matched_service and give your recommendation \
             in reply_to_user."
        )
    };

    let system_prompt = format!(
        "You are a senior {domain} consultant. The client has a concrete need but cannot name \
         it and only describes symptoms.\n\n\
         ## Service catalog\n{taxonomy_context}\n\n\
         ## Strategy\n\
         1. Do not guess blindly. Ask broad questions first to rule out whole categories.\n\
         2. Use plain language; the client does not know the jargon.\n\
         3. Ask one question at a time.\n\
         4. {conclusion_rule}\n\n\
         Reply with plain JSON only:\n{EXPERT_OUTPUT_FORMAT}"
    );

    TurnRequest {
        simulation_id: simulation_id.to_string(),
        role: GeneratorRole::Expert,
        system_prompt,
        user_prompt: format!("Conversation so far:\n{}", transcript.render()),
        temperature: None,
    }
}

/// Prompt for one novice reply. The ground truth is shown to the novice
/// only so it can avoid saying it.
pub fn novice_request(simulation_id: &str, scenario: &Scenario, transcript: &Transcript) -> TurnRequest {
    let hidden = scenario
        .hidden_signal
        .as_deref()
        .map(|signal| {
            format!("\n- Something you will not say outright unless asked directly: {signal}")
        })
        .unwrap_or_default();

    let system_prompt = format!(
        "You are a client talking to a consultant.\n\n\
         ## Your private brief (the consultant cannot see this)\n\
         - Persona: {persona} ({tone})\n\
         - What is bothering you: \"{intent}\"\n\
         - The service you actually need: {term} (never say this name){hidden}\n\n\
         ## Rules\n\
         1. Answer only what the consultant asked, based on what is bothering you.\n\
         2. Never mention \"{term}\" or any professional term.\n\
         3. If the question hits the mark, show recognition; if it misses, show confusion.\n\n\
         Reply with plain JSON only:\n{NOVICE_OUTPUT_FORMAT}",
        persona = scenario.persona,
        tone = scenario.tone,
        intent = scenario.novice_intent,
        term = scenario.expert_term,
    );

    TurnRequest {
        simulation_id: simulation_id.to_string(),
        role: GeneratorRole::Novice,
        system_prompt,
        user_prompt: format!("Conversation so far:\n{}", transcript.render()),
        temperature: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Role;

    fn scenario() -> Scenario {
        Scenario {
            novice_intent: "I want to fire an employee who won't listen".to_string(),
            expert_term: "Termination Compliance Advisory".to_string(),
            category: "Termination & Compliance".to_string(),
            persona: "startup founder".to_string(),
            tone: "impatient".to_string(),
            hidden_signal: Some("the person is on probation".to_string()),
            confusion_with: Vec::new(),
        }
    }

    #[test]
    fn test_expert_prompt_never_contains_ground_truth_scenario() {
        let mut transcript = Transcript::new();
        transcript.push(Role::Novice, "Someone on my team won't follow instructions.", None);
        let request = expert_request("sim_1", "hr", "[Recruitment]: Executive Search", &transcript, 1, 3);

        assert_eq!(request.role, GeneratorRole::Expert);
        assert!(request.system_prompt.contains("[Recruitment]: Executive Search"));
        assert!(request.system_prompt.contains("may not conclude before question 3"));
        assert!(request.user_prompt.contains("Novice: Someone on my team"));
    }

    #[test]
    fn test_expert_prompt_allows_conclusion_after_floor() {
        let request = expert_request("sim_1", "hr", "", &Transcript::new(), 3, 3);
        assert!(request.system_prompt.contains("set status \"concluded\""));
    }

    #[test]
    fn test_novice_prompt_carries_private_brief() {
        let request = novice_request("sim_1", &scenario(), &Transcript::new());
        assert_eq!(request.role, GeneratorRole::Novice);
        assert!(request.system_prompt.contains("never say this name"));
        assert!(request.system_prompt.contains("on probation"));
    }

    #[test]
    fn test_opening_prompt_omits_ground_truth() {
        let request = opening_request("sim_1", "hr", &scenario());
        assert_eq!(request.role, GeneratorRole::Opening);
        assert!(!request.system_prompt.contains("Termination Compliance Advisory"));
    }
}
