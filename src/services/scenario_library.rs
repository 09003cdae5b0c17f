//! Built-in scenario material: personas, surface modifiers and the HR
//! template library used when a taxonomy document carries no templates.

use crate::domain::models::{Persona, ScenarioTemplate};

/// Pools the scenario generator samples from.
#[derive(Debug, Clone)]
pub struct ScenarioLibrary {
    /// Who the novice can be.
    pub personas: Vec<Persona>,
    /// Emotional openers; the empty string means none.
    pub emotions: Vec<String>,
    /// Urgency openers; the empty string means none.
    pub urgency: Vec<String>,
    /// Category name to templates, in display order.
    pub templates: Vec<(String, Vec<ScenarioTemplate>)>,
}

const PERSONAS: &[(&str, &str, &str)] = &[
    ("startup founder", "impatient", "I run a small business, and"),
    ("HR manager", "professional", "As the HR manager at my company,"),
    ("individual contributor", "confused", "I'm just a regular employee, and"),
    ("department head", "anxious", "I manage a department, and"),
    ("new graduate", "nervous", "I only just started my first job, and"),
    ("long-tenured employee", "angry", "I've been with this company for over ten years, and"),
    ("multinational executive", "cautious", "I'm an executive at a foreign-owned company, and"),
    ("early-stage team lead", "confused", "We're a tiny early-stage team, and"),
];

const EMOTIONS: &[&str] = &[
    "honestly this is giving me a headache,",
    "this is really stressing me out,",
    "I have no idea what to do,",
    "I'm desperate here,",
    "I'm so frustrated,",
    "this can't wait,",
    "I've heard this can get messy,",
    "I'm scared of getting it wrong,",
    "I know nothing about this stuff,",
    "we got burned on something like this before,",
    "a friend's company got into trouble over this,",
    "",
];

const URGENCY: &[&str] = &[
    "it's really urgent,",
    "it has to be sorted by next week,",
    "the sooner the better,",
    "this has been dragging on for ages,",
    "things are about to blow up,",
    "",
];

const RECRUITMENT: &str = "Recruitment & Talent Acquisition";
const COMPLIANCE: &str = "Termination & Compliance";
const COMPENSATION: &str = "Compensation, Benefits & Tax";
const ORG_DEVELOPMENT: &str = "Organization Development & Training";

impl ScenarioLibrary {
    /// The built-in HR library.
    pub fn builtin_hr() -> Self {
        Self {
            personas: PERSONAS
                .iter()
                .map(|(role, tone, prefix)| Persona::new(*role, *tone, *prefix))
                .collect(),
            emotions: EMOTIONS.iter().map(|s| (*s).to_string()).collect(),
            urgency: URGENCY.iter().map(|s| (*s).to_string()).collect(),
            templates: vec![
                (RECRUITMENT.to_string(), recruitment_templates()),
                (COMPLIANCE.to_string(), compliance_templates()),
                (COMPENSATION.to_string(), compensation_templates()),
                (ORG_DEVELOPMENT.to_string(), org_development_templates()),
            ],
        }
    }

    /// Same pools, different templates.
    pub fn with_templates(mut self, templates: Vec<(String, Vec<ScenarioTemplate>)>) -> Self {
        self.templates = templates;
        self
    }

    /// Templates across every category.
    pub fn template_count(&self) -> usize {
        self.templates.iter().map(|(_, t)| t.len()).sum()
    }

    /// Rough count of distinct surface forms, ignoring template variables.
    pub fn estimated_unique_combinations(&self) -> usize {
        self.template_count()
            * self.personas.len().max(1)
            * self.emotions.len().max(1)
            * self.urgency.len().max(1)
    }
}

fn recruitment_templates() -> Vec<ScenarioTemplate> {
    vec![
        ScenarioTemplate::new(
            "we're swamped lately and I'd like to find a few people to help out",
            "Flexible Staffing",
        )
        .with_ambiguity(3)
        .with_confusion("Recruitment Process Outsourcing"),
        ScenarioTemplate::new(
            "year-end is crazy busy, can we get some people in just for a while?",
            "Flexible Staffing",
        )
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "the office air conditioning has been broken for {days} days and everyone is melting",
            "Workplace Facilities Support",
        )
        .with_var("days", ["3", "5", "7", "10"])
        .with_ambiguity(1),
        ScenarioTemplate::new(
            "hiring is exhausting, is there someone who can just take it off my hands?",
            "Recruitment Process Outsourcing",
        )
        .with_ambiguity(3)
        .with_confusion("Flexible Staffing"),
        ScenarioTemplate::new(
            "I need one really exceptional person but I can't find anyone",
            "Executive Search",
        )
        .with_ambiguity(4)
        .with_confusion("Recruitment Process Outsourcing"),
        ScenarioTemplate::new(
            "someone wants to join us but their resume looks a little too good",
            "Background Screening",
        )
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "campus hiring season brought in {count} applications and I'm on my own",
            "Recruitment Process Outsourcing",
        )
        .with_var("count", ["200", "500", "1000"])
        .with_ambiguity(3),
        ScenarioTemplate::new(
            "someone from a competitor wants to jump ship to us and I'm not sure they're legit",
            "Background Screening",
        )
        .with_ambiguity(2),
    ]
}

fn compliance_templates() -> Vec<ScenarioTemplate> {
    vec![
        ScenarioTemplate::new(
            "I want to fire an employee who won't listen",
            "Termination Compliance Advisory",
        )
        .with_ambiguity(4)
        .with_confusion("Labor Relations Compliance"),
        ScenarioTemplate::new(
            "there's someone on the team I don't want to keep, I want them gone",
            "Termination Compliance Advisory",
        )
        .with_ambiguity(5)
        .with_confusion("Pregnancy & Maternity Compliance"),
        ScenarioTemplate::new(
            "the company needs to cut {count} people and I don't know how to go about it",
            "Termination Compliance Advisory",
        )
        .with_var("count", ["5", "20", "50"])
        .with_ambiguity(3),
        ScenarioTemplate::new(
            "one of the women on my team keeps taking leave and her work has slipped",
            "Pregnancy & Maternity Compliance",
        )
        .with_ambiguity(5)
        .with_confusion("Termination Compliance Advisory")
        .with_hidden_signal("she may be pregnant"),
        ScenarioTemplate::new(
            "an employee has been unwell and keeps calling in sick",
            "Pregnancy & Maternity Compliance",
        )
        .with_ambiguity(5)
        .with_confusion("Labor Relations Compliance")
        .with_hidden_signal("the employee is a woman and this may be pregnancy related"),
        ScenarioTemplate::new(
            "an employee is suing us, what do I do now?",
            "Labor Arbitration Representation",
        )
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "our company rules are ancient and something feels off about them",
            "Employee Handbook Design",
        )
        .with_ambiguity(3),
        ScenarioTemplate::new(
            "after an incident an employee just stopped showing up",
            "Labor Relations Compliance",
        )
        .with_ambiguity(3)
        .with_confusion("Termination Compliance Advisory"),
        ScenarioTemplate::new(
            "a new hire isn't working out and I want to let them go",
            "Termination Compliance Advisory",
        )
        .with_ambiguity(3)
        .with_hidden_signal("the person is still on probation"),
        ScenarioTemplate::new(
            "a key person quit and took a lot of our stuff with them",
            "Non-Compete Management",
        )
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "someone who left took our customers along with them",
            "Non-Compete Management",
        )
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "an employee leaked company information to outsiders",
            "Confidentiality & Trade Secrets",
        )
        .with_ambiguity(2),
    ]
}

fn compensation_templates() -> Vec<ScenarioTemplate> {
    vec![
        ScenarioTemplate::new(
            "how can we pay salaries so people lose less to tax?",
            "Payroll Tax Optimization",
        )
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "we want to hand out year-end money, what's the smartest way?",
            "Payroll Tax Optimization",
        )
        .with_ambiguity(3)
        .with_confusion("Employee Benefits Design"),
        ScenarioTemplate::new(
            "our pay is all over the place and I want to tidy it up",
            "Compensation Structure Design",
        )
        .with_ambiguity(3),
        ScenarioTemplate::new(
            "social insurance paperwork is a pain, can someone handle it for us?",
            "Social Insurance Administration",
        )
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "how do we handle social insurance for staff in {city}?",
            "Social Insurance Administration",
        )
        .with_var("city", ["another province", "a different city", "a new branch office"])
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "I'd like to give the team some perks but don't know where to start",
            "Employee Benefits Design",
        )
        .with_ambiguity(3)
        .with_confusion("Payroll Tax Optimization"),
    ]
}

fn org_development_templates() -> Vec<ScenarioTemplate> {
    vec![
        ScenarioTemplate::new(
            "our managers are really not up to scratch and I want to raise the bar",
            "Leadership Training",
        )
        .with_ambiguity(2),
        ScenarioTemplate::new(
            "my best people keep eyeing the exit, how do I make them stay?",
            "Equity Incentive Design",
        )
        .with_ambiguity(4)
        .with_confusion("Employee Engagement Improvement"),
        ScenarioTemplate::new(
            "the team just isn't getting things done, could someone take a look?",
            "Leadership Training",
        )
        .with_ambiguity(3)
        .with_confusion("Employee Engagement Improvement"),
        ScenarioTemplate::new(
            "we've grown to {headcount} people and management can't keep up",
            "Organization Structure Design",
        )
        .with_var("headcount", ["50", "120", "300"])
        .with_ambiguity(3),
        ScenarioTemplate::new(
            "nobody sees a way to move up here so people have stopped trying",
            "Career Ladder Design",
        )
        .with_ambiguity(3)
        .with_confusion("Employee Engagement Improvement"),
        ScenarioTemplate::new(
            "morale is really low lately and people keep quitting",
            "Employee Engagement Improvement",
        )
        .with_ambiguity(2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_library_shape() {
        let library = ScenarioLibrary::builtin_hr();
        assert_eq!(library.personas.len(), 8);
        assert_eq!(library.templates.len(), 4);
        assert_eq!(library.template_count(), 32);
        assert!(library.emotions.contains(&String::new()));
        assert!(library.urgency.contains(&String::new()));
    }

    #[test]
    fn test_templates_never_mention_their_service() {
        let library = ScenarioLibrary::builtin_hr();
        for (_, templates) in &library.templates {
            for template in templates {
                assert!(
                    !template.intent.to_lowercase().contains(&template.service.to_lowercase()),
                    "template leaks its label: {}",
                    template.intent
                );
            }
        }
    }

    #[test]
    fn test_placeholders_have_values() {
        let library = ScenarioLibrary::builtin_hr();
        for (_, templates) in &library.templates {
            for template in templates {
                for name in template.vars.keys() {
                    assert!(template.intent.contains(&format!("{{{name}}}")));
                }
            }
        }
    }

    #[test]
    fn test_each_service_has_single_category() {
        let library = ScenarioLibrary::builtin_hr();
        let mut owner: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();
        for (category, templates) in &library.templates {
            let services: HashSet<&str> = templates.iter().map(|t| t.service.as_str()).collect();
            for service in services {
                assert!(owner.insert(service, category.as_str()).is_none());
            }
        }
    }
}
