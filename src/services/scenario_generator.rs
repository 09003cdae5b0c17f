//! Scenario generator: draws secret missions and keeps them fresh.
//!
//! Templates come from the taxonomy document when it carries any, otherwise
//! from the built-in library. Each issued scenario is fingerprinted; a
//! repeat triggers regeneration up to `max_dedup_retries` times, after which
//! the duplicate is accepted so generation never stalls.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::scenario::var_text;
use crate::domain::models::{Persona, Scenario, ScenarioConfig, ScenarioTemplate, Taxonomy};
use crate::services::scenario_library::ScenarioLibrary;

/// Capped set of issued fingerprints; the oldest are evicted first.
#[derive(Debug, Clone)]
pub struct FingerprintCache {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl FingerprintCache {
    /// Cache holding at most `capacity` fingerprints (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    /// Whether `fingerprint` is still remembered.
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.members.contains(fingerprint)
    }

    /// Record a fingerprint. Returns false if it was already present.
    pub fn insert(&mut self, fingerprint: String) -> bool {
        if self.members.contains(&fingerprint) {
            return false;
        }
        self.members.insert(fingerprint.clone());
        self.order.push_back(fingerprint);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    /// Fingerprints currently held.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Nothing held.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// Where templates were drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// The document's `scenario_templates`.
    Taxonomy,
    /// The built-in library, used when the document has none.
    Builtin,
}

/// Diversity figures for the `simulate stats` output.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioStats {
    /// Where templates came from.
    pub template_source: TemplateSource,
    /// Categories with at least one template.
    pub categories: usize,
    /// Templates across those categories.
    pub templates: usize,
    /// Personas in the library.
    pub personas: usize,
    /// Emotion modifiers in the library.
    pub emotions: usize,
    /// Urgency modifiers in the library.
    pub urgency: usize,
    /// Fingerprints issued since the last reset.
    pub issued_fingerprints: usize,
    /// Duplicates accepted after exhausting retries.
    pub duplicates_accepted: usize,
    /// Upper bound on distinct scenarios.
    pub estimated_unique_combinations: usize,
}

/// Draws scenarios from a taxonomy's templates, avoiding repeats.
pub struct ScenarioGenerator {
    config: ScenarioConfig,
    library: ScenarioLibrary,
    rng: StdRng,
    issued: FingerprintCache,
    duplicates_accepted: usize,
}

impl ScenarioGenerator {
    /// Generator seeded from the OS.
    pub fn new(config: ScenarioConfig, library: ScenarioLibrary) -> Self {
        Self::with_rng(config, library, StdRng::from_os_rng())
    }

    /// Deterministic generator for tests and reproducible runs.
    pub fn with_seed(config: ScenarioConfig, library: ScenarioLibrary, seed: u64) -> Self {
        Self::with_rng(config, library, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ScenarioConfig, library: ScenarioLibrary, rng: StdRng) -> Self {
        let issued = FingerprintCache::new(config.fingerprint_capacity);
        Self {
            config,
            library,
            rng,
            issued,
            duplicates_accepted: 0,
        }
    }

    /// Draw a scenario for the given taxonomy.
    pub fn generate(&mut self, taxonomy: &Taxonomy) -> DomainResult<Scenario> {
        let (source, pool) = template_pool(&self.library, taxonomy);
        if pool.is_empty() {
            return Err(DomainError::NoScenarioTemplates(
                "taxonomy and built-in library are both empty".to_string(),
            ));
        }

        let mut retries = 0;
        loop {
            let scenario = draw(&mut self.rng, &self.library, &pool, &self.config)
                .ok_or_else(|| DomainError::NoScenarioTemplates("empty template list".to_string()))?;
            let fingerprint = scenario.fingerprint();

            if self.issued.insert(fingerprint.clone()) {
                debug!(
                    fingerprint = %fingerprint,
                    category = %scenario.category,
                    source = ?source,
                    retries,
                    "Generated scenario"
                );
                return Ok(scenario);
            }

            if retries >= self.config.max_dedup_retries {
                warn!(
                    fingerprint = %fingerprint,
                    retries,
                    "Retry bound exhausted, accepting duplicate scenario"
                );
                self.duplicates_accepted += 1;
                return Ok(scenario);
            }
            retries += 1;
        }
    }

    /// Forget issued fingerprints. Called at batch boundaries.
    pub fn reset(&mut self) {
        let cleared = self.issued.len();
        self.issued.clear();
        self.duplicates_accepted = 0;
        info!(cleared, "Reset scenario fingerprints");
    }

    /// Fingerprints issued since the last reset.
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    /// Duplicates accepted since the last reset.
    pub fn duplicates_accepted(&self) -> usize {
        self.duplicates_accepted
    }

    /// Diversity figures for `taxonomy`.
    pub fn stats(&self, taxonomy: &Taxonomy) -> ScenarioStats {
        let (template_source, pool) = template_pool(&self.library, taxonomy);
        let templates: usize = pool.iter().map(|(_, t)| t.len()).sum();
        ScenarioStats {
            template_source,
            categories: pool.len(),
            templates,
            personas: self.library.personas.len(),
            emotions: self.library.emotions.len(),
            urgency: self.library.urgency.len(),
            issued_fingerprints: self.issued.len(),
            duplicates_accepted: self.duplicates_accepted,
            estimated_unique_combinations: templates
                * self.library.personas.len().max(1)
                * self.library.emotions.len().max(1)
                * self.library.urgency.len().max(1),
        }
    }
}

type Pool<'a> = Vec<(&'a str, &'a [ScenarioTemplate])>;

fn template_pool<'a>(library: &'a ScenarioLibrary, taxonomy: &'a Taxonomy) -> (TemplateSource, Pool<'a>) {
    let from_taxonomy: Pool<'a> = taxonomy
        .scenario_templates
        .iter()
        .filter(|(_, templates)| !templates.is_empty())
        .map(|(category, templates)| (category.as_str(), templates.as_slice()))
        .collect();
    if !from_taxonomy.is_empty() {
        return (TemplateSource::Taxonomy, from_taxonomy);
    }
    let builtin = library
        .templates
        .iter()
        .filter(|(_, templates)| !templates.is_empty())
        .map(|(category, templates)| (category.as_str(), templates.as_slice()))
        .collect();
    (TemplateSource::Builtin, builtin)
}

fn draw(
    rng: &mut StdRng,
    library: &ScenarioLibrary,
    pool: &Pool<'_>,
    config: &ScenarioConfig,
) -> Option<Scenario> {
    let (category, templates) = pool.choose(rng)?;
    let template = templates.choose(rng)?;
    let fallback = Persona::new("anonymous", "neutral", "");
    let persona = library.personas.choose(rng).unwrap_or(&fallback);

    let mut parts: Vec<String> = vec![persona.prefix.clone()];
    if chance(rng, config.emotion_probability) {
        if let Some(emotion) = library.emotions.choose(rng) {
            parts.push(emotion.clone());
        }
    }
    if chance(rng, config.urgency_probability) {
        if let Some(urgency) = library.urgency.choose(rng) {
            parts.push(urgency.clone());
        }
    }
    parts.push(fill_vars(&template.intent, &template.vars, rng));

    let novice_intent = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Some(Scenario {
        novice_intent,
        expert_term: template.service.clone(),
        category: (*category).to_string(),
        persona: persona.role.clone(),
        tone: persona.tone.clone(),
        hidden_signal: template.hidden_signal.clone(),
        confusion_with: template.confusion_with.clone(),
    })
}

fn chance(rng: &mut StdRng, probability: f64) -> bool {
    probability.is_finite() && rng.random_bool(probability.clamp(0.0, 1.0))
}

fn fill_vars(intent: &str, vars: &BTreeMap<String, Vec<Value>>, rng: &mut StdRng) -> String {
    let mut filled = intent.to_string();
    for (name, values) in vars {
        if let Some(value) = values.choose(rng) {
            filled = filled.replace(&format!("{{{name}}}"), &var_text(value));
        }
    }
    filled
}
