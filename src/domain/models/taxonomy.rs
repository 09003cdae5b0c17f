//! Taxonomy domain model.
//!
//! A taxonomy is an ordered list of categories, each owning a list of
//! services and the trace history ingested for them. Category order is
//! significant: context rendering and ingestion matching scan in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use super::lenient;
use super::record::{default_source, source_or_default};
use super::scenario::ScenarioTemplate;
use super::transcript::Turn;
use crate::domain::errors::{DomainError, DomainResult};

/// A pending record folded into the knowledge base. Immutable once written.
///
/// Decoding tolerates entries written by older tooling: nulls become
/// defaults and naive timestamps are read as UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Id of the pending record this entry came from.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub id: String,
    /// When the simulation finished.
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    /// The novice's opening line.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub query: String,
    /// Service the expert settled on.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub ai_prediction: String,
    /// Expert confidence at conclusion, in `[0, 1]`.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub confidence: f64,
    /// Provenance tag, e.g. `batch_simulation`.
    #[serde(default = "default_source", deserialize_with = "source_or_default")]
    pub source: String,
    /// Persona role the novice played.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub persona: String,
    /// Tone the novice spoke in.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub tone: String,
    /// Full transcript of the simulation.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub dialogue_path: Vec<Turn>,
    /// Number of turns in `dialogue_path`.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub total_turns: u32,
    /// Whether the prediction matched the ground truth. Unknown reads as false.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub diagnosis_correct: bool,
    /// Service the scenario was drawn for.
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub ground_truth: String,
}

/// A named group of services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Unique within the taxonomy.
    pub name: String,
    /// Free-text note for curators. Not rendered into prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Services in display order. A service belongs to one category.
    #[serde(default)]
    pub services: Vec<String>,
    /// Service name to ingested traces, oldest first.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trace_records: BTreeMap<String, Vec<TraceEntry>>,
}

impl Category {
    /// Empty category named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            services: Vec::new(),
            trace_records: BTreeMap::new(),
        }
    }

    /// Set the curator note.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append services, keeping their order.
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.extend(services.into_iter().map(Into::into));
        self
    }

    /// Exact-name lookup.
    pub fn has_service(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }

    /// Traces for `service`, empty when none were ingested.
    pub fn traces_for(&self, service: &str) -> &[TraceEntry] {
        self.trace_records.get(service).map_or(&[], Vec::as_slice)
    }

    /// Traces across every service of the category.
    pub fn trace_count(&self) -> usize {
        self.trace_records.values().map(Vec::len).sum()
    }
}

/// Result of an idempotent mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// Something changed.
    Added,
    /// Already present; nothing changed.
    Skipped,
}

impl MutationOutcome {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Skipped => "skipped",
        }
    }
}

/// What `Taxonomy::deduplicate` removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    /// Repeated categories merged into their first occurrence.
    pub removed_categories: usize,
    /// Repeated services dropped within a category.
    pub removed_services: usize,
}

impl DedupReport {
    /// Nothing was removed.
    pub fn is_clean(&self) -> bool {
        self.removed_categories == 0 && self.removed_services == 0
    }
}

/// The whole taxonomy document for one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    /// Categories in significant order. Serialized as `taxonomy`.
    #[serde(rename = "taxonomy", default)]
    pub categories: Vec<Category>,
    /// Optional category name to intent templates.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scenario_templates: BTreeMap<String, Vec<ScenarioTemplate>>,
    /// Unrecognized top-level keys, preserved across read/write.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Taxonomy {
    /// Taxonomy with no templates or extra keys.
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            ..Self::default()
        }
    }

    /// No categories at all.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Exact-name lookup.
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Mutable exact-name lookup.
    pub fn category_mut(&mut self, name: &str) -> Option<&mut Category> {
        self.categories.iter_mut().find(|c| c.name == name)
    }

    /// The category that owns `service`, by exact name.
    pub fn category_of_service(&self, service: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.has_service(service))
    }

    /// Services across every category.
    pub fn service_count(&self) -> usize {
        self.categories.iter().map(|c| c.services.len()).sum()
    }

    /// Traces across every category.
    pub fn trace_count(&self) -> usize {
        self.categories.iter().map(Category::trace_count).sum()
    }

    /// One line per category, in taxonomy order, listing its services.
    pub fn render_context(&self) -> String {
        self.categories
            .iter()
            .map(|c| {
                let services = if c.services.is_empty() {
                    "(no services)".to_string()
                } else {
                    c.services.join(" | ")
                };
                format!("[{}]: {services}", c.name)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Append a category. An existing name is skipped.
    pub fn add_category(
        &mut self,
        name: &str,
        description: Option<String>,
    ) -> DomainResult<MutationOutcome> {
        let name = non_empty(name, "category name")?;
        if self.category(name).is_some() {
            return Ok(MutationOutcome::Skipped);
        }
        let mut category = Category::new(name);
        category.description = description;
        self.categories.push(category);
        Ok(MutationOutcome::Added)
    }

    /// Add a service to a category. Re-adding to the same category is skipped;
    /// a service owned by another category is rejected.
    pub fn add_service(&mut self, category: &str, service: &str) -> DomainResult<MutationOutcome> {
        let service = non_empty(service, "service name")?;
        if let Some(owner) = self.category_of_service(service) {
            if owner.name == category {
                return Ok(MutationOutcome::Skipped);
            }
            return Err(DomainError::ServiceConflict {
                service: service.to_string(),
                category: owner.name.clone(),
            });
        }
        let target = self
            .category_mut(category)
            .ok_or_else(|| DomainError::CategoryNotFound(category.to_string()))?;
        target.services.push(service.to_string());
        Ok(MutationOutcome::Added)
    }

    /// Rename a category, carrying its scenario templates along.
    /// The new name must not be in use.
    pub fn rename_category(&mut self, from: &str, to: &str) -> DomainResult<()> {
        let to = non_empty(to, "category name")?;
        if from == to {
            return if self.category(from).is_some() {
                Ok(())
            } else {
                Err(DomainError::CategoryNotFound(from.to_string()))
            };
        }
        if self.category(to).is_some() {
            return Err(DomainError::CategoryExists(to.to_string()));
        }
        let category = self
            .category_mut(from)
            .ok_or_else(|| DomainError::CategoryNotFound(from.to_string()))?;
        category.name = to.to_string();
        if let Some(templates) = self.scenario_templates.remove(from) {
            self.scenario_templates.insert(to.to_string(), templates);
        }
        Ok(())
    }

    /// Remove a category with its services, traces and templates.
    pub fn delete_category(&mut self, name: &str) -> DomainResult<Category> {
        let index = self
            .categories
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| DomainError::CategoryNotFound(name.to_string()))?;
        self.scenario_templates.remove(name);
        Ok(self.categories.remove(index))
    }

    /// Collapse repeated category names into their first occurrence and drop
    /// repeated services. Services and traces of a dropped duplicate are
    /// merged into the surviving category.
    pub fn deduplicate(&mut self) -> DedupReport {
        let mut report = DedupReport::default();
        let mut merged: Vec<Category> = Vec::with_capacity(self.categories.len());
        let mut seen: HashSet<String> = HashSet::new();

        for mut category in std::mem::take(&mut self.categories) {
            let before = category.services.len();
            category.services.retain(|s| seen.insert(s.clone()));
            report.removed_services += before - category.services.len();

            if let Some(existing) = merged.iter_mut().find(|c| c.name == category.name) {
                report.removed_categories += 1;
                existing.services.extend(category.services);
                for (service, traces) in category.trace_records {
                    existing.trace_records.entry(service).or_default().extend(traces);
                }
                if existing.description.is_none() {
                    existing.description = category.description;
                }
            } else {
                merged.push(category);
            }
        }

        self.categories = merged;
        report
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> DomainResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(DomainError::ValidationFailed(format!("{what} must not be empty")))
    } else {
        Ok(trimmed)
    }
}
