//! Folds pending records into a taxonomy.
//!
//! Matching precedence, scanning categories and services in taxonomy order:
//! 1. the predicted label equals a service name (case-insensitive);
//! 2. the predicted label and a service name contain one another;
//! 3. the record's category and a category name contain one another, in
//!    which case the label becomes a new service of that category.
//!
//! First match wins at each level. A trace entry is added only when the
//! service has no entry with the same (query, prediction) pair.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::models::{IngestionStatus, PendingRecord, Taxonomy};

/// Where a record landed, or why it did not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Stored as a trace.
    Matched {
        /// Category holding the service.
        category: String,
        /// Service the trace was stored under.
        service: String,
        /// The service did not exist before this record.
        created_service: bool,
    },
    /// The service already holds an identical (query, prediction) entry.
    Duplicate {
        /// Category holding the service.
        category: String,
        /// Service that already had the entry.
        service: String,
    },
    /// Neither the prediction nor the category matched anything.
    Unmatched,
}

impl IngestOutcome {
    /// Flattened status for batch summaries.
    pub fn status(&self) -> IngestionStatus {
        match self {
            Self::Matched { .. } => IngestionStatus::Matched,
            Self::Duplicate { .. } => IngestionStatus::Duplicate,
            Self::Unmatched => IngestionStatus::Unmatched,
        }
    }

    /// Matched or duplicate: the record can leave the inbox.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unmatched)
    }

    /// The taxonomy was changed and needs saving.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// `(category, service)` when the record resolved.
    pub fn location(&self) -> Option<(&str, &str)> {
        match self {
            Self::Matched { category, service, .. } | Self::Duplicate { category, service } => {
                Some((category, service))
            }
            Self::Unmatched => None,
        }
    }
}

/// How a label resolved against the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchLocation {
    /// Index into `Taxonomy::categories`.
    pub category_index: usize,
    /// Service name as stored, or the label to add.
    pub service: String,
    /// The label is not yet a service; it goes under `category_index`.
    pub new_service: bool,
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn overlaps(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Resolve a prediction (and its stated category) to a location.
pub fn locate(taxonomy: &Taxonomy, prediction: &str, record_category: &str) -> Option<MatchLocation> {
    let label = normalize(prediction);
    if label.is_empty() {
        return None;
    }

    let services = || {
        taxonomy
            .categories
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.services.iter().map(move |s| (i, s)))
    };

    if let Some((i, service)) = services().find(|(_, s)| normalize(s) == label) {
        return Some(MatchLocation {
            category_index: i,
            service: service.clone(),
            new_service: false,
        });
    }

    if let Some((i, service)) = services().find(|(_, s)| overlaps(&normalize(s), &label)) {
        return Some(MatchLocation {
            category_index: i,
            service: service.clone(),
            new_service: false,
        });
    }

    let wanted = normalize(record_category);
    taxonomy
        .categories
        .iter()
        .position(|c| overlaps(&normalize(&c.name), &wanted))
        .map(|i| MatchLocation {
            category_index: i,
            service: prediction.trim().to_string(),
            new_service: true,
        })
}

/// Match `record` against `taxonomy` and attach its trace entry in place.
pub fn ingest(record: &PendingRecord, taxonomy: &mut Taxonomy) -> IngestOutcome {
    let Some(location) = locate(taxonomy, &record.ai_prediction, &record.category) else {
        warn!(
            record_id = %record.id,
            prediction = %record.ai_prediction,
            category = %record.category,
            "No category or service matches record"
        );
        return IngestOutcome::Unmatched;
    };

    let category = &mut taxonomy.categories[location.category_index];
    if location.new_service {
        category.services.push(location.service.clone());
    }

    let traces = category
        .trace_records
        .entry(location.service.clone())
        .or_default();
    let duplicate = traces
        .iter()
        .any(|t| t.query == record.query && t.ai_prediction == record.ai_prediction);

    if duplicate {
        debug!(
            record_id = %record.id,
            category = %category.name,
            service = %location.service,
            "Identical trace already present, skipping"
        );
        return IngestOutcome::Duplicate {
            category: category.name.clone(),
            service: location.service,
        };
    }

    traces.push(record.to_trace_entry());
    debug!(
        record_id = %record.id,
        category = %category.name,
        service = %location.service,
        created_service = location.new_service,
        "Attached trace entry"
    );
    IngestOutcome::Matched {
        category: category.name.clone(),
        service: location.service,
        created_service: location.new_service,
    }
}
