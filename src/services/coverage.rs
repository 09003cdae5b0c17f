//! Trace coverage of a taxonomy.

use serde::{Deserialize, Serialize};

use crate::domain::models::Taxonomy;

/// Trace count for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCoverage {
    /// Service name.
    pub service: String,
    /// Traces stored under the service.
    pub trace_count: usize,
}

/// Per-category rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCoverage {
    /// Category name.
    pub category: String,
    /// Services in the category.
    pub total_services: usize,
    /// Services holding at least one trace.
    pub covered_services: usize,
    /// `covered_services / total_services`, 0 for an empty category.
    pub coverage_rate: f64,
    /// Traces across all services.
    pub total_traces: usize,
    /// In taxonomy order.
    pub services: Vec<ServiceCoverage>,
}

/// Whole-taxonomy rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Categories in the taxonomy.
    pub total_categories: usize,
    /// Services across every category.
    pub total_services: usize,
    /// Services holding at least one trace.
    pub covered_services: usize,
    /// `covered_services / total_services`.
    pub coverage_rate: f64,
    /// Traces across the taxonomy.
    pub total_traces: usize,
}

/// A service to simulate next. Higher priority means fewer traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityItem {
    /// Owning category.
    pub category: String,
    /// Service to simulate.
    pub service: String,
    /// Traces it holds today.
    pub trace_count: usize,
    /// `1 / (trace_count + 1)`.
    pub priority: f64,
}

/// Coverage of one domain's taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Domain the report covers.
    pub domain: String,
    /// Totals.
    pub summary: CoverageSummary,
    /// Per category, in taxonomy order.
    pub categories: Vec<CategoryCoverage>,
    /// `(category, service)` pairs with no traces.
    pub uncovered: Vec<(String, String)>,
    /// Least covered first; ties keep taxonomy order.
    pub priority_queue: Vec<PriorityItem>,
}

#[allow(clippy::cast_precision_loss)]
fn rate(covered: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// Only services listed in a category count; stray trace keys are ignored.
pub fn coverage_report(domain: &str, taxonomy: &Taxonomy) -> CoverageReport {
    let mut summary = CoverageSummary {
        total_categories: taxonomy.categories.len(),
        ..CoverageSummary::default()
    };
    let mut categories = Vec::with_capacity(taxonomy.categories.len());
    let mut uncovered = Vec::new();
    let mut priority_queue = Vec::new();

    for category in &taxonomy.categories {
        let services: Vec<ServiceCoverage> = category
            .services
            .iter()
            .map(|s| ServiceCoverage {
                service: s.clone(),
                trace_count: category.traces_for(s).len(),
            })
            .collect();
        let covered = services.iter().filter(|s| s.trace_count > 0).count();
        let traces: usize = services.iter().map(|s| s.trace_count).sum();

        for s in &services {
            if s.trace_count == 0 {
                uncovered.push((category.name.clone(), s.service.clone()));
            }
            priority_queue.push(PriorityItem {
                category: category.name.clone(),
                service: s.service.clone(),
                trace_count: s.trace_count,
                priority: rate(1, s.trace_count + 1),
            });
        }

        summary.total_services += services.len();
        summary.covered_services += covered;
        summary.total_traces += traces;
        categories.push(CategoryCoverage {
            category: category.name.clone(),
            total_services: services.len(),
            covered_services: covered,
            coverage_rate: rate(covered, services.len()),
            total_traces: traces,
            services,
        });
    }

    summary.coverage_rate = rate(summary.covered_services, summary.total_services);
    priority_queue.sort_by(|a, b| a.trace_count.cmp(&b.trace_count));

    CoverageReport {
        domain: domain.to_string(),
        summary,
        categories,
        uncovered,
        priority_queue,
    }
}
