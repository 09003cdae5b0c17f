//! Table output for records, taxonomies, coverage and batch results using comfy-table.
//!
//! Colors are dropped when `NO_COLOR` is set or the terminal is dumb.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::domain::models::{BatchRunSummary, IngestionStatus, PendingRecord, Taxonomy};
use crate::services::coverage::{CoverageReport, PriorityItem};

/// Renders domain values as terminal tables.
pub struct TableFormatter {
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Formatter with color detection.
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Formatter with explicit color and width settings.
    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Inbox listing.
    pub fn format_records(&self, records: &[PendingRecord]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "ID", "Domain", "Created", "Query", "Prediction", "Ground Truth", "Correct",
        ]));

        for record in records {
            table.add_row(vec![
                Cell::new(&record.id),
                Cell::new(&record.domain),
                Cell::new(record.timestamp.format("%Y-%m-%d %H:%M")),
                Cell::new(truncate(&record.query, 40)),
                Cell::new(truncate(&record.ai_prediction, 30)),
                Cell::new(truncate(&record.ground_truth, 30)),
                self.verdict_cell(record.diagnosis_correct),
            ]);
        }

        table.to_string()
    }

    /// One row per service, with trace counts.
    pub fn format_taxonomy(&self, taxonomy: &Taxonomy) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Category", "Services", "Traces"]));

        for category in &taxonomy.categories {
            let services = category
                .services
                .iter()
                .map(|s| format!("{s} ({})", category.traces_for(s).len()))
                .collect::<Vec<_>>()
                .join("\n");
            table.add_row(vec![
                self.highlight(Cell::new(&category.name), Color::Cyan),
                Cell::new(services),
                Cell::new(category.trace_count()),
            ]);
        }

        table.to_string()
    }

    /// Per-category coverage.
    pub fn format_coverage(&self, report: &CoverageReport) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Category", "Services", "Covered", "Rate", "Traces"]));

        for category in &report.categories {
            table.add_row(vec![
                Cell::new(&category.category),
                Cell::new(category.total_services),
                Cell::new(category.covered_services),
                self.rate_cell(category.coverage_rate),
                Cell::new(category.total_traces),
            ]);
        }

        table.to_string()
    }

    /// Services to simulate next.
    pub fn format_priority(&self, items: &[PriorityItem]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Category", "Service", "Traces", "Priority"]));

        for item in items {
            table.add_row(vec![
                Cell::new(truncate(&item.category, 36)),
                Cell::new(&item.service),
                Cell::new(item.trace_count),
                Cell::new(format!("{:.2}", item.priority)),
            ]);
        }

        table.to_string()
    }

    /// Recent batch runs.
    pub fn format_batch_results(&self, results: &[BatchRunSummary]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "#", "Record", "Prediction", "Ground Truth", "Correct", "Turns", "Ingestion",
        ]));

        for result in results {
            let ingestion = match result.ingestion {
                IngestionStatus::Unmatched => {
                    self.highlight(Cell::new(result.ingestion.as_str()), Color::Yellow)
                }
                status => Cell::new(status.as_str()),
            };
            table.add_row(vec![
                Cell::new(result.index),
                Cell::new(&result.record_id),
                Cell::new(truncate(&result.prediction, 30)),
                Cell::new(truncate(&result.ground_truth, 30)),
                self.verdict_cell(result.correct),
                Cell::new(result.turns),
                ingestion,
            ]);
        }

        table.to_string()
    }

    fn verdict_cell(&self, correct: bool) -> Cell {
        match (correct, self.use_colors) {
            (true, true) => Cell::new("yes").fg(Color::Green),
            (false, true) => Cell::new("no").fg(Color::Red),
            (true, false) => Cell::new("✓ yes"),
            (false, false) => Cell::new("✗ no"),
        }
    }

    fn rate_cell(&self, rate: f64) -> Cell {
        let cell = Cell::new(format!("{:.0}%", rate * 100.0));
        let color = if rate >= 0.8 {
            Color::Green
        } else if rate >= 0.4 {
            Color::Yellow
        } else {
            Color::Red
        };
        self.highlight(cell, color)
    }

    fn highlight(&self, cell: Cell, color: Color) -> Cell {
        if self.use_colors {
            cell.fg(color)
        } else {
            cell
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|l| Cell::new(l).add_attribute(Attribute::Bold))
        .collect()
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM"), Ok(term) if term == "dumb")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Category, SimulationOutcome};
    use crate::services::coverage_report;

    fn plain() -> TableFormatter {
        TableFormatter::with_config(false, Some(160))
    }

    #[test]
    fn test_taxonomy_table_lists_services_with_counts() {
        let taxonomy = Taxonomy::new(vec![
            Category::new("Payroll").with_services(["Payroll Outsourcing", "Tax Filing"])
        ]);
        let rendered = plain().format_taxonomy(&taxonomy);
        assert!(rendered.contains("Payroll"));
        assert!(rendered.contains("Payroll Outsourcing (0)"));
        assert!(rendered.contains("Tax Filing (0)"));
    }

    #[test]
    fn test_coverage_table_shows_rate() {
        let taxonomy = Taxonomy::new(vec![Category::new("Payroll").with_services(["Tax Filing"])]);
        let rendered = plain().format_coverage(&coverage_report("hr", &taxonomy));
        assert!(rendered.contains("0%"));
    }

    #[test]
    fn test_batch_results_without_colors_use_icons() {
        let results = vec![BatchRunSummary {
            index: 1,
            record_id: "sim_00000001".to_string(),
            query: "q".to_string(),
            prediction: "Executive Search".to_string(),
            ground_truth: "Executive Search".to_string(),
            correct: true,
            turns: 3,
            confidence: 0.9,
            outcome: SimulationOutcome::Concluded,
            ingestion: IngestionStatus::Matched,
        }];
        let rendered = plain().format_batch_results(&results);
        assert!(rendered.contains("✓ yes"));
        assert!(rendered.contains("matched"));
    }
}
