//! Per-resource pull statistics and the end-of-run summary.
//!
//! Statistics hierarchy:
//! - Resource-level: `ResourceStats`, filled in by the pull worker
//! - Run-level: `RunSummary`, printed as a table on TTY or logged otherwise

use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use hubline_core::{SharedProgress, fmt_num};

use crate::loader::LoadReport;

/// How a resource pull ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Done,
    Failed(String),
    Cancelled,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

// =============================================================================
// Resource-level
// =============================================================================

/// Statistics for one resource pull.
#[derive(Debug, Clone, Default)]
pub struct ResourceStats {
    pub resource: String,
    /// Non-empty pages fetched and loaded
    pub pages: usize,
    /// Records received across all pages
    pub records: usize,
    pub rows_inserted: usize,
    pub rows_failed: usize,
    pub batches_failed: usize,
    /// Watermark persisted at the end of the pull
    pub watermark: Option<String>,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

impl ResourceStats {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    /// Fold one page's load report into the totals.
    pub fn add_page(&mut self, report: &LoadReport) {
        self.pages += 1;
        self.records += report.rows;
        self.rows_inserted += report.inserted;
        self.rows_failed += report.failed_rows;
        self.batches_failed += report.failed_batches;
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// Log pull completion (non-TTY mode only).
    pub fn log(&self) {
        log::info!(
            "{}: {} records in {} pages, {} inserted, {} failed, watermark={} [{:.1}s] {}",
            self.resource,
            fmt_num(self.records),
            self.pages,
            fmt_num(self.rows_inserted),
            fmt_num(self.rows_failed),
            self.watermark.as_deref().unwrap_or("-"),
            self.elapsed.as_secs_f64(),
            self.outcome
        );
    }
}

// =============================================================================
// Run-level
// =============================================================================

/// Aggregated results of one run over every configured resource.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub resources: Vec<ResourceStats>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Build a summary ordered by resource name.
    pub fn from_resources(mut resources: Vec<ResourceStats>, elapsed: Duration) -> Self {
        resources.sort_by(|a, b| a.resource.cmp(&b.resource));
        Self { resources, elapsed }
    }

    pub fn failed(&self) -> usize {
        self.resources.iter().filter(|r| r.is_failed()).count()
    }

    pub fn cancelled(&self) -> bool {
        self.resources
            .iter()
            .any(|r| r.outcome == Outcome::Cancelled)
    }

    /// 130 when cancelled, 1 when any resource failed, 0 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.cancelled() {
            130
        } else if self.failed() > 0 {
            1
        } else {
            0
        }
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Resource")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Pages").fg(Color::Cyan),
                Cell::new("Records").fg(Color::Cyan),
                Cell::new("Inserted").fg(Color::Cyan),
                Cell::new("Failed rows").fg(Color::Cyan),
                Cell::new("Watermark").fg(Color::Cyan),
                Cell::new("Outcome").fg(Color::Cyan),
            ]);

        for r in &self.resources {
            let outcome_color = match r.outcome {
                Outcome::Done if r.rows_failed == 0 => Color::Green,
                Outcome::Done => Color::Yellow,
                Outcome::Failed(_) => Color::Red,
                Outcome::Cancelled => Color::Yellow,
            };
            table.add_row(vec![
                Cell::new(&r.resource),
                Cell::new(fmt_num(r.pages)),
                Cell::new(fmt_num(r.records)),
                Cell::new(fmt_num(r.rows_inserted)),
                Cell::new(format!("{} ({} batches)", fmt_num(r.rows_failed), r.batches_failed)),
                Cell::new(r.watermark.as_deref().unwrap_or("-")),
                Cell::new(r.outcome.to_string()).fg(outcome_color),
            ]);
        }

        format!("\n{table}\n  Elapsed: {:.1}s", self.elapsed.as_secs_f64())
    }

    /// Print the table on TTY, log per-resource lines otherwise.
    pub fn report(&self, progress: &SharedProgress) {
        if progress.is_tty() {
            progress.println(self.format_table());
        } else {
            self.log();
        }
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        for r in &self.resources {
            r.log();
        }
        log::info!(
            "Run complete: {}/{} resources ok [{:.1}s]",
            self.resources.len() - self.failed(),
            self.resources.len(),
            self.elapsed.as_secs_f64()
        );
    }
}
