//! Per-resource incremental pull
//!
//! ```text
//! Start → Fetching → Loading → Advancing ─┬→ Fetching (next cursor)
//!             │                           └→ Done
//!             └→ Done (empty page)
//! ```
//!
//! Pages of one resource are strictly sequential: each cursor comes from the
//! previous response.

use std::time::Instant;

use hubline_warehouse::{Schema, WarehouseError, infer};
use indicatif::ProgressBar;

use crate::api::FetchError;
use crate::record::{Page, is_later};
use crate::resource::{Resource, with_query};
use crate::runner::Pipeline;
use crate::stats::{Outcome, ResourceStats};
use crate::watermark::PullState;

/// Phase of a resource pull, logged at debug on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPhase {
    Start,
    Fetching,
    Loading,
    Advancing,
    Done,
}

/// Phase plus the data it operates on.
enum Step {
    Start,
    Fetching,
    Loading(Page),
    Advancing(Page),
    Done,
}

impl Step {
    fn phase(&self) -> PullPhase {
        match self {
            Self::Start => PullPhase::Start,
            Self::Fetching => PullPhase::Fetching,
            Self::Loading(_) => PullPhase::Loading,
            Self::Advancing(_) => PullPhase::Advancing,
            Self::Done => PullPhase::Done,
        }
    }
}

/// Why a resource pull stopped early.
#[derive(Debug)]
pub enum PullError {
    Cancelled,
    /// Property catalogue could not be fetched
    Properties(FetchError),
    /// Page fetch failed after the retry policy gave up
    Fetch(FetchError),
    /// Destination table could not be checked or created
    Table {
        table: String,
        source: WarehouseError,
    },
}

impl std::fmt::Display for PullError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::Properties(e) => write!(f, "property discovery failed: {e}"),
            Self::Fetch(e) => write!(f, "fetch failed: {e}"),
            Self::Table { table, source } => write!(f, "cannot prepare table {table}: {source}"),
        }
    }
}

impl std::error::Error for PullError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cancelled => None,
            Self::Properties(e) | Self::Fetch(e) => Some(e),
            Self::Table { source, .. } => Some(source),
        }
    }
}

impl From<FetchError> for PullError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Cancelled => Self::Cancelled,
            e => Self::Fetch(e),
        }
    }
}

/// Pull one resource to completion and report how it went.
///
/// Never panics on remote failures: they end up in [`ResourceStats::outcome`].
pub fn pull_resource(pipeline: &Pipeline, resource: &Resource, pb: &ProgressBar) -> ResourceStats {
    let start = Instant::now();
    let mut stats = ResourceStats::new(&resource.name);

    let result = attempt_pull(pipeline, resource, pb, &mut stats);

    stats.elapsed = start.elapsed();
    stats.outcome = match result {
        Ok(()) => Outcome::Done,
        Err(PullError::Cancelled) => {
            log::warn!("{resource}: cancelled after {} pages", stats.pages);
            Outcome::Cancelled
        }
        Err(e) => {
            log::error!("{resource}: {e}");
            Outcome::Failed(e.to_string())
        }
    };
    stats
}

fn attempt_pull(
    pipeline: &Pipeline,
    resource: &Resource,
    pb: &ProgressBar,
    stats: &mut ResourceStats,
) -> Result<(), PullError> {
    let fetcher = pipeline.fetcher();
    let store = pipeline.store();

    let mut endpoint = String::new();
    let mut cursor: Option<String> = None;
    let mut watermark: Option<String> = None;
    let mut table_schema: Option<Schema> = None;

    let mut step = Step::Start;
    loop {
        log::debug!("{resource}: {:?}", step.phase());
        step = match step {
            Step::Start => {
                let prior = store.get(&resource.name);
                endpoint = resolve_endpoint(pipeline, resource, prior.timestamp.as_deref())?;
                if let Some(after) = &prior.after {
                    log::info!("{resource}: resuming from cursor {after}");
                }
                stats.watermark = prior.timestamp.clone();
                cursor = prior.after;
                watermark = prior.timestamp;
                Step::Fetching
            }

            Step::Fetching => {
                if pipeline.cancel().is_cancelled() {
                    return Err(PullError::Cancelled);
                }
                pb.set_message(format!("fetching page {}...", stats.pages + 1));
                let page = fetcher.fetch_page(&endpoint, cursor.as_deref())?;
                if page.is_empty() {
                    log::info!("{resource}: no records on page, done");
                    Step::Done
                } else {
                    Step::Loading(page)
                }
            }

            Step::Loading(page) => {
                let schema = match table_schema.take() {
                    Some(schema) => schema,
                    None => prepare_table(pipeline, resource, &page)?,
                };
                pb.set_message(format!("loading {} records...", page.records.len()));
                let report = pipeline.loader().load(resource.table(), &schema, &page.records);
                table_schema = Some(schema);

                stats.add_page(&report);
                log::info!(
                    "{resource}: page {}: {} records, {} inserted, {} failed",
                    stats.pages,
                    report.rows,
                    report.inserted,
                    report.failed_rows
                );
                Step::Advancing(page)
            }

            Step::Advancing(page) => {
                if let Some(page_max) = page.max_updated_at() {
                    let advance = match watermark.as_deref() {
                        Some(current) => is_later(page_max, current),
                        None => true,
                    };
                    if advance {
                        watermark = Some(page_max.to_string());
                    }
                }
                cursor = page.next_cursor;

                let state = PullState {
                    after: cursor.clone(),
                    timestamp: watermark.clone(),
                };
                if let Err(e) = store.update(&resource.name, state) {
                    log::error!("{resource}: cannot persist pull state: {e}");
                }
                stats.watermark = watermark.clone();
                pb.set_message(format!("{} records", stats.records));

                if cursor.is_some() {
                    Step::Fetching
                } else {
                    Step::Done
                }
            }

            Step::Done => return Ok(()),
        };
    }
}

/// Build the endpoint for this pull: property list and `since` qualifier.
fn resolve_endpoint(
    pipeline: &Pipeline,
    resource: &Resource,
    since: Option<&str>,
) -> Result<String, PullError> {
    let mut endpoint = resource.endpoint.clone();

    if let Some(catalogue) = &resource.properties_endpoint {
        let names = pipeline
            .fetcher()
            .fetch_property_names(catalogue)
            .map_err(|e| match e {
                FetchError::Cancelled => PullError::Cancelled,
                e => PullError::Properties(e),
            })?;
        log::info!("{resource}: requesting {} properties", names.len());
        if !names.is_empty() {
            endpoint = with_query(&endpoint, "properties", &names.join(","));
        }
    }

    if let Some(ts) = since {
        log::info!("{resource}: pulling records updated since {ts}");
        endpoint = with_query(&endpoint, "since", ts);
    }
    Ok(endpoint)
}

/// Infer the schema from the page's first record and make sure the table exists.
fn prepare_table(
    pipeline: &Pipeline,
    resource: &Resource,
    page: &Page,
) -> Result<Schema, PullError> {
    let schema = page
        .records
        .first()
        .map(|r| infer(&r.properties))
        .unwrap_or_else(Schema::prefix_only);
    log::debug!(
        "{resource}: inferred {} property columns",
        schema.property_columns().count()
    );
    pipeline
        .loader()
        .ensure_table(resource.table(), &schema)
        .map_err(|source| PullError::Table {
            table: resource.table().to_string(),
            source,
        })?;
    Ok(schema)
}
