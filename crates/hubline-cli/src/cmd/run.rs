//! `hubline run` - pull every configured resource

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use hubline_core::{CancelToken, SharedProgress, install_signal_handlers};
use hubline_hubspot::Pipeline;
use hubline_warehouse::BigQueryWarehouse;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only pull these resources (repeatable)
    #[arg(short, long = "resource")]
    pub resources: Vec<String>,

    /// Pull state file (overrides [state].path)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Rows per insert call (overrides [warehouse].batch_size)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Attempts per request for transient failures (overrides [retry].max_retries)
    #[arg(long)]
    pub max_retries: Option<u32>,
}

/// Build the pipeline settings: config file first, CLI flags override.
fn pipeline_config(args: &RunArgs, config: &Config) -> Result<hubline_hubspot::Config> {
    let mut pipeline = config.pipeline();
    if let Some(path) = &args.state_file {
        pipeline.state_path = path.clone();
    }
    if let Some(n) = args.batch_size {
        pipeline.batch_size = n;
    }
    if let Some(n) = args.max_retries {
        pipeline.retry.max_retries = n;
    }
    pipeline.select_resources(&args.resources)?;
    pipeline.validate()?;
    Ok(pipeline)
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let pipeline_config = pipeline_config(&args, config)?;
    let bigquery = config.bigquery()?;

    let cancel = CancelToken::new();
    install_signal_handlers(&cancel).context("Failed to install signal handlers")?;

    let warehouse = BigQueryWarehouse::connect(&bigquery)
        .with_context(|| format!("Cannot connect to BigQuery project {}", bigquery.project_id))?;
    let pipeline = Pipeline::connect(pipeline_config, Arc::new(warehouse), cancel)?;

    let summary = hubline_hubspot::run(&pipeline, progress)?;
    Ok(ExitCode::from(summary.exit_code()))
}
