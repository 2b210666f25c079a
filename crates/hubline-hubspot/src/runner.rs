//! Main execution logic: one worker per resource on a dedicated pool

use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use hubline_core::{CancelToken, Pause, SharedProgress, SleepPause};
use hubline_warehouse::Warehouse;

use crate::api::{Fetcher, ReqwestTransport, Transport};
use crate::config::Config;
use crate::loader::BatchLoader;
use crate::stats::{ResourceStats, RunSummary};
use crate::watermark::WatermarkStore;
use crate::worker;

/// Everything a pull needs, shared by reference across workers.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    fetcher: Fetcher,
    loader: BatchLoader,
    store: WatermarkStore,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        warehouse: Arc<dyn Warehouse>,
        pause: Arc<dyn Pause>,
        cancel: CancelToken,
    ) -> Self {
        let fetcher = Fetcher::new(
            transport,
            pause,
            config.api.base_url.clone(),
            config.api.access_token.clone(),
            cancel.clone(),
        )
        .with_backoff(config.retry.backoff())
        .with_default_retry_after(config.retry.default_retry_after);
        let loader = BatchLoader::new(warehouse, config.batch_size);
        let store = WatermarkStore::open(&config.state_path);
        Self {
            config,
            fetcher,
            loader,
            store,
            cancel,
        }
    }

    /// Pipeline talking to the real HubSpot API.
    pub fn connect(
        config: Config,
        warehouse: Arc<dyn Warehouse>,
        cancel: CancelToken,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let transport =
            ReqwestTransport::new(config.api.timeout).context("Failed to build HTTP client")?;
        Ok(Self::new(
            config,
            Arc::new(transport),
            warehouse,
            Arc::new(SleepPause),
            cancel,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn loader(&self) -> &BatchLoader {
        &self.loader
    }

    pub fn store(&self) -> &WatermarkStore {
        &self.store
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }
}

/// Pull every configured resource in parallel and report the results.
pub fn run(pipeline: &Pipeline, progress: &SharedProgress) -> anyhow::Result<RunSummary> {
    let config = pipeline.config();
    let names: Vec<&str> = config.resources.iter().map(|r| r.name.as_str()).collect();
    log::info!(
        "hubline starting: resources={names:?}, batch_size={}, state={}",
        config.batch_size,
        pipeline.store().path().display()
    );

    let start = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.resources.len().max(1))
        .thread_name(|i| format!("pull-{i}"))
        .build()
        .context("Failed to create thread pool")?;

    let results: Mutex<Vec<ResourceStats>> = Mutex::new(Vec::with_capacity(names.len()));
    pool.scope(|s| {
        for resource in &config.resources {
            let results = &results;
            s.spawn(move |_| {
                let pb = progress.resource_line(&resource.name);
                pb.set_message("starting...");
                let stats = worker::pull_resource(pipeline, resource, &pb);
                pb.finish_and_clear();
                results
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(stats);
            });
        }
    });

    let resources = results.into_inner().unwrap_or_else(|e| e.into_inner());
    let summary = RunSummary::from_resources(resources, start.elapsed());
    summary.report(progress);

    if summary.cancelled() {
        log::warn!("Run cancelled, state kept at the last loaded page");
    } else if summary.failed() > 0 {
        log::error!("{} of {} resources failed", summary.failed(), summary.resources.len());
    } else {
        log::info!("hubline completed successfully");
    }
    Ok(summary)
}
