//! Hubline HubSpot - incremental CRM pulls into a warehouse
//!
//! This crate provides the HubSpot client, the persisted pull state, and the
//! per-resource orchestration that loads pages through a [`Warehouse`].
//!
//! [`Warehouse`]: hubline_warehouse::Warehouse

pub mod api;
pub mod config;
pub mod loader;
pub mod record;
pub mod resource;
pub mod runner;
pub mod stats;
pub mod transform;
pub mod watermark;
pub mod worker;

// Re-exports
pub use api::{FetchError, Fetcher, RawResponse, ReqwestTransport, Transport};
pub use config::{ApiConfig, Config, RetryConfig};
pub use loader::{BatchLoader, LoadReport};
pub use record::{Page, RemoteRecord};
pub use resource::Resource;
pub use runner::{Pipeline, run};
pub use stats::{Outcome, ResourceStats, RunSummary};
pub use watermark::{PullState, StateMap, WatermarkStore};
pub use worker::{PullError, PullPhase, pull_resource};
