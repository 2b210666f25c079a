//! Hubline Core - Common infrastructure for CRM extract-load pipelines
//!
//! This crate provides reusable components for talking to remote HTTP APIs,
//! retrying with backoff, cooperative cancellation, and console reporting.

pub mod cancel;
pub mod fs;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;

// Re-exports for convenience
pub use cancel::{CancelToken, Cancelled, install_signal_handlers};
pub use fs::{remove_stale_tmp, tmp_path_for, write_atomic};
pub use http::{DEFAULT_REQUEST_TIMEOUT, HttpError, SHARED_RUNTIME, build_client};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{Backoff, Pause, SleepPause};
