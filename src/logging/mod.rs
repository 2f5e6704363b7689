//! Logging and observability
//!
//! Structured logging through `tracing`, with a console layer and an
//! optional rotating JSON file layer.
//!
//! # Example
//!
//! ```no_run
//! use photobundle::logging::init_logging;
//! use photobundle::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the start of an export job
///
/// # Example
///
/// ```no_run
/// use photobundle::log_export_start;
///
/// let job_id = uuid::Uuid::new_v4();
/// log_export_start!(job_id, 12, "windowed");
/// ```
#[macro_export]
macro_rules! log_export_start {
    ($job_id:expr, $requested:expr, $strategy:expr) => {
        tracing::info!(
            job_id = %$job_id,
            requested = $requested,
            strategy = %$strategy,
            "Starting export"
        );
    };
}

/// Log the completion of an export job
///
/// # Example
///
/// ```no_run
/// use photobundle::log_export_complete;
/// use std::time::Duration;
///
/// let job_id = uuid::Uuid::new_v4();
/// log_export_complete!(job_id, 10, 2, Duration::from_secs(3));
/// ```
#[macro_export]
macro_rules! log_export_complete {
    ($job_id:expr, $succeeded:expr, $failed:expr, $duration:expr) => {
        tracing::info!(
            job_id = %$job_id,
            succeeded = $succeeded,
            failed = $failed,
            duration_ms = $duration.as_millis() as u64,
            "Export completed"
        );
    };
}

/// Log a per-photo fetch failure
///
/// These never fail the job, so they are logged at WARN.
///
/// # Example
///
/// ```no_run
/// use photobundle::log_fetch_failure;
///
/// log_fetch_failure!("42", "1718-IMG_0001.jpg", "timeout", "read timed out");
/// ```
#[macro_export]
macro_rules! log_fetch_failure {
    ($photo_id:expr, $storage_key:expr, $reason:expr, $message:expr) => {
        tracing::warn!(
            photo_id = %$photo_id,
            storage_key = %$storage_key,
            reason = %$reason,
            detail = %$message,
            "Photo fetch failed, skipping"
        );
    };
}
