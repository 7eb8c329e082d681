//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. The ledger itself never
//! retries a backend call; backoff is only used while establishing connectivity at
//! startup.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::storage::BackendError;

/// Backoff for backend connectivity checks at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

/// Determines if a backend error may go away on its own.
///
/// Retryable:
/// - transport failures (connect errors, timeouts)
/// - 429 and 5xx statuses
/// - `Unavailable`
///
/// Everything else (auth failures, bad paths, malformed payloads) will not
/// succeed on retry.
pub fn is_transient(err: &BackendError) -> bool {
    match err {
        BackendError::Http(e) => e.is_timeout() || e.is_connect(),
        BackendError::Status { status, .. } => *status == 429 || *status >= 500,
        BackendError::Unavailable(_) => true,
        _ => false,
    }
}
