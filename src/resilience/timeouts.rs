//! Timeout enforcement.
//!
//! The caller's future is dropped when the deadline passes, which cancels it:
//! an in-flight HTTP request is aborted rather than left running.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

/// Run `call` with a deadline. Expiry is reported as a network-class error.
pub async fn with_timeout<T, F>(deadline: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::timeout(deadline)),
    }
}
