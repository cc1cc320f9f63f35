// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential retry for transient write contention.
//!
//! SQLite reports SQLITE_BUSY when a writer cannot acquire the file
//! lock within the connection busy timeout. Call sites wrap write-side
//! closures in [`retry_on_busy`] with attempt counts of their own
//! choosing — hot paths retry harder than cold paths.

use std::future::Future;
use std::time::Duration;

/// Job save/update call sites.
pub const JOB_WRITE_ATTEMPTS: u32 = 5;
pub const JOB_WRITE_DELAY: Duration = Duration::from_millis(100);

/// Queue message deletion call sites.
pub const QUEUE_DELETE_ATTEMPTS: u32 = 3;
pub const QUEUE_DELETE_DELAY: Duration = Duration::from_millis(200);

/// Child job creation during crawl expansion (hot path).
pub const CHILD_CREATE_ATTEMPTS: u32 = 5;
pub const CHILD_CREATE_DELAY: Duration = Duration::from_millis(100);

/// Errors that can mark themselves as transient store contention.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for crate::StorageError {
    fn is_retryable(&self) -> bool {
        self.is_busy()
    }
}

/// Run `op`, retrying on busy errors with exponential backoff.
///
/// Attempt `n` sleeps `initial_delay * 2^(n-1)` before retrying. Errors
/// that are not busy signals return immediately; the last busy error is
/// returned once `max_attempts` is exhausted.
pub async fn retry_on_busy<T, E, F, Fut>(
    mut op: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = initial_delay * 2u32.saturating_pow(attempt - 1);
                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "store busy, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
