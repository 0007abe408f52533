//! Cancellation-aware sleeping shared by the limiter and the retrier.

use crate::{Error, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest uninterrupted blocking sleep; cancellation is checked in between.
pub(crate) const BLOCKING_SLICE: Duration = Duration::from_millis(50);

pub(crate) async fn sleep(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

pub(crate) fn sleep_blocking(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    let deadline = std::time::Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let now = std::time::Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep((deadline - now).min(BLOCKING_SLICE));
    }
}
