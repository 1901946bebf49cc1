use std::{future::Future, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::common::{
    constants::{MAX_TX_RETRIES, TX_RETRY_BACKOFF},
    logger::Logger,
    utils::sleep_or_cancel,
};

/// Bounded retry around a fallible network action.
///
/// The runner does not deduplicate: the action itself must be safe to repeat
/// (e.g. resubmitting identical signed transaction bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: MAX_TX_RETRIES,
            backoff: Duration::from_secs(TX_RETRY_BACKOFF),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            backoff,
        }
    }

    /// Runs `action` until it succeeds or `max_attempts` is used up, sleeping
    /// `backoff` between attempts. Returns `None` on exhaustion or cancellation.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        logger: &Logger,
        mut action: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 1..=self.max_attempts {
            match action().await {
                Ok(value) => {
                    logger.success(format!(
                        "[{}] succeeded (attempt {}/{})",
                        label, attempt, self.max_attempts
                    ));
                    return Some(value);
                }
                Err(e) => {
                    logger.error(format!(
                        "[{}] failed (attempt {}/{}): {}",
                        label, attempt, self.max_attempts, e
                    ));
                }
            }
            if attempt < self.max_attempts && !sleep_or_cancel(cancel, self.backoff).await {
                logger.warn(format!("[{}] cancelled during backoff", label));
                return None;
            }
        }
        logger.error(format!("[{}] max retries reached", label));
        None
    }
}
