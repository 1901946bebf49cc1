use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless `cancel` fires first.
/// Returns `false` when cancelled.
pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn completes_full_sleep_when_not_cancelled() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        assert!(sleep_or_cancel(&cancel, Duration::from_secs(300)).await);
        assert_eq!(start.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_early_on_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let start = Instant::now();
        assert!(!sleep_or_cancel(&cancel, Duration::from_secs(300)).await);
        assert!(start.elapsed() < Duration::from_secs(300));
    }
}
