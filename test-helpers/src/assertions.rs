//! Assertion helpers that poll for a condition rather than checking it once

use std::time::Duration;

use eyre::{Result, eyre};
use tokio::time::{Instant, sleep};

/// The interval at which conditions are re-checked
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Wait until the given condition holds, failing after `timeout`
pub async fn wait_until<F: FnMut() -> bool>(
    timeout: Duration,
    mut condition: F,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() >= deadline {
            return Err(eyre!("condition not met within {timeout:?}"));
        }

        sleep(POLL_INTERVAL).await;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::wait_until;

    /// Tests that waiting succeeds once a condition flips
    #[tokio::test]
    async fn test_wait_until_condition_met() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter_clone.store(1, Ordering::SeqCst);
        });

        let res =
            wait_until(Duration::from_secs(1), || counter.load(Ordering::SeqCst) == 1).await;
        assert!(res.is_ok());
    }

    /// Tests that waiting times out on a condition that never holds
    #[tokio::test]
    async fn test_wait_until_times_out() {
        let res = wait_until(Duration::from_millis(20), || false).await;
        assert!(res.is_err());
    }
}
