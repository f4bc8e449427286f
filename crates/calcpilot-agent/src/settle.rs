//! Bounded waits. Nothing in the core sleeps or blocks without a limit.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Run a backend call with a deadline. Expiry becomes [`Error::Timeout`].
pub async fn bounded<T, F>(what: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "{} did not complete within {}ms",
            what,
            limit.as_millis()
        ))),
    }
}

/// Poll `probe` until two consecutive readings agree.
///
/// Always waits at least `min` first. Gives up after `limit` and returns the
/// last reading; an unsettled window is still usable, just less trustworthy.
pub async fn until_stable<T, F, Fut>(
    min: Duration,
    poll: Duration,
    limit: Duration,
    mut probe: F,
) -> Result<T>
where
    T: PartialEq + std::fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    sleep(min).await;

    let mut last = probe().await?;
    loop {
        if start.elapsed() >= limit {
            warn!("still moving after {}ms: {:?}", limit.as_millis(), last);
            return Ok(last);
        }
        sleep(poll).await;
        let next = probe().await?;
        if next == last {
            debug!("settled after {}ms", start.elapsed().as_millis());
            return Ok(next);
        }
        last = next;
    }
}

/// Poll `probe` until it yields `Some`, or time out.
pub async fn until_some<T, F, Fut>(what: &str, poll: Duration, limit: Duration, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    loop {
        if let Some(v) = probe().await? {
            return Ok(v);
        }
        if start.elapsed() >= limit {
            return Err(Error::Timeout(format!(
                "{} not seen within {}ms",
                what,
                limit.as_millis()
            )));
        }
        sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn bounded_times_out() {
        let err = bounded("slow call", Duration::from_millis(10), async {
            sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(ref m) if m.contains("slow call")));
    }

    #[tokio::test]
    async fn bounded_passes_result_through() {
        let v = bounded("fast", Duration::from_secs(1), async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
        let err = bounded::<(), _>("fails", Duration::from_secs(1), async {
            Err(Error::Backend("nope".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn stable_after_movement_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        // Moves for three readings, then stays put.
        let pos = until_stable(
            Duration::from_millis(100),
            Duration::from_millis(10),
            Duration::from_secs(2),
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst).min(3) as i32;
                async move { Ok((n * 10, 0)) }
            },
        )
        .await
        .unwrap();
        assert_eq!(pos, (30, 0));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn stable_gives_up_with_last_reading() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let pos = until_stable(
            Duration::ZERO,
            Duration::from_millis(10),
            Duration::from_millis(50),
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst) as i32;
                async move { Ok(n) }
            },
        )
        .await
        .unwrap();
        assert!(pos >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn until_some_waits_then_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let v = until_some("window", Duration::from_millis(10), Duration::from_secs(1), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move { Ok((n >= 2).then_some("w1")) }
        })
        .await
        .unwrap();
        assert_eq!(v, "w1");

        let err = until_some::<(), _, _>("window", Duration::from_millis(10), Duration::from_millis(30), || async {
            Ok(None)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
