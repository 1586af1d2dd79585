//! Startup liveness probing.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pagewise_core::{ExtractError, Extraction, ExtractionRequest, TransportError};

pub const HEALTH_CHECK_HTML: &str = "<html><body>health check</body></html>";
pub const HEALTH_CHECK_URL: &str = "http://health.check/local";

/// Retries a probe until it answers or a deadline passes.
///
/// Any well-formed reply counts as healthy, `NoArticle` included; the probe
/// document is not expected to contain an article.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    /// Upper bound on a single probe.
    pub attempt_timeout: Duration,
    /// Pause between a failed probe and the next one.
    pub retry_interval: Duration,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_millis(100),
            retry_interval: Duration::from_millis(200),
        }
    }
}

impl HealthChecker {
    /// The synthetic document every probe sends.
    pub fn probe_request() -> ExtractionRequest {
        ExtractionRequest::new(HEALTH_CHECK_HTML, HEALTH_CHECK_URL)
    }

    /// Run `probe` until it succeeds, `deadline` elapses or `cancel` fires.
    ///
    /// `probe` receives the timeout it should apply to its own request; the
    /// checker enforces the same bound around it. Returns the number of
    /// attempts made, or `HealthCheck` wrapping the last probe failure.
    pub async fn wait_until_healthy<F, Fut>(
        &self,
        deadline: Duration,
        cancel: &CancellationToken,
        mut probe: F,
    ) -> Result<u32, ExtractError>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<Extraction, ExtractError>>,
    {
        let started = Instant::now();
        let deadline_at = started + deadline;
        let mut attempts = 0u32;

        let last = loop {
            attempts += 1;
            let budget = self
                .attempt_timeout
                .min(deadline_at.saturating_duration_since(Instant::now()));

            let outcome: Result<Extraction, ExtractError> = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TransportError::Cancelled.into()),
                result = tokio::time::timeout(budget, probe(budget)) => {
                    result.unwrap_or_else(|_| Err(TransportError::TimedOut(budget).into()))
                }
            };

            let err = match outcome {
                Ok(_) => {
                    tracing::debug!(
                        attempts,
                        elapsed = ?started.elapsed(),
                        "health check passed"
                    );
                    return Ok(attempts);
                }
                Err(e) => e,
            };
            tracing::trace!(attempt = attempts, error = %err, "health probe failed");

            if cancel.is_cancelled() || Instant::now() >= deadline_at {
                break err;
            }
            let wake = (Instant::now() + self.retry_interval).min(deadline_at);
            tokio::select! {
                _ = cancel.cancelled() => break err,
                _ = tokio::time::sleep_until(wake) => {}
            }
            if Instant::now() >= deadline_at {
                break err;
            }
        };

        Err(ExtractError::HealthCheck {
            elapsed: started.elapsed(),
            attempts,
            last: Box::new(last),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn refused() -> ExtractError {
        TransportError::Connect {
            path: "/tmp/w.sock".into(),
            message: "connection refused".into(),
        }
        .into()
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let checker = HealthChecker::default();
        let started = Instant::now();

        let attempts = checker
            .wait_until_healthy(Duration::from_secs(5), &CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(refused())
                    } else {
                        Ok(Extraction::NoArticle)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_wraps_last_error() {
        let checker = HealthChecker::default();
        let err = checker
            .wait_until_healthy(Duration::from_secs(1), &CancellationToken::new(), |_| async {
                Err::<Extraction, _>(refused())
            })
            .await
            .unwrap_err();

        match err {
            ExtractError::HealthCheck {
                elapsed,
                attempts,
                last,
            } => {
                assert_eq!(attempts, 5);
                assert_eq!(elapsed, Duration::from_secs(1));
                assert!(matches!(
                    *last,
                    ExtractError::Transport(TransportError::Connect { .. })
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_is_bounded_per_attempt() {
        let checker = HealthChecker::default();
        let err = checker
            .wait_until_healthy(Duration::from_millis(250), &CancellationToken::new(), |_| {
                std::future::pending::<Result<Extraction, ExtractError>>()
            })
            .await
            .unwrap_err();

        // 0..100 probe, 100..250 sleep (capped at the deadline).
        let ExtractError::HealthCheck { attempts, last, .. } = err else {
            panic!("expected health check error");
        };
        assert_eq!(attempts, 1);
        assert!(last.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_retrying() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = HealthChecker::default()
            .wait_until_healthy(Duration::from_secs(30), &cancel, |_| async {
                Ok::<_, ExtractError>(Extraction::NoArticle)
            })
            .await
            .unwrap_err();

        let ExtractError::HealthCheck { attempts, last, .. } = err else {
            panic!("expected health check error");
        };
        assert_eq!(attempts, 1);
        assert!(last.is_cancelled());
    }

    #[test]
    fn probe_request_is_fixed() {
        let request = HealthChecker::probe_request();
        assert_eq!(request.document_url, "http://health.check/local");
        assert_eq!(&request.html_body[..], HEALTH_CHECK_HTML.as_bytes());
    }
}
