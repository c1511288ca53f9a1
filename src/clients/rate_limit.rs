use crate::clients::catalog::CatalogError;
use crate::domain::MetadataProvider;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode, header::RETRY_AFTER};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const RATE_LIMITED_BACKOFF_SECS: u64 = 20;
const SERVER_ERROR_BACKOFF_SECS: u64 = 5;
const MAX_JITTER_MS: u64 = 1000;

/// Per-catalog request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub requests_per_minute: u32,
    pub burst: u32,
    pub min_interval: Duration,
    pub max_retries: u32,
}

/// Token bucket plus a minimum gap between consecutive requests, owned by one
/// client object.
pub struct Throttle {
    service: MetadataProvider,
    limiter: DefaultDirectRateLimiter,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
    max_retries: u32,
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("service", &self.service)
            .field("min_interval", &self.min_interval)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl Throttle {
    #[must_use]
    pub fn new(service: MetadataProvider, settings: RateLimitSettings) -> Self {
        let per_minute = NonZeroU32::new(settings.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(settings.burst).unwrap_or(NonZeroU32::MIN);

        Self {
            service,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute).allow_burst(burst)),
            min_interval: settings.min_interval,
            last_request: Mutex::new(None),
            max_retries: settings.max_retries.max(1),
        }
    }

    /// Waits until both the bucket and the minimum gap allow another request.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;

        let mut last = self.last_request.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!(service = %self.service, wait_ms = wait_time.as_millis(), "Rate limiting");
                tokio::time::sleep(wait_time).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Sends a request built by `build`, retrying 429 and 5xx responses and
    /// transport failures. Any other response is handed back unchanged.
    pub async fn send<F>(&self, build: F) -> Result<Response, CatalogError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            self.acquire().await;
            let last_attempt = attempt + 1 >= self.max_retries;

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok());

                    let Some(delay) = backoff_delay(status, retry_after, attempt) else {
                        return Ok(response);
                    };

                    if last_attempt {
                        if status == StatusCode::TOO_MANY_REQUESTS {
                            return Err(CatalogError::RateLimited {
                                service: self.service,
                                attempts: attempt + 1,
                            });
                        }
                        let body = response.text().await.unwrap_or_default();
                        return Err(CatalogError::Status {
                            service: self.service,
                            status: status.as_u16(),
                            body,
                        });
                    }

                    warn!(
                        service = %self.service,
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        wait_secs = delay.as_secs(),
                        "Transient catalog failure, retrying"
                    );
                    tokio::time::sleep(delay + jitter()).await;
                }
                Err(e) => {
                    if last_attempt {
                        return Err(CatalogError::Http {
                            service: self.service,
                            source: e,
                        });
                    }
                    let delay = Duration::from_secs(SERVER_ERROR_BACKOFF_SECS * u64::from(attempt + 1));
                    warn!(
                        service = %self.service,
                        error = %e,
                        attempt = attempt + 1,
                        "Catalog request failed, retrying"
                    );
                    tokio::time::sleep(delay + jitter()).await;
                }
            }

            attempt += 1;
        }
    }
}

/// Wait before retrying a response, or `None` when the status is not transient.
///
/// 429 honours `Retry-After` plus one second, else waits `(attempt + 1) * 20s`;
/// 5xx waits `(attempt + 1) * 5s`.
#[must_use]
pub fn backoff_delay(status: StatusCode, retry_after: Option<u64>, attempt: u32) -> Option<Duration> {
    let step = u64::from(attempt) + 1;

    if status == StatusCode::TOO_MANY_REQUESTS {
        let secs = retry_after.map_or(step * RATE_LIMITED_BACKOFF_SECS, |s| s + 1);
        return Some(Duration::from_secs(secs));
    }

    if status.is_server_error() {
        return Some(Duration::from_secs(step * SERVER_ERROR_BACKOFF_SECS));
    }

    None
}

fn jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(0..MAX_JITTER_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_honours_retry_after() {
        assert_eq!(
            backoff_delay(StatusCode::TOO_MANY_REQUESTS, Some(7), 0),
            Some(Duration::from_secs(8))
        );
    }

    #[test]
    fn test_backoff_grows_with_attempts() {
        assert_eq!(
            backoff_delay(StatusCode::TOO_MANY_REQUESTS, None, 1),
            Some(Duration::from_secs(40))
        );
        assert_eq!(
            backoff_delay(StatusCode::BAD_GATEWAY, None, 2),
            Some(Duration::from_secs(15))
        );
    }

    #[test]
    fn test_backoff_ignores_other_statuses() {
        assert_eq!(backoff_delay(StatusCode::OK, None, 0), None);
        assert_eq!(backoff_delay(StatusCode::NOT_FOUND, Some(3), 0), None);
    }

    #[tokio::test]
    async fn test_throttle_enforces_min_gap() {
        let throttle = Throttle::new(
            MetadataProvider::Anilist,
            RateLimitSettings {
                requests_per_minute: 6000,
                burst: 10,
                min_interval: Duration::from_millis(50),
                max_retries: 1,
            },
        );

        let started = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
