use reqwest::Client;
use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed ({0})")]
    Status(u16),
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("already fetching {0}")]
    InFlight(String),
}

impl FetchError {
    /// HTTP status of the failed response, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status(code) => Some(*code),
            FetchError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Bounded retry with exponential backoff.
///
/// Attempts run strictly one after another; there is no delay after the
/// final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: 2,
        }
    }

    /// A single attempt, no retries
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay after the `attempt`-th failure (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }

    /// Every delay the policy would wait through before giving up
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_after(a)).collect()
    }

    /// Run `op` until it succeeds or attempts run out, returning the last error.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    warn!(attempt, error = %e, "giving up after final attempt");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    debug!(attempt, ?delay, error = %e, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Fetches playlist text over HTTP with a retry policy.
///
/// Only one retry sequence per URL runs at a time; a second concurrent
/// request for the same URL is rejected with [`FetchError::InFlight`].
#[derive(Clone)]
pub struct PlaylistFetcher {
    client: Client,
    policy: RetryPolicy,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl PlaylistFetcher {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, policy)
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        let _guard = InFlightGuard::acquire(&self.in_flight, url)?;
        info!(url, "fetching playlist");

        self.policy
            .run(|attempt| async move {
                debug!(url, attempt, "sending request");
                let response = self.client.get(url).send().await?;
                if !response.status().is_success() {
                    return Err(FetchError::Status(response.status().as_u16()));
                }
                Ok(response.text().await?)
            })
            .await
    }
}

struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, key: &str) -> Result<Self, FetchError> {
        let mut active = set
            .lock()
            .map_err(|_| FetchError::InFlight(key.to_string()))?;
        if !active.insert(key.to_string()) {
            return Err(FetchError::InFlight(key.to_string()));
        }
        Ok(Self {
            set: Arc::clone(set),
            key: key.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.set.lock() {
            active.remove(&self.key);
        }
    }
}
