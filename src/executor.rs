use crate::traits::FetchError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, instrument};

/// Bounds how many repository fetches are in flight at once and applies the
/// optional per-fetch timeout.
///
/// A timed out fetch is reported as [`FetchError::Timeout`], the same way
/// as any other fetch failure.
#[derive(Debug, Clone)]
pub struct FetchExecutor {
    semaphore: Arc<Semaphore>,
    concurrency_limit: usize,
    fetch_timeout: Option<Duration>,
}

impl FetchExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        let concurrency_limit = concurrency_limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit)),
            concurrency_limit,
            fetch_timeout: None,
        }
    }

    pub fn with_timeout(mut self, fetch_timeout: Option<Duration>) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    #[instrument(skip(self, fetch))]
    pub async fn execute<T, F>(&self, label: &str, fetch: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| FetchError::Unavailable(format!("Semaphore error: {}", e)))?;

        debug!("Fetch started");

        match self.fetch_timeout {
            Some(limit) => timeout(limit, fetch)
                .await
                .map_err(|_| FetchError::Timeout {
                    label: label.to_string(),
                    millis: limit.as_millis() as u64,
                })?,
            None => fetch.await,
        }
    }
}

impl Default for FetchExecutor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CONCURRENCY)
    }
}
