use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::Url;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::Settings;
use crate::error::FetchError;

/// Shared HTTP client bounded by a semaphore. Cheap to clone; clones share
/// the client and the permit pool.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    base: Url,
    limiter: Arc<Semaphore>,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()?;
        let base = Url::parse(&settings.base_url)?;
        Ok(Self {
            client,
            base,
            limiter: Arc::new(Semaphore::new(settings.concurrency)),
        })
    }

    /// Resolve a catalog path (or an absolute href) against the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        self.base.join(path).map_err(|e| FetchError::InvalidUrl {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// GET one page and return its body.
    pub async fn fetch(&self, path: &str) -> Result<String, FetchError> {
        let url = self.resolve(path)?;
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| FetchError::Aborted {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let start = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| classify(&url, e))?;
        debug!(
            url = %url,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );
        Ok(body)
    }

    /// Fetch every path concurrently, at most `concurrency` in flight.
    /// Results come back in input order.
    pub async fn fetch_all(&self, paths: &[String]) -> Vec<Result<String, FetchError>> {
        let handles: Vec<_> = paths
            .iter()
            .cloned()
            .map(|path| {
                let fetcher = self.clone();
                tokio::spawn(async move { fetcher.fetch(&path).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (handle, path) in handles.into_iter().zip(paths) {
            let result = match handle.await {
                Ok(r) => r,
                Err(e) => Err(FetchError::Aborted {
                    url: path.clone(),
                    reason: e.to_string(),
                }),
            };
            results.push(result);
        }
        results
    }
}

fn classify(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source: e,
        }
    }
}
