//! Data sources for samples and the live snapshot
//!
//! Both inputs are addressed by a location string from the configuration:
//! `http(s)://` locations are fetched with `reqwest`, anything else is read
//! from the local filesystem.

use crate::config::SourcesConfig;
use crate::error::{ChargeError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::status::LiveSnapshot;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Provider of the raw sample document
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn fetch_samples(&self) -> Result<Value>;
}

/// Provider of the live status snapshot
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<LiveSnapshot>;
}

fn is_http(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// JSON document fetched over HTTP
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
    logger: StructuredLogger,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chargeapt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChargeError::network(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            url: url.into(),
            client,
            logger: get_logger("http_source"),
        })
    }

    async fn fetch_json(&self) -> Result<Value> {
        self.logger.trace(&format!("GET {}", self.url));
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            self.logger
                .warn(&format!("{} answered {}", self.url, resp.status()));
            return Err(ChargeError::upstream(format!(
                "{} answered {}",
                self.url,
                resp.status()
            )));
        }
        Ok(resp.json::<Value>().await?)
    }
}

#[async_trait]
impl SampleSource for HttpSource {
    async fn fetch_samples(&self) -> Result<Value> {
        self.fetch_json().await
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn fetch_snapshot(&self) -> Result<LiveSnapshot> {
        let doc = self.fetch_json().await?;
        Ok(serde_json::from_value(doc)?)
    }
}

/// JSON document read from disk on every fetch
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            ChargeError::io(format!("Failed to read {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl SampleSource for FileSource {
    async fn fetch_samples(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.read().await?)?)
    }
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn fetch_snapshot(&self) -> Result<LiveSnapshot> {
        Ok(serde_json::from_slice(&self.read().await?)?)
    }
}

/// Sample source for a configured location
pub fn sample_source(config: &SourcesConfig) -> Result<Arc<dyn SampleSource>> {
    if is_http(&config.samples) {
        Ok(Arc::new(HttpSource::new(
            config.samples.clone(),
            config.request_timeout(),
        )?))
    } else {
        Ok(Arc::new(FileSource::new(&config.samples)))
    }
}

/// Snapshot source for a configured location
pub fn snapshot_source(config: &SourcesConfig) -> Result<Arc<dyn SnapshotSource>> {
    if is_http(&config.snapshot) {
        Ok(Arc::new(HttpSource::new(
            config.snapshot.clone(),
            config.request_timeout(),
        )?))
    } else {
        Ok(Arc::new(FileSource::new(&config.snapshot)))
    }
}
