//! Where key-set documents come from.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::KeySetDocument;
use crate::error::AuthError;

/// Produces the current key-set document.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetches the document.
    async fn fetch(&self) -> Result<KeySetDocument, AuthError>;
}

/// Fetches the key set over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    url: String,
    http: reqwest::Client,
}

impl HttpKeySource {
    /// Creates a source for `url`, bounding each fetch by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::KeyFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// The key set location.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<KeySetDocument, AuthError> {
        debug!(url = %self.url, "Fetching signing key set");

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::KeyFetch(format!(
                "key set endpoint returned status {status}"
            )));
        }

        response
            .json::<KeySetDocument>()
            .await
            .map_err(|e| AuthError::KeyFetch(format!("invalid key set document: {e}")))
    }
}

/// Serves a key set held in memory.
///
/// Useful for tests and for deployments that pin keys. Counts fetches so
/// callers can observe refresh behaviour.
#[derive(Debug, Default)]
pub struct InMemoryKeySource {
    document: Mutex<Option<KeySetDocument>>,
    fetches: AtomicUsize,
}

impl InMemoryKeySource {
    /// Creates a source serving `document`.
    pub fn new(document: KeySetDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Parses a JSON key-set document.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let document = serde_json::from_str(json)
            .map_err(|e| AuthError::KeyFetch(format!("invalid key set document: {e}")))?;
        Ok(Self::new(document))
    }

    /// Replaces the served document.
    pub fn replace(&self, document: KeySetDocument) {
        *self.document.lock() = Some(document);
    }

    /// Makes subsequent fetches fail until [`replace`](Self::replace) is called.
    pub fn fail(&self) {
        *self.document.lock() = None;
    }

    /// Number of fetches served or attempted so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for InMemoryKeySource {
    async fn fetch(&self) -> Result<KeySetDocument, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.document
            .lock()
            .clone()
            .ok_or_else(|| AuthError::KeyFetch("key source unavailable".to_string()))
    }
}
