//! Key/value object storage for the snapshot.
//!
//! Three backends share the [`ObjectStore`] trait:
//! - [`FileStore`]: keys are paths under a root directory
//! - [`HttpStore`]: keys are appended to a base URL, read with GET and written
//!   with PUT (any S3-style bucket that accepts presigned or token-authorized
//!   requests works)
//! - [`MemoryStore`]: in-process map, used by tests
//!
//! [`Store`] wraps them so callers can pick one at runtime.

use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP {0}")]
    Http(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

pub trait ObjectStore {
    /// Read the whole object. A missing object is [`StoreError::NotFound`].
    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send;

    /// Replace the whole object.
    fn put(&self, key: &str, body: Vec<u8>) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Where `key` lives, for logs and reports.
    fn locate(&self, key: &str) -> String;
}

/// Local filesystem backend.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for FileStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.path(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(level = "debug", skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Write beside the target and rename so readers never see half a file.
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "Wrote object");
        Ok(())
    }

    fn locate(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }
}

/// Remote object storage over plain HTTP GET/PUT.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStore {
    pub fn new(client: Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }
}

impl ObjectStore for HttpStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.authorize(self.client.get(self.url(key))).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            status => Err(StoreError::Http(status.as_u16())),
        }
    }

    #[instrument(level = "debug", skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let request = self
            .client
            .put(self.url(key))
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(CACHE_CONTROL, "max-age=300")
            .body(body);
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Http(status.as_u16()));
        }
        debug!(url = %self.url(key), "Uploaded object");
        Ok(())
    }

    fn locate(&self, key: &str) -> String {
        self.url(key)
    }
}

/// In-process backend. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned map still holds whole objects; keep using it.
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), body);
        Ok(())
    }

    fn locate(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

/// Runtime choice of backend.
#[derive(Debug, Clone)]
pub enum Store {
    File(FileStore),
    Http(HttpStore),
    Memory(MemoryStore),
}

impl ObjectStore for Store {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        match self {
            Store::File(s) => s.get(key).await,
            Store::Http(s) => s.get(key).await,
            Store::Memory(s) => s.get(key).await,
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        match self {
            Store::File(s) => s.put(key, body).await,
            Store::Http(s) => s.put(key, body).await,
            Store::Memory(s) => s.put(key, body).await,
        }
    }

    fn locate(&self, key: &str) -> String {
        match self {
            Store::File(s) => s.locate(key),
            Store::Http(s) => s.locate(key),
            Store::Memory(s) => s.locate(key),
        }
    }
}
