//! Transports that fetch remote documents.
//!
//! The engine only knows the [`Transport`] trait. [`HttpTransport`] is the
//! production implementation (reqwest for `http`/`https`, the filesystem for
//! `file`); [`MemoryTransport`] serves canned documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Url};

use crate::error::FetchError;

/// A fetched body plus its content-type hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl Fetched {
    pub fn new(body: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.map(str::to_string),
        }
    }
}

/// Retrieves the raw body behind an absolute URL.
///
/// Implementations must tolerate any number of concurrent outstanding calls;
/// the engine imposes no ordering between them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Fetched, FetchError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        (**self).get(url).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        (**self).get(url).await
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Allow plaintext `http` roots.
    pub allow_plaintext: bool,
    /// Largest accepted document, in bytes.
    pub max_document_size: usize,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// URL → local file served instead of going to the network.
    pub mirrors: HashMap<String, PathBuf>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            allow_plaintext: true,
            max_document_size: 10 * 1024 * 1024,
            user_agent: concat!("specref/", env!("CARGO_PKG_VERSION")).to_string(),
            mirrors: HashMap::new(),
        }
    }
}

/// Fetches `http`/`https` roots with reqwest and `file` roots from disk.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a new transport.
    pub fn new(config: HttpTransportConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    async fn get_http(&self, url: Url) -> Result<Fetched, FetchError> {
        let display = url.to_string();

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(display.clone())
            } else if e.is_connect() {
                FetchError::ConnectionFailed(e.to_string())
            } else {
                FetchError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: display,
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.config.max_document_size as u64 {
                return Err(FetchError::TooLarge {
                    url: display,
                    limit: self.config.max_document_size,
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(display.clone())
            } else {
                FetchError::Request(format!("failed to read response: {}", e))
            }
        })?;
        self.check_size(&display, body.len())?;

        Ok(Fetched {
            body: body.to_vec(),
            content_type,
        })
    }

    async fn get_file(&self, display: &str, path: &Path) -> Result<Fetched, FetchError> {
        let body = tokio::fs::read(path).await.map_err(|e| FetchError::Io {
            url: display.to_string(),
            message: e.to_string(),
        })?;
        self.check_size(display, body.len())?;
        Ok(Fetched {
            body,
            content_type: None,
        })
    }

    fn check_size(&self, url: &str, len: usize) -> Result<(), FetchError> {
        if len > self.config.max_document_size {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.config.max_document_size,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        if let Some(path) = self.config.mirrors.get(url) {
            tracing::debug!(url = %url, mirror = %path.display(), "Serving document from mirror");
            return self.get_file(url, path).await;
        }

        let parsed = url
            .parse::<Url>()
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;

        match parsed.scheme() {
            "https" => self.get_http(parsed).await,
            "http" if self.config.allow_plaintext => self.get_http(parsed).await,
            "http" => Err(FetchError::PlaintextNotAllowed(url.to_string())),
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
                self.get_file(url, &path).await
            }
            other => Err(FetchError::UnsupportedScheme {
                scheme: other.to_string(),
                url: url.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
enum Canned {
    Body(Fetched),
    Status(u16),
}

/// Serves documents registered up front; anything else is a 404.
///
/// Counts requests per URL so callers can assert fetch de-duplication.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    documents: HashMap<String, Canned>,
    requests: Mutex<HashMap<String, usize>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` as JSON at `url`.
    pub fn with_json(mut self, url: impl Into<String>, document: &serde_json::Value) -> Self {
        let body = document.to_string();
        self.documents.insert(
            url.into(),
            Canned::Body(Fetched::new(body, Some("application/json"))),
        );
        self
    }

    /// Serve a raw body at `url`.
    pub fn with_body(
        mut self,
        url: impl Into<String>,
        body: impl Into<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Self {
        self.documents
            .insert(url.into(), Canned::Body(Fetched::new(body, content_type)));
        self
    }

    /// Answer `url` with a non-success status.
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.documents.insert(url.into(), Canned::Status(status));
        self
    }

    /// Requests made for `url` so far.
    pub fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    /// Requests made for any URL so far.
    pub fn total_requests(&self) -> usize {
        self.requests.lock().values().sum()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        *self.requests.lock().entry(url.to_string()).or_insert(0) += 1;

        // Let other branches of the walk run before the response lands.
        tokio::task::yield_now().await;

        match self.documents.get(url) {
            Some(Canned::Body(fetched)) => Ok(fetched.clone()),
            Some(Canned::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
