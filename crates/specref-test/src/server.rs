//! DocumentServer: serves spec documents over HTTP for end-to-end tests.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use specref_resolver::{
    parse_document, FetchError, HttpTransport, HttpTransportConfig, Resolution, ResolveError,
    Resolver, Transport,
};

/// Errors from DocumentServer operations.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveError),
}

/// A mock HTTP server hosting documents at fixed paths.
pub struct DocumentServer {
    server: MockServer,
}

impl DocumentServer {
    /// Start a server on a random local port.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URI of the server, e.g. `http://127.0.0.1:41234`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Absolute URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Serve a JSON document at `path`.
    pub async fn serve_json(&self, at: &str, document: &Value) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    /// Serve a YAML document at `path`.
    pub async fn serve_yaml(&self, at: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/yaml"),
            )
            .mount(&self.server)
            .await;
    }

    /// Serve a file from `tests/fixtures` at `path`.
    pub async fn serve_fixture(&self, at: &str, fixture: &str) -> Result<(), TestError> {
        let file = fixtures().join(fixture);
        let body = std::fs::read_to_string(&file)?;
        if file.extension().is_some_and(|ext| ext == "json") {
            let document: Value = serde_json::from_str(&body).map_err(std::io::Error::other)?;
            self.serve_json(at, &document).await;
        } else {
            self.serve_yaml(at, &body).await;
        }
        Ok(())
    }

    /// Answer `path` with a bare status code.
    pub async fn serve_status(&self, at: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of requests received for `path`.
    pub async fn requests_for(&self, at: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == at)
            .count()
    }
}

/// Fetch the document at `url` and resolve it with the given transport configuration.
pub async fn resolve_url(
    url: &str,
    config: HttpTransportConfig,
) -> Result<(Value, Resolution), TestError> {
    let transport = HttpTransport::new(config)?;
    let fetched = transport.get(url).await?;
    let mut document = parse_document(&fetched.body, fetched.content_type.as_deref(), url)?;

    let resolver = Resolver::new(transport);
    let resolution = resolver.resolve(&mut document, Some(url)).await?;
    Ok((document, resolution))
}

/// Absolute path to the shared test fixtures directory.
pub fn fixtures() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/specref-test
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .join("tests/fixtures")
}
