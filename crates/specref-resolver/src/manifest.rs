//! Resolver manifest (`specref.yaml`) parser.
//!
//! The manifest configures the HTTP transport and declares local mirrors for
//! remote documents, e.g. to resolve a spec offline in CI.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::reference::normalize_root;
use crate::transport::HttpTransportConfig;

/// A resolver manifest (`specref.yaml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverManifest {
    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpSettings,

    /// Mirrors: remote URL -> local file (relative to the manifest or absolute).
    #[serde(default)]
    pub mirrors: HashMap<String, String>,
}

/// `http:` section. Unset fields keep the transport defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub allow_plaintext: Option<bool>,
    pub max_document_size: Option<usize>,
}

impl ResolverManifest {
    /// Load a manifest from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse a manifest from YAML content.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        serde_yaml::from_str(content).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Mirror URLs mapped to local paths, relative paths joined onto `base_path`.
    ///
    /// URLs are normalized the way document roots are, so `http://host`
    /// matches the root `http://host/`.
    pub fn mirror_paths(&self, base_path: &Path) -> HashMap<String, PathBuf> {
        self.mirrors
            .iter()
            .map(|(url, path)| {
                let path = Path::new(path);
                let resolved = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    base_path.join(path)
                };
                (normalize_root(url), resolved)
            })
            .collect()
    }

    /// Build the transport configuration described by this manifest.
    ///
    /// The `base_path` is used to resolve relative mirror paths.
    pub fn transport_config(&self, base_path: &Path) -> HttpTransportConfig {
        let defaults = HttpTransportConfig::default();
        HttpTransportConfig {
            connect_timeout: self
                .http
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            timeout: self
                .http
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            allow_plaintext: self.http.allow_plaintext.unwrap_or(defaults.allow_plaintext),
            max_document_size: self
                .http
                .max_document_size
                .unwrap_or(defaults.max_document_size),
            user_agent: defaults.user_agent,
            mirrors: self.mirror_paths(base_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn parse_empty_manifest() {
        let manifest = ResolverManifest::parse("{}", Path::new("specref.yaml")).unwrap();
        assert_eq!(manifest, ResolverManifest::default());

        let config = manifest.transport_config(Path::new("."));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.allow_plaintext);
    }

    #[test]
    fn parse_full_manifest() {
        let yaml = r#"
http:
  timeout_secs: 5
  connect_timeout_secs: 2
  allow_plaintext: false
  max_document_size: 1024
mirrors:
  "http://example.com/petstore.json": ./vendor/petstore.json
  "http://example.com/models.yaml": /opt/specs/models.yaml
"#;
        let manifest = ResolverManifest::parse(yaml, Path::new("specref.yaml")).unwrap();
        let config = manifest.transport_config(Path::new("/work"));

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(!config.allow_plaintext);
        assert_eq!(config.max_document_size, 1024);
        assert_eq!(
            config.mirrors["http://example.com/petstore.json"],
            PathBuf::from("/work/./vendor/petstore.json")
        );
        assert_eq!(
            config.mirrors["http://example.com/models.yaml"],
            PathBuf::from("/opt/specs/models.yaml")
        );
    }

    #[test]
    fn mirror_urls_match_normalized_roots() {
        let yaml = r#"
mirrors:
  "http://example.com": ./index.json
  "http://example.com/models.yaml#/definitions": ./models.yaml
"#;
        let manifest = ResolverManifest::parse(yaml, Path::new("specref.yaml")).unwrap();
        let mirrors = manifest.mirror_paths(Path::new("/work"));

        assert_eq!(mirrors["http://example.com/"], PathBuf::from("/work/index.json"));
        assert_eq!(
            mirrors["http://example.com/models.yaml"],
            PathBuf::from("/work/models.yaml")
        );
        assert!(!mirrors.contains_key("http://example.com"));
    }

    #[test]
    fn parse_invalid_manifest() {
        let err = ResolverManifest::parse("http: [", Path::new("bad.yaml")).unwrap_err();
        match err {
            ManifestError::Parse { path, .. } => assert_eq!(path, "bad.yaml"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("specref.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "http:\n  timeout_secs: 12").unwrap();

        let manifest = ResolverManifest::load(&path).unwrap();
        assert_eq!(manifest.http.timeout_secs, Some(12));
    }

    #[test]
    fn load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ResolverManifest::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ManifestError::Io(_)));
    }
}
