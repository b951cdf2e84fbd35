//! Body deserialization for fetched documents.
//!
//! Swagger/OpenAPI documents travel as JSON or YAML, and servers are sloppy
//! about content types, so both formats are always tried.

use serde_json::Value;

use crate::error::FetchError;

/// Serialization hint derived from a content type or a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Guess the format from a content type, falling back to the URL's extension.
    pub fn detect(content_type: Option<&str>, url: &str) -> Self {
        if let Some(content_type) = content_type {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if essence.ends_with("json") {
                return Self::Json;
            }
            if essence.contains("yaml") || essence.contains("yml") {
                return Self::Yaml;
            }
        }

        let path = url.split(['#', '?']).next().unwrap_or_default().to_ascii_lowercase();
        if path.ends_with(".json") {
            Self::Json
        } else {
            Self::Yaml
        }
    }
}

/// Deserialize a fetched body into a document.
///
/// Tries the detected format first and the other one second. An empty or
/// `null` document is rejected: there is nothing a reference could point at.
pub fn parse_document(
    body: &[u8],
    content_type: Option<&str>,
    url: &str,
) -> Result<Value, FetchError> {
    let text = std::str::from_utf8(body).map_err(|e| FetchError::Deserialize {
        url: url.to_string(),
        message: format!("body is not UTF-8: {}", e),
    })?;

    if text.trim().is_empty() {
        return Err(FetchError::Deserialize {
            url: url.to_string(),
            message: "empty document".to_string(),
        });
    }

    let parsed = match DocumentFormat::detect(content_type, url) {
        DocumentFormat::Json => parse_json(text).or_else(|json_err| {
            parse_yaml(text).map_err(|_| json_err)
        }),
        DocumentFormat::Yaml => parse_yaml(text).or_else(|yaml_err| {
            parse_json(text).map_err(|_| yaml_err)
        }),
    };

    match parsed {
        Ok(Value::Null) => Err(FetchError::Deserialize {
            url: url.to_string(),
            message: "document is null".to_string(),
        }),
        Ok(document) => Ok(document),
        Err(message) => Err(FetchError::Deserialize {
            url: url.to_string(),
            message,
        }),
    }
}

fn parse_json(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

fn parse_yaml(text: &str) -> Result<Value, String> {
    serde_yaml::from_str(text).map_err(|e| e.to_string())
}
