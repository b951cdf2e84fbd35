//! Reference string classification.
//!
//! Splits a `$ref` string into the document it names (the root) and the
//! pointer inside that document (the location). Classification never fails:
//! a malformed string still yields a descriptor, which the engine reports as
//! unresolved when it tries to use it.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::pointer;

/// The `{root, location}` pair a reference string points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    /// Absolute URL of the target document, or empty for the current document.
    pub root: String,
    /// Pointer path inside the target document, as written after the `#`.
    pub location: String,
}

impl ReferenceDescriptor {
    pub fn new(root: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            location: location.into(),
        }
    }

    /// Decoded pointer segments of the location.
    pub fn segments(&self) -> Vec<String> {
        pointer::segments(&self.location)
    }

    /// True when the root is an absolute URL a transport can fetch.
    pub fn is_absolute(&self) -> bool {
        Url::parse(&self.root).is_ok()
    }

    /// `root#location`, the form used to identify an import.
    pub fn to_absolute(&self) -> String {
        format!("{}#{}", self.root, self.location)
    }

    /// Name under which this target is stored when imported as a model.
    ///
    /// The last location segment, or the file stem of the root for
    /// whole-document references.
    pub fn model_name(&self) -> String {
        if let Some(last) = self.segments().into_iter().rev().find(|s| !s.is_empty()) {
            return last;
        }

        let path = Url::parse(&self.root)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| self.root.clone());
        let file = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default();
        let stem = file.split('.').next().unwrap_or_default();
        let stem = percent_decode_str(stem).decode_utf8_lossy();

        if stem.is_empty() {
            "Model".to_string()
        } else {
            stem.into_owned()
        }
    }
}

/// Classify a reference string relative to the root of the document it appears in.
pub fn classify(reference: &str, current_root: &str) -> ReferenceDescriptor {
    if let Some(location) = reference.strip_prefix('#') {
        return ReferenceDescriptor::new(current_root, location);
    }

    match reference.split_once('#') {
        Some((document, location)) => {
            ReferenceDescriptor::new(resolve_root(document, current_root), location)
        }
        None => ReferenceDescriptor::new(resolve_root(reference, current_root), ""),
    }
}

/// Resolve a document reference against the current root.
///
/// Absolute URLs pass through normalized. Relative ones (`models.yaml`,
/// `../common/x.json`, `/v2/petstore.json`) are joined onto `current_root`.
/// Without a usable base the raw string is kept.
pub fn resolve_root(document: &str, current_root: &str) -> String {
    if let Ok(url) = Url::parse(document) {
        return without_fragment(url);
    }

    match Url::parse(current_root) {
        Ok(base) => base
            .join(document)
            .map(without_fragment)
            .unwrap_or_else(|_| document.to_string()),
        Err(_) => document.to_string(),
    }
}

/// Normalize a caller-supplied root: drop any fragment, canonicalize URLs.
pub fn normalize_root(root: &str) -> String {
    let document = root.split('#').next().unwrap_or_default();
    match Url::parse(document) {
        Ok(url) => without_fragment(url),
        Err(_) => document.to_string(),
    }
}

fn without_fragment(mut url: Url) -> String {
    url.set_fragment(None);
    url.to_string()
}
