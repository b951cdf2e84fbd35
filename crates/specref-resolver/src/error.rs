use thiserror::Error;

/// Errors produced while materializing a remote document.
///
/// Cloneable so one failed fetch can be handed to every reference waiting
/// on the same root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The root is not an absolute URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// No transport for this URL scheme.
    #[error("unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { scheme: String, url: String },

    /// Plain `http` refused by configuration.
    #[error("plaintext HTTP not allowed: {0}")]
    PlaintextNotAllowed(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-success HTTP status.
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("document {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("I/O error reading {url}: {message}")]
    Io { url: String, message: String },

    /// The body is neither JSON nor YAML, or is empty.
    #[error("cannot deserialize {url}: {message}")]
    Deserialize { url: String, message: String },

    #[error("request failed: {0}")]
    Request(String),
}

/// Why a reference could not be substituted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnresolvedReason {
    /// Malformed reference string (e.g. a relative root with no base to resolve against).
    #[error("malformed reference: {0}")]
    Parse(String),

    /// The target document could not be fetched or deserialized.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The location is absent in an otherwise fetched document.
    #[error("location '{0}' not found")]
    PointerNotFound(String),

    /// The reference is already being resolved further up the chain.
    #[error("reference cycle detected")]
    CycleDetected,

    /// The target refers, directly or transitively, to a reference that
    /// could not be resolved.
    #[error("depends on unresolved reference '{0}'")]
    Dependency(String),

    /// A path item `$ref` with sibling operations points at a non-mapping.
    #[error("path item reference does not point at a mapping")]
    NotMergeable,
}

/// Caller misuse, reported before any asynchronous work starts.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The document root must be a mapping or a sequence.
    #[error("spec root must be a mapping or a sequence, got {0}")]
    NotAContainer(&'static str),
}

/// Errors writing into a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    #[error("cannot write into a scalar")]
    NotAContainer,

    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("'{0}' is not a sequence index")]
    InvalidIndex(String),
}

/// Errors loading a resolver manifest (`specref.yaml`).
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest parse error in {path}: {message}")]
    Parse { path: String, message: String },
}
