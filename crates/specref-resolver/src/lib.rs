//! Resolves `$ref` pointers in Swagger 2.0 / OpenAPI 3.x documents.
//!
//! References are replaced in place by the fragment they point to, whether it
//! lives in the same document or in a remote one. Remote model references
//! are imported into the document's own `definitions` (or
//! `components/schemas`) and linked locally. Resolution is best-effort: it
//! always completes and reports what it could not resolve.
//!
//! ```ignore
//! use specref_resolver::{HttpTransport, HttpTransportConfig, Resolver};
//!
//! let resolver = Resolver::new(HttpTransport::new(HttpTransportConfig::default())?);
//! let resolution = resolver.resolve(&mut spec, Some("https://example.com/petstore.json")).await?;
//! for (reference, entry) in &resolution.unresolved {
//!     eprintln!("{}: {}", reference, entry.reason);
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod format;
pub mod manifest;
pub mod namespace;
pub mod pointer;
pub mod reference;
pub mod registry;
pub mod section;
pub mod transport;

pub use cache::DocumentCache;
pub use engine::{Resolution, ResolveStats, Resolver};
pub use error::{FetchError, ManifestError, PointerError, ResolveError, UnresolvedReason};
pub use format::{parse_document, DocumentFormat};
pub use manifest::{HttpSettings, ResolverManifest};
pub use reference::{classify, normalize_root, ReferenceDescriptor};
pub use registry::{UnresolvedEntry, UnresolvedRegistry};
pub use section::Section;
pub use transport::{Fetched, HttpTransport, HttpTransportConfig, MemoryTransport, Transport};
