//! Per-resolution document cache.
//!
//! Maps a root URL to its fetched document so that any number of references
//! into the same remote document cost one transport request. Callers that ask
//! for a root whose request is still in flight are parked as waiters and
//! notified in arrival order once the request settles.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use specref_telemetry::{log_document_fetched, log_fetch_failed};
use tokio::sync::oneshot;

use crate::error::FetchError;
use crate::format::parse_document;
use crate::transport::Transport;

type FetchResult = Result<Arc<Value>, FetchError>;

enum CacheEntry {
    /// Request in flight; waiters are flushed front to back.
    Pending(VecDeque<oneshot::Sender<FetchResult>>),
    Fulfilled(Arc<Value>),
    Failed(FetchError),
}

/// Fetch layer scoped to a single resolution call.
///
/// Not `Sync`: it is shared by reference between the futures of one
/// resolution, all polled on the same task.
pub struct DocumentCache<'t, T: ?Sized> {
    transport: &'t T,
    resident_root: String,
    resident: Arc<Value>,
    entries: RefCell<HashMap<String, CacheEntry>>,
    requests: Cell<usize>,
}

impl<'t, T: Transport + ?Sized> DocumentCache<'t, T> {
    /// Create a cache whose resident document is served for `resident_root`
    /// (and for the empty root) without touching the transport.
    pub fn new(transport: &'t T, resident_root: impl Into<String>, resident: Arc<Value>) -> Self {
        Self {
            transport,
            resident_root: resident_root.into(),
            resident,
            entries: RefCell::new(HashMap::new()),
            requests: Cell::new(0),
        }
    }

    /// Transport requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }

    /// True when `root` names the resident document.
    pub fn is_resident(&self, root: &str) -> bool {
        root.is_empty() || root == self.resident_root
    }

    /// Materialize the document at `root`.
    pub async fn fetch(&self, root: &str) -> FetchResult {
        if self.is_resident(root) {
            return Ok(Arc::clone(&self.resident));
        }

        let waiter = {
            let mut entries = self.entries.borrow_mut();
            match entries.entry(root.to_string()) {
                Entry::Occupied(mut occupied) => match occupied.get_mut() {
                    CacheEntry::Fulfilled(document) => return Ok(Arc::clone(document)),
                    CacheEntry::Failed(error) => return Err(error.clone()),
                    CacheEntry::Pending(waiters) => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push_back(tx);
                        Some(rx)
                    }
                },
                Entry::Vacant(vacant) => {
                    vacant.insert(CacheEntry::Pending(VecDeque::new()));
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or_else(|_| {
                Err(FetchError::Request(format!(
                    "request for {} was abandoned",
                    root
                )))
            });
        }

        self.requests.set(self.requests.get() + 1);
        let result = self.load(root).await;

        let waiters = {
            let settled = match &result {
                Ok(document) => CacheEntry::Fulfilled(Arc::clone(document)),
                Err(error) => CacheEntry::Failed(error.clone()),
            };
            match self.entries.borrow_mut().insert(root.to_string(), settled) {
                Some(CacheEntry::Pending(waiters)) => waiters,
                _ => VecDeque::new(),
            }
        };

        for waiter in waiters {
            // A dropped receiver only means that branch stopped caring.
            let _ = waiter.send(result.clone());
        }

        result
    }

    async fn load(&self, root: &str) -> FetchResult {
        let outcome = match self.transport.get(root).await {
            Ok(fetched) => parse_document(&fetched.body, fetched.content_type.as_deref(), root),
            Err(error) => Err(error),
        };

        match outcome {
            Ok(document) => {
                log_document_fetched!(root = %root, "Fetched remote document");
                Ok(Arc::new(document))
            }
            Err(error) => {
                log_fetch_failed!(root = %root, error = %error, "Failed to fetch remote document");
                Err(error)
            }
        }
    }
}
