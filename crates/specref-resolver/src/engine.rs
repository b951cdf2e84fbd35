//! The resolution engine.
//!
//! A resolution walks the document, classifies every reference marker it
//! finds, materializes the target through the per-call [`DocumentCache`],
//! resolves the fragment recursively against its own root and writes it back
//! over the marker. Sibling subtrees are walked concurrently on one task, so
//! all references into a remote document wait on a single request.

use std::cell::RefCell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use futures_util::future::{join, join_all, LocalBoxFuture};
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use specref_telemetry::{
    log_reference_unresolved, log_resolution_completed, log_resolution_started,
};
use tracing::Instrument;

use crate::cache::DocumentCache;
use crate::error::{ResolveError, UnresolvedReason};
use crate::namespace::merge_imports;
use crate::pointer;
use crate::reference::{classify, normalize_root, ReferenceDescriptor};
use crate::registry::UnresolvedRegistry;
use crate::section::Section;
use crate::transport::Transport;

/// Counters of one resolution call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    /// Transport requests issued.
    pub requests: usize,
    /// References replaced by their target or by a link to an imported model,
    /// counting those inside resolved targets.
    pub substitutions: usize,
    /// Models added to the shared namespace.
    pub imports: usize,
}

/// Outcome of a resolution. The document itself is resolved in place.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub unresolved: UnresolvedRegistry,
    pub stats: ResolveStats,
}

/// Resolves `$ref` pointers in Swagger/OpenAPI documents.
///
/// Every call is independent: the fetch cache and all bookkeeping live only
/// for the duration of that call.
pub struct Resolver<T> {
    transport: T,
}

impl<T: Transport> Resolver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve every reference in `spec` in place.
    ///
    /// `root` is the URL the document was loaded from; references without
    /// their own root resolve against it, and references to it are served
    /// from `spec` itself. Failures to resolve individual references are
    /// reported in [`Resolution::unresolved`]; only a `spec` that is not a
    /// mapping or a sequence is an error.
    pub async fn resolve(
        &self,
        spec: &mut Value,
        root: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        match spec {
            Value::Object(_) | Value::Array(_) => {}
            other => return Err(ResolveError::NotAContainer(kind(other))),
        }

        let root = root.map(normalize_root).unwrap_or_default();
        let span = tracing::info_span!("resolve", root = %root);

        async move {
            log_resolution_started!(root = %root, "Resolving references");

            let snapshot = Arc::new(spec.clone());
            let session = Session::new(&self.transport, &root, snapshot);
            let outcome = session
                .walk(spec, Scope::top(&root, Section::Document))
                .await;

            let Session {
                cache,
                unresolved,
                imports,
                ..
            } = session;
            let unresolved = unresolved.into_inner();
            let imported = merge_imports(spec, imports.into_inner(), &unresolved);

            let stats = ResolveStats {
                requests: cache.requests(),
                substitutions: outcome.substitutions,
                imports: imported,
            };
            log_resolution_completed!(
                root = %root,
                unresolved = unresolved.len(),
                requests = stats.requests,
                substitutions = stats.substitutions,
                imports = stats.imports,
                "Resolution completed"
            );

            Ok(Resolution { unresolved, stats })
        }
        .instrument(span)
        .await
    }

    /// Resolve `spec` and hand the result to `on_complete`, exactly once.
    pub async fn resolve_with<F>(
        &self,
        mut spec: Value,
        root: Option<&str>,
        on_complete: F,
    ) -> Result<(), ResolveError>
    where
        F: FnOnce(Value, UnresolvedRegistry),
    {
        let resolution = self.resolve(&mut spec, root).await?;
        on_complete(spec, resolution.unresolved);
        Ok(())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// The chain of references being expanded above a node.
///
/// A persistent list: concurrent branches share their common prefix and
/// each extends its own tail.
#[derive(Clone, Default)]
struct VisitedSet(Option<Rc<Visited>>);

struct Visited {
    descriptor: ReferenceDescriptor,
    parent: VisitedSet,
}

impl VisitedSet {
    fn contains(&self, descriptor: &ReferenceDescriptor) -> bool {
        let mut current = self.0.as_deref();
        while let Some(visited) = current {
            if visited.descriptor == *descriptor {
                return true;
            }
            current = visited.parent.0.as_deref();
        }
        false
    }

    fn with(&self, descriptor: ReferenceDescriptor) -> VisitedSet {
        VisitedSet(Some(Rc::new(Visited {
            descriptor,
            parent: self.clone(),
        })))
    }
}

#[derive(Clone)]
struct Scope {
    /// Root of the document the node was read from.
    root: Rc<str>,
    section: Section,
    visited: VisitedSet,
}

impl Scope {
    fn top(root: &str, section: Section) -> Self {
        Self {
            root: Rc::from(root),
            section,
            visited: VisitedSet::default(),
        }
    }

    fn enter(&self, section: Section) -> Self {
        Self {
            root: Rc::clone(&self.root),
            section,
            visited: self.visited.clone(),
        }
    }
}

/// A reference that could not be substituted, as seen from the nodes above it.
#[derive(Debug, Clone)]
struct Failure {
    reference: String,
    reason: UnresolvedReason,
}

impl Failure {
    /// Reason recorded for a reference whose target contains this failure.
    ///
    /// Cycles stay cycles; anything else points at the reference that
    /// failed first.
    fn reason_for_dependents(&self) -> UnresolvedReason {
        match &self.reason {
            UnresolvedReason::CycleDetected => UnresolvedReason::CycleDetected,
            UnresolvedReason::Dependency(origin) => UnresolvedReason::Dependency(origin.clone()),
            _ => UnresolvedReason::Dependency(self.reference.clone()),
        }
    }
}

/// What a walk did to its subtree.
#[derive(Debug, Default)]
struct Outcome {
    substitutions: usize,
    /// First failure met in the subtree, if any.
    failure: Option<Failure>,
}

impl Outcome {
    fn substituted(substitutions: usize) -> Self {
        Self {
            substitutions,
            failure: None,
        }
    }

    fn failed(failure: Failure) -> Self {
        Self {
            substitutions: 0,
            failure: Some(failure),
        }
    }

    fn absorb(&mut self, other: Outcome) {
        self.substitutions += other.substitutions;
        if self.failure.is_none() {
            self.failure = other.failure;
        }
    }
}

/// A fully resolved target and the substitutions made inside it.
#[derive(Debug, Clone)]
struct Resolved {
    value: Value,
    substitutions: usize,
}

type ResolvedKey = (ReferenceDescriptor, Section);

/// State shared by every branch of one resolution.
///
/// `RefCell` borrows are never held across an await.
struct Session<'t, T: ?Sized> {
    cache: DocumentCache<'t, T>,
    top_root: String,
    unresolved: RefCell<UnresolvedRegistry>,
    imports: RefCell<BTreeMap<ReferenceDescriptor, Value>>,
    /// Targets already resolved in this call. A target that reaches itself
    /// fails on every path, so the entry does not depend on the chain that
    /// produced it.
    resolved: RefCell<HashMap<ResolvedKey, Result<Resolved, UnresolvedReason>>>,
}

impl<'t, T: Transport + ?Sized> Session<'t, T> {
    fn new(transport: &'t T, root: &str, snapshot: Arc<Value>) -> Self {
        Self {
            cache: DocumentCache::new(transport, root, snapshot),
            top_root: root.to_string(),
            unresolved: RefCell::new(UnresolvedRegistry::new()),
            imports: RefCell::new(BTreeMap::new()),
            resolved: RefCell::new(HashMap::new()),
        }
    }

    fn walk<'s>(&'s self, node: &'s mut Value, scope: Scope) -> LocalBoxFuture<'s, Outcome> {
        async move {
            if scope.section == Section::Literal {
                return Outcome::default();
            }

            if let Some(reference) = marker(node) {
                return self.substitute(node, reference, scope).await;
            }

            self.walk_children(node, &scope).await
        }
        .boxed_local()
    }

    async fn walk_children(&self, node: &mut Value, scope: &Scope) -> Outcome {
        let branches: Vec<_> = match node {
            Value::Object(map) => map
                .iter_mut()
                .map(|(key, child)| self.walk(child, scope.enter(scope.section.child(key))))
                .collect(),
            Value::Array(items) => {
                let section = scope.section.element();
                items
                    .iter_mut()
                    .map(|child| self.walk(child, scope.enter(section)))
                    .collect()
            }
            _ => Vec::new(),
        };

        let mut outcome = Outcome::default();
        for branch in join_all(branches).await {
            outcome.absorb(branch);
        }
        outcome
    }

    async fn substitute(&self, node: &mut Value, reference: String, scope: Scope) -> Outcome {
        let descriptor = classify(&reference, &scope.root);

        if scope.section == Section::PathItem && has_siblings(node) {
            return self.merge_path_item(node, &reference, descriptor, scope).await;
        }
        if scope.section.is_model() && self.is_foreign(&descriptor) {
            return self.import(node, &reference, descriptor, scope).await;
        }

        match self.materialize(&reference, &descriptor, &scope).await {
            Ok(resolved) => {
                *node = resolved.value;
                Outcome::substituted(resolved.substitutions + 1)
            }
            Err(failure) => Outcome::failed(failure),
        }
    }

    /// Path item `$ref` with operations next to it: target and siblings are
    /// merged, siblings win. The siblings are resolved in place, so they
    /// keep their substitutions when the target fails.
    async fn merge_path_item(
        &self,
        node: &mut Value,
        reference: &str,
        descriptor: ReferenceDescriptor,
        scope: Scope,
    ) -> Outcome {
        let (mut outcome, target) = join(
            self.walk_children(node, &scope),
            self.materialize(reference, &descriptor, &scope),
        )
        .await;

        let target = match target {
            Ok(target) => target,
            Err(failure) => {
                outcome.absorb(Outcome::failed(failure));
                return outcome;
            }
        };

        let merged = match (target.value, node.as_object_mut()) {
            (Value::Object(mut merged), Some(local)) => {
                let siblings = std::mem::take(local);
                merged.extend(siblings.into_iter().filter(|(key, _)| key != "$ref"));
                Some(merged)
            }
            _ => None,
        };

        match merged {
            Some(merged) => {
                *node = Value::Object(merged);
                outcome.absorb(Outcome::substituted(target.substitutions + 1));
            }
            None => {
                let failure = self.fail(reference, &descriptor, UnresolvedReason::NotMergeable);
                outcome.absorb(Outcome::failed(failure));
            }
        }
        outcome
    }

    /// Model reference into another document: materialize once, link by placeholder.
    async fn import(
        &self,
        node: &mut Value,
        reference: &str,
        descriptor: ReferenceDescriptor,
        scope: Scope,
    ) -> Outcome {
        // Already imported, or being imported further up this chain.
        let known = self.imports.borrow().contains_key(&descriptor)
            || scope.visited.contains(&descriptor);

        let mut substitutions = 1;
        if !known {
            let model = match self.materialize(reference, &descriptor, &scope).await {
                Ok(model) => model,
                Err(failure) => return Outcome::failed(failure),
            };
            if let Entry::Vacant(entry) = self.imports.borrow_mut().entry(descriptor.clone()) {
                entry.insert(model.value);
                substitutions += model.substitutions;
            }
        }

        *node = json!({ "$ref": descriptor.to_absolute() });
        Outcome::substituted(substitutions)
    }

    /// Fetch, navigate and recursively resolve the target of a reference.
    ///
    /// Records the failure and returns it when any step fails, including a
    /// failure anywhere inside the target.
    async fn materialize(
        &self,
        reference: &str,
        descriptor: &ReferenceDescriptor,
        scope: &Scope,
    ) -> Result<Resolved, Failure> {
        if scope.visited.contains(descriptor) {
            return Err(self.fail(reference, descriptor, UnresolvedReason::CycleDetected));
        }

        let key = (descriptor.clone(), scope.section);
        let known = self.resolved.borrow().get(&key).cloned();
        let result = match known {
            Some(result) => result,
            None => {
                let result = self.resolve_target(descriptor, scope).await;
                self.resolved.borrow_mut().insert(key, result.clone());
                result
            }
        };

        result.map_err(|reason| self.fail(reference, descriptor, reason))
    }

    async fn resolve_target(
        &self,
        descriptor: &ReferenceDescriptor,
        scope: &Scope,
    ) -> Result<Resolved, UnresolvedReason> {
        let mut value = self.fragment(descriptor).await?;

        let root = if descriptor.root.is_empty() {
            Rc::clone(&scope.root)
        } else {
            Rc::from(descriptor.root.as_str())
        };
        let inner = Scope {
            root,
            section: scope.section,
            visited: scope.visited.with(descriptor.clone()),
        };

        let outcome = self.walk(&mut value, inner).await;
        match outcome.failure {
            Some(failure) => Err(failure.reason_for_dependents()),
            None => Ok(Resolved {
                value,
                substitutions: outcome.substitutions,
            }),
        }
    }

    async fn fragment(&self, descriptor: &ReferenceDescriptor) -> Result<Value, UnresolvedReason> {
        if !self.cache.is_resident(&descriptor.root) && !descriptor.is_absolute() {
            return Err(UnresolvedReason::Parse(format!(
                "cannot resolve document '{}' without an absolute base",
                descriptor.root
            )));
        }

        let document = self.cache.fetch(&descriptor.root).await?;
        pointer::read(&document, &descriptor.location)
            .cloned()
            .ok_or_else(|| UnresolvedReason::PointerNotFound(descriptor.location.clone()))
    }

    fn is_foreign(&self, descriptor: &ReferenceDescriptor) -> bool {
        !descriptor.root.is_empty() && descriptor.root != self.top_root
    }

    /// Record `reason` for `reference` and hand the failure to the caller.
    fn fail(
        &self,
        reference: &str,
        descriptor: &ReferenceDescriptor,
        reason: UnresolvedReason,
    ) -> Failure {
        log_reference_unresolved!(
            reference = %reference,
            root = %descriptor.root,
            location = %descriptor.location,
            reason = %reason,
            "Unresolved reference"
        );
        self.unresolved
            .borrow_mut()
            .insert(reference, descriptor.clone(), reason.clone());
        Failure {
            reference: reference.to_string(),
            reason,
        }
    }
}

/// The `$ref` string of a reference marker.
fn marker(node: &Value) -> Option<String> {
    match node.get("$ref")? {
        Value::String(reference) => Some(reference.clone()),
        _ => None,
    }
}

fn has_siblings(node: &Value) -> bool {
    node.as_object().is_some_and(|map| map.len() > 1)
}
