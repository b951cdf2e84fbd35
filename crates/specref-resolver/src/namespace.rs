//! Merging imported models into the document's shared namespace.
//!
//! During the walk, imported model references are written as absolute
//! `root#location` placeholders. Once the walk has settled, each import gets a
//! name in `definitions` (Swagger 2) or `components/schemas` (OpenAPI 3) and
//! every placeholder is rewritten to a local link.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use specref_telemetry::log_model_imported;

use crate::pointer;
use crate::reference::ReferenceDescriptor;
use crate::registry::UnresolvedRegistry;
use crate::section::Section;

/// Path of the shared model namespace of `document`.
pub fn namespace_path(document: &Value) -> &'static [&'static str] {
    let openapi3 = document
        .get("openapi")
        .and_then(Value::as_str)
        .is_some_and(|version| version.starts_with('3'));

    if openapi3 {
        &["components", "schemas"]
    } else {
        &["definitions"]
    }
}

/// Name the imports, rewrite placeholders and merge the models into `document`.
///
/// Names already present in the document win. A model with the same content
/// as an existing entry reuses its name; otherwise a taken name gets a
/// numeric suffix. Returns the number of models added.
pub fn merge_imports(
    document: &mut Value,
    imports: BTreeMap<ReferenceDescriptor, Value>,
    unresolved: &UnresolvedRegistry,
) -> usize {
    if imports.is_empty() {
        return 0;
    }

    let path = namespace_path(document);
    let mut taken: BTreeMap<String, Value> = match pointer::ensure_object(document, path) {
        Some(namespace) => namespace.clone().into_iter().collect(),
        None => {
            tracing::warn!(
                namespace = %path.join("/"),
                "Shared namespace is not a mapping, leaving imported references absolute"
            );
            return 0;
        }
    };

    let mut links = HashMap::new();
    let mut added = Vec::new();
    for (origin, model) in imports {
        let base = origin.model_name();
        let mut name = base.clone();
        let mut suffix = 2;
        let reused = loop {
            match taken.get(&name) {
                None => break false,
                Some(existing) if *existing == model => break true,
                Some(_) => {
                    name = format!("{}_{}", base, suffix);
                    suffix += 1;
                }
            }
        };

        log_model_imported!(origin = %origin.to_absolute(), name = %name, reused, "Imported remote model");
        let link = format!(
            "#/{}/{}",
            path.join("/"),
            pointer::escape(&name)
        );
        links.insert(origin.to_absolute(), link);
        if !reused {
            taken.insert(name.clone(), model.clone());
            added.push((name, model));
        }
    }

    rewrite_links(document, Section::Document, &links, unresolved);

    let location = format!("/{}", path.join("/"));
    let Some(namespace) = pointer::read_mut(document, &location) else {
        return 0;
    };
    let mut count = 0;
    for (name, mut model) in added {
        rewrite_links(&mut model, Section::Schema, &links, unresolved);
        match pointer::write(namespace, &name, model) {
            Ok(_) => count += 1,
            Err(e) => tracing::warn!(name = %name, error = %e, "Failed to add imported model"),
        }
    }
    count
}

/// Replace placeholder `$ref` strings with their local links, skipping literal data.
fn rewrite_links(
    node: &mut Value,
    section: Section,
    links: &HashMap<String, String>,
    unresolved: &UnresolvedRegistry,
) {
    if section == Section::Literal {
        return;
    }

    match node {
        Value::Object(map) => {
            rewrite_marker(map, links, unresolved);
            for (key, child) in map.iter_mut() {
                rewrite_links(child, section.child(key), links, unresolved);
            }
        }
        Value::Array(items) => {
            let section = section.element();
            for item in items {
                rewrite_links(item, section, links, unresolved);
            }
        }
        _ => {}
    }
}

fn rewrite_marker(
    map: &mut Map<String, Value>,
    links: &HashMap<String, String>,
    unresolved: &UnresolvedRegistry,
) {
    let Some(Value::String(reference)) = map.get_mut("$ref") else {
        return;
    };
    if unresolved.contains(reference) {
        return;
    }
    if let Some(link) = links.get(reference.as_str()) {
        *reference = link.clone();
    }
}
