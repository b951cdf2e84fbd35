//! JSON-Pointer style navigation inside a document.
//!
//! Lookups never fail loudly: a missing key, an out-of-range or malformed
//! index, or a step into a scalar all yield `None`.

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use crate::error::PointerError;

/// Split a location into decoded segments.
///
/// The leading `/` is optional; `""` addresses the whole document.
pub fn segments(location: &str) -> Vec<String> {
    if location.is_empty() {
        return Vec::new();
    }
    let trimmed = location.strip_prefix('/').unwrap_or(location);
    trimmed.split('/').map(decode_segment).collect()
}

/// Decodes a pointer segment (`~1` → `/`, `~0` → `~`, then percent-decoding).
pub fn decode_segment(segment: &str) -> String {
    let unescaped = segment.replace("~1", "/").replace("~0", "~");
    percent_decode_str(&unescaped)
        .decode_utf8_lossy()
        .into_owned()
}

/// Escape a key for use as a pointer segment.
pub fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Read the value at `location`.
pub fn read<'a>(document: &'a Value, location: &str) -> Option<&'a Value> {
    segments(location)
        .iter()
        .try_fold(document, |node, segment| match node {
            Value::Object(map) => map.get(segment).or_else(|| {
                path_key(segment).and_then(|key| map.get(&key))
            }),
            Value::Array(items) => parse_index(segment).and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Mutable variant of [`read`].
pub fn read_mut<'a>(document: &'a mut Value, location: &str) -> Option<&'a mut Value> {
    let mut current = document;
    for segment in segments(location) {
        current = match current {
            Value::Object(map) => {
                let key = if map.contains_key(&segment) {
                    segment
                } else {
                    path_key(&segment)?
                };
                map.get_mut(&key)?
            }
            Value::Array(items) => {
                let index = parse_index(&segment)?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Replace the value at `key` of a mapping or sequence, returning the previous value.
///
/// For sequences, an index equal to the length (or `-`) appends.
pub fn write(parent: &mut Value, key: &str, value: Value) -> Result<Option<Value>, PointerError> {
    match parent {
        Value::Object(map) => Ok(map.insert(key.to_string(), value)),
        Value::Array(items) => {
            let len = items.len();
            let index = if key == "-" {
                len
            } else {
                parse_index(key).ok_or_else(|| PointerError::InvalidIndex(key.to_string()))?
            };
            match index {
                i if i < len => Ok(Some(std::mem::replace(&mut items[i], value))),
                i if i == len => {
                    items.push(value);
                    Ok(None)
                }
                i => Err(PointerError::IndexOutOfRange { index: i, len }),
            }
        }
        _ => Err(PointerError::NotAContainer),
    }
}

/// Walk `path` through mappings, creating empty mappings where keys are missing.
///
/// Returns `None` when an existing value on the way is not a mapping.
pub fn ensure_object<'a>(document: &'a mut Value, path: &[&str]) -> Option<&'a mut Map<String, Value>> {
    let mut current = document;
    for segment in path {
        current = current
            .as_object_mut()?
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current.as_object_mut()
}

/// `user/{username}` also addresses the path key `/user/{username}`.
fn path_key(segment: &str) -> Option<String> {
    (segment.contains('/') && !segment.starts_with('/')).then(|| format!("/{}", segment))
}

/// Sequence index per RFC 6901: digits only, no leading zeros.
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty()
        || (segment.len() > 1 && segment.starts_with('0'))
        || !segment.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "definitions": {
                "Pet": { "type": "object" },
                "a/b": { "type": "string" },
                "m~n": { "type": "integer" },
                "User Profile": { "type": "boolean" }
            },
            "tags": [ { "name": "pet" }, { "name": "store" } ],
            "count": 3
        })
    }

    #[test]
    fn reads_nested_keys() {
        let d = doc();
        assert_eq!(read(&d, "/definitions/Pet"), Some(&json!({ "type": "object" })));
    }

    #[test]
    fn reads_without_leading_slash() {
        let d = doc();
        assert_eq!(read(&d, "definitions/Pet"), read(&d, "/definitions/Pet"));
    }

    #[test]
    fn empty_location_is_whole_document() {
        let d = doc();
        assert_eq!(read(&d, ""), Some(&d));
    }

    #[test]
    fn decodes_escapes() {
        let d = doc();
        assert_eq!(read(&d, "/definitions/a~1b/type"), Some(&json!("string")));
        assert_eq!(read(&d, "/definitions/m~0n/type"), Some(&json!("integer")));
        assert_eq!(read(&d, "/definitions/User%20Profile/type"), Some(&json!("boolean")));
    }

    #[test]
    fn path_keys_may_omit_leading_slash() {
        let d = json!({ "paths": { "/user/{username}": { "get": {} } } });
        assert_eq!(read(&d, "paths/user~1{username}/get"), Some(&json!({})));
        assert_eq!(read(&d, "/paths/~1user~1{username}/get"), Some(&json!({})));
        assert_eq!(read(&d, "/paths/user"), None);
    }

    #[test]
    fn reads_array_indices() {
        let d = doc();
        assert_eq!(read(&d, "/tags/1/name"), Some(&json!("store")));
        assert_eq!(read(&d, "/tags/2"), None);
        assert_eq!(read(&d, "/tags/01"), None);
        assert_eq!(read(&d, "/tags/name"), None);
    }

    #[test]
    fn missing_or_mismatched_is_none() {
        let d = doc();
        assert_eq!(read(&d, "/definitionz/Pet"), None);
        assert_eq!(read(&d, "/count/inner"), None);
    }

    #[test]
    fn read_mut_allows_in_place_edit() {
        let mut d = doc();
        if let Some(v) = read_mut(&mut d, "/tags/0/name") {
            *v = json!("animal");
        }
        assert_eq!(read(&d, "/tags/0/name"), Some(&json!("animal")));
        assert!(read_mut(&mut d, "/tags/9").is_none());
    }

    #[test]
    fn write_replaces_mapping_value() {
        let mut parent = json!({ "a": 1 });
        let previous = write(&mut parent, "a", json!(2)).unwrap();
        assert_eq!(previous, Some(json!(1)));
        assert_eq!(parent, json!({ "a": 2 }));
    }

    #[test]
    fn write_replaces_and_appends_sequence_items() {
        let mut parent = json!([1, 2]);
        assert_eq!(write(&mut parent, "0", json!(9)).unwrap(), Some(json!(1)));
        assert_eq!(write(&mut parent, "-", json!(3)).unwrap(), None);
        assert_eq!(parent, json!([9, 2, 3]));
    }

    #[test]
    fn write_rejects_bad_targets() {
        let mut scalar = json!("x");
        assert_eq!(
            write(&mut scalar, "a", json!(1)),
            Err(PointerError::NotAContainer)
        );

        let mut seq = json!([1]);
        assert_eq!(
            write(&mut seq, "5", json!(1)),
            Err(PointerError::IndexOutOfRange { index: 5, len: 1 })
        );
        assert_eq!(
            write(&mut seq, "x", json!(1)),
            Err(PointerError::InvalidIndex("x".to_string()))
        );
    }

    #[test]
    fn ensure_object_creates_intermediate_mappings() {
        let mut d = json!({ "openapi": "3.0.0" });
        let schemas = ensure_object(&mut d, &["components", "schemas"]).unwrap();
        schemas.insert("Pet".into(), json!({ "type": "object" }));
        assert_eq!(read(&d, "/components/schemas/Pet/type"), Some(&json!("object")));
    }

    #[test]
    fn ensure_object_refuses_non_mapping() {
        let mut d = json!({ "definitions": [] });
        assert!(ensure_object(&mut d, &["definitions"]).is_none());
    }

    #[test]
    fn escape_round_trips_through_segments() {
        let key = "a/b~c";
        assert_eq!(segments(&format!("/{}", escape(key))), vec![key.to_string()]);
    }
}
