//! Per-backend response transformations.
//!
//! Transformations apply in a fixed order: `target` extraction, then the
//! `allow`/`deny` filter, then field `mapping`. All three address nested
//! fields with dot-paths (`a.b.c`) and recurse elementwise through
//! sequences; scalars pass through untouched.
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::config::Backend;

/// Applies a backend's transformation directives to a decoded value.
#[derive(Debug, Clone, Default)]
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    /// Apply all transformations configured on `backend`, in order.
    pub fn transform(&self, value: Value, backend: &Backend) -> Value {
        let mut value = value;

        if let Some(target) = backend.target.as_deref() {
            if !target.is_empty() {
                value = apply_target(&value, target);
            }
        }

        if !backend.allow.is_empty() || !backend.deny.is_empty() {
            value = apply_filtering(value, &backend.allow, &backend.deny);
        }

        if !backend.mapping.is_empty() {
            value = apply_mapping(value, &backend.mapping);
        }

        value
    }
}

/// Extract the sub-value at `target`. A non-mapping encountered mid-path is
/// returned as-is (early exit); a missing segment returns the original input
/// unchanged.
pub fn apply_target(value: &Value, target: &str) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };

    let mut current = map;
    for part in target.split('.') {
        match current.get(part) {
            Some(Value::Object(next)) => current = next,
            Some(other) => return other.clone(),
            None => return value.clone(),
        }
    }

    Value::Object(current.clone())
}

/// Apply `allow` / `deny` to a value. A non-empty allow list rebuilds the
/// mapping from just the allowed paths and ignores `deny`; otherwise all
/// keys are kept and each deny path is removed.
pub fn apply_filtering(value: Value, allow: &[String], deny: &[String]) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| apply_filtering(item, allow, deny))
                .collect(),
        ),
        Value::Object(map) => {
            if !allow.is_empty() {
                let mut result = Map::new();
                for field in allow {
                    if let Some(found) = get_path(&map, field) {
                        let found = found.clone();
                        set_path(&mut result, field, found);
                    }
                }
                Value::Object(result)
            } else {
                let mut result = map;
                for field in deny {
                    delete_path(&mut result, field);
                }
                Value::Object(result)
            }
        }
        other => other,
    }
}

/// Rename fields per the mapping directive. Input keys whose top-level name
/// matches a directive's old path are excluded from the copy; directive
/// values are read from the original input, so chained renames do not
/// observe each other.
pub fn apply_mapping(value: Value, mapping: &BTreeMap<String, String>) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| apply_mapping(item, mapping))
                .collect(),
        ),
        Value::Object(map) => {
            let mut result = Map::new();

            for (key, val) in &map {
                if !mapping.contains_key(key) {
                    result.insert(key.clone(), val.clone());
                }
            }

            for (old_path, new_path) in mapping {
                if let Some(found) = get_path(&map, old_path) {
                    let found = found.clone();
                    set_path(&mut result, new_path, found);
                }
            }

            Value::Object(result)
        }
        other => other,
    }
}

/// Look up a dot-path. JSON `null` counts as absent, as does a non-mapping
/// in a non-terminal position.
pub fn get_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut current = map;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        let value = current.get(part)?;
        if parts.peek().is_none() {
            return if value.is_null() { None } else { Some(value) };
        }
        match value {
            Value::Object(next) => current = next,
            _ => return None,
        }
    }

    None
}

/// Set a dot-path, creating intermediate mappings as needed. If a
/// non-mapping sits mid-path the write is silently dropped; conflicting
/// scalar prefixes are never overwritten.
pub fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    let mut current = map;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), value);
            return;
        }
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match slot {
            Value::Object(next) => current = next,
            _ => return,
        }
    }
}

/// Remove the terminal key of a dot-path if its prefix resolves to
/// mappings; otherwise do nothing.
pub fn delete_path(map: &mut Map<String, Value>, path: &str) {
    let mut current = map;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.remove(part);
            return;
        }
        match current.get_mut(part) {
            Some(Value::Object(next)) => current = next,
            _ => return,
        }
    }
}
