//! Combines transformed backend responses into one structured value.
use serde_json::{Map, Value};

use crate::core::{BackendResponse, Transformer};

/// Merges the ordered response list of one endpoint. Failed responses are
/// skipped (flagging the aggregation as incomplete); successful responses
/// run through the transformer and are then composed by directive:
/// `concat` into an array, `group` under a key, or deep-merged.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    transformer: Transformer,
}

impl Merger {
    pub fn new() -> Self {
        Self {
            transformer: Transformer::new(),
        }
    }

    /// Merge `responses` in configured order. Returns the merged value and
    /// whether every backend completed successfully.
    pub fn merge(&self, responses: &[BackendResponse]) -> (Value, bool) {
        let mut result = Map::new();
        let mut all_completed = true;
        let mut successful = 0usize;

        for response in responses {
            if response.error.is_some() {
                all_completed = false;
                continue;
            }

            let Some(data) = &response.data else {
                continue;
            };

            successful += 1;

            let processed = self.transformer.transform(data.clone(), &response.backend);

            // concat wins over group when both are configured.
            if let Some(key) = response.backend.concat.as_deref() {
                append_to_array(&mut result, key, processed);
            } else if let Some(group) = response.backend.group.as_deref() {
                result.insert(group.to_string(), processed);
            } else {
                // A sole successful response with no composition directive
                // keeps its own shape (array, scalar, ...) unwrapped.
                if successful == 1 && responses.len() == 1 {
                    return (processed, all_completed);
                }
                merge_into_result(&mut result, processed);
            }
        }

        (Value::Object(result), all_completed)
    }
}

/// Append `data` to the array at `result[key]`. Arrays are spread
/// (flattened one level); a non-array existing value is promoted to an
/// array first.
fn append_to_array(result: &mut Map<String, Value>, key: &str, data: Value) {
    let new_elements = match data {
        Value::Array(items) => items,
        other => vec![other],
    };

    match result.get_mut(key) {
        None => {
            result.insert(key.to_string(), Value::Array(new_elements));
        }
        Some(Value::Array(existing)) => {
            existing.extend(new_elements);
        }
        Some(other) => {
            let mut promoted = vec![other.take()];
            promoted.extend(new_elements);
            result.insert(key.to_string(), Value::Array(promoted));
        }
    }
}

/// Deep-merge `data` into `result`. Non-mapping values cannot be merged at
/// the top level and are silently dropped.
fn merge_into_result(result: &mut Map<String, Value>, data: Value) {
    let Value::Object(map) = data else {
        return;
    };
    for (key, value) in map {
        deep_merge(result, key, value);
    }
}

/// Merge `value` into `result[key]`: recurse when both sides are mappings,
/// concatenate when both are sequences, overwrite otherwise.
fn deep_merge(result: &mut Map<String, Value>, key: String, value: Value) {
    let Some(existing) = result.get_mut(&key) else {
        result.insert(key, value);
        return;
    };

    match (existing, value) {
        (Value::Object(existing_map), Value::Object(value_map)) => {
            for (k, v) in value_map {
                deep_merge(existing_map, k, v);
            }
        }
        (Value::Array(existing_items), Value::Array(value_items)) => {
            existing_items.extend(value_items);
        }
        (existing, value) => {
            *existing = value;
        }
    }
}
