//! Deep merge for session `extra` payloads.

use serde_json::Value;

/// Merge `patch` into `target`.
///
/// Objects merge key by key, recursively. Any other patch value (scalar,
/// array or null) replaces the target value outright.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_objects_merge() {
        let mut target = json!({"theme": {"dark": true, "accent": "red"}, "pinned": true});
        deep_merge(&mut target, json!({"theme": {"accent": "blue"}}));
        assert_eq!(
            target,
            json!({"theme": {"dark": true, "accent": "blue"}, "pinned": true})
        );
    }

    #[test]
    fn arrays_and_scalars_are_replaced() {
        let mut target = json!({"tags": [1, 2, 3], "count": 1});
        deep_merge(&mut target, json!({"tags": [9], "count": "many"}));
        assert_eq!(target, json!({"tags": [9], "count": "many"}));
    }

    #[test]
    fn object_over_scalar_replaces() {
        let mut target = json!({"a": 1});
        deep_merge(&mut target, json!({"a": {"b": 2}}));
        assert_eq!(target, json!({"a": {"b": 2}}));

        let mut root = Value::Null;
        deep_merge(&mut root, json!({"x": 1}));
        assert_eq!(root, json!({"x": 1}));
    }
}
