//! Value propagation
//!
//! Pure transformations from {configuration, state, secrets} to the nested
//! value trees handed to the installation adapters. Keys and nesting are
//! the compatibility surface with the chart-style installer and must stay
//! stable. Defaults are applied here, never inside an adapter.

pub mod addresses;
pub mod application;
pub mod event_bus;
pub mod logging;
pub mod monitoring;
pub mod tls;

use std::collections::BTreeMap;

use serde_json::Value;

/// Merge user-supplied override values into a generated tree, last.
///
/// The merge is deep: objects merge key-by-key and only leaves are
/// replaced, so an override can never silently drop sibling keys the
/// orchestrator reads back from state.
pub fn merge_custom(tree: &mut Value, overrides: &BTreeMap<String, Value>) {
    if overrides.is_empty() {
        return;
    }
    let override_map = Value::Object(
        overrides
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    );
    deep_merge(tree, &override_map);
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overrides_leaf_without_dropping_siblings() {
        let mut tree = json!({
            "app": { "replicas": 2, "broker": "kafka:9092" },
            "version": "1.0.0"
        });
        let mut overrides = BTreeMap::new();
        overrides.insert("app".to_string(), json!({ "replicas": 5 }));

        merge_custom(&mut tree, &overrides);

        assert_eq!(tree["app"]["replicas"], 5);
        // Sibling key survives the override
        assert_eq!(tree["app"]["broker"], "kafka:9092");
        assert_eq!(tree["version"], "1.0.0");
    }

    #[test]
    fn test_merge_adds_new_keys() {
        let mut tree = json!({ "a": 1 });
        let mut overrides = BTreeMap::new();
        overrides.insert("extra".to_string(), json!({ "nested": true }));

        merge_custom(&mut tree, &overrides);
        assert_eq!(tree["extra"]["nested"], true);
        assert_eq!(tree["a"], 1);
    }
}
