//! OutputStore - ordered record of node outputs
//!
//! Unlike a plain map, production order is kept: variable resolution falls
//! back to the most recently produced outputs, so recency must be queryable.
//! Writes go through a single `RwLock`; readers take a snapshot of
//! `Arc`-shared entries and never observe a half-written map.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::util::jsonpath;

/// Outputs of one node, in insertion order (output name → value)
pub type OutputMap = Map<String, Value>;

/// One node's recorded outputs
#[derive(Debug, Clone)]
pub struct ProducedEntry {
    pub node_id: Arc<str>,
    pub outputs: Arc<OutputMap>,
}

impl ProducedEntry {
    /// First value in insertion order, if any
    pub fn first_value(&self) -> Option<&Value> {
        self.outputs.values().next()
    }
}

/// Resolve `node.key[.path]` (e.g. "summarize.output" or
/// "fetch.data.items[0]") against the most recent entry for `node`
pub fn resolve_qualified<'p>(produced: &'p [ProducedEntry], name: &str) -> Option<&'p Value> {
    let (node_id, rest) = name.split_once('.')?;
    let entry = produced.iter().rev().find(|e| &*e.node_id == node_id)?;
    let (key, nested) = match rest.split_once('.') {
        Some((key, nested)) => (key, Some(nested)),
        None => (rest, None),
    };
    let value = entry.outputs.get(key)?;
    match nested {
        Some(path) => jsonpath::resolve(value, path),
        None => Some(value),
    }
}

/// Thread-safe ordered output storage
///
/// Cloning shares the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct OutputStore {
    entries: Arc<RwLock<Vec<ProducedEntry>>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node's outputs as the most recent production
    ///
    /// Re-recording a node replaces its previous entry and moves it to the end.
    pub fn record(&self, node_id: Arc<str>, outputs: OutputMap) {
        let mut entries = self.entries.write();
        entries.retain(|e| e.node_id != node_id);
        entries.push(ProducedEntry {
            node_id,
            outputs: Arc::new(outputs),
        });
    }

    /// Outputs of a node
    pub fn get(&self, node_id: &str) -> Option<Arc<OutputMap>> {
        self.entries
            .read()
            .iter()
            .find(|e| &*e.node_id == node_id)
            .map(|e| Arc::clone(&e.outputs))
    }

    /// Check if a node has produced outputs
    pub fn contains(&self, node_id: &str) -> bool {
        self.entries.read().iter().any(|e| &*e.node_id == node_id)
    }

    /// Consistent copy of all entries in production order
    pub fn snapshot(&self) -> Vec<ProducedEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// All outputs as `{node_id: {name: value}}`, production order
    pub fn to_value(&self) -> Value {
        let entries = self.entries.read();
        let map: Map<String, Value> = entries
            .iter()
            .map(|e| (e.node_id.to_string(), Value::Object((*e.outputs).clone())))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs(pairs: &[(&str, Value)]) -> OutputMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn record_and_get() {
        let store = OutputStore::new();
        store.record(Arc::from("a"), outputs(&[("output", json!("pong"))]));

        assert!(store.contains("a"));
        assert_eq!(store.get("a").unwrap()["output"], "pong");
        assert!(store.get("b").is_none());
    }

    #[test]
    fn keeps_production_order() {
        let store = OutputStore::new();
        store.record(Arc::from("b"), OutputMap::new());
        store.record(Arc::from("a"), OutputMap::new());

        let ids: Vec<_> = store.snapshot().iter().map(|e| e.node_id.to_string()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn re_record_moves_to_end() {
        let store = OutputStore::new();
        store.record(Arc::from("a"), outputs(&[("output", json!(1))]));
        store.record(Arc::from("b"), OutputMap::new());
        store.record(Arc::from("a"), outputs(&[("output", json!(2))]));

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(&*snap[1].node_id, "a");
        assert_eq!(snap[1].first_value(), Some(&json!(2)));
    }

    #[test]
    fn resolve_nested_path() {
        let store = OutputStore::new();
        store.record(
            Arc::from("fetch"),
            outputs(&[("data", json!({"items": [{"name": "x"}]}))]),
        );

        let snap = store.snapshot();
        assert_eq!(resolve_qualified(&snap, "fetch.data.items[0].name"), Some(&json!("x")));
        assert_eq!(
            resolve_qualified(&snap, "fetch.data"),
            Some(&json!({"items": [{"name": "x"}]}))
        );
        assert_eq!(resolve_qualified(&snap, "fetch.missing"), None);
        assert_eq!(resolve_qualified(&snap, "fetch"), None);
        assert_eq!(resolve_qualified(&snap, "other.data"), None);
    }

    #[test]
    fn to_value_shape() {
        let store = OutputStore::new();
        store.record(Arc::from("a"), outputs(&[("output", json!("x"))]));
        assert_eq!(store.to_value(), json!({"a": {"output": "x"}}));
    }

    #[test]
    fn concurrent_writes_all_stored() {
        let store = OutputStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.record(Arc::from(format!("n{i}")), OutputMap::new());
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
