//! Scalar parameter store
//!
//! Parameters are small named scalars registered once at startup and
//! persisted independently of the bulk segments. The store itself is a
//! plain map; the coordinator owns write-through persistence.

use dashmap::DashMap;
use runtime_core::{Error, ParamValue, Result};
use tracing::debug;

/// Name-keyed store of scalar parameters
#[derive(Debug, Default)]
pub struct ParameterStore {
    params: DashMap<String, ParamValue>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter if absent; returns whether it was inserted
    ///
    /// A value that is already present wins, which makes registration
    /// restart-safe: a resumed run re-registering its parameters keeps
    /// the recovered values.
    pub fn register(&self, name: &str, value: ParamValue) -> bool {
        match self.params.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                debug!(parameter = name, value = %value, "parameter registered");
                entry.insert(value);
                true
            }
        }
    }

    /// Unconditionally set a parameter; recovery only
    pub fn insert(&self, name: &str, value: ParamValue) {
        self.params.insert(name.to_string(), value);
    }

    /// Look up a parameter
    pub fn get(&self, name: &str) -> Result<ParamValue> {
        self.params
            .get(name)
            .map(|entry| *entry.value())
            .ok_or_else(|| Error::UnknownParameter {
                parameter: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// All parameters, ordered by name
    pub fn entries(&self) -> Vec<(String, ParamValue)> {
        let mut entries: Vec<(String, ParamValue)> = self
            .params
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Replace the whole store; recovery only
    pub fn replace_all(&self, entries: Vec<(String, ParamValue)>) {
        self.params.clear();
        for (name, value) in entries {
            self.params.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let store = ParameterStore::new();
        assert!(store.register("max_iter", ParamValue::Int32(100)));
        assert_eq!(store.get("max_iter").unwrap().as_i32(), Some(100));
    }

    #[test]
    fn test_register_present_wins() {
        let store = ParameterStore::new();
        assert!(store.register("lr", ParamValue::Float64(0.1)));
        assert!(!store.register("lr", ParamValue::Float64(0.9)));
        assert_eq!(store.get("lr").unwrap().as_f64(), Some(0.1));
    }

    #[test]
    fn test_get_unknown() {
        let store = ParameterStore::new();
        let err = store.get("missing").unwrap_err();
        assert!(matches!(err, Error::UnknownParameter { .. }));
    }

    #[test]
    fn test_replace_all() {
        let store = ParameterStore::new();
        store.register("a", ParamValue::Int32(1));
        store.replace_all(vec![("b".to_string(), ParamValue::Int64(2))]);
        assert!(!store.contains("a"));
        assert_eq!(store.get("b").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn test_entries_sorted() {
        let store = ParameterStore::new();
        store.register("beta", ParamValue::Int32(2));
        store.register("alpha", ParamValue::Int32(1));
        let names: Vec<String> = store.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }
}
