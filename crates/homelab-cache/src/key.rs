//! Call arguments and deterministic cache keys.
//!
//! A key is `{namespace}:{positional}:{keyword}` where both argument
//! segments are canonical JSON: object keys sorted at every depth, no
//! whitespace. JSON types are kept as-is, so `5`, `5.0` and `"5"` are three
//! different keys; no coercion is attempted.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Positional and keyword arguments of one fetch invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument, replacing any previous value under `name`.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Set a keyword argument from any serializable value.
    pub fn try_kwarg<T: Serialize>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> serde_json::Result<Self> {
        Ok(self.kwarg(name, serde_json::to_value(value)?))
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Keyword arguments, sorted by name.
    pub fn keyword(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }

    /// Look up a keyword argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Look up a string keyword argument.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Whether there are no arguments at all.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// A derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `args` within `namespace`.
    pub fn derive(namespace: &str, args: &CallArgs) -> Self {
        let positional = Value::Array(args.positional.iter().map(canonicalize).collect());
        let keyword = Value::Object(
            args.keyword
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect(),
        );
        CacheKey(format!("{}:{}:{}", namespace, positional, keyword))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rebuild `value` with every object's keys in sorted order.
///
/// Independent of whether `serde_json` was built with `preserve_order`.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_calls_share_key() {
        let a = CacheKey::derive("nas:folders", &CallArgs::new().kwarg("folder", "/volume1"));
        let b = CacheKey::derive("nas:folders", &CallArgs::new().kwarg("folder", "/volume1"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_keyword_values_distinguish_keys() {
        let one = CacheKey::derive("fetch", &CallArgs::new().kwarg("id", 1));
        let two = CacheKey::derive("fetch", &CallArgs::new().kwarg("id", 2));
        assert_ne!(one, two);
    }

    #[test]
    fn test_keyword_order_is_irrelevant() {
        let a = CacheKey::derive("ns", &CallArgs::new().kwarg("a", 1).kwarg("b", 2));
        let b = CacheKey::derive("ns", &CallArgs::new().kwarg("b", 2).kwarg("a", 1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_nested_object_order_is_irrelevant() {
        let a = CacheKey::derive(
            "ns",
            &CallArgs::new().kwarg("filter", json!({"x": 1, "y": {"b": 2, "a": 1}})),
        );
        let b = CacheKey::derive(
            "ns",
            &CallArgs::new().kwarg("filter", json!({"y": {"a": 1, "b": 2}, "x": 1})),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_value_types_are_not_coerced() {
        let int = CacheKey::derive("ns", &CallArgs::new().kwarg("count", 5));
        let string = CacheKey::derive("ns", &CallArgs::new().kwarg("count", "5"));
        let float = CacheKey::derive("ns", &CallArgs::new().kwarg("count", 5.0));
        assert_ne!(int, string);
        assert_ne!(int, float);
        assert_ne!(string, float);
    }

    #[test]
    fn test_positional_and_keyword_do_not_collide() {
        let positional = CacheKey::derive("ns", &CallArgs::new().arg("id"));
        let keyword = CacheKey::derive("ns", &CallArgs::new().kwarg("id", "id"));
        assert_ne!(positional, keyword);
    }

    #[test]
    fn test_key_layout() {
        let key = CacheKey::derive("test:key", &CallArgs::new().arg("test").kwarg("kwarg1", 20));
        assert_eq!(key.as_str(), r#"test:key:["test"]:{"kwarg1":20}"#);

        let empty = CacheKey::derive("test:key", &CallArgs::new());
        assert_eq!(empty.as_str(), "test:key:[]:{}");
    }

    #[test]
    fn test_try_kwarg_serializes_structs() {
        #[derive(Serialize)]
        struct Range {
            from: u32,
            until: u32,
        }

        let args = CallArgs::new()
            .try_kwarg("range", &Range { from: 1, until: 2 })
            .unwrap();
        assert_eq!(args.get("range"), Some(&json!({"from": 1, "until": 2})));
        assert!(!args.is_empty());
    }
}
