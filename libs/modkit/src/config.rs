//! The read-only configuration contract every module sees through its
//! [`crate::context::AppContext`].
//!
//! [`Config`] is a narrow, typed view over a tree of sections (a "section"
//! being anything that can itself answer `get_sub`). The default
//! implementation, [`JsonConfig`], is backed by a `serde_json::Value`
//! assembled once at startup from a [`figment::Figment`] (file + environment
//! sources), the same merge strategy used throughout this codebase.

use std::collections::HashMap;
use std::sync::Arc;

use figment::Figment;
use modkit_errors::ErrorValue;
use serde::de::DeserializeOwned;

use crate::errors::ERR_INVALID_MODULE_CONFIG;

/// Read-only, typed access to a configuration tree.
///
/// Every accessor returns `None` when the key is absent or the stored value
/// doesn't match the requested shape; callers that need that distinction use
/// [`Config::has`] first, or fall back to a default via
/// [`Config::deserialize_or_default`].
pub trait Config: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn get_int(&self, key: &str) -> Option<i64>;
    fn get_float64(&self, key: &str) -> Option<f64>;
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_string_slice(&self, key: &str) -> Option<Vec<String>>;
    fn get_sub(&self, key: &str) -> Option<Arc<dyn Config>>;
    fn has(&self, key: &str) -> bool;
    fn all(&self) -> serde_json::Value;

    /// Deserialize the section at `key` into `T`, falling back to
    /// `T::default()` when the section is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_INVALID_MODULE_CONFIG`] if the section is present but
    /// doesn't deserialize into `T`.
    fn deserialize_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, ErrorValue> {
        if !self.has(key) {
            return Ok(T::default());
        }
        self.deserialize_required(key)
    }

    /// Deserialize the section at `key` into `T`, requiring it to be
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_INVALID_MODULE_CONFIG`] if the section is missing or
    /// doesn't deserialize into `T`.
    fn deserialize_required<T: DeserializeOwned>(&self, key: &str) -> Result<T, ErrorValue> {
        let value = self.get_sub(key).map_or(serde_json::Value::Null, |sub| sub.all());
        serde_json::from_value(value)
            .map_err(|e| ERR_INVALID_MODULE_CONFIG.value().with_detail("key", key).with_cause(e))
    }
}

/// A `serde_json::Value`-backed [`Config`] implementation, reachable via
/// dot-separated paths (`"database.pool.max_conns"`).
#[derive(Debug, Clone)]
pub struct JsonConfig {
    value: serde_json::Value,
}

impl JsonConfig {
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Merge `figment`'s providers into a single JSON tree and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`ERR_INVALID_MODULE_CONFIG`] if figment fails to extract a
    /// `serde_json::Value` from its merged providers.
    pub fn from_figment(figment: &Figment) -> Result<Self, ErrorValue> {
        let value: serde_json::Value = figment
            .extract()
            .map_err(|e| ERR_INVALID_MODULE_CONFIG.value().with_detail("key", "<root>").with_cause(e))?;
        Ok(Self::new(value))
    }

    fn navigate(&self, key: &str) -> Option<&serde_json::Value> {
        let mut current = &self.value;
        if key.is_empty() {
            return Some(current);
        }
        for segment in key.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl Config for JsonConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        self.navigate(key)?.as_str().map(str::to_owned)
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.navigate(key)?.as_i64()
    }

    fn get_float64(&self, key: &str) -> Option<f64> {
        self.navigate(key)?.as_f64()
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.navigate(key)?.as_bool()
    }

    fn get_string_slice(&self, key: &str) -> Option<Vec<String>> {
        self.navigate(key)?
            .as_array()
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
    }

    fn get_sub(&self, key: &str) -> Option<Arc<dyn Config>> {
        self.navigate(key).map(|v| Arc::new(Self::new(v.clone())) as Arc<dyn Config>)
    }

    fn has(&self, key: &str) -> bool {
        self.navigate(key).is_some()
    }

    fn all(&self) -> serde_json::Value {
        self.value.clone()
    }
}

/// An in-memory [`Config`] useful for tests, built directly from a map of
/// top-level sections.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    inner: JsonConfig,
}

impl StaticConfig {
    #[must_use]
    pub fn from_sections(sections: HashMap<String, serde_json::Value>) -> Self {
        Self {
            inner: JsonConfig::new(serde_json::Value::Object(sections.into_iter().collect())),
        }
    }
}

impl Config for StaticConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        self.inner.get_string(key)
    }
    fn get_int(&self, key: &str) -> Option<i64> {
        self.inner.get_int(key)
    }
    fn get_float64(&self, key: &str) -> Option<f64> {
        self.inner.get_float64(key)
    }
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.inner.get_bool(key)
    }
    fn get_string_slice(&self, key: &str) -> Option<Vec<String>> {
        self.inner.get_string_slice(key)
    }
    fn get_sub(&self, key: &str) -> Option<Arc<dyn Config>> {
        self.inner.get_sub(key)
    }
    fn has(&self, key: &str) -> bool {
        self.inner.has(key)
    }
    fn all(&self) -> serde_json::Value {
        self.inner.all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    struct Sub {
        #[serde(default)]
        max_conns: i64,
    }

    fn config() -> JsonConfig {
        JsonConfig::new(json!({
            "database": { "max_conns": 10, "host": "localhost" },
            "tags": ["a", "b"],
            "debug": true,
        }))
    }

    #[test]
    fn navigates_nested_paths() {
        let c = config();
        assert_eq!(c.get_int("database.max_conns"), Some(10));
        assert_eq!(c.get_string("database.host"), Some("localhost".to_owned()));
        assert_eq!(c.get_string_slice("tags"), Some(vec!["a".to_owned(), "b".to_owned()]));
        assert_eq!(c.get_bool("debug"), Some(true));
        assert!(c.has("database.max_conns"));
        assert!(!c.has("database.missing"));
    }

    #[test]
    fn deserializes_sub_section() {
        let c = config();
        let sub: Sub = c.deserialize_required("database").unwrap();
        assert_eq!(sub.max_conns, 10);
    }

    #[test]
    fn missing_section_falls_back_to_default() {
        let c = config();
        let sub: Sub = c.deserialize_or_default("nonexistent").unwrap();
        assert_eq!(sub, Sub::default());
    }
}
