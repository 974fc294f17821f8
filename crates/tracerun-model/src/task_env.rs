use serde::{Deserialize, Serialize};

use crate::{KeyValue, ModelError};

/// Environment variables passed into the task's base environment.
///
/// Stored as an ordered list of key–value pairs and serialized as a plain array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskEnv(pub Vec<KeyValue>);

impl TaskEnv {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Get the value for a key, returning the last matching entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    /// Append a key–value pair. Later entries override earlier ones in [`TaskEnv::get`].
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Builder-style [`TaskEnv::push`].
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.push(key, value);
        self
    }

    /// Keys must be non-empty and must not contain `=` or NUL.
    pub fn validate(&self) -> Result<(), ModelError> {
        for kv in self.iter() {
            let key = kv.key();
            if key.is_empty() || key.contains('=') || key.contains('\0') {
                return Err(ModelError::InvalidEnvKey(key.to_string()));
            }
        }
        Ok(())
    }

    /// Render as `KEY=VALUE` strings, last write wins, first-seen order kept.
    pub fn to_assignments(&self) -> Vec<String> {
        let mut keys: Vec<&str> = Vec::new();
        for kv in self.iter() {
            if !keys.contains(&kv.key()) {
                keys.push(kv.key());
            }
        }
        keys.into_iter()
            .filter_map(|k| self.get(k).map(|v| format!("{k}={v}")))
            .collect()
    }
}
