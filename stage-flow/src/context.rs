use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{FlowError, Result};

/// Session-scoped key/value store shared between stages.
///
/// Values are serde round-tripped on every access, so stages always work on
/// owned copies and never hold references into the store.
#[derive(Clone, Debug, Default)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: impl serde::Serialize) {
        let value = serde_json::to_value(value).expect("value must serialize");
        self.data.insert(key.into(), value);
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Fetch a value that must be present, mapping absence (or a shape
    /// mismatch) to a context error.
    pub async fn require<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)
            .await
            .ok_or_else(|| FlowError::ContextError(format!("{key} not found in session context")))
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
    }
}
