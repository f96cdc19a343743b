//! Thread store: narrow persistence seam for multi-turn callers.
//!
//! The loop itself never touches this; callers that keep per-thread context
//! between runs load it, fold it into the next `TaskSpec`, and save the
//! outcome back. Context passing stays explicit.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::PipelineError;

/// Load/save one JSON value per thread id.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<Value>, PipelineError>;
    async fn save(&self, thread_id: &str, value: Value) -> Result<(), PipelineError>;
}

/// Process-local thread store on a concurrent map.
#[derive(Default)]
pub struct InMemoryThreadStore {
    entries: DashMap<String, Value>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Value>, PipelineError> {
        Ok(self.entries.get(thread_id).map(|entry| entry.clone()))
    }

    async fn save(&self, thread_id: &str, value: Value) -> Result<(), PipelineError> {
        self.entries.insert(thread_id.to_string(), value);
        Ok(())
    }
}
