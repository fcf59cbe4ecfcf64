use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{Context, error::Result};

/// Per-operator session: gate position plus the session context.
///
/// `completed` is the set of stages that finished with a non-failed result;
/// it only ever grows within a session. The context is not serialized: a
/// session lives for one interactive run and is rebuilt from scratch on
/// restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub pipeline_id: String,
    /// The stage the operator is expected to trigger next
    pub current_stage_id: String,
    /// Stages that completed, in completion order
    pub completed: Vec<String>,
    pub status_message: Option<String>,
    #[serde(skip)]
    pub context: Context,
}

impl Session {
    pub fn new_from_stage(sid: String, stage_id: &str) -> Self {
        Self {
            id: sid,
            pipeline_id: "default".to_string(),
            current_stage_id: stage_id.to_string(),
            completed: Vec::new(),
            status_message: None,
            context: Context::new(),
        }
    }

    pub fn is_completed(&self, stage_id: &str) -> bool {
        self.completed.iter().any(|s| s == stage_id)
    }

    pub(crate) fn mark_completed(&mut self, stage_id: &str) {
        if !self.is_completed(stage_id) {
            self.completed.push(stage_id.to_string());
        }
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
