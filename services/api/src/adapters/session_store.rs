//! services/api/src/adapters/session_store.rs
//!
//! Process-local implementation of the `SessionStore` port. Session contexts live
//! only in memory and disappear when the server restarts.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sql_assistant_core::domain::SessionContext;
use sql_assistant_core::ports::{PortError, PortResult, SessionChange, SessionStore};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionContext>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, context: SessionContext) -> PortResult<Uuid> {
        let session_id = Uuid::new_v4();
        self.sessions.write().await.insert(session_id, context);
        Ok(session_id)
    }

    async fn load(&self, session_id: Uuid) -> PortResult<SessionContext> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn update(&self, session_id: Uuid, change: SessionChange) -> PortResult<SessionContext> {
        let mut sessions = self.sessions.write().await;
        let context = sessions
            .get_mut(&session_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        change(context);
        context.touch();
        Ok(context.clone())
    }

    async fn remove(&self, session_id: Uuid) -> PortResult<()> {
        self.sessions.write().await.remove(&session_id);
        Ok(())
    }

    async fn purge_idle(&self, max_idle: Duration) -> PortResult<usize> {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, ctx| ctx.last_accessed_at >= cutoff);
        Ok(before - sessions.len())
    }
}
