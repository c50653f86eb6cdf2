//! crates/sql_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::domain::{QueryTable, SessionContext};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The language model could not produce a query.
    #[error("Query generation failed: {0}")]
    Generation(String),
    /// The database rejected or failed to run a statement.
    #[error("{0}")]
    Execution(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// An in-place edit of a session, applied atomically by a `SessionStore`.
pub type SessionChange = Box<dyn FnOnce(&mut SessionContext) + Send>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Sends a system instruction and a prompt to a text model and returns its raw answer.
    async fn complete(&self, system: &str, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait QueryExecutionService: Send + Sync {
    /// Runs a SQL statement verbatim and materializes its result set.
    async fn execute(&self, sql: &str) -> PortResult<QueryTable>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, context: SessionContext) -> PortResult<Uuid>;

    async fn load(&self, session_id: Uuid) -> PortResult<SessionContext>;

    /// Applies `change` to the stored context in one step and returns the result.
    /// Concurrent updates to the same session never overwrite each other.
    async fn update(&self, session_id: Uuid, change: SessionChange) -> PortResult<SessionContext>;

    async fn remove(&self, session_id: Uuid) -> PortResult<()>;

    /// Drops every session idle for longer than `max_idle`, returning how many were removed.
    async fn purge_idle(&self, max_idle: Duration) -> PortResult<usize>;
}
