//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request session handle.

use crate::config::Config;
use crate::web::auth::AccessGate;
use sql_assistant_core::generation::QueryGenerator;
use sql_assistant_core::ports::{QueryExecutionService, SessionStore};
use std::sync::Arc;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<AccessGate>,
    pub sessions: Arc<dyn SessionStore>,
    /// `None` when AI-assisted generation is switched off.
    pub generator: Option<QueryGenerator>,
    pub executor: Arc<dyn QueryExecutionService>,
}

//=========================================================================================
// SessionId (Specific to One Authenticated Request)
//=========================================================================================

/// The authenticated session, inserted into request extensions by `require_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(pub Uuid);
