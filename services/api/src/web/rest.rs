//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the query assistant's REST API and the master
//! definition for the OpenAPI specification.

use crate::adapters::db::SAMPLE_JOIN_QUERY;
use crate::web::protocol::{
    example_groups, ExampleGroup, GenerateRequest, GenerateResponse, GeneratedBy, HistoryItem,
    HistoryResponse, LoginRequest, LoginResponse, QueryResultResponse, RunRequest,
    SessionResponse,
};
use crate::web::state::{AppState, SessionId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use sql_assistant_core::domain::{SessionContext, HISTORY_DISPLAY_LIMIT};
use sql_assistant_core::ports::{PortError, SessionChange};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        session_handler,
        examples_handler,
        generate_handler,
        run_handler,
        sample_handler,
        history_handler,
        clear_history_handler,
        rerun_handler,
    ),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            SessionResponse,
            ExampleGroup,
            GenerateRequest,
            GenerateResponse,
            GeneratedBy,
            RunRequest,
            QueryResultResponse,
            HistoryItem,
            HistoryResponse,
        )
    ),
    tags(
        (name = "SQL Assistant API", description = "Ask questions in plain English, review the generated SQL and run it.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

type HandlerError = (StatusCode, String);

/// Maps a port failure onto the status code and message shown to the user.
fn port_error_response(e: PortError) -> HandlerError {
    match e {
        PortError::Generation(msg) => (
            StatusCode::BAD_GATEWAY,
            format!("Error calling the AI assistant: {}", msg),
        ),
        PortError::Execution(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Error executing query: {}", msg),
        ),
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("Unexpected error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            )
        }
    }
}

async fn load_session(state: &AppState, session_id: SessionId) -> Result<SessionContext, HandlerError> {
    state.sessions.load(session_id.0).await.map_err(|e| {
        warn!("Session {} vanished mid-request: {}", session_id.0, e);
        (StatusCode::UNAUTHORIZED, "Session expired".to_string())
    })
}

/// Applies `change` to the stored session in one step, after any model call or
/// query has finished.
async fn update_session(
    state: &AppState,
    session_id: SessionId,
    change: SessionChange,
) -> Result<SessionContext, HandlerError> {
    state.sessions.update(session_id.0, change).await.map_err(|e| match e {
        PortError::NotFound(_) => {
            warn!("Session {} vanished mid-request: {}", session_id.0, e);
            (StatusCode::UNAUTHORIZED, "Session expired".to_string())
        }
        other => {
            error!("Failed to update session {}: {:?}", session_id.0, other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update session".to_string())
        }
    })
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Current state of the caller's session.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Session state", body = SessionResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
) -> Result<impl IntoResponse, HandlerError> {
    let context = load_session(&state, session_id).await?;
    Ok(Json(SessionResponse {
        logged_in: context.logged_in,
        ai_enabled: state.generator.is_some(),
        current_question: context.current_question,
        generated_sql: context.generated_sql,
        history_len: context.query_history.len(),
    }))
}

/// Example questions, grouped by topic.
#[utoipa::path(
    get,
    path = "/examples",
    responses(
        (status = 200, description = "Example questions", body = [ExampleGroup])
    )
)]
pub async fn examples_handler() -> impl IntoResponse {
    Json(example_groups())
}

//=========================================================================================
// Query Handlers
//=========================================================================================

/// Generate SQL for a natural-language question.
///
/// When no model credential is configured the response carries a fixed example
/// query and `source = "fallback"`.
#[utoipa::path(
    post,
    path = "/queries/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "SQL generated", body = GenerateResponse),
        (status = 400, description = "Empty question"),
        (status = 404, description = "AI-assisted generation is disabled"),
        (status = 502, description = "The language model call failed")
    )
)]
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
    Json(req): Json<GenerateRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let Some(generator) = &state.generator else {
        return Err((
            StatusCode::NOT_FOUND,
            "AI-assisted generation is disabled".to_string(),
        ));
    };

    let question = req.question.trim();
    if question.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Please enter a question first.".to_string(),
        ));
    }

    let question = question.to_string();

    let asked = question.clone();
    let begin = move |ctx: &mut SessionContext| ctx.begin_question(&asked);
    update_session(&state, session_id, Box::new(begin)).await?;

    let generated = generator.generate(&question).await.map_err(|e| {
        error!("SQL generation failed: {}", e);
        port_error_response(e)
    })?;
    info!("Generated SQL ({:?}) for session {}", generated.source, session_id.0);

    let (asked, sql) = (question.clone(), generated.sql.clone());
    let record = move |ctx: &mut SessionContext| ctx.record_generated(asked, sql);
    update_session(&state, session_id, Box::new(record)).await?;

    Ok(Json(GenerateResponse {
        question,
        sql: generated.sql,
        source: generated.source.into(),
    }))
}

/// Execute SQL text verbatim and record it in the session history.
#[utoipa::path(
    post,
    path = "/queries/run",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Query executed", body = QueryResultResponse),
        (status = 400, description = "Empty SQL"),
        (status = 422, description = "The database rejected the query")
    )
)]
pub async fn run_handler(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
    Json(req): Json<RunRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    if req.sql.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Please enter a SQL query first.".to_string(),
        ));
    }

    let table = state
        .executor
        .execute(&req.sql)
        .await
        .map_err(port_error_response)?;

    let (sql, row_count) = (req.sql, table.row_count());
    let record = move |ctx: &mut SessionContext| ctx.record_execution(sql, row_count);
    update_session(&state, session_id, Box::new(record)).await?;

    Ok(Json(QueryResultResponse::from(table)))
}

/// Run the built-in demonstration join. History is not touched.
#[utoipa::path(
    post,
    path = "/queries/sample",
    responses(
        (status = 200, description = "Sample orders", body = QueryResultResponse),
        (status = 422, description = "The database rejected the query")
    )
)]
pub async fn sample_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let table = state
        .executor
        .execute(SAMPLE_JOIN_QUERY)
        .await
        .map_err(port_error_response)?;
    Ok(Json(QueryResultResponse::from(table)))
}

//=========================================================================================
// History Handlers
//=========================================================================================

/// The most recent history entries, newest first.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Recent queries", body = HistoryResponse)
    )
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
) -> Result<impl IntoResponse, HandlerError> {
    let context = load_session(&state, session_id).await?;
    let entries = context
        .recent_history(HISTORY_DISPLAY_LIMIT)
        .into_iter()
        .map(|(number, entry)| HistoryItem::new(number, entry))
        .collect();

    Ok(Json(HistoryResponse {
        total: context.query_history.len(),
        entries,
    }))
}

/// Forget the history together with the current question and SQL.
#[utoipa::path(
    delete,
    path = "/history",
    responses(
        (status = 204, description = "History cleared")
    )
)]
pub async fn clear_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
) -> Result<impl IntoResponse, HandlerError> {
    let clear = |ctx: &mut SessionContext| ctx.clear_history();
    update_session(&state, session_id, Box::new(clear)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-run a stored query exactly as it was recorded. History is not modified.
#[utoipa::path(
    post,
    path = "/history/{number}/rerun",
    params(
        ("number" = usize, Path, description = "1-based history entry number")
    ),
    responses(
        (status = 200, description = "Query executed", body = QueryResultResponse),
        (status = 404, description = "No such history entry"),
        (status = 422, description = "The database rejected the query")
    )
)]
pub async fn rerun_handler(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
    Path(number): Path<usize>,
) -> Result<impl IntoResponse, HandlerError> {
    let context = load_session(&state, session_id).await?;
    let sql = context
        .history_entry(number)
        .map(|entry| entry.sql.clone())
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No history entry {}", number)))?;

    let table = state
        .executor
        .execute(&sql)
        .await
        .map_err(port_error_response)?;
    Ok(Json(QueryResultResponse::from(table)))
}
