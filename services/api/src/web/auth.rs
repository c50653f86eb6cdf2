//! services/api/src/web/auth.rs
//!
//! The password gate in front of the assistant, plus the login and logout endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Duration;
use sql_assistant_core::domain::SessionContext;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{AppSecret, ConfigError};
use crate::web::middleware::session_id_from_headers;
use crate::web::protocol::{LoginRequest, LoginResponse};
use crate::web::state::AppState;

//=========================================================================================
// AccessGate
//=========================================================================================

/// Compares login attempts against the configured application password.
pub struct AccessGate {
    password_hash: String,
}

impl AccessGate {
    /// Builds the gate from configuration. A plaintext secret is hashed here so that
    /// only the hash is kept in memory.
    pub fn from_secret(secret: &AppSecret) -> Result<Self, ConfigError> {
        let password_hash = match secret {
            AppSecret::Hashed(hash) => {
                PasswordHash::new(hash).map_err(|e| {
                    ConfigError::InvalidValue("APP_PASSWORD_HASH".to_string(), e.to_string())
                })?;
                hash.clone()
            }
            AppSecret::Plain(password) => {
                let salt = SaltString::generate(&mut OsRng);
                Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| {
                        ConfigError::InvalidValue("APP_PASSWORD".to_string(), e.to_string())
                    })?
                    .to_string()
            }
        };
        Ok(Self { password_hash })
    }

    /// Returns `true` only for an exact match. The empty string never matches.
    pub fn verify(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                error!("Stored password hash is unreadable: {:?}", e);
                false
            }
        }
    }
}

fn session_cookie(session_id: Uuid, max_age: Duration, secure: bool) -> String {
    format!(
        "session={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        session_id,
        if secure { " Secure;" } else { "" },
        max_age.num_seconds()
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Unlock the assistant with the application password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "No password entered"),
        (status = 401, description = "Incorrect password"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Reject empty input outright
    if req.password.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Please enter a password".to_string()));
    }

    // 2. Verify the password on the blocking pool
    let gate = state.gate.clone();
    let valid = tokio::task::spawn_blocking(move || gate.verify(&req.password))
        .await
        .map_err(|e| {
            error!("Password verification task failed: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
        })?;

    if !valid {
        warn!("Rejected login attempt");
        return Err((StatusCode::UNAUTHORIZED, "Incorrect password".to_string()));
    }

    // 3. Drop sessions nobody has used for a while
    let idle = Duration::minutes(state.config.session_idle_minutes);
    match state.sessions.purge_idle(idle).await {
        Ok(0) => {}
        Ok(purged) => info!("Purged {} idle sessions", purged),
        Err(e) => warn!("Failed to purge idle sessions: {:?}", e),
    }

    // 4. Create the authorized session
    let mut context = SessionContext::new();
    context.logged_in = true;
    let session_id = state.sessions.create(context).await.map_err(|e| {
        error!("Failed to create session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
    })?;
    info!("Session {} logged in", session_id);

    // 5. Return response with cookie
    let cookie = session_cookie(session_id, idle, state.config.cookie_secure);
    let response = LoginResponse {
        logged_in: true,
        ai_enabled: state.generator.is_some(),
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Lock the assistant again and forget the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Extract the session from the cookie
    let session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // 2. Forget the session
    state.sessions.remove(session_id).await.map_err(|e| {
        error!("Failed to remove session: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;
    info!("Session {} logged out", session_id);

    // 3. Clear cookie
    let cookie = "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
