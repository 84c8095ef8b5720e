//! HTTP handlers for registration and login.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use storage::{StoreError, UserStore};

use crate::password::{hash_password, verify_password};
use crate::token::TokenKeys;

/// Lifetime of tokens handed out by login.
const TOKEN_TTL_MINUTES: i64 = 15;

/// Shared state of the credential service.
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub keys: TokenKeys,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state)
}

/// Uniform response envelope.
#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    status_code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn ok<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    let body = Envelope {
        success: true,
        status_code: status.as_u16(),
        message: message.to_string(),
        data: Some(data),
    };
    (status, Json(body)).into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    let body = Envelope::<()> {
        success: false,
        status_code: status.as_u16(),
        message: message.to_string(),
        data: None,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct CredentialsRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Response {
    if req.username.is_empty() || req.password.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "username and password are required");
    }

    let hash = match hash_password(&req.password) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Password hashing failed: {}", e);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "registration failed");
        }
    };

    match state.users.create(&req.username, &hash).await {
        Ok(_) => {
            info!("Registered user {}", req.username);
            ok(StatusCode::CREATED, "registration successful", json!({}))
        }
        Err(StoreError::DuplicateUsername(_)) => {
            fail(StatusCode::CONFLICT, "username is already taken")
        }
        Err(e) => {
            warn!("Registration failed for {}: {}", req.username, e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "registration failed")
        }
    }
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Response {
    if req.username.is_empty() || req.password.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "username and password are required");
    }

    let user = match state.users.find_by_username(&req.username).await {
        Ok(Some(user)) => user,
        Ok(None) => return fail(StatusCode::UNAUTHORIZED, "invalid credentials"),
        Err(e) => {
            warn!("User lookup failed for {}: {}", req.username, e);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "login failed");
        }
    };

    if !verify_password(&user.password, &req.password) {
        return fail(StatusCode::UNAUTHORIZED, "invalid credentials");
    }

    match state
        .keys
        .mint(&user.username, Duration::minutes(TOKEN_TTL_MINUTES))
    {
        Ok(token) => {
            info!("User {} logged in", user.username);
            ok(StatusCode::OK, "login successful", TokenResponse { token })
        }
        Err(e) => {
            warn!("Token minting failed for {}: {}", user.username, e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "login failed")
        }
    }
}
