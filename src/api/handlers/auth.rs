//! Auth API handlers
//!
//! Registration and login endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::handlers::{bad_request, server_error, ApiError};
use crate::models::{LoginRequest, PublicUser, RegisterRequest};
use crate::services::identity::IdentityError;
use crate::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub msg: String,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: PublicUser,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new account
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let user_id = state
        .identity
        .register(req)
        .await
        .map_err(map_identity_error)?;

    Ok(Json(RegisterResponse {
        msg: "Registered successfully".to_string(),
        user_id,
    }))
}

/// Log in with email and password
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let session = state
        .identity
        .authenticate(req)
        .await
        .map_err(map_identity_error)?;

    Ok(Json(LoginResponse {
        token: session.token,
        user: session.user,
    }))
}

fn map_identity_error(err: IdentityError) -> ApiError {
    match err {
        IdentityError::MissingFields
        | IdentityError::MissingCredentials
        | IdentityError::AlreadyExists
        | IdentityError::InvalidCredentials => bad_request(err.to_string()),
        IdentityError::Store(_) | IdentityError::Hash(_) | IdentityError::Token(_) => {
            tracing::error!("Identity operation failed: {}", err);
            server_error(err)
        }
    }
}
