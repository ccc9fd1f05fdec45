//! Account API handlers
//!
//! Tier upgrades and the transaction ledger, for the authenticated caller.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::handlers::{bad_request, not_found, server_error, ApiError, ErrorBody};
use crate::auth::middleware::AuthUser;
use crate::models::Transaction;
use crate::services::ledger::LedgerError;
use crate::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UpgradeResponse {
    pub msg: String,
    pub tier: i32,
    pub balance: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Buy the next tier
/// POST /api/auth/upgrade-tier
pub async fn upgrade_tier(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<UpgradeResponse>, ApiError> {
    match state.ledger.upgrade_tier(auth_user.id).await {
        Ok(next) => Ok(Json(UpgradeResponse {
            msg: format!("Successfully upgraded to Tier {}", next.tier),
            tier: next.tier,
            balance: next.balance,
        })),
        Err(err) => Err(match err {
            // An unknown user is a 400 on this route, not a 404.
            LedgerError::UserNotFound | LedgerError::AlreadyMaxTier => {
                bad_request(err.to_string())
            }
            LedgerError::InsufficientBalance { required, current } => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new(err.to_string()).with_shortfall(required, current)),
            ),
            LedgerError::Store(_) => {
                tracing::error!("Tier upgrade failed for {}: {}", auth_user.id, err);
                server_error(err)
            }
        }),
    }
}

/// The caller's transactions, oldest first
/// GET /api/auth/transactions
pub async fn transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    match state.ledger.transactions(auth_user.id).await {
        Ok(log) => Ok(Json(log)),
        Err(err @ LedgerError::UserNotFound) => Err(not_found(err.to_string())),
        Err(err) => {
            tracing::error!("Transaction fetch failed for {}: {}", auth_user.id, err);
            Err(server_error(err))
        }
    }
}
