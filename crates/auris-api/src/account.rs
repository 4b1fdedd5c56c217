use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::{error, info};

use auris_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::view::{account_view, now_rfc3339};

/// Account view with freshly reconciled indices and recounted stats. The
/// reconcile steps are repeat-safe appends, so a profile read is always a
/// safe time to heal drift left by earlier partial writes.
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub.to_string();

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        for whisper_id in db.db.unlinked_whisper_ids(&account_id)? {
            db.db
                .link_whisper_to_account(&account_id, &whisper_id, &now_rfc3339())?;
        }
        for whisper_id in db.db.unlinked_discovery_ids(&account_id)? {
            db.db
                .record_account_discovery(&account_id, &whisper_id, &now_rfc3339())?;
        }
        db.db.recompute_likes_received(&account_id)?;

        db.db.get_account_by_id(&account_id)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??
    .ok_or(ApiError::NotFound("account"))?;

    Ok(Json(account_view(&row)))
}

/// Delete every whisper this account created and zero its indices and
/// stats. Whispers the account merely discovered belong to other creators
/// and stay untouched.
pub async fn reset_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub.to_string();

    let db = state.clone();
    let deleted_count = tokio::task::spawn_blocking(move || {
        if db.db.get_account_by_id(&account_id)?.is_none() {
            return Ok(None);
        }
        db.db.reset_account_content(&account_id).map(Some)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??
    .ok_or(ApiError::NotFound("account"))?;

    info!(
        "Account {} reset: {} whispers deleted",
        claims.sub, deleted_count
    );
    Ok(Json(serde_json::json!({
        "success": true,
        "whispers_deleted": deleted_count,
    })))
}

/// Remove the account principal. Its whispers stay in the store with an
/// orphaned creator id: content outlives the identity.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub.to_string();

    let db = state.clone();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_account(&account_id))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })??;

    if !deleted {
        return Err(ApiError::NotFound("account"));
    }

    info!("Account {} deleted; its whispers remain anonymous", claims.sub);
    Ok(Json(serde_json::json!({ "success": true })))
}
