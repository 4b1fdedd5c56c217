use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use auris_types::api::DiscoverRequest;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::MaybeClaims;
use crate::view::now_rfc3339;

/// Record that an identity has unlocked a whisper. Idempotent: the ledger's
/// uniqueness constraint makes any repeat (including two racing requests)
/// a no-op, and account stats move only on the first insertion.
pub async fn discover(
    State(state): State<AppState>,
    Path(whisper_id): Path<Uuid>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Json(req): Json<DiscoverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.map(|c| c.sub);
    let session_id = req.session_id;

    let db = state.clone();
    let first = tokio::task::spawn_blocking(move || {
        let wid = whisper_id.to_string();
        if db.db.get_whisper(&wid)?.is_none() {
            return Ok(None);
        }

        let first = db.db.record_discovery(&wid, &session_id.to_string(), &now_rfc3339())?;

        if let Some(account_id) = account_id {
            let aid = account_id.to_string();
            // Ledger entry under the account identity keeps the discovery
            // attributable if the session is later reset, and feeds the
            // reconcile path on profile reads.
            db.db.record_discovery(&wid, &aid, &now_rfc3339())?;
            db.db.record_account_discovery(&aid, &wid, &now_rfc3339())?;
        }

        Ok::<_, anyhow::Error>(Some(first))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??
    .ok_or(ApiError::NotFound("whisper"))?;

    if first {
        info!("Whisper {} discovered by {}", whisper_id, session_id);
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "first_discovery": first,
    })))
}
