use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::{debug, error};
use uuid::Uuid;

use auris_types::api::ReactRequest;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::MaybeClaims;
use crate::view::now_rfc3339;

/// One acknowledgement per identity per whisper. A duplicate is the
/// user-facing `AlreadyReacted` condition, not a system failure. On the
/// first insertion the creator's likes_received is recounted from scratch,
/// never incremented, so any stat drift from an earlier partial write
/// heals here.
pub async fn react(
    State(state): State<AppState>,
    Path(whisper_id): Path<Uuid>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Json(req): Json<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.map(|c| c.sub);
    let session_id = req.session_id;

    let db = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let wid = whisper_id.to_string();
        let Some(whisper) = db.db.get_whisper(&wid)? else {
            return Ok(Outcome::MissingWhisper);
        };

        if !db.db.add_reaction(&wid, &session_id.to_string(), &now_rfc3339())? {
            return Ok(Outcome::AlreadyReacted);
        }

        if let Some(creator_id) = whisper.creator_id.as_deref() {
            let total = db.db.recompute_likes_received(creator_id)?;
            debug!("creator {} likes_received recounted to {}", creator_id, total);
        }
        if let Some(account_id) = account_id {
            db.db.bump_reactions_given(&account_id.to_string())?;
        }

        Ok::<_, anyhow::Error>(Outcome::Reacted)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    match outcome {
        Outcome::MissingWhisper => Err(ApiError::NotFound("whisper")),
        Outcome::AlreadyReacted => Err(ApiError::AlreadyReacted),
        Outcome::Reacted => Ok(Json(serde_json::json!({ "success": true }))),
    }
}

enum Outcome {
    Reacted,
    AlreadyReacted,
    MissingWhisper,
}
