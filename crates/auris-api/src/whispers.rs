use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use auris_db::models::WhisperRow;
use auris_geo::BoundingBox;
use auris_types::api::{CreateWhisperRequest, NearbyQuery, NearbyWhisper, SessionQuery};
use auris_types::models::{Coordinates, MAX_TEXT_LEN, MAX_WHY_HERE_LEN, UnlockConditions, Whisper};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::MaybeClaims;
use crate::view::{now_rfc3339, whisper_views};

const MAX_NEARBY_LIMIT: u32 = 200;

pub async fn create_whisper(
    State(state): State<AppState>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Json(req): Json<CreateWhisperRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".into()));
    }
    if req.text.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::Validation(format!(
            "text exceeds {MAX_TEXT_LEN} characters"
        )));
    }
    if let Some(why) = &req.why_here {
        if why.chars().count() > MAX_WHY_HERE_LEN {
            return Err(ApiError::Validation(format!(
                "why_here exceeds {MAX_WHY_HERE_LEN} characters"
            )));
        }
    }
    if !req.location.is_valid() {
        return Err(ApiError::Validation("coordinates out of range".into()));
    }

    let whisper_id = Uuid::new_v4();
    let account_id = claims.map(|c| c.sub);
    let policy = UnlockConditions::default();

    let row = WhisperRow {
        id: whisper_id.to_string(),
        text: req.text,
        tone: req.tone.as_str().to_string(),
        lat: req.location.latitude,
        lng: req.location.longitude,
        why_here: req.why_here,
        session_id: req.session_id.to_string(),
        creator_id: account_id.map(|id| id.to_string()),
        proximity_required: policy.proximity_required,
        dwell_time: policy.dwell_time,
        created_at: now_rfc3339(),
    };

    // Run blocking DB work off the async runtime.
    let db = state.clone();
    let created: Vec<Whisper> = tokio::task::spawn_blocking(move || {
        if !db.db.session_is_active(&row.session_id)? {
            return Ok(None);
        }

        db.db.insert_whisper(&row)?;

        // An authenticated creator gets the whisper linked to their account
        // index right away; the reconcile path covers any miss later.
        if let Some(account_id) = account_id {
            db.db.link_whisper_to_account(
                &account_id.to_string(),
                &row.id,
                &now_rfc3339(),
            )?;
        }

        let row = db
            .db
            .get_whisper(&row.id)?
            .ok_or_else(|| anyhow::anyhow!("whisper vanished after insert"))?;
        whisper_views(&db.db, vec![row]).map(Some)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??
    .ok_or_else(|| ApiError::Validation("unknown or reset session".into()))?;

    let whisper = created
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("empty view for created whisper")))?;

    info!("Whisper {} created ({})", whisper.id, whisper.tone.as_str());
    Ok((StatusCode::CREATED, Json(whisper)))
}

/// Radius query: bounding-box prefilter against the (lat, lng) index, exact
/// haversine check on the survivors, most recent first. A whisper farther
/// than the radius is never returned, boundary inclusive.
pub async fn nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let center = Coordinates {
        latitude: query.lat,
        longitude: query.lng,
    };
    if !center.is_valid() {
        return Err(ApiError::Validation("coordinates out of range".into()));
    }
    if !query.radius.is_finite() || query.radius <= 0.0 {
        return Err(ApiError::Validation("radius must be positive".into()));
    }

    let radius = query.radius;
    let limit = query.limit.min(MAX_NEARBY_LIMIT) as usize;

    let db = state.clone();
    let whispers: Vec<NearbyWhisper> = tokio::task::spawn_blocking(move || {
        let in_range = nearby_rows(&db.db, center, radius, limit)?;
        let views = whisper_views(&db.db, in_range)?;
        Ok::<_, anyhow::Error>(
            views
                .into_iter()
                .map(|whisper| {
                    let distance = auris_geo::distance_meters(center, whisper.location);
                    let unlockable =
                        auris_geo::is_unlockable(distance, &whisper.unlock_conditions);
                    NearbyWhisper {
                        whisper,
                        distance_meters: distance,
                        unlockable,
                    }
                })
                .collect(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    debug!("nearby query returned {} whispers", whispers.len());
    Ok(Json(whispers))
}

/// Bounding-box prefilter over the index, then the exact great-circle check.
/// Recency order from the store survives the filter, so the newest in-range
/// whispers win the limit.
fn nearby_rows(
    db: &auris_db::Database,
    center: Coordinates,
    radius: f64,
    limit: usize,
) -> anyhow::Result<Vec<WhisperRow>> {
    let bbox = BoundingBox::around(center, radius);
    let rows = db.whispers_in_bbox(
        bbox.min_lat,
        bbox.max_lat,
        bbox.min_lng,
        bbox.max_lng,
        bbox.wraps(),
    )?;

    Ok(rows
        .into_iter()
        .filter(|row| {
            let point = Coordinates {
                latitude: row.lat,
                longitude: row.lng,
            };
            auris_geo::distance_meters(center, point) <= radius
        })
        .take(limit)
        .collect())
}

/// Whispers the caller created. Authenticated callers get their whole
/// account's output, after reconciling any whisper that carries their
/// creator id but missed the index. Anonymous callers get the session's.
pub async fn mine(
    State(state): State<AppState>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.map(|c| c.sub);

    let db = state.clone();
    let whispers: Vec<Whisper> = tokio::task::spawn_blocking(move || {
        let rows = match account_id {
            Some(account_id) => {
                let account_id = account_id.to_string();
                for whisper_id in db.db.unlinked_whisper_ids(&account_id)? {
                    db.db
                        .link_whisper_to_account(&account_id, &whisper_id, &now_rfc3339())?;
                }
                db.db.whispers_by_creator(&account_id)?
            }
            None => db.db.whispers_by_session(&query.session_id.to_string())?,
        };
        whisper_views(&db.db, rows)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(Json(whispers))
}

/// Whispers the caller has unlocked, with the same account/session split and
/// ledger-to-index reconciliation for authenticated callers.
pub async fn discovered(
    State(state): State<AppState>,
    Extension(MaybeClaims(claims)): Extension<MaybeClaims>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.map(|c| c.sub);

    let db = state.clone();
    let whispers: Vec<Whisper> = tokio::task::spawn_blocking(move || {
        let rows = match account_id {
            Some(account_id) => {
                let account_id = account_id.to_string();
                for whisper_id in db.db.unlinked_discovery_ids(&account_id)? {
                    db.db
                        .record_account_discovery(&account_id, &whisper_id, &now_rfc3339())?;
                }
                db.db.discovered_whispers_for_account(&account_id)?
            }
            None => db
                .db
                .discovered_whispers_for_identity(&query.session_id.to_string())?,
        };
        whisper_views(&db.db, rows)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })??;

    Ok(Json(whispers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use auris_db::Database;

    fn seed(db: &Database, id: &str, lat: f64, lng: f64) {
        db.insert_whisper(&WhisperRow {
            id: id.into(),
            text: "a small thing I never said out loud".into(),
            tone: "Heartbreak".into(),
            lat,
            lng,
            why_here: Some("this bench".into()),
            session_id: "s1".into(),
            creator_id: None,
            proximity_required: 100.0,
            dwell_time: 60,
            created_at: now_rfc3339(),
        })
        .unwrap();
    }

    #[test]
    fn nearby_finds_close_and_rejects_far() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "w1", 37.7749, -122.4194);

        // ~11 m north of the whisper.
        let close = Coordinates {
            latitude: 37.7750,
            longitude: -122.4194,
        };
        let found = nearby_rows(&db, close, 100.0, 50).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "w1");

        // ~5 km away with a 1 m radius must come back empty.
        let far = Coordinates {
            latitude: 37.8199,
            longitude: -122.4194,
        };
        assert!(nearby_rows(&db, far, 1.0, 50).unwrap().is_empty());
    }

    #[test]
    fn nearby_never_leaks_beyond_radius() {
        let db = Database::open_in_memory().unwrap();
        let center = Coordinates {
            latitude: 37.7749,
            longitude: -122.4194,
        };
        // A ring of whispers at increasing distances north of the center.
        for (i, meters) in [50.0, 150.0, 450.0, 900.0, 2_000.0].iter().enumerate() {
            let lat = center.latitude + meters / 111_320.0;
            seed(&db, &format!("w{i}"), lat, center.longitude);
        }

        let rows = nearby_rows(&db, center, 500.0, 50).unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            let p = Coordinates {
                latitude: row.lat,
                longitude: row.lng,
            };
            assert!(auris_geo::distance_meters(center, p) <= 500.0);
        }
    }

    #[test]
    fn nearby_spans_the_antimeridian() {
        let db = Database::open_in_memory().unwrap();
        // ~2.2 km west of the query center, on the far side of +/-180.
        seed(&db, "w-west", 0.0, -179.99);
        seed(&db, "w-distant", 0.0, 179.0);

        let center = Coordinates {
            latitude: 0.0,
            longitude: 179.99,
        };
        let rows = nearby_rows(&db, center, 5_000.0, 50).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["w-west"]);
    }

    #[test]
    fn nearby_caps_at_limit_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let center = Coordinates {
            latitude: 37.7749,
            longitude: -122.4194,
        };
        for i in 0..5 {
            db.insert_whisper(&WhisperRow {
                id: format!("w{i}"),
                text: "here".into(),
                tone: "Joy".into(),
                lat: center.latitude,
                lng: center.longitude,
                why_here: None,
                session_id: "s1".into(),
                creator_id: None,
                proximity_required: 100.0,
                dwell_time: 60,
                created_at: format!("2026-0{}-01T00:00:00.000000Z", i + 1),
            })
            .unwrap();
        }

        let rows = nearby_rows(&db, center, 100.0, 2).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["w4", "w3"]);
    }
}
