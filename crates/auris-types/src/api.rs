use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Account, Coordinates, Tone, Whisper};

// -- JWT Claims --

/// JWT claims shared between the auth handlers (token issuance) and the
/// middleware (token validation). Canonical definition lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub account: Account,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetSessionRequest {
    pub old_session_id: Uuid,
}

// -- Whispers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWhisperRequest {
    pub text: String,
    pub tone: Tone,
    pub location: Coordinates,
    pub why_here: Option<String>,
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_radius() -> f64 {
    5000.0
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Uuid,
}

/// A whisper as seen from a nearby query: the record plus the requester's
/// computed distance and whether the unlock policy is satisfied from here.
#[derive(Debug, Serialize)]
pub struct NearbyWhisper {
    #[serde(flatten)]
    pub whisper: Whisper,
    pub distance_meters: f64,
    pub unlockable: bool,
}

// -- Discovery & reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoverRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactRequest {
    pub session_id: Uuid,
}
