/// Database row types that map directly to SQLite rows.
/// Distinct from auris-types API models to keep the DB layer independent.

pub struct SessionRow {
    pub id: String,
    pub revoked: bool,
    pub created_at: String,
}

pub struct AccountRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub whispers_created: u32,
    pub whispers_discovered: u32,
    pub reactions_given: u32,
    pub likes_received: u32,
    pub created_at: String,
}

pub struct WhisperRow {
    pub id: String,
    pub text: String,
    pub tone: String,
    pub lat: f64,
    pub lng: f64,
    pub why_here: Option<String>,
    pub session_id: String,
    pub creator_id: Option<String>,
    pub proximity_required: f64,
    pub dwell_time: u32,
    pub created_at: String,
}

pub struct ReactionRow {
    pub whisper_id: String,
    pub session_id: String,
    pub kind: String,
    pub created_at: String,
}
