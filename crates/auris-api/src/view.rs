//! Row-to-API assembly shared by the whisper, discovery and account handlers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use auris_db::Database;
use auris_db::models::{AccountRow, WhisperRow};
use auris_types::models::{
    Account, AccountStats, Coordinates, Reaction, Tone, UnlockConditions, Whisper,
};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub fn parse_created_at(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') default stores "YYYY-MM-DD HH:MM:SS"
            // without timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

fn parse_uuid(raw: &str, field: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on {}: {}", field, raw, context, e);
        Uuid::default()
    })
}

pub fn account_view(row: &AccountRow) -> Account {
    Account {
        id: parse_uuid(&row.id, "id", "account"),
        username: row.username.clone(),
        email: row.email.clone(),
        display_name: row.display_name.clone(),
        bio: row.bio.clone(),
        stats: AccountStats {
            whispers_created: row.whispers_created,
            whispers_discovered: row.whispers_discovered,
            reactions_given: row.reactions_given,
            likes_received: row.likes_received,
        },
        created_at: parse_created_at(&row.created_at, "account"),
    }
}

/// Assemble full whisper views for a page of rows, batch-fetching reactions
/// and discoverer identities in two queries instead of 2N.
pub fn whisper_views(db: &Database, rows: Vec<WhisperRow>) -> anyhow::Result<Vec<Whisper>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut reaction_map: HashMap<String, Vec<Reaction>> = HashMap::new();
    for r in db.reactions_for_whispers(&ids)? {
        reaction_map
            .entry(r.whisper_id.clone())
            .or_default()
            .push(Reaction {
                kind: r.kind,
                session_id: parse_uuid(&r.session_id, "session_id", "reaction"),
                created_at: parse_created_at(&r.created_at, "reaction"),
            });
    }

    let mut discoverer_map: HashMap<String, Vec<String>> = HashMap::new();
    for (whisper_id, identity) in db.discoverers_for_whispers(&ids)? {
        discoverer_map.entry(whisper_id).or_default().push(identity);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let reactions = reaction_map.remove(&row.id).unwrap_or_default();
            let discovered_by = discoverer_map.remove(&row.id).unwrap_or_default();

            let tone = Tone::parse(&row.tone).unwrap_or_else(|| {
                warn!("Corrupt tone '{}' on whisper '{}'", row.tone, row.id);
                Tone::Joy
            });

            Whisper {
                id: parse_uuid(&row.id, "id", "whisper"),
                text: row.text,
                tone,
                location: Coordinates {
                    latitude: row.lat,
                    longitude: row.lng,
                },
                why_here: row.why_here,
                session_id: parse_uuid(&row.session_id, "session_id", "whisper"),
                creator_id: row
                    .creator_id
                    .as_deref()
                    .map(|id| parse_uuid(id, "creator_id", "whisper")),
                reactions,
                discovered_by,
                unlock_conditions: UnlockConditions {
                    proximity_required: row.proximity_required,
                    dwell_time: row.dwell_time,
                },
                created_at: parse_created_at(&row.created_at, "whisper"),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auris_db::models::WhisperRow;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_whisper(&WhisperRow {
            id: "11111111-1111-1111-1111-111111111111".into(),
            text: "thank you, whoever you are".into(),
            tone: "Gratitude".into(),
            lat: 48.8584,
            lng: 2.2945,
            why_here: None,
            session_id: "22222222-2222-2222-2222-222222222222".into(),
            creator_id: None,
            proximity_required: 100.0,
            dwell_time: 60,
            created_at: now_rfc3339(),
        })
        .unwrap();
        db
    }

    #[test]
    fn views_carry_reactions_and_discoverers() {
        let db = seeded_db();
        let wid = "11111111-1111-1111-1111-111111111111";
        db.add_reaction(wid, "33333333-3333-3333-3333-333333333333", &now_rfc3339())
            .unwrap();
        db.record_discovery(wid, "s-anon", &now_rfc3339()).unwrap();

        let rows = db.whispers_by_session("22222222-2222-2222-2222-222222222222").unwrap();
        let views = whisper_views(&db, rows).unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].tone, Tone::Gratitude);
        assert_eq!(views[0].reactions.len(), 1);
        assert_eq!(views[0].reactions[0].kind, "acknowledgement");
        assert_eq!(views[0].discovered_by, vec!["s-anon".to_string()]);
    }

    #[test]
    fn sqlite_default_timestamps_still_parse() {
        let ts = parse_created_at("2026-08-30 12:00:00", "whisper");
        assert_eq!(ts.to_rfc3339(), "2026-08-30T12:00:00+00:00");
    }
}
