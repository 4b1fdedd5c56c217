use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum whisper text length, in Unicode code points.
pub const MAX_TEXT_LEN: usize = 280;
/// Maximum "why here" note length, in Unicode code points.
pub const MAX_WHY_HERE_LEN: usize = 150;

/// Closed set of emotional tones a whisper can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Joy,
    Longing,
    Gratitude,
    Apology,
    Heartbreak,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Joy => "Joy",
            Tone::Longing => "Longing",
            Tone::Gratitude => "Gratitude",
            Tone::Apology => "Apology",
            Tone::Heartbreak => "Heartbreak",
        }
    }

    pub fn parse(s: &str) -> Option<Tone> {
        match s {
            "Joy" => Some(Tone::Joy),
            "Longing" => Some(Tone::Longing),
            "Gratitude" => Some(Tone::Gratitude),
            "Apology" => Some(Tone::Apology),
            "Heartbreak" => Some(Tone::Heartbreak),
            _ => None,
        }
    }
}

/// A WGS84 point. Latitude in degrees [-90, 90], longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Unlock policy attached to every whisper. `dwell_time` is carried for
/// clients but the server checks instantaneous proximity only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnlockConditions {
    /// Meters within which the whisper becomes unlockable.
    pub proximity_required: f64,
    /// Seconds of sustained presence (advisory, not enforced server-side).
    pub dwell_time: u32,
}

impl Default for UnlockConditions {
    fn default() -> Self {
        Self {
            proximity_required: 100.0,
            dwell_time: 60,
        }
    }
}

/// A single acknowledgement from one identity toward one whisper.
/// At most one per (whisper, session) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub kind: String,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An anonymous, immutable geotagged message. Only `reactions` and
/// `discovered_by` grow after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Whisper {
    pub id: Uuid,
    pub text: String,
    pub tone: Tone,
    pub location: Coordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why_here: Option<String>,
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<Uuid>,
    pub reactions: Vec<Reaction>,
    pub discovered_by: Vec<String>,
    pub unlock_conditions: UnlockConditions,
    pub created_at: DateTime<Utc>,
}

/// Cached per-account counters. `likes_received` is derived: always
/// recomputable as the sum of reaction counts over the account's whispers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AccountStats {
    pub whispers_created: u32,
    pub whispers_discovered: u32,
    pub reactions_given: u32,
    pub likes_received: u32,
}

/// Public view of an authenticated account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub stats: AccountStats,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_roundtrip() {
        for tone in [
            Tone::Joy,
            Tone::Longing,
            Tone::Gratitude,
            Tone::Apology,
            Tone::Heartbreak,
        ] {
            assert_eq!(Tone::parse(tone.as_str()), Some(tone));
        }
        assert_eq!(Tone::parse("Melancholy"), None);
    }

    #[test]
    fn coordinate_bounds() {
        let ok = Coordinates {
            latitude: 37.7749,
            longitude: -122.4194,
        };
        assert!(ok.is_valid());

        let bad_lat = Coordinates {
            latitude: 90.01,
            longitude: 0.0,
        };
        assert!(!bad_lat.is_valid());

        let nan = Coordinates {
            latitude: f64::NAN,
            longitude: 0.0,
        };
        assert!(!nan.is_valid());
    }
}
