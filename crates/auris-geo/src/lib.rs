//! Proximity math for whisper discovery. Pure functions only; all unlock
//! state lives in the discovery ledger, not here.

use auris_types::models::{Coordinates, UnlockConditions};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters, via the haversine
/// formula. The value fed to `asin` is clamped to [0, 1] so floating-point
/// overshoot near antipodal points can never produce NaN.
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Whether a requester at `distance` meters satisfies the whisper's unlock
/// policy. Boundary is inclusive. Dwell time is advisory and not checked.
pub fn is_unlockable(distance: f64, policy: &UnlockConditions) -> bool {
    distance <= policy.proximity_required
}

/// A latitude/longitude rectangle guaranteed to contain every point within
/// `radius_m` of `center`. Used to prefilter indexed rows before the exact
/// haversine check; it over-approximates, never under.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn around(center: Coordinates, radius_m: f64) -> Self {
        // One degree of latitude is ~111,320 m everywhere.
        let lat_delta = radius_m / 111_320.0;

        // Longitude degrees shrink with the cosine of latitude. Near the
        // poles the box degenerates to the full longitude range.
        let cos_lat = center.latitude.to_radians().cos();
        let lng_delta = if cos_lat > 1e-6 {
            radius_m / (111_320.0 * cos_lat)
        } else {
            180.0
        };

        // A box reaching past +/-180 wraps around instead of clamping, so a
        // query near the antimeridian still sees whispers on the far side.
        // `min_lng > max_lng` marks the wrapped case.
        let (min_lng, max_lng) = if lng_delta >= 180.0 {
            (-180.0, 180.0)
        } else {
            (
                wrap_longitude(center.longitude - lng_delta),
                wrap_longitude(center.longitude + lng_delta),
            )
        };

        Self {
            min_lat: (center.latitude - lat_delta).max(-90.0),
            max_lat: (center.latitude + lat_delta).min(90.0),
            min_lng,
            max_lng,
        }
    }

    /// True when the longitude range crosses the antimeridian and must be
    /// read as two intervals, [min_lng, 180] and [-180, max_lng].
    pub fn wraps(&self) -> bool {
        self.min_lng > self.max_lng
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        let lat_ok = point.latitude >= self.min_lat && point.latitude <= self.max_lat;
        let lng_ok = if self.wraps() {
            point.longitude >= self.min_lng || point.longitude <= self.max_lng
        } else {
            point.longitude >= self.min_lng && point.longitude <= self.max_lng
        };
        lat_ok && lng_ok
    }
}

/// Normalize a longitude into [-180, 180].
fn wrap_longitude(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}
