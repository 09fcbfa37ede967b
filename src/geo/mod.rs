use crate::models::delivery::GeoPoint;

// Fleet home region; addresses without a real geocoder land near here.
const CENTER: GeoPoint = GeoPoint {
    lat: -23.5505,
    lng: -46.6333,
};

const JITTER_DEGREES: f64 = 0.05;

/// Approximate coordinates for a free-text address: a deterministic point
/// scattered around the fleet's home region. Good enough for map pins and
/// optimizer hints; not real geocoding.
pub fn approximate_coordinates(address: &str) -> Option<GeoPoint> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return None;
    }

    let hash = fnv1a(trimmed.as_bytes());
    let lat_unit = (hash as u32) as f64 / u32::MAX as f64;
    let lng_unit = ((hash >> 32) as u32) as f64 / u32::MAX as f64;

    Some(GeoPoint {
        lat: CENTER.lat + (lat_unit - 0.5) * 2.0 * JITTER_DEGREES,
        lng: CENTER.lng + (lng_unit - 0.5) * 2.0 * JITTER_DEGREES,
    })
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
