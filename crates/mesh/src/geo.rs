//! Geographic distance and latency estimation.
//!
//! Route selection never measures the network; it estimates latency from
//! stored node coordinates through a configured curve.

use geo::{point, HaversineDistance};

use loomnet_core::config::LatencyCurve;

/// Great-circle distance between two `(latitude, longitude)` pairs in
/// kilometers.
pub fn distance_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let pa = point!(x: a.1, y: a.0);
    let pb = point!(x: b.1, y: b.0);
    pa.haversine_distance(&pb) / 1000.0
}

/// Map a distance onto an expected one-hop latency.
pub fn leg_latency_ms(curve: &LatencyCurve, distance_km: f64) -> f64 {
    curve.base_ms + curve.ms_per_km * distance_km
}

/// How much longer the path source -> via.. -> dest is than the direct
/// line, as a ratio. A relay sitting on the corridor scores near 1.0.
pub fn detour_ratio(source: (f64, f64), via: &[(f64, f64)], dest: (f64, f64)) -> f64 {
    let direct = distance_km(source, dest).max(1.0);
    let mut total = 0.0;
    let mut previous = source;
    for point in via {
        total += distance_km(previous, *point);
        previous = *point;
    }
    total += distance_km(previous, dest);
    total / direct
}
