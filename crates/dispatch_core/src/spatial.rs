//! Spatial operations: haversine distance and H3 bucketing.
//!
//! The haversine formula on a spherical earth (radius 6371 km) is the
//! authoritative distance metric, used consistently for matching, fare
//! estimation and no-match diagnostics. H3 cells are only a bucketing
//! device for radius queries; exact distances are always recomputed from
//! raw coordinates.

use h3o::{CellIndex, LatLng, Resolution};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinate pairs, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// True when both components are finite and within valid geographic range.
pub fn valid_coords(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0
}

/// Bucket a coordinate into an H3 cell, or `None` for invalid coordinates.
pub fn cell_for(lat: f64, lon: f64, resolution: Resolution) -> Option<CellIndex> {
    LatLng::new(lat, lon).ok().map(|ll| ll.to_cell(resolution))
}

/// Average hexagon edge length for the resolutions the core supports.
fn avg_edge_km(resolution: Resolution) -> f64 {
    match resolution {
        Resolution::Seven => 1.22,
        Resolution::Eight => 0.461,
        Resolution::Nine => 0.174,
        Resolution::Ten => 0.0659,
        // Coarser or finer resolutions are not used for dispatch; fall back
        // to the finest supported edge so the ring over-covers.
        _ => 0.0659,
    }
}

/// Grid-disk ring count that is guaranteed to cover `radius_km` around a
/// cell at the given resolution. Over-covering is fine (callers filter by
/// exact haversine distance afterwards); under-covering would hide drivers.
pub fn ring_for_radius(radius_km: f64, resolution: Resolution) -> u32 {
    let edge = avg_edge_km(resolution);
    let rings = (radius_km / edge).ceil();
    if rings.is_finite() && rings >= 0.0 {
        rings as u32 + 1
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_same_point() {
        assert!(haversine_km(37.7749, -122.4194, 37.7749, -122.4194) < 1e-9);
    }

    #[test]
    fn haversine_sf_to_la_is_about_559km() {
        let d = haversine_km(37.7749, -122.4194, 34.0522, -118.2437);
        assert!((d - 559.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = haversine_km(37.78, -122.41, 37.80, -122.27);
        let b = haversine_km(37.80, -122.27, 37.78, -122.41);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn cell_for_rejects_invalid_coords() {
        assert!(cell_for(91.0, 0.0, Resolution::Nine).is_none());
        assert!(cell_for(37.7749, -122.4194, Resolution::Nine).is_some());
    }

    #[test]
    fn ring_covers_radius_with_margin() {
        // 5 km at resolution 9 needs at least ~29 rings.
        let k = ring_for_radius(5.0, Resolution::Nine);
        assert!(k >= 29, "got {k}");
        assert!(ring_for_radius(0.0, Resolution::Nine) >= 1);
    }

    #[test]
    fn nearby_cells_are_close_in_km() {
        let cell = cell_for(37.7749, -122.4194, Resolution::Nine).expect("cell");
        for neighbor in cell.grid_disk::<Vec<_>>(1) {
            let ll: LatLng = neighbor.into();
            let d = haversine_km(37.7749, -122.4194, ll.lat(), ll.lng());
            assert!(d < 1.0, "neighbor {neighbor} is {d} km away");
        }
    }
}
