// Spherical Geometry
// Geocentric/geographic conversion, distance-azimuth and forward great-circle
// projection in the Engdahl convention

/// Geocentric conversion factor applied to tan(latitude).
pub const GEOCENTRIC_FLATTENING: f64 = 0.993305521;

/// Geocentric colatitude in radians for a geographic latitude in degrees.
pub fn geocentric_colat(lat_deg: f64) -> f64 {
    let lat = lat_deg.to_radians();
    if lat.abs() >= std::f64::consts::FRAC_PI_2 - 1e-12 {
        return if lat > 0.0 { 0.0 } else { std::f64::consts::PI };
    }
    std::f64::consts::FRAC_PI_2 - (GEOCENTRIC_FLATTENING * lat.tan()).atan()
}

/// Geographic latitude in degrees for a geocentric colatitude in radians.
pub fn geographic_lat(colat_rad: f64) -> f64 {
    let gc_lat = std::f64::consts::FRAC_PI_2 - colat_rad;
    if gc_lat.abs() >= std::f64::consts::FRAC_PI_2 - 1e-12 {
        return if gc_lat > 0.0 { 90.0 } else { -90.0 };
    }
    (gc_lat.tan() / GEOCENTRIC_FLATTENING).atan().to_degrees()
}

/// Epicentral distance and source-to-receiver azimuth, both in degrees, on
/// the geocentric sphere.
pub fn delaz(src_lat: f64, src_lon: f64, rcv_lat: f64, rcv_lon: f64) -> (f64, f64) {
    let t1 = geocentric_colat(src_lat);
    let t2 = geocentric_colat(rcv_lat);
    let dlon = (rcv_lon - src_lon).to_radians();
    let cos_d = t1.cos() * t2.cos() + t1.sin() * t2.sin() * dlon.cos();
    let delta = cos_d.clamp(-1.0, 1.0).acos();
    let az_y = dlon.sin() * t2.sin();
    let az_x = t2.cos() * t1.sin() - t2.sin() * t1.cos() * dlon.cos();
    let mut azimuth = az_y.atan2(az_x).to_degrees();
    if azimuth < 0.0 {
        azimuth += 360.0;
    }
    (delta.to_degrees(), azimuth)
}

/// Project a point `delta_deg` along `azimuth_deg` from the source on the
/// geocentric sphere, returning its geographic (lat, lon) in degrees.
pub fn project(src_lat: f64, src_lon: f64, azimuth_deg: f64, delta_deg: f64) -> (f64, f64) {
    let t1 = geocentric_colat(src_lat);
    let d = delta_deg.to_radians();
    let az = azimuth_deg.to_radians();
    let cos_t = t1.cos() * d.cos() + t1.sin() * d.sin() * az.cos();
    let t_b = cos_t.clamp(-1.0, 1.0).acos();
    let y = d.sin() * az.sin();
    let x = d.cos() * t1.sin() - d.sin() * t1.cos() * az.cos();
    let dlon = y.atan2(x);
    let mut lon = src_lon + dlon.to_degrees();
    if lon > 180.0 {
        lon -= 360.0;
    }
    if lon < -180.0 {
        lon += 360.0;
    }
    (geographic_lat(t_b), lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocentric_round_trip() {
        for lat in [-75.0, -30.0, 0.0, 12.34, 50.2075, 89.0] {
            let colat = geocentric_colat(lat);
            let back = geographic_lat(colat);
            assert!((back - lat).abs() < 1e-9, "{} -> {}", lat, back);
        }
    }

    #[test]
    fn test_equator_delaz() {
        // Two equatorial points 10 degrees apart in longitude.
        let (d, az) = delaz(0.0, 0.0, 0.0, 10.0);
        assert!((d - 10.0).abs() < 1e-9);
        assert!((az - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_pole_azimuth() {
        let (d, az) = delaz(0.0, 0.0, 45.0, 0.0);
        assert!((az - 0.0).abs() < 1e-9);
        // Geocentric distance is slightly less than 45 geographic degrees.
        assert!(d > 44.0 && d < 45.1);
    }

    #[test]
    fn test_project_inverts_delaz() {
        let (src_lat, src_lon) = (50.2075, -114.8603);
        let (rcv_lat, rcv_lon) = (49.0586, -113.9115);
        let (d, az) = delaz(src_lat, src_lon, rcv_lat, rcv_lon);
        let (lat, lon) = project(src_lat, src_lon, az, d);
        assert!((lat - rcv_lat).abs() < 1e-6);
        assert!((lon - rcv_lon).abs() < 1e-6);
    }

    #[test]
    fn test_project_halfway_on_path() {
        let (d, az) = delaz(10.0, 20.0, -10.0, 60.0);
        let (mid_lat, mid_lon) = project(10.0, 20.0, az, d / 2.0);
        let (d1, _) = delaz(10.0, 20.0, mid_lat, mid_lon);
        let (d2, _) = delaz(mid_lat, mid_lon, -10.0, 60.0);
        assert!((d1 + d2 - d).abs() < 1e-6);
    }
}
