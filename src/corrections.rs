// Travel-Time Corrections
// Pure functions for elevation, ellipticity, bounce-point and pwP water-layer
// adjustments

use crate::model::WaveType;

/// Default near-receiver P velocity, km/s.
pub const DEFVP: f64 = 5.80;
/// Default near-receiver S velocity, km/s.
pub const DEFVS: f64 = 3.46;
/// Default water-column velocity, km/s.
pub const DEFVW: f64 = 1.50;

/// Ocean threshold for a pwP bounce, km (bounce elevation at or below this).
pub const PWP_OCEAN_ELEV_KM: f64 = -1.5;
/// Fixed pwP post-correction offset in seconds; kept verbatim from the
/// operational tables.
pub const PWP_OFFSET_SECONDS: f64 = -4.67;

fn default_velocity(wave: WaveType) -> f64 {
    match wave {
        WaveType::P => DEFVP,
        WaveType::S => DEFVS,
    }
}

/// One-way elevation correction in seconds for a station `elev_km` above the
/// ellipsoid, with `p_skm` the ray parameter in s/km of surface arc.
pub fn elevation_correction(elev_km: f64, p_skm: f64, wave: WaveType) -> f64 {
    let v = default_velocity(wave);
    let vp = (v * p_skm).powi(2).min(1.0);
    elev_km / v * (1.0 - vp).sqrt()
}

/// One-way bounce-point topography correction, same vertical-slowness form as
/// the elevation correction.
pub fn topo_correction(elev_km: f64, p_skm: f64, wave: WaveType) -> f64 {
    elevation_correction(elev_km, p_skm, wave)
}

/// Dziewonski-Gilbert ellipticity correction from the three interpolated
/// coefficients, the source geocentric colatitude and the source-to-receiver
/// azimuth (radians).
pub fn ellipticity_correction(coeffs: (f64, f64, f64), colat: f64, azimuth: f64) -> f64 {
    let (t0, t1, t2) = coeffs;
    let sqrt3_2 = 3.0f64.sqrt() / 2.0;
    let f0 = 0.25 * (1.0 + 3.0 * (2.0 * colat).cos());
    let f1 = sqrt3_2 * (2.0 * colat).sin() * azimuth.cos();
    let f2 = sqrt3_2 * colat.sin().powi(2) * (2.0 * azimuth).cos();
    f0 * t0 + f1 * t1 + f2 * t2
}

/// Two-way surface-bounce correction: doubled for a same-type reflection,
/// summed per type for a converted bounce.
pub fn bounce_correction(elev_km: f64, p_skm: f64, down: WaveType, up: WaveType) -> f64 {
    if down == up {
        2.0 * topo_correction(elev_km, p_skm, down)
    } else {
        topo_correction(elev_km, p_skm, down) + topo_correction(elev_km, p_skm, up)
    }
}

/// pwP adjustment relative to the corrected pP time, valid only when the
/// bounce elevation is oceanic. The water column replaces the crustal bounce
/// correction, plus the fixed operational offset.
pub fn pwp_correction(bounce_elev_km: f64, p_skm: f64) -> Option<f64> {
    if bounce_elev_km > PWP_OCEAN_ELEV_KM {
        return None;
    }
    let depth = -bounce_elev_km;
    let vw = (DEFVW * p_skm).powi(2).min(1.0);
    let water = depth / DEFVW * (1.0 - vw).sqrt();
    let crust = topo_correction(depth, p_skm, WaveType::P);
    Some(2.0 * (water - crust) + PWP_OFFSET_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_sign_and_magnitude() {
        // A station 1 km up delays a steep P by a bit under 1/5.8 s.
        let c = elevation_correction(1.0, 0.01, WaveType::P);
        assert!(c > 0.15 && c < 1.0 / DEFVP);
        // Below sea level the correction is negative.
        assert!(elevation_correction(-2.0, 0.01, WaveType::P) < 0.0);
        // Grazing rays get no vertical delay.
        let grazing = elevation_correction(1.0, 1.0 / DEFVP, WaveType::P);
        assert!(grazing.abs() < 1e-12);
    }

    #[test]
    fn test_ellipticity_polar_symmetry() {
        // At the pole the azimuth terms vanish.
        let coeffs = (-1.0, 0.5, 0.25);
        let at_pole = ellipticity_correction(coeffs, 0.0, 1.234);
        assert!((at_pole - -1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounce_converted_vs_same() {
        let same = bounce_correction(2.0, 0.02, WaveType::P, WaveType::P);
        let conv = bounce_correction(2.0, 0.02, WaveType::P, WaveType::S);
        assert!((same - 2.0 * topo_correction(2.0, 0.02, WaveType::P)).abs() < 1e-12);
        // The S leg spends longer in the extra crust.
        assert!(conv > same);
    }

    #[test]
    fn test_pwp_requires_ocean() {
        assert!(pwp_correction(-1.0, 0.02).is_none());
        let c = pwp_correction(-4.0, 0.02).unwrap();
        // Water transit is slower than crust, minus the fixed offset.
        assert!(c > 2.0 * (4.0 / DEFVW - 4.0 / DEFVP) * 0.8 + PWP_OFFSET_SECONDS - 1.0);
        assert!(c.is_finite());
    }
}
