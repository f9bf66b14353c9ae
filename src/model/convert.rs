// Dimensionalisation algebra
// All internal math runs in non-dimensional units derived from the surface
// shear velocity and the Earth radius

use serde::{Deserialize, Serialize};

/// Normalisation constants for one radial model.
///
/// Distance is normalised by the Earth radius, slowness by the surface shear
/// velocity, and depth through the flattening transform z = ln(r * x_norm),
/// which maps the surface to 0 and the centre to negative infinity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelConversions {
    /// Surface radius in km
    pub r_surface: f64,
    /// 1 / r_surface, km^-1
    pub x_norm: f64,
    /// Surface shear velocity, km/s
    pub v_norm: f64,
    /// x_norm * v_norm, s^-1
    pub t_norm: f64,
}

impl ModelConversions {
    pub fn new(r_surface: f64, vs_surface: f64) -> Self {
        let x_norm = 1.0 / r_surface;
        Self {
            r_surface,
            x_norm,
            v_norm: vs_surface,
            t_norm: x_norm * vs_surface,
        }
    }

    /// Radius in km to non-dimensional radius in (0, 1].
    pub fn norm_r(&self, r: f64) -> f64 {
        r * self.x_norm
    }

    /// Non-dimensional radius back to km.
    pub fn dim_r(&self, rn: f64) -> f64 {
        rn / self.x_norm
    }

    /// Flattened depth coordinate for a radius in km.
    pub fn flat_z(&self, r: f64) -> f64 {
        (r * self.x_norm).ln()
    }

    /// Radius in km for a flattened depth.
    pub fn real_r(&self, z: f64) -> f64 {
        z.exp() / self.x_norm
    }

    /// Depth below the surface in km for a flattened depth.
    pub fn real_depth(&self, z: f64) -> f64 {
        self.r_surface - self.real_r(z)
    }

    /// Flattened depth for a depth below the surface in km.
    pub fn flat_depth(&self, depth_km: f64) -> f64 {
        self.flat_z(self.r_surface - depth_km)
    }

    /// Non-dimensional slowness for velocity v (km/s) at radius r (km).
    pub fn flat_p(&self, v: f64, r: f64) -> f64 {
        r * self.t_norm / v
    }

    /// Velocity in km/s for a non-dimensional slowness at flattened depth z.
    pub fn real_v(&self, slow: f64, z: f64) -> f64 {
        self.real_r(z) * self.t_norm / slow
    }

    /// Non-dimensional time to seconds.
    pub fn dim_time(&self, tau: f64) -> f64 {
        tau / self.t_norm
    }

    /// Non-dimensional ray parameter to s/deg.
    pub fn dim_slowness_deg(&self, p: f64) -> f64 {
        p / self.t_norm * std::f64::consts::PI / 180.0
    }

    /// Non-dimensional ray parameter to s/km of surface arc.
    pub fn dim_slowness_km(&self, p: f64) -> f64 {
        p / self.t_norm / self.r_surface
    }

    /// Degrees of arc to non-dimensional distance (radians).
    pub fn norm_delta(&self, delta_deg: f64) -> f64 {
        delta_deg.to_radians()
    }

    /// Non-dimensional distance back to degrees.
    pub fn dim_delta(&self, x: f64) -> f64 {
        x.to_degrees()
    }
}
