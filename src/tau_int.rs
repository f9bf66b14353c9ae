// Closed-Form Layer Integrals
// Tau and distance contributions of one flattened layer under the in-layer
// power-law velocity assumption

use crate::errors::{TauIntError, TauIntResult};

// Below this relative slowness contrast a layer is integrated as constant.
const CONSTANT_LAYER_TOL: f64 = 1.0e-12;

/// Evaluates tau and distance across one layer of the flattened model.
///
/// Within a layer the velocity follows the Mohorovicic power law, so the
/// slowness varies exponentially in the flattened depth and both integrals
/// close over elementary functions. `int_layer` returns the tau contribution
/// and stores the matching distance, retrievable with `x_layer`.
#[derive(Debug, Clone, Default)]
pub struct TauInt {
    x_layer: f64,
}

impl TauInt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tau contribution of the layer between flattened depths z_top > z_bot
    /// with endpoint slownesses slow_top, slow_bot, for ray parameter p.
    ///
    /// A ray that bottoms inside the layer is integrated with slow_bot == p
    /// and z_bot set to the turning depth by the caller; the closed form then
    /// reduces to the turning-point half-layer because the bottom ordinate
    /// vanishes.
    pub fn int_layer(
        &mut self,
        p: f64,
        slow_top: f64,
        slow_bot: f64,
        z_top: f64,
        z_bot: f64,
    ) -> TauIntResult<f64> {
        let dz = z_top - z_bot;
        if dz.abs() < 1e-15 {
            if (slow_top - slow_bot).abs() > CONSTANT_LAYER_TOL * slow_top.max(slow_bot) {
                return Err(TauIntError::IllegalInterval {
                    z: z_top,
                    slow_top,
                    slow_bot,
                });
            }
            self.x_layer = 0.0;
            return Ok(0.0);
        }
        if p > slow_top && p > slow_bot {
            return Err(TauIntError::RayDoesNotBottom {
                p,
                slow_top,
                slow_bot,
            });
        }

        // Grazing ray in a constant-slowness layer: zero path below the ray.
        if p >= slow_top && p >= slow_bot {
            self.x_layer = 0.0;
            return Ok(0.0);
        }

        let du_rel = ((slow_bot - slow_top) / slow_top).abs();
        if du_rel < CONSTANT_LAYER_TOL {
            // Constant slowness: straight-ray segment.
            let eta = (slow_top * slow_top - p * p).sqrt();
            self.x_layer = p * dz / eta;
            return Ok(eta * dz);
        }

        let beta = (slow_bot / slow_top).ln() / (z_bot - z_top);
        let f = |u: f64| -> (f64, f64) {
            // (tau ordinate, distance ordinate) at slowness u
            if u <= p {
                return (0.0, 0.0);
            }
            let eta = (u * u - p * p).sqrt();
            let ac = if p > 0.0 { (p / u).min(1.0).acos() } else { 0.0 };
            (eta - p * ac, ac)
        };
        let (t_top, x_top) = f(slow_top);
        let (t_bot, x_bot) = f(slow_bot);
        // p == 0 needs the distance ordinate pinned: acos(0) at both ends
        // cancels, and the tau ordinate is just the slowness itself.
        let (tau, x) = if p == 0.0 {
            ((slow_bot - slow_top) / beta, 0.0)
        } else {
            ((t_bot - t_top) / beta, (x_bot - x_top) / beta)
        };
        self.x_layer = x;
        Ok(tau)
    }

    /// Distance matching the last `int_layer` call.
    pub fn x_layer(&self) -> f64 {
        self.x_layer
    }

    /// Flattened turning depth for ray parameter p inside a layer whose
    /// slowness runs from slow_top at z_top to slow_bot at z_bot.
    pub fn turning_depth(p: f64, slow_top: f64, slow_bot: f64, z_top: f64, z_bot: f64) -> f64 {
        let beta = (slow_bot / slow_top).ln() / (z_bot - z_top);
        z_top + (p / slow_top).ln() / beta
    }
}
