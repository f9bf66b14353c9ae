// Tau Spline Engine
// Cubic basis in sqrt(p_max - p) per branch: evaluates tau(p), distance
// x(p) = -dtau/dp and dx/dp analytically, and inverts x(p) = target

/// Interpolating basis for one branch over its ascending ray-parameter grid
/// p_0 < ... < p_{n-1}, with p_{n-1} the branch's bottoming slowness.
///
/// The working variable is w = sqrt(p_{n-1} - p), which regularises the
/// square-root behaviour of tau at the branch end. Interior intervals are
/// cubic Hermite pieces whose knot slopes are pinned to 2 * w_k * x_k, so the
/// analytic distance reproduces the integrated x at every sample. The last
/// interval is quartic in w with an even leading term that pins the limiting
/// distance of the bottoming ray itself.
#[derive(Debug, Clone)]
pub struct SplineBasis {
    pub p_max: f64,
    p: Vec<f64>,
    w: Vec<f64>,
    tau: Vec<f64>,
    x: Vec<f64>,
    /// dtau/dw at the knots, 2 * w_k * x_k
    m: Vec<f64>,
    c2: Vec<f64>,
    c3: Vec<f64>,
}

impl SplineBasis {
    pub fn fit(p: &[f64], tau: &[f64], x: &[f64]) -> Self {
        let n = p.len();
        debug_assert!(n >= 2);
        let p_max = p[n - 1];
        let w: Vec<f64> = p.iter().map(|&pk| (p_max - pk).max(0.0).sqrt()).collect();
        let m: Vec<f64> = w.iter().zip(x).map(|(&wk, &xk)| 2.0 * wk * xk).collect();

        let mut c2 = vec![0.0; n - 1];
        let mut c3 = vec![0.0; n - 1];
        for j in 0..n - 1 {
            if j + 1 == n - 1 {
                // Quartic closure about the bottoming point:
                //   tau(w) = tau_end + x_end w^2 + b w^3 + c w^4
                // matched to tau and slope at the left knot.
                let x_end = x[n - 1];
                let wj = w[j];
                if wj > 0.0 {
                    let f = tau[j] - tau[n - 1] - x_end * wj * wj;
                    let g = m[j] - 2.0 * x_end * wj;
                    c2[j] = (4.0 * f - g * wj) / wj.powi(3);
                    c3[j] = (g * wj - 3.0 * f) / wj.powi(4);
                }
            } else {
                let h = w[j + 1] - w[j];
                if h.abs() > 1e-300 {
                    let d = (tau[j + 1] - tau[j]) / h;
                    c2[j] = (3.0 * d - 2.0 * m[j] - m[j + 1]) / h;
                    c3[j] = (m[j] + m[j + 1] - 2.0 * d) / (h * h);
                }
            }
        }

        Self {
            p_max,
            p: p.to_vec(),
            w,
            tau: tau.to_vec(),
            x: x.to_vec(),
            m,
            c2,
            c3,
        }
    }

    pub fn len(&self) -> usize {
        self.p.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
    }

    fn interval(&self, p: f64) -> Option<usize> {
        let n = self.p.len();
        if p < self.p[0] - 1e-12 || p > self.p[n - 1] + 1e-12 {
            return None;
        }
        let j = match self.p.binary_search_by(|v| v.partial_cmp(&p).unwrap()) {
            Ok(j) => j,
            Err(j) => j.saturating_sub(1),
        };
        Some(j.min(n - 2))
    }

    /// (tau, x, dx/dp) at ray parameter p, or None outside the grid.
    pub fn evaluate(&self, p: f64) -> Option<(f64, f64, f64)> {
        let j = self.interval(p)?;
        let n = self.p.len();
        let w = (self.p_max - p).max(0.0).sqrt();
        if j + 1 == n - 1 {
            let (b, c) = (self.c2[j], self.c3[j]);
            let x_end = self.x[n - 1];
            let tau = self.tau[n - 1] + x_end * w * w + b * w.powi(3) + c * w.powi(4);
            let x = x_end + 1.5 * b * w + 2.0 * c * w * w;
            let dxdw = 1.5 * b + 4.0 * c * w;
            let dxdp = if w > 1e-150 { dxdw * (-0.5 / w) } else { f64::NEG_INFINITY };
            return Some((tau, x, dxdp));
        }
        let s = w - self.w[j];
        let tau = self.tau[j] + self.m[j] * s + self.c2[j] * s * s + self.c3[j] * s * s * s;
        let dt = self.m[j] + 2.0 * self.c2[j] * s + 3.0 * self.c3[j] * s * s;
        let ddt = 2.0 * self.c2[j] + 6.0 * self.c3[j] * s;
        let x = dt / (2.0 * w);
        let dxdw = (ddt * w - dt) / (2.0 * w * w);
        let dxdp = dxdw * (-0.5 / w);
        Some((tau, x, dxdp))
    }

    pub fn tau_at(&self, p: f64) -> Option<f64> {
        self.evaluate(p).map(|(t, _, _)| t)
    }

    pub fn x_at(&self, p: f64) -> Option<f64> {
        self.evaluate(p).map(|(_, x, _)| x)
    }

    /// Solve x(p) = target inside the bracketing sample interval [p_a, p_b]
    /// with Newton iterations safeguarded by bisection. The distance is
    /// monotone between caustics, so a bracketed solve always converges.
    pub fn invert_x(&self, target: f64, p_a: f64, p_b: f64) -> Option<f64> {
        let (mut lo, mut hi) = (p_a.min(p_b), p_a.max(p_b));
        let f_lo = self.x_at(lo)? - target;
        let f_hi = self.x_at(hi)? - target;
        if f_lo == 0.0 {
            return Some(lo);
        }
        if f_hi == 0.0 {
            return Some(hi);
        }
        if f_lo * f_hi > 0.0 {
            return None;
        }
        let mut p = 0.5 * (lo + hi);
        for _ in 0..50 {
            let (_, x, dxdp) = self.evaluate(p)?;
            let f = x - target;
            if f.abs() < 1e-12 {
                return Some(p);
            }
            if f * f_lo > 0.0 {
                lo = p;
            } else {
                hi = p;
            }
            let newton = if dxdp.is_finite() && dxdp.abs() > 1e-300 {
                p - f / dxdp
            } else {
                f64::NAN
            };
            p = if newton.is_finite() && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };
            if hi - lo < 1e-14 {
                return Some(p);
            }
        }
        Some(p)
    }
}
