// Per-shell velocity interpolation
// Cubic spline through a shell's samples when it has at least 3 points,
// straight lines otherwise

use nalgebra::{DMatrix, DVector};

use super::{ModelSample, Shell};

/// Fitted interpolant for one continuous shell.
#[derive(Debug, Clone)]
pub struct ShellSpline {
    r: Vec<f64>,
    vp: Vec<f64>,
    vs: Vec<f64>,
    vp_d2: Vec<f64>,
    vs_d2: Vec<f64>,
}

impl ShellSpline {
    pub fn fit(samples: &[ModelSample], shell: &Shell) -> Self {
        let mut r = Vec::new();
        let mut vp = Vec::new();
        let mut vs = Vec::new();
        for s in &samples[shell.i_bot..=shell.i_top] {
            // Shell edges can repeat a radius when the shell abuts a
            // discontinuity; keep the first occurrence only.
            if r.last().map_or(true, |&last: &f64| s.r > last + 1e-12) {
                r.push(s.r);
                vp.push(s.vp);
                vs.push(s.vs);
            }
        }
        let vp_d2 = natural_spline_d2(&r, &vp);
        let vs_d2 = natural_spline_d2(&r, &vs);
        Self { r, vp, vs, vp_d2, vs_d2 }
    }

    /// Interpolated (vp, vs) at radius r; r must already be bounds-checked.
    pub fn eval(&self, r: f64) -> (f64, f64) {
        if self.r.len() < 2 {
            return (self.vp[0], self.vs[0]);
        }
        let j = self.interval(r);
        let h = self.r[j + 1] - self.r[j];
        let a = (self.r[j + 1] - r) / h;
        let b = (r - self.r[j]) / h;
        let cubic = |v: &[f64], d2: &[f64]| {
            a * v[j]
                + b * v[j + 1]
                + ((a * a * a - a) * d2[j] + (b * b * b - b) * d2[j + 1]) * h * h / 6.0
        };
        (cubic(&self.vp, &self.vp_d2), cubic(&self.vs, &self.vs_d2))
    }

    fn interval(&self, r: f64) -> usize {
        let n = self.r.len();
        match self.r.binary_search_by(|x| x.partial_cmp(&r).unwrap()) {
            Ok(j) => j.min(n - 2),
            Err(j) => j.saturating_sub(1).min(n - 2),
        }
    }
}

/// Natural-spline second derivatives; all zeros for fewer than 3 points,
/// which reduces evaluation to linear interpolation.
fn natural_spline_d2(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 3 {
        return vec![0.0; n];
    }
    let m = n - 2;
    let mut a = DMatrix::<f64>::zeros(m, m);
    let mut rhs = DVector::<f64>::zeros(m);
    for i in 0..m {
        let h0 = x[i + 1] - x[i];
        let h1 = x[i + 2] - x[i + 1];
        if i > 0 {
            a[(i, i - 1)] = h0 / 6.0;
        }
        a[(i, i)] = (h0 + h1) / 3.0;
        if i + 1 < m {
            a[(i, i + 1)] = h1 / 6.0;
        }
        rhs[i] = (y[i + 2] - y[i + 1]) / h1 - (y[i + 1] - y[i]) / h0;
    }
    let mut d2 = vec![0.0; n];
    if let Some(sol) = a.lu().solve(&rhs) {
        for i in 0..m {
            d2[i + 1] = sol[i];
        }
    }
    d2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShellName;

    fn sample(r: f64, vp: f64, vs: f64) -> ModelSample {
        ModelSample {
            r,
            vp,
            vs,
            z: 0.0,
            slow_p: 0.0,
            slow_s: 0.0,
            fluid: false,
        }
    }

    fn shell(n: usize) -> Shell {
        Shell {
            i_bot: 0,
            i_top: n - 1,
            r_bot: 0.0,
            r_top: 0.0,
            is_disc: false,
            name: ShellName::UpperMantle,
            delta_x_target: 150.0,
        }
    }

    #[test]
    fn test_spline_passes_through_samples() {
        let samples = vec![
            sample(5700.0, 10.2, 5.6),
            sample(5800.0, 9.9, 5.4),
            sample(5900.0, 9.5, 5.2),
            sample(6000.0, 9.0, 4.9),
        ];
        let sp = ShellSpline::fit(&samples, &shell(4));
        for s in &samples {
            let (vp, vs) = sp.eval(s.r);
            assert!((vp - s.vp).abs() < 1e-12);
            assert!((vs - s.vs).abs() < 1e-12);
        }
    }

    #[test]
    fn test_two_points_is_linear() {
        let samples = vec![sample(6000.0, 8.0, 4.5), sample(6100.0, 8.2, 4.6)];
        let sp = ShellSpline::fit(&samples, &shell(2));
        let (vp, vs) = sp.eval(6050.0);
        assert!((vp - 8.1).abs() < 1e-12);
        assert!((vs - 4.55).abs() < 1e-12);
    }

    #[test]
    fn test_linear_data_stays_linear() {
        // A spline through collinear points must reproduce the line between
        // knots as well as at them.
        let samples = vec![
            sample(6000.0, 8.0, 4.5),
            sample(6100.0, 8.5, 4.75),
            sample(6200.0, 9.0, 5.0),
        ];
        let sp = ShellSpline::fit(&samples, &shell(3));
        let (vp, _) = sp.eval(6150.0);
        assert!((vp - 8.75).abs() < 1e-9);
    }
}
