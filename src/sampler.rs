// Slowness Sampler
// Builds the adaptive per-wave slowness grids honouring critical points,
// caustics and distance targets, then merges P and S into one universal grid

use log::debug;

use crate::errors::ModelResult;
use crate::model::{RadialModel, WaveType};
use crate::solver::pegasus;
use crate::tau_int::TauInt;

/// Largest allowed slowness step between successive samples.
pub const DELTA_P_MAX: f64 = 0.01;
/// Largest allowed bottoming-radius step between successive samples, km.
pub const DELTA_R_MAX_KM: f64 = 75.0;
/// Convergence tolerance for caustic and distance-target solves.
pub const CAUSTIC_TOL: f64 = 5.0e-6;

const SLOW_EQ_TOL: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CritLoc {
    Shell,
    Boundary,
}

/// A slowness that must appear exactly in the sampling: a shell-boundary
/// slowness or a local extremum marking a high-slowness zone.
#[derive(Debug, Clone)]
pub struct CriticalSlowness {
    pub wave: WaveType,
    pub slowness: f64,
    pub p_shell: Option<usize>,
    pub s_shell: Option<usize>,
    pub loc: CritLoc,
}

/// One point of the slowness/distance curve for one wave type. `x` is the
/// one-way surface-to-turning distance in non-dimensional units.
#[derive(Debug, Clone, Copy)]
pub struct TauSample {
    pub r: f64,
    pub z: f64,
    pub slow: f64,
    pub x: f64,
    pub index: usize,
}

/// Adaptive sampling for one wave type, ordered surface to centre
/// (descending slowness). `turns[i]` is false where the ray reflects off a
/// discontinuity instead of bottoming in a gradient.
#[derive(Debug, Clone)]
pub struct SampledWave {
    pub wave: WaveType,
    pub samples: Vec<TauSample>,
    pub turns: Vec<bool>,
}

/// Full sampling product: criticals, both wave grids, and the merged
/// universal ray-parameter list (descending).
#[derive(Debug, Clone)]
pub struct Sampling {
    pub critical: Vec<CriticalSlowness>,
    pub waves: [SampledWave; 2],
    pub merged: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct Bottoming {
    pub x: f64,
    pub r: f64,
    pub z: f64,
    pub turns: bool,
}

/// One-way distance and bottoming point for ray parameter p, walking the
/// model from the surface down to the first slowness crossing.
pub fn bottoming(model: &RadialModel, wave: WaveType, p: f64) -> Option<Bottoming> {
    let s = &model.samples;
    let n = s.len();
    if p > s[n - 1].slow(wave) + SLOW_EQ_TOL || p < 0.0 {
        return None;
    }
    let mut ti = TauInt::new();
    let mut x = 0.0;
    for i in (1..n).rev() {
        let top = &s[i];
        let bot = &s[i - 1];
        if (top.r - bot.r).abs() < 1e-9 {
            // Discontinuity: total reflection when the slowness below drops
            // past p.
            if p > bot.slow(wave) + SLOW_EQ_TOL {
                return Some(Bottoming {
                    x,
                    r: top.r,
                    z: top.z,
                    turns: false,
                });
            }
            continue;
        }
        let u_top = top.slow(wave);
        let u_bot = bot.slow(wave);
        if p > u_top + SLOW_EQ_TOL {
            // Grazed the top of a high-slowness zone at the previous sample.
            return Some(Bottoming {
                x,
                r: top.r,
                z: top.z,
                turns: true,
            });
        }
        if p > u_bot + SLOW_EQ_TOL {
            let z_turn = TauInt::turning_depth(p, u_top, u_bot, top.z, bot.z);
            ti.int_layer(p, u_top, p, top.z, z_turn).ok()?;
            return Some(Bottoming {
                x: x + ti.x_layer(),
                r: model.conv.real_r(z_turn),
                z: z_turn,
                turns: true,
            });
        }
        ti.int_layer(p, u_top, u_bot, top.z, bot.z).ok()?;
        x += ti.x_layer();
    }
    Some(Bottoming {
        x,
        r: s[0].r,
        z: s[0].z,
        turns: true,
    })
}

/// Shell-boundary slownesses and high-slowness-zone extrema, ascending,
/// duplicates of the same wave collapsed.
pub fn critical_slownesses(model: &RadialModel) -> Vec<CriticalSlowness> {
    let mut crits: Vec<CriticalSlowness> = Vec::new();
    let mut push = |wave: WaveType, slowness: f64, shell_idx: usize, loc: CritLoc| {
        let other = wave.other();
        let other_shell = model.shells.iter().position(|sh| {
            if sh.is_disc {
                return false;
            }
            let lo = model.samples[sh.i_bot].slow(other);
            let hi = model.samples[sh.i_top].slow(other);
            slowness >= lo.min(hi) && slowness <= lo.max(hi)
        });
        let (p_shell, s_shell) = match wave {
            WaveType::P => (Some(shell_idx), other_shell),
            WaveType::S => (other_shell, Some(shell_idx)),
        };
        crits.push(CriticalSlowness {
            wave,
            slowness,
            p_shell,
            s_shell,
            loc,
        });
    };

    for (si, shell) in model.shells.iter().enumerate() {
        for wave in [WaveType::P, WaveType::S] {
            push(wave, model.samples[shell.i_bot].slow(wave), si, CritLoc::Boundary);
            push(wave, model.samples[shell.i_top].slow(wave), si, CritLoc::Boundary);
            if !shell.is_disc {
                for i in shell.i_bot + 1..shell.i_top {
                    let d0 = model.samples[i].slow(wave) - model.samples[i - 1].slow(wave);
                    let d1 = model.samples[i + 1].slow(wave) - model.samples[i].slow(wave);
                    if d0 * d1 < 0.0 {
                        push(wave, model.samples[i].slow(wave), si, CritLoc::Shell);
                    }
                }
            }
        }
    }

    crits.sort_by(|a, b| a.slowness.partial_cmp(&b.slowness).unwrap());
    crits.dedup_by(|a, b| a.wave == b.wave && (a.slowness - b.slowness).abs() < SLOW_EQ_TOL);
    crits
}

/// Adaptive sampling of one wave type between its critical slownesses.
pub fn sample_wave(
    model: &RadialModel,
    wave: WaveType,
    crits: &[CriticalSlowness],
) -> ModelResult<SampledWave> {
    let u_surf = model.surface_slowness(wave);
    let u_min = model.samples[0].slow(wave).min(u_surf);

    // Descending critical values for this wave, clamped into [u_min, u_surf].
    let mut cuts: Vec<f64> = crits
        .iter()
        .filter(|c| c.wave == wave)
        .map(|c| c.slowness)
        .filter(|&v| v > u_min + SLOW_EQ_TOL && v < u_surf - SLOW_EQ_TOL)
        .collect();
    cuts.push(u_surf);
    cuts.push(u_min);
    cuts.sort_by(|a, b| b.partial_cmp(a).unwrap());
    cuts.dedup_by(|a, b| (*a - *b).abs() < SLOW_EQ_TOL);

    let mut grid: Vec<(f64, Bottoming)> = Vec::new();
    for w in cuts.windows(2) {
        let (c_hi, c_lo) = (w[0], w[1]);
        let seg = sample_interval(model, wave, c_hi, c_lo);
        for (p, b) in seg {
            if grid
                .last()
                .map_or(true, |&(lp, _)| lp - p > SLOW_EQ_TOL)
            {
                grid.push((p, b));
            }
        }
    }
    // Close the grid at the deepest slowness.
    if let Some(b) = bottoming(model, wave, u_min) {
        if grid.last().map_or(true, |&(lp, _)| lp - u_min > SLOW_EQ_TOL) {
            grid.push((u_min, b));
        }
    }

    infill(model, wave, &mut grid);
    refine_bottoming_radii(model, wave, &mut grid);

    let samples: Vec<TauSample> = grid
        .iter()
        .enumerate()
        .map(|(index, &(slow, b))| TauSample {
            r: b.r,
            z: b.z,
            slow,
            x: b.x,
            index,
        })
        .collect();
    let turns = grid.iter().map(|&(_, b)| b.turns).collect();
    debug!("{} sampling: {} samples", wave, samples.len());
    Ok(SampledWave {
        wave,
        samples,
        turns,
    })
}

/// Quadratic seed grid, caustic bracketing and distance-target refinement for
/// one inter-critical interval [c_lo, c_hi], returned descending.
fn sample_interval(
    model: &RadialModel,
    wave: WaveType,
    c_hi: f64,
    c_lo: f64,
) -> Vec<(f64, Bottoming)> {
    let xv = |p: f64| bottoming(model, wave, p);
    let (b_hi, b_lo) = match (xv(c_hi), xv(c_lo)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Vec::new(),
    };

    // Distance target from the shell the interval bottoms in; spacing is
    // judged on the full surface-to-surface distance.
    let mid = 0.5 * (c_hi + c_lo);
    let dx_target = bottoming(model, wave, mid)
        .and_then(|b| model.shell_of_radius(b.r))
        .map(|si| model.shells[si].delta_x_target)
        .unwrap_or(150.0)
        * model.conv.x_norm;

    let n = ((2.0 * (b_hi.x - b_lo.x).abs() / dx_target).ceil() as usize).max(1);
    let mut ps: Vec<f64> = (0..=n)
        .map(|j| {
            let t = j as f64 / n as f64;
            // Quadratic spacing, denser near the interval top where the
            // bottoming angle is most ambiguous.
            c_hi - (c_hi - c_lo) * t * t
        })
        .collect();
    if ps.len() < 3 {
        ps.insert(1, (c_hi * c_lo.max(SLOW_EQ_TOL)).sqrt());
    }

    let mut seg: Vec<(f64, Bottoming)> = ps
        .iter()
        .filter_map(|&p| xv(p).map(|b| (p, b)))
        .collect();

    locate_caustics(model, wave, &mut seg);
    refine_distance_targets(model, wave, &mut seg, dx_target);
    seg
}

/// Bracket sign changes of dX/dp on the sampled grid and insert the caustic
/// ray parameters located with the Pegasus solver.
fn locate_caustics(model: &RadialModel, wave: WaveType, seg: &mut Vec<(f64, Bottoming)>) {
    if seg.len() < 3 {
        return;
    }
    let dxdp = |p: f64| -> f64 {
        let h = (1e-6 * p.abs()).max(1e-8);
        let xa = bottoming(model, wave, p - h).map(|b| b.x);
        let xb = bottoming(model, wave, p + h).map(|b| b.x);
        match (xa, xb) {
            (Some(a), Some(b)) => (b - a) / (2.0 * h),
            _ => 0.0,
        }
    };
    let mut inserted: Vec<(f64, Bottoming)> = Vec::new();
    for i in 1..seg.len() - 1 {
        let d0 = seg[i].1.x - seg[i - 1].1.x;
        let d1 = seg[i + 1].1.x - seg[i].1.x;
        if d0 * d1 < 0.0 {
            // seg is descending in p, so the bracket is [p_{i+1}, p_{i-1}]
            if let Ok(pc) = pegasus(&dxdp, seg[i + 1].0, seg[i - 1].0, CAUSTIC_TOL) {
                if let Some(b) = bottoming(model, wave, pc) {
                    inserted.push((pc, b));
                }
            }
        }
    }
    merge_descending(seg, inserted);
}

/// Subdivide caustic-free stretches whose distance step exceeds the target by
/// solving X(p) = x_target for evenly spaced targets.
fn refine_distance_targets(
    model: &RadialModel,
    wave: WaveType,
    seg: &mut Vec<(f64, Bottoming)>,
    dx_target: f64,
) {
    let mut inserted: Vec<(f64, Bottoming)> = Vec::new();
    for i in 0..seg.len() - 1 {
        let (p_a, b_a) = seg[i];
        let (p_b, b_b) = seg[i + 1];
        let gap = 2.0 * (b_b.x - b_a.x).abs();
        if gap <= dx_target || p_a - p_b < 4.0 * SLOW_EQ_TOL {
            continue;
        }
        let m = (gap / dx_target).ceil() as usize;
        for k in 1..m {
            let x_t = b_a.x + (b_b.x - b_a.x) * k as f64 / m as f64;
            let f = |p: f64| bottoming(model, wave, p).map_or(0.0, |b| b.x - x_t);
            if let Ok(p_new) = pegasus(f, p_b, p_a, CAUSTIC_TOL) {
                if let Some(b) = bottoming(model, wave, p_new) {
                    inserted.push((p_new, b));
                }
            }
        }
    }
    merge_descending(seg, inserted);
}

/// Enforce the slowness and bottoming-radius step limits by inserting
/// intermediate slownesses from a local power-law reconstruction.
fn infill(model: &RadialModel, wave: WaveType, grid: &mut Vec<(f64, Bottoming)>) {
    let mut out: Vec<(f64, Bottoming)> = Vec::new();
    for i in 0..grid.len() {
        if let Some(&(p_prev, b_prev)) = out.last() {
            let (p_cur, b_cur) = grid[i];
            let mut guard = 0;
            let mut prev = (p_prev, b_prev);
            while (prev.0 - p_cur > DELTA_P_MAX
                || (prev.1.r - b_cur.r).abs() > DELTA_R_MAX_KM)
                && guard < 64
            {
                guard += 1;
                let p_new = if prev.0 - p_cur > DELTA_P_MAX {
                    0.5 * (prev.0 + p_cur)
                } else {
                    // Radius-driven insertion: reconstruct slow(r) as a power
                    // law between the bounding samples.
                    let r_mid = 0.5 * (prev.1.r + b_cur.r);
                    power_law_slowness(model, wave, prev.1.r, b_cur.r, r_mid)
                };
                if p_new >= prev.0 - SLOW_EQ_TOL || p_new <= p_cur + SLOW_EQ_TOL {
                    break;
                }
                match bottoming(model, wave, p_new) {
                    Some(b) => {
                        out.push((p_new, b));
                        prev = (p_new, b);
                    }
                    None => break,
                }
            }
        }
        out.push(grid[i]);
    }
    *grid = out;
}

/// Slowness at r_mid assuming slow(r) = slow(r1) * (r/r1)^e between the model
/// samples bracketing [r1, r2].
fn power_law_slowness(model: &RadialModel, wave: WaveType, r1: f64, r2: f64, r_mid: f64) -> f64 {
    let lookup = |r: f64| -> f64 {
        model
            .shell_of_radius(r)
            .and_then(|si| model.velocity(si, wave, r).ok())
            .map(|v| model.conv.flat_p(v, r))
            .unwrap_or(0.0)
    };
    let (u1, u2) = (lookup(r1), lookup(r2));
    if u1 <= 0.0 || u2 <= 0.0 || (r2 / r1 - 1.0).abs() < 1e-12 {
        return 0.5 * (u1 + u2);
    }
    let e = (u2 / u1).ln() / (r2 / r1).ln();
    u1 * (r_mid / r1).powf(e)
}

/// Pegasus-refine each sample's bottoming radius on the continuous
/// interpolated model: solve r * t_norm / v(r) = p inside the bottoming shell.
fn refine_bottoming_radii(model: &RadialModel, wave: WaveType, grid: &mut [(f64, Bottoming)]) {
    for (p, b) in grid.iter_mut() {
        if !b.turns {
            continue;
        }
        let Some(si) = model.shell_of_radius(b.r) else {
            continue;
        };
        let shell = &model.shells[si];
        let f = |r: f64| -> f64 {
            model
                .velocity(si, wave, r)
                .map(|v| model.conv.flat_p(v, r) - *p)
                .unwrap_or(f64::NAN)
        };
        let lo = shell.r_bot.max(b.r - DELTA_R_MAX_KM);
        let hi = shell.r_top.min(b.r + DELTA_R_MAX_KM);
        if let Ok(r_ref) = pegasus(f, lo, hi, 1e-6) {
            b.r = r_ref;
            b.z = model.conv.flat_z(r_ref);
        }
    }
}

fn merge_descending(seg: &mut Vec<(f64, Bottoming)>, mut inserted: Vec<(f64, Bottoming)>) {
    if inserted.is_empty() {
        return;
    }
    seg.append(&mut inserted);
    seg.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    seg.dedup_by(|a, b| (a.0 - b.0).abs() < SLOW_EQ_TOL);
}

/// Merge the two wave grids: between consecutive critical slownesses (taken
/// across both types) keep whichever sub-list is denser.
pub fn merge_waves(
    crits: &[CriticalSlowness],
    p_wave: &SampledWave,
    s_wave: &SampledWave,
) -> Vec<f64> {
    let mut cuts: Vec<f64> = crits.iter().map(|c| c.slowness).collect();
    let top = p_wave
        .samples
        .first()
        .map(|s| s.slow)
        .unwrap_or(0.0)
        .max(s_wave.samples.first().map(|s| s.slow).unwrap_or(0.0));
    let bot = p_wave
        .samples
        .last()
        .map(|s| s.slow)
        .unwrap_or(0.0)
        .min(s_wave.samples.last().map(|s| s.slow).unwrap_or(0.0));
    cuts.push(top);
    cuts.push(bot);
    cuts.retain(|&v| v >= bot - SLOW_EQ_TOL && v <= top + SLOW_EQ_TOL);
    cuts.sort_by(|a, b| b.partial_cmp(a).unwrap());
    cuts.dedup_by(|a, b| (*a - *b).abs() < SLOW_EQ_TOL);

    let mut merged: Vec<f64> = Vec::new();
    for w in cuts.windows(2) {
        let (hi, lo) = (w[0], w[1]);
        merged.push(hi);
        let inner = |sw: &SampledWave| -> Vec<f64> {
            sw.samples
                .iter()
                .map(|s| s.slow)
                .filter(|&v| v < hi - SLOW_EQ_TOL && v > lo + SLOW_EQ_TOL)
                .collect()
        };
        let from_p = inner(p_wave);
        let from_s = inner(s_wave);
        let chosen = if from_p.len() >= from_s.len() {
            from_p
        } else {
            from_s
        };
        merged.extend(chosen);
    }
    if let Some(&last) = cuts.last() {
        merged.push(last);
    }
    merged.sort_by(|a, b| b.partial_cmp(a).unwrap());
    merged.dedup_by(|a, b| (*a - *b).abs() < SLOW_EQ_TOL);
    merged
}

/// Full sampling pipeline for one model.
pub fn build_sampling(model: &RadialModel) -> ModelResult<Sampling> {
    let critical = critical_slownesses(model);
    let p_wave = sample_wave(model, WaveType::P, &critical)?;
    let s_wave = sample_wave(model, WaveType::S, &critical)?;
    let merged = merge_waves(&critical, &p_wave, &s_wave);
    debug!(
        "sampling: {} criticals, {} P, {} S, {} merged",
        critical.len(),
        p_wave.samples.len(),
        s_wave.samples.len(),
        merged.len()
    );
    Ok(Sampling {
        critical,
        waves: [p_wave, s_wave],
        merged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TOY_MODEL;
    use crate::model::RadialModel;

    fn model() -> RadialModel {
        RadialModel::from_str(TOY_MODEL).unwrap()
    }

    #[test]
    fn test_criticals_ascending_and_typed() {
        let m = model();
        let crits = critical_slownesses(&m);
        assert!(!crits.is_empty());
        for w in crits.windows(2) {
            assert!(w[0].slowness <= w[1].slowness + 1e-15);
        }
        // Surface slownesses of both waves must be present.
        let has = |wave: WaveType, v: f64| {
            crits
                .iter()
                .any(|c| c.wave == wave && (c.slowness - v).abs() < 1e-12)
        };
        assert!(has(WaveType::P, m.surface_slowness(WaveType::P)));
        assert!(has(WaveType::S, 1.0));
    }

    #[test]
    fn test_bottoming_shrinks_with_p() {
        let m = model();
        let u_surf = m.surface_slowness(WaveType::P);
        let b1 = bottoming(&m, WaveType::P, 0.95 * u_surf).unwrap();
        let b2 = bottoming(&m, WaveType::P, 0.5 * u_surf).unwrap();
        assert!(b1.r > b2.r);
        assert!(b1.x >= 0.0 && b2.x > 0.0);
    }

    #[test]
    fn test_vertical_ray_reaches_centre() {
        let m = model();
        let u_min = m.samples[0].slow(WaveType::P);
        let b = bottoming(&m, WaveType::P, u_min).unwrap();
        assert!((b.r - m.samples[0].r).abs() < 1e-6);
    }

    #[test]
    fn test_sample_wave_spacing() {
        let m = model();
        let crits = critical_slownesses(&m);
        let sw = sample_wave(&m, WaveType::P, &crits).unwrap();
        assert!(sw.samples.len() > 10);
        for w in sw.samples.windows(2) {
            assert!(w[0].slow > w[1].slow, "descending slowness");
            assert!(w[0].slow - w[1].slow <= DELTA_P_MAX + 1e-9);
        }
        // Every critical slowness of this wave inside the grid range appears.
        let (lo, hi) = (
            sw.samples.last().unwrap().slow,
            sw.samples[0].slow,
        );
        for c in crits.iter().filter(|c| c.wave == WaveType::P) {
            if c.slowness > lo && c.slowness < hi {
                assert!(
                    sw.samples
                        .iter()
                        .any(|s| (s.slow - c.slowness).abs() < 1e-9),
                    "critical {} missing",
                    c.slowness
                );
            }
        }
    }

    #[test]
    fn test_merged_grid_descending_unique() {
        let m = model();
        let s = build_sampling(&m).unwrap();
        assert!(s.merged.len() > 10);
        for w in s.merged.windows(2) {
            assert!(w[0] > w[1]);
        }
        // The S surface slowness caps the merged grid.
        assert!((s.merged[0] - 1.0).abs() < 1e-9);
    }
}
