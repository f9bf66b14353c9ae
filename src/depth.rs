// Depth Corrector
// Builds the volatile per-depth state: corrected up-going integrals, branch
// shortening at the source slowness and fresh spline bases

use log::debug;

use crate::branch::{BounceKind, SegmentTypes};
use crate::decimate;
use crate::model::{RadialModel, WaveType};
use crate::spline::SplineBasis;
use crate::tables::RefTables;
use crate::tau_int::TauInt;

/// Shallowest non-surface source depth in km; shallower requests are clamped
/// here to keep the flattening logarithm well away from its singularity.
pub const MIN_SOURCE_DEPTH_KM: f64 = 0.011;

const SLOW_EQ_TOL: f64 = 1.0e-12;

/// A branch corrected to the session's source depth.
#[derive(Debug, Clone)]
pub struct VolatileBranch {
    pub phase_code: String,
    pub seg: SegmentTypes,
    pub bounce: BounceKind,
    pub p: Vec<f64>,
    pub tau: Vec<f64>,
    pub x: Vec<f64>,
    pub p_range: [f64; 2],
    pub x_range: [f64; 2],
    pub basis: SplineBasis,
    /// Index into the reference branch array; None for the up-going proxies.
    pub ref_idx: Option<usize>,
}

/// Corrected surface-to-source column for one wave, aligned with the merged
/// slowness grid.
#[derive(Debug, Clone)]
pub struct UpGoingColumn {
    pub wave: WaveType,
    pub tau: Vec<f64>,
    pub x: Vec<f64>,
    /// Largest ray parameter that reaches the surface from the source.
    pub p_lim: f64,
    pub lvz: bool,
}

/// Volatile per-depth state derived from the immutable tables.
#[derive(Debug, Clone)]
pub struct VolatileTables {
    pub depth_km: f64,
    pub z_src: f64,
    pub r_src: f64,
    /// Model slowness at the source per wave
    pub p_source: [f64; 2],
    /// Largest up-going ray parameter per wave (differs from p_source in a
    /// high-slowness zone)
    pub p_max_up: [f64; 2],
    pub up: [UpGoingColumn; 2],
    pub branches: Vec<VolatileBranch>,
    pub bad_depth: bool,
}

/// Tau/x of the column between the surface and z_src for one ray parameter,
/// walking the model layers. None when the ray cannot reach the source level.
pub fn column_to_depth(
    model: &RadialModel,
    wave: WaveType,
    p: f64,
    z_src: f64,
) -> Option<(f64, f64)> {
    let samples = &model.samples;
    let n = samples.len();
    let mut ti = TauInt::new();
    let (mut tau, mut x) = (0.0, 0.0);
    for i in (1..n).rev() {
        let top = &samples[i];
        let bot = &samples[i - 1];
        if top.z <= z_src + 1e-15 {
            break;
        }
        if (top.r - bot.r).abs() < 1e-9 {
            continue;
        }
        let (u_top, u_bot) = (top.slow(wave), bot.slow(wave));
        if p > u_top + SLOW_EQ_TOL {
            return None;
        }
        let z_bot = bot.z.max(z_src);
        let u_eff_bot = if z_bot > bot.z {
            // Partial layer ending at the source level.
            let beta = (u_bot / u_top).ln() / (bot.z - top.z);
            u_top * (beta * (z_bot - top.z)).exp()
        } else {
            u_bot
        };
        if p > u_eff_bot + SLOW_EQ_TOL {
            // Bottoms above the source level: the column ends at the turn.
            let z_turn = TauInt::turning_depth(p, u_top, u_eff_bot, top.z, z_bot);
            tau += ti.int_layer(p, u_top, p, top.z, z_turn).ok()?;
            x += ti.x_layer();
            return Some((tau, x));
        }
        tau += ti.int_layer(p, u_top, u_eff_bot, top.z, z_bot).ok()?;
        x += ti.x_layer();
    }
    Some((tau, x))
}

/// Correct the reference tables to a new source depth.
pub fn correct_to_depth(tables: &RefTables, depth_km: f64) -> VolatileTables {
    let model = &tables.model;
    let conv = &model.conv;

    if depth_km <= 0.0 {
        return surface_focus(tables);
    }
    let depth_km = depth_km.max(MIN_SOURCE_DEPTH_KM);
    let r_src = conv.r_surface - depth_km;
    let z_src = conv.flat_z(r_src);

    // Source slowness per wave from the continuous interpolated model.
    let p_source = [
        source_slowness(model, WaveType::P, r_src),
        source_slowness(model, WaveType::S, r_src),
    ];
    // Largest slowness that makes it to the surface: the column minimum.
    let p_max_up = [
        column_min_slowness(model, WaveType::P, z_src).min(p_source[0]),
        column_min_slowness(model, WaveType::S, z_src).min(p_source[1]),
    ];

    let up = [
        correct_up_going(tables, WaveType::P, z_src, p_source[0], p_max_up[0]),
        correct_up_going(tables, WaveType::S, z_src, p_source[1], p_max_up[1]),
    ];

    let mut branches: Vec<VolatileBranch> = Vec::new();
    for (ref_idx, rb) in tables.branches.iter().enumerate() {
        // Every leg is capped by the source slowness of its wave; for a
        // source inside a high-slowness zone the column minimum caps the
        // return to the surface as well.
        let down_lim = p_source[rb.seg.down.index()].min(p_max_up[rb.seg.down.index()]);
        let p_lim = if rb.seg.up_going {
            down_lim.min(p_max_up[rb.seg.up.index()])
        } else {
            down_lim
        };
        if p_lim < rb.p[0] - SLOW_EQ_TOL {
            continue;
        }
        let source_wave = if rb.seg.up_going { rb.seg.up } else { rb.seg.down };
        let sign = if rb.seg.up_going { 1.0 } else { -1.0 };
        let col = &up[source_wave.index()];

        let mut p = Vec::new();
        let mut tau = Vec::new();
        let mut x = Vec::new();
        for (k, &pk) in rb.p.iter().enumerate() {
            if pk > p_lim - SLOW_EQ_TOL {
                break;
            }
            let gi = rb.grid_idx[k];
            let (ct, cx) = (col.tau[gi], col.x[gi]);
            if !ct.is_finite() {
                continue;
            }
            p.push(pk);
            tau.push(rb.tau[k] + sign * ct);
            x.push(rb.x[k] + sign * cx);
        }
        // Shortened branches get one endpoint at the source slowness itself.
        if p_lim < rb.p_range[1] - SLOW_EQ_TOL {
            if let (Some((te, xe)), Some((tr, xr, _))) = (
                column_to_depth(model, source_wave, p_lim, z_src),
                rb.basis.evaluate(p_lim),
            ) {
                if p.last().map_or(true, |&lp| p_lim > lp + SLOW_EQ_TOL) {
                    p.push(p_lim);
                    tau.push(tr + sign * te);
                    x.push(xr + sign * xe);
                }
            }
        }
        if p.len() < 2 {
            continue;
        }
        let basis = SplineBasis::fit(&p, &tau, &x);
        let x_min = x.iter().cloned().fold(f64::INFINITY, f64::min);
        let x_max = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        branches.push(VolatileBranch {
            phase_code: rb.phase_code.clone(),
            seg: rb.seg,
            bounce: rb.bounce,
            p_range: [p[0], p[p.len() - 1]],
            x_range: [x_min, x_max],
            p,
            tau,
            x,
            basis,
            ref_idx: Some(ref_idx),
        });
    }

    // Up-going proxy branches from the corrected columns.
    for wave in [WaveType::P, WaveType::S] {
        if let Some(b) = up_going_proxy(tables, &up[wave.index()], wave, z_src) {
            branches.push(b);
        }
    }

    debug!(
        "depth correction to {:.2} km: {} volatile branches",
        depth_km,
        branches.len()
    );
    VolatileTables {
        depth_km,
        z_src,
        r_src,
        p_source,
        p_max_up,
        up,
        branches,
        bad_depth: false,
    }
}

/// Surface focus: no up-going phases, branches keep their full range.
fn surface_focus(tables: &RefTables) -> VolatileTables {
    let np = tables.sampling.merged.len();
    let empty = |wave| UpGoingColumn {
        wave,
        tau: vec![0.0; np],
        x: vec![0.0; np],
        p_lim: tables.model.surface_slowness(wave),
        lvz: false,
    };
    let branches = tables
        .branches
        .iter()
        .enumerate()
        .filter(|(_, rb)| !rb.seg.up_going)
        .map(|(ref_idx, rb)| VolatileBranch {
            phase_code: rb.phase_code.clone(),
            seg: rb.seg,
            bounce: rb.bounce,
            p: rb.p.clone(),
            tau: rb.tau.clone(),
            x: rb.x.clone(),
            p_range: rb.p_range,
            x_range: rb.x_range,
            basis: rb.basis.clone(),
            ref_idx: Some(ref_idx),
        })
        .collect();
    VolatileTables {
        depth_km: 0.0,
        z_src: 0.0,
        r_src: tables.model.conv.r_surface,
        p_source: [
            tables.model.surface_slowness(WaveType::P),
            tables.model.surface_slowness(WaveType::S),
        ],
        p_max_up: [
            tables.model.surface_slowness(WaveType::P),
            tables.model.surface_slowness(WaveType::S),
        ],
        up: [empty(WaveType::P), empty(WaveType::S)],
        branches,
        bad_depth: false,
    }
}

pub fn bad_depth_state(tables: &RefTables, depth_km: f64) -> VolatileTables {
    let mut v = surface_focus(tables);
    v.depth_km = depth_km;
    v.branches.clear();
    v.bad_depth = true;
    v
}

fn source_slowness(model: &RadialModel, wave: WaveType, r_src: f64) -> f64 {
    model
        .shell_of_radius(r_src)
        .and_then(|si| model.velocity(si, wave, r_src).ok())
        .map(|v| model.conv.flat_p(v, r_src))
        .unwrap_or_else(|| model.surface_slowness(wave))
}

fn column_min_slowness(model: &RadialModel, wave: WaveType, z_src: f64) -> f64 {
    model
        .samples
        .iter()
        .filter(|s| s.z >= z_src - 1e-15)
        .map(|s| s.slow(wave))
        .fold(f64::INFINITY, f64::min)
}

/// Subtract the sub-source part of the stored records to get the
/// surface-to-source column on the merged grid.
fn correct_up_going(
    tables: &RefTables,
    wave: WaveType,
    z_src: f64,
    p_source: f64,
    p_max_up: f64,
) -> UpGoingColumn {
    let model = &tables.model;
    let merged = &tables.sampling.merged;
    let records = &tables.integrated[wave.index()].records;

    // First record at or below the source.
    let i_src = records
        .iter()
        .position(|r| r.z <= z_src + 1e-15)
        .unwrap_or(records.len() - 1);
    let rec = &records[i_src];

    let mut tau = vec![f64::NAN; merged.len()];
    let mut x = vec![f64::NAN; merged.len()];
    let mut ti = TauInt::new();
    for (i, &p) in merged.iter().enumerate() {
        if p > p_max_up + SLOW_EQ_TOL {
            continue;
        }
        if (rec.z - z_src).abs() < 1e-14 {
            tau[i] = rec.tau[i];
            x[i] = rec.x[i];
            continue;
        }
        // Remove the partial layer between the source and the record depth.
        let contrib = if p > rec.slow + SLOW_EQ_TOL {
            let z_turn = TauInt::turning_depth(p, p_source, rec.slow, z_src, rec.z);
            ti.int_layer(p, p_source, p, z_src, z_turn)
        } else {
            ti.int_layer(p, p_source, rec.slow, z_src, rec.z)
        };
        if let Ok(t) = contrib {
            tau[i] = rec.tau[i] - t;
            x[i] = rec.x[i] - ti.x_layer();
        }
    }
    UpGoingColumn {
        wave,
        tau,
        x,
        p_lim: p_max_up.min(p_source),
        lvz: p_max_up < p_source - SLOW_EQ_TOL,
    }
}

/// Build the Pup/Sup proxy branch from a corrected column, thinned with the
/// fast one-pass decimator.
fn up_going_proxy(
    tables: &RefTables,
    col: &UpGoingColumn,
    wave: WaveType,
    z_src: f64,
) -> Option<VolatileBranch> {
    let merged = &tables.sampling.merged;
    let model = &tables.model;
    let mut p = Vec::new();
    let mut tau = Vec::new();
    let mut x = Vec::new();
    // Ascending p: walk the descending merged grid backwards.
    for i in (0..merged.len()).rev() {
        if merged[i] >= col.p_lim - SLOW_EQ_TOL {
            continue;
        }
        if col.tau[i].is_finite() {
            p.push(merged[i]);
            tau.push(col.tau[i]);
            x.push(col.x[i]);
        }
    }
    if let Some((te, xe)) = column_to_depth(model, wave, col.p_lim, z_src) {
        p.push(col.p_lim);
        tau.push(te);
        x.push(xe);
    }
    if p.len() < 2 {
        return None;
    }

    let dx_target = 100.0 * model.conv.x_norm;
    let keep = decimate::fast(&p, &x, dx_target);
    let p: Vec<f64> = p.iter().zip(&keep).filter(|&(_, &k)| k).map(|(&v, _)| v).collect();
    let tau: Vec<f64> = tau.iter().zip(&keep).filter(|&(_, &k)| k).map(|(&v, _)| v).collect();
    let x: Vec<f64> = x.iter().zip(&keep).filter(|&(_, &k)| k).map(|(&v, _)| v).collect();

    let basis = SplineBasis::fit(&p, &tau, &x);
    let x_min = x.iter().cloned().fold(f64::INFINITY, f64::min);
    let x_max = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let code = match wave {
        WaveType::P => "Pup",
        WaveType::S => "Sup",
    };
    Some(VolatileBranch {
        phase_code: code.to_string(),
        seg: SegmentTypes {
            up: wave,
            down: wave,
            ret: wave,
            up_going: true,
        },
        bounce: BounceKind::None,
        p_range: [p[0], p[p.len() - 1]],
        x_range: [x_min, x_max],
        p,
        tau,
        x,
        basis,
        ref_idx: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TOY_MODEL;
    use crate::model::RadialModel;

    fn tables() -> RefTables {
        let model = RadialModel::from_str(TOY_MODEL).unwrap();
        RefTables::build(model).unwrap()
    }

    #[test]
    fn test_round_trip_same_depth_identical() {
        let t = tables();
        let a = correct_to_depth(&t, 33.0);
        let b = correct_to_depth(&t, 33.0);
        assert_eq!(a.branches.len(), b.branches.len());
        for (ba, bb) in a.branches.iter().zip(&b.branches) {
            assert_eq!(ba.phase_code, bb.phase_code);
            assert_eq!(ba.p, bb.p);
            assert_eq!(ba.tau, bb.tau);
            assert_eq!(ba.x, bb.x);
        }
    }

    #[test]
    fn test_surface_focus_has_no_up_going() {
        let t = tables();
        let v = correct_to_depth(&t, 0.0);
        assert!(!v.bad_depth);
        assert!(v.branches.iter().all(|b| !b.seg.up_going));
        assert!(v.branches.iter().all(|b| b.phase_code != "Pup"));
    }

    #[test]
    fn test_depth_produces_proxies_and_shortening() {
        let t = tables();
        let v = correct_to_depth(&t, 100.0);
        let codes: Vec<&str> = v.branches.iter().map(|b| b.phase_code.as_str()).collect();
        assert!(codes.contains(&"Pup"));
        assert!(codes.contains(&"Sup"));
        // Source below the crust removes the crustal branches entirely.
        assert!(!codes.contains(&"Pg"), "Pg should vanish below the crust");
        // Down-going branches are capped at the source slowness.
        let p_src = v.p_source[WaveType::P.index()];
        for b in v.branches.iter().filter(|b| !b.seg.up_going) {
            if b.seg.down == WaveType::P {
                assert!(b.p_range[1] <= p_src + 1e-9, "{}", b.phase_code);
            }
        }
    }

    #[test]
    fn test_depth_phase_arrives_after_direct() {
        // At the same ray parameter, pP carries the extra up-leg and must
        // have a larger tau than P.
        let t = tables();
        let v = correct_to_depth(&t, 200.0);
        let p_dir = v.branches.iter().find(|b| b.phase_code == "P").unwrap();
        let p_dep = v.branches.iter().find(|b| b.phase_code == "pP").unwrap();
        let pk = p_dir.p[0].max(p_dep.p[0]);
        let (t_dir, _, _) = p_dir.basis.evaluate(pk).unwrap();
        let (t_dep, _, _) = p_dep.basis.evaluate(pk).unwrap();
        assert!(t_dep > t_dir);
    }

    #[test]
    fn test_column_to_depth_vertical() {
        let t = tables();
        let model = &t.model;
        let z = model.conv.flat_depth(100.0);
        let (tau, x) = column_to_depth(model, WaveType::P, 0.0, z).unwrap();
        assert!(tau > 0.0);
        assert_eq!(x, 0.0);
    }
}
