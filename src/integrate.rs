// Tau/Distance Integrator
// Walks the depth-ordered sampled model accumulating tau and distance for
// every merged ray parameter, recording earthquake-depth and shell snapshots

use log::debug;

use crate::errors::{ModelError, ModelResult};
use crate::model::{RadialModel, ShellName, WaveType};
use crate::sampler::{SampledWave, Sampling};
use crate::tau_int::TauInt;

/// Depth records are kept somewhat past the deepest supported source so
/// converted legs can still be corrected there.
pub const MAX_RECORD_DEPTH_KM: f64 = 900.0;

const R_EQ_TOL: f64 = 1e-9;
const SLOW_EQ_TOL: f64 = 1e-12;

/// Cumulative tau/x snapshot at one depth, indexed by the merged slowness
/// position. `lvz` marks records taken inside a high-slowness zone.
#[derive(Debug, Clone)]
pub struct TauXsample {
    pub name: String,
    pub z: f64,
    pub depth_km: f64,
    /// Model slowness of this wave at the record depth
    pub slow: f64,
    pub tau: Vec<f64>,
    pub x: Vec<f64>,
    pub lvz: bool,
}

/// Integration product for one wave type over the merged grid (descending p):
/// the per-depth up-going records plus the three whole-shell snapshots.
#[derive(Debug, Clone)]
pub struct IntegratedWave {
    pub wave: WaveType,
    pub records: Vec<TauXsample>,
    pub cmb: TauXsample,
    pub icb: TauXsample,
    pub center: TauXsample,
}

#[derive(Debug, Clone, Copy)]
struct DepthPoint {
    r: f64,
    z: f64,
    slow: f64,
}

/// Model samples merged with this wave's turning points, surface to centre.
fn depth_grid(model: &RadialModel, wave: WaveType, sampled: &SampledWave) -> Vec<DepthPoint> {
    let mut pts: Vec<DepthPoint> = Vec::new();
    let mut turns: Vec<DepthPoint> = sampled
        .samples
        .iter()
        .zip(&sampled.turns)
        .filter(|&(_, &t)| t)
        .map(|(s, _)| DepthPoint {
            r: s.r,
            z: s.z,
            slow: s.slow,
        })
        .collect();
    turns.sort_by(|a, b| b.r.partial_cmp(&a.r).unwrap());
    let mut ti = turns.into_iter().peekable();

    for s in model.samples.iter().rev() {
        while let Some(t) = ti.peek() {
            if t.r > s.r + R_EQ_TOL {
                let t = *t;
                ti.next();
                if pts
                    .last()
                    .map_or(true, |l| (l.r - t.r).abs() > R_EQ_TOL || (l.slow - t.slow).abs() > SLOW_EQ_TOL)
                {
                    pts.push(t);
                }
            } else {
                if (t.r - s.r).abs() <= R_EQ_TOL {
                    // Turning exactly at a model sample; the model point wins.
                    ti.next();
                }
                break;
            }
        }
        pts.push(DepthPoint {
            r: s.r,
            z: s.z,
            slow: s.slow(wave),
        });
    }
    pts
}

/// Accumulate tau/x down the depth grid for every merged ray parameter,
/// snapshotting earthquake-eligible depths and the three shell bottoms.
pub fn integrate_wave(
    model: &RadialModel,
    wave: WaveType,
    sampled: &SampledWave,
    merged: &[f64],
) -> ModelResult<IntegratedWave> {
    let pts = depth_grid(model, wave, sampled);
    let np = merged.len();
    let mut tau = vec![0.0f64; np];
    let mut x = vec![0.0f64; np];
    let mut ti = TauInt::new();

    let boundary_r = |name: ShellName| -> Option<f64> {
        model
            .shells
            .iter()
            .find(|sh| sh.is_disc && sh.name == name)
            .map(|sh| sh.r_bot)
    };
    let r_cmb = boundary_r(ShellName::CoreMantleBoundary);
    let r_icb = boundary_r(ShellName::InnerCoreBoundary);

    let mut records: Vec<TauXsample> = Vec::new();
    let mut cmb: Option<TauXsample> = None;
    let mut icb: Option<TauXsample> = None;
    let mut min_slow_above = f64::INFINITY;

    let snapshot = |name: String, pt: &DepthPoint, tau: &[f64], x: &[f64], lvz: bool| TauXsample {
        name,
        z: pt.z,
        depth_km: model.conv.real_depth(pt.z),
        slow: pt.slow,
        tau: tau.to_vec(),
        x: x.to_vec(),
        lvz,
    };

    for k in 0..pts.len() {
        if k > 0 {
            let top = pts[k - 1];
            let bot = pts[k];
            if (top.r - bot.r).abs() > R_EQ_TOL {
                let (u_top, u_bot) = (top.slow, bot.slow);
                for (i, &p) in merged.iter().enumerate() {
                    if p > u_top + SLOW_EQ_TOL {
                        continue;
                    }
                    let contrib = if p > u_bot + SLOW_EQ_TOL {
                        let z_turn = TauInt::turning_depth(p, u_top, u_bot, top.z, bot.z);
                        ti.int_layer(p, u_top, p, top.z, z_turn)
                    } else {
                        ti.int_layer(p, u_top, u_bot, top.z, bot.z)
                    };
                    let t = contrib.map_err(|_| ModelError::IntegrationDegenerate {
                        z: top.z,
                        slow_top: u_top,
                        slow_bot: u_bot,
                    })?;
                    tau[i] += t;
                    x[i] += ti.x_layer();
                }
            }
            min_slow_above = min_slow_above.min(top.slow);
        }

        let pt = &pts[k];
        let depth_km = model.conv.real_depth(pt.z);
        let lvz = pt.slow > min_slow_above + SLOW_EQ_TOL;

        if depth_km <= MAX_RECORD_DEPTH_KM
            && records
                .last()
                .map_or(true, |r| (r.z - pt.z).abs() > 1e-12)
        {
            records.push(snapshot(format!("z{:.2}", depth_km), pt, &tau, &x, lvz));
        }
        if let Some(rc) = r_cmb {
            if cmb.is_none() && pt.r <= rc + R_EQ_TOL {
                cmb = Some(snapshot("CMB".into(), pt, &tau, &x, lvz));
            }
        }
        if let Some(ri) = r_icb {
            if icb.is_none() && pt.r <= ri + R_EQ_TOL {
                icb = Some(snapshot("ICB".into(), pt, &tau, &x, lvz));
            }
        }
    }

    let last = pts.last().unwrap();
    let center = snapshot("CENTER".into(), last, &tau, &x, false);
    // Models without a core collapse all three shell snapshots onto the
    // centre; the core partials are then identically zero.
    let cmb = cmb.unwrap_or_else(|| center.clone());
    let icb = icb.unwrap_or_else(|| center.clone());

    debug!(
        "integrated {}: {} depth points, {} records",
        wave,
        pts.len(),
        records.len()
    );
    Ok(IntegratedWave {
        wave,
        records,
        cmb,
        icb,
        center,
    })
}

pub fn integrate_all(model: &RadialModel, sampling: &Sampling) -> ModelResult<[IntegratedWave; 2]> {
    let p = integrate_wave(
        model,
        WaveType::P,
        &sampling.waves[WaveType::P.index()],
        &sampling.merged,
    )?;
    let s = integrate_wave(
        model,
        WaveType::S,
        &sampling.waves[WaveType::S.index()],
        &sampling.merged,
    )?;
    Ok([p, s])
}
