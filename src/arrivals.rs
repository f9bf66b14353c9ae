// Arrival Generator
// Unwraps the requested distance, inverts every branch, applies corrections
// and statistics, then filters and orders the arrival list

use std::f64::consts::PI;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::auxdata::AuxData;
use crate::branch::BounceKind;
use crate::corrections;
use crate::depth::{VolatileBranch, VolatileTables};
use crate::errors::validate_bounds;
use crate::geometry;
use crate::model::WaveType;
use crate::session::SessionFlags;
use crate::tables::RefTables;

/// Coincident-candidate guard for the 0 and 180 degree edges.
pub const DTOL: f64 = 1.0e-9;
/// Arrivals of the same phase closer than this are chatter, seconds.
pub const DT_CHATTER: f64 = 0.005;
/// Observability taper window behind a preceding arrival, seconds.
pub const DT_OBSERV: f64 = 3.0;

/// Fixed group velocities of the surface-wave stubs, km/s.
pub const LG_GROUP_VELOCITY: f64 = 3.5396;
pub const LR_GROUP_VELOCITY: f64 = 3.9;
const MAX_LG_DELTA_DEG: f64 = 30.0;
const MAX_LG_DEPTH_KM: f64 = 35.0;
const MAX_LR_DEPTH_KM: f64 = 55.0;

/// Spread assigned when a phase has no informative statistics, seconds.
const DEFAULT_SPREAD: f64 = 12.0;
const MIN_WINDOW: f64 = 5.0;
const WINDOW_PER_SPREAD: f64 = 7.0;

/// A travel-time query. Geographic fields are optional; when any is missing
/// the request degrades to the simple distance form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    pub delta_deg: Option<f64>,
    /// Receiver elevation, km
    pub elev_km: f64,
    pub source_lat: Option<f64>,
    pub source_lon: Option<f64>,
    pub recv_lat: Option<f64>,
    pub recv_lon: Option<f64>,
}

/// One arrival in the ordered output list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TTime {
    pub phase_code: String,
    /// Travel time, s
    pub tt: f64,
    /// dT/d-distance, s/deg
    pub d_tdd: f64,
    /// dT/d-depth at the source, s/km
    pub d_tdz: f64,
    pub spread: f64,
    pub observ: f64,
    /// Association window, s
    pub window: f64,
    pub phase_group: String,
    pub aux_group: String,
    pub regional: bool,
    pub depth_sensitive: bool,
    pub can_use: bool,
    pub dis_respect: bool,
}

struct Geometry {
    delta_deg: f64,
    azimuth_deg: Option<f64>,
    source_colat: Option<f64>,
    source_lat: Option<f64>,
    source_lon: Option<f64>,
}

/// Generate the full ordered arrival list for one request.
pub fn generate(
    tables: &RefTables,
    vol: &VolatileTables,
    aux: &AuxData,
    flags: &SessionFlags,
    phase_list: &[String],
    request: &Request,
) -> Vec<TTime> {
    if vol.bad_depth {
        return Vec::new();
    }
    let Some(geom) = resolve_geometry(request) else {
        return Vec::new();
    };
    let elev_km = request.elev_km.clamp(-11.0, 9.0);

    let candidates = unwrap_distance(geom.delta_deg);
    let mut arrivals: Vec<TTime> = Vec::new();

    for branch in &vol.branches {
        if !matches_phase_list(&branch.phase_code, phase_list, flags) {
            continue;
        }
        for &x_cand in &candidates {
            for p_star in invert_branch(branch, x_cand) {
                if let Some(tt) = make_arrival(
                    tables, vol, aux, flags, branch, p_star, x_cand, elev_km, &geom,
                ) {
                    // pwP rides along with an oceanic pP bounce.
                    if branch.phase_code == "pP" {
                        if let Some(pwp) =
                            make_pwp(tables, aux, branch, p_star, x_cand, &geom, &tt)
                        {
                            arrivals.push(pwp);
                        }
                    }
                    arrivals.push(tt);
                }
            }
        }
    }

    surface_wave_stubs(tables, vol, aux, flags, phase_list, &geom, &mut arrivals);

    apply_filters(&mut arrivals, aux, flags);
    debug!(
        "{} arrivals at {:.3} deg, depth {:.2} km",
        arrivals.len(),
        geom.delta_deg,
        vol.depth_km
    );
    arrivals
}

fn resolve_geometry(request: &Request) -> Option<Geometry> {
    if let (Some(slat), Some(slon), Some(rlat), Some(rlon)) = (
        request.source_lat,
        request.source_lon,
        request.recv_lat,
        request.recv_lon,
    ) {
        let ok = validate_bounds(slat, -90.0, 90.0, "source latitude").is_ok()
            && validate_bounds(rlat, -90.0, 90.0, "receiver latitude").is_ok()
            && validate_bounds(slon, -360.0, 360.0, "source longitude").is_ok()
            && validate_bounds(rlon, -360.0, 360.0, "receiver longitude").is_ok();
        if ok {
            let (delta, azimuth) = geometry::delaz(slat, slon, rlat, rlon);
            return Some(Geometry {
                delta_deg: delta,
                azimuth_deg: Some(azimuth),
                source_colat: Some(geometry::geocentric_colat(slat)),
                source_lat: Some(slat),
                source_lon: Some(slon),
            });
        }
        // Invalid geographic inputs degrade to the simple form.
    }
    let delta = request.delta_deg?;
    if validate_bounds(delta, 0.0, 180.0, "distance").is_err() {
        return None;
    }
    Some(Geometry {
        delta_deg: delta,
        azimuth_deg: None,
        source_colat: None,
        source_lat: None,
        source_lon: None,
    })
}

/// Candidate non-dimensional distances on the half circle: the folded
/// distance, its complement and one full extra orbit.
fn unwrap_distance(delta_deg: f64) -> Vec<f64> {
    let two_pi = 2.0 * PI;
    let mut x0 = delta_deg.to_radians().rem_euclid(two_pi);
    if x0 > PI {
        x0 = two_pi - x0;
    }
    x0 = x0.clamp(DTOL, PI - DTOL);
    let raw = [x0, two_pi - x0, x0 + two_pi];
    let mut out: Vec<f64> = Vec::new();
    for x in raw {
        if out.iter().all(|&y| (y - x).abs() > 2.0 * DTOL) {
            out.push(x);
        }
    }
    out
}

/// Distance mismatch under which a candidate snaps onto a branch endpoint,
/// radians. Covers grazing and antipodal rays that sit a hair outside the
/// sampled range.
const X_EDGE_TOL: f64 = 1.0e-4;

/// All ray parameters on one branch whose distance matches the candidate.
fn invert_branch(branch: &VolatileBranch, x_cand: f64) -> Vec<f64> {
    let mut roots: Vec<f64> = Vec::new();
    if x_cand < branch.x_range[0] - X_EDGE_TOL || x_cand > branch.x_range[1] + X_EDGE_TOL {
        return roots;
    }
    for k in 0..branch.x.len() - 1 {
        let (lo, hi) = if branch.x[k] <= branch.x[k + 1] {
            (branch.x[k], branch.x[k + 1])
        } else {
            (branch.x[k + 1], branch.x[k])
        };
        if x_cand < lo - 1e-12 || x_cand > hi + 1e-12 {
            continue;
        }
        if let Some(p) = branch.basis.invert_x(x_cand, branch.p[k], branch.p[k + 1]) {
            if roots.iter().all(|&r| (r - p).abs() > 1e-12) {
                roots.push(p);
            }
        }
    }
    if roots.is_empty() {
        let n = branch.x.len();
        for (xe, pe) in [(branch.x[0], branch.p[0]), (branch.x[n - 1], branch.p[n - 1])] {
            if (x_cand - xe).abs() <= X_EDGE_TOL {
                roots.push(pe);
                break;
            }
        }
    }
    roots
}

#[allow(clippy::too_many_arguments)]
fn make_arrival(
    tables: &RefTables,
    vol: &VolatileTables,
    aux: &AuxData,
    flags: &SessionFlags,
    branch: &VolatileBranch,
    p_star: f64,
    x_cand: f64,
    elev_km: f64,
    geom: &Geometry,
) -> Option<TTime> {
    let conv = &tables.model.conv;
    let (tau, _, _) = branch.basis.evaluate(p_star)?;
    let mut tt = conv.dim_time(tau + p_star * x_cand);
    let d_tdd = conv.dim_slowness_deg(p_star);
    let p_skm = conv.dim_slowness_km(p_star);

    // Depth derivative from the vertical slowness at the source.
    let (src_wave, sign) = if branch.seg.up_going {
        (branch.seg.up, 1.0)
    } else {
        (branch.seg.down, -1.0)
    };
    let u_src = vol.p_source[src_wave.index()];
    let eta = (u_src * u_src - p_star * p_star).max(0.0).sqrt();
    let d_tdz = sign * eta / (conv.t_norm * vol.r_src);

    let code = &branch.phase_code;
    let is_surface_wave = code.starts_with('L');
    let skip_elev = is_surface_wave || (flags.use_rstt && aux.groups.is_regional(code));
    if !skip_elev {
        tt += corrections::elevation_correction(elev_km, p_skm, branch.seg.ret);
    }

    if let (Some(colat), Some(az)) = (geom.source_colat, geom.azimuth_deg) {
        if let Some(coeffs) = aux
            .ellip
            .coefficients(code, geom.delta_deg, vol.depth_km)
        {
            tt += corrections::ellipticity_correction(coeffs, colat, az.to_radians());
        }
        // Bounce-point correction for surface reflections.
        if branch.bounce != BounceKind::None {
            if let Some(elev_b) = bounce_elevation(tables, aux, branch, p_star, x_cand, geom) {
                let (down, up) = bounce_types(branch);
                let corr = corrections::bounce_correction(elev_b, p_skm, down, up);
                if corr.is_nan() {
                    return None;
                }
                tt += corr;
            }
        }
    }

    let (spread, observ, has_stats) = match aux.stats.lookup(code) {
        Some(ps) => {
            if !flags.plot_mode {
                tt += aux.stats.bias(ps, geom.delta_deg);
            }
            (
                aux.stats.spread(ps, geom.delta_deg),
                aux.stats.observability(ps, geom.delta_deg),
                true,
            )
        }
        None => (DEFAULT_SPREAD, 0.0, false),
    };
    let (group, aux_group) = aux.groups.phase_group(code);

    Some(TTime {
        phase_code: code.clone(),
        tt,
        d_tdd,
        d_tdz,
        spread,
        observ,
        window: MIN_WINDOW.max(WINDOW_PER_SPREAD * spread),
        phase_group: group.unwrap_or("").to_string(),
        aux_group: aux_group.unwrap_or("").to_string(),
        regional: aux.groups.is_regional(code),
        depth_sensitive: aux.groups.is_depth_sensitive(code),
        can_use: has_stats && aux.groups.can_use(code),
        dis_respect: aux.groups.should_down_weight(code),
    })
}

fn bounce_types(branch: &VolatileBranch) -> (WaveType, WaveType) {
    match branch.bounce {
        BounceKind::DepthPhase => (branch.seg.up, branch.seg.down),
        BounceKind::SurfaceConverted => (branch.seg.down, branch.seg.ret),
        _ => (branch.seg.down, branch.seg.down),
    }
}

/// Elevation at the surface bounce point, traced along the great circle.
fn bounce_elevation(
    tables: &RefTables,
    aux: &AuxData,
    branch: &VolatileBranch,
    p_star: f64,
    x_cand: f64,
    geom: &Geometry,
) -> Option<f64> {
    let (slat, slon, az) = (geom.source_lat?, geom.source_lon?, geom.azimuth_deg?);
    let x_bounce = match branch.bounce {
        BounceKind::DepthPhase => {
            // Up-leg distance: the volatile branch carries the up-leg on top
            // of its reference arrays.
            let rb = &tables.branches[branch.ref_idx?];
            let x_vol = branch.basis.x_at(p_star)?;
            let x_ref = rb.basis.x_at(p_star.min(rb.p_range[1]))?;
            (x_vol - x_ref).max(0.0)
        }
        BounceKind::SurfaceSameType => 0.5 * x_cand,
        BounceKind::SurfaceConverted => first_leg_distance(tables, branch.seg.down, p_star),
        BounceKind::None => return None,
    };
    let (blat, blon) = geometry::project(slat, slon, az, x_bounce.to_degrees());
    Some(
        aux.topo
            .as_ref()
            .map_or(0.0, |grid| grid.elevation_km(blat, blon)),
    )
}

/// Two-way distance of the first (mantle) leg, interpolated on the merged
/// grid.
fn first_leg_distance(tables: &RefTables, wave: WaveType, p: f64) -> f64 {
    let merged = &tables.sampling.merged;
    let xm = &tables.integrated[wave.index()].cmb.x;
    // merged is descending
    for k in 0..merged.len() - 1 {
        if p <= merged[k] + 1e-12 && p >= merged[k + 1] - 1e-12 {
            let f = if (merged[k] - merged[k + 1]).abs() < 1e-15 {
                0.0
            } else {
                (merged[k] - p) / (merged[k] - merged[k + 1])
            };
            return 2.0 * (xm[k] * (1.0 - f) + xm[k + 1] * f);
        }
    }
    0.0
}

#[allow(clippy::too_many_arguments)]
fn make_pwp(
    tables: &RefTables,
    aux: &AuxData,
    branch: &VolatileBranch,
    p_star: f64,
    x_cand: f64,
    geom: &Geometry,
    base: &TTime,
) -> Option<TTime> {
    let conv = &tables.model.conv;
    let elev_b = bounce_elevation(tables, aux, branch, p_star, x_cand, geom)?;
    let p_skm = conv.dim_slowness_km(p_star);
    let dt = corrections::pwp_correction(elev_b, p_skm)?;
    let mut out = base.clone();
    out.phase_code = "pwP".to_string();
    out.tt += dt;
    let (group, aux_group) = aux.groups.phase_group("pwP");
    out.phase_group = group.unwrap_or(&base.phase_group).to_string();
    out.aux_group = aux_group.unwrap_or(&base.aux_group).to_string();
    out.can_use = aux.groups.can_use("pwP") && aux.stats.lookup("pwP").is_some();
    Some(out)
}

/// Lg and LR from fixed group velocities; no elevation correction by
/// definition.
fn surface_wave_stubs(
    tables: &RefTables,
    vol: &VolatileTables,
    aux: &AuxData,
    flags: &SessionFlags,
    phase_list: &[String],
    geom: &Geometry,
    arrivals: &mut Vec<TTime>,
) {
    let conv = &tables.model.conv;
    let arc_km = geom.delta_deg.to_radians() * conv.r_surface;
    let per_deg = conv.r_surface * PI / 180.0;
    let mut push = |code: &str, v_group: f64| {
        if !matches_phase_list(code, phase_list, flags) {
            return;
        }
        let (spread, observ, has_stats) = match aux.stats.lookup(code) {
            Some(ps) => (
                aux.stats.spread(ps, geom.delta_deg),
                aux.stats.observability(ps, geom.delta_deg),
                true,
            ),
            None => (DEFAULT_SPREAD, 0.0, false),
        };
        let (group, aux_group) = aux.groups.phase_group(code);
        arrivals.push(TTime {
            phase_code: code.to_string(),
            tt: arc_km / v_group,
            d_tdd: per_deg / v_group,
            d_tdz: 0.0,
            spread,
            observ,
            window: MIN_WINDOW.max(WINDOW_PER_SPREAD * spread),
            phase_group: group.unwrap_or("").to_string(),
            aux_group: aux_group.unwrap_or("").to_string(),
            regional: aux.groups.is_regional(code),
            depth_sensitive: aux.groups.is_depth_sensitive(code),
            can_use: has_stats && aux.groups.can_use(code),
            dis_respect: aux.groups.should_down_weight(code),
        });
    };
    if vol.depth_km <= MAX_LG_DEPTH_KM && geom.delta_deg <= MAX_LG_DELTA_DEG {
        push("Lg", LG_GROUP_VELOCITY);
    }
    if vol.depth_km <= MAX_LR_DEPTH_KM {
        push("LR", LR_GROUP_VELOCITY);
    }
}

fn matches_phase_list(code: &str, phase_list: &[String], flags: &SessionFlags) -> bool {
    if phase_list.is_empty() {
        return true;
    }
    phase_list.iter().any(|ph| {
        code.starts_with(ph.as_str())
            || (flags.return_all_phases
                && code
                    .strip_prefix('p')
                    .or_else(|| code.strip_prefix('s'))
                    .map_or(false, |c| c.starts_with(ph.as_str())))
    })
}

/// Chatter, tectonic renaming, back-branch removal, observability taper and
/// chaff in the prescribed order; output ascending in time.
fn apply_filters(arrivals: &mut Vec<TTime>, aux: &AuxData, flags: &SessionFlags) {
    arrivals.sort_by(|a, b| a.tt.partial_cmp(&b.tt).unwrap());

    if flags.tectonic {
        for a in arrivals.iter_mut() {
            a.phase_code = tectonic_rename(&a.phase_code);
        }
    }

    // Chatter: identical phase codes closer than DT_CHATTER collapse.
    let mut kept: Vec<TTime> = Vec::with_capacity(arrivals.len());
    for a in arrivals.drain(..) {
        let dup = kept
            .last()
            .map_or(false, |k: &TTime| {
                k.phase_code == a.phase_code && (a.tt - k.tt).abs() <= DT_CHATTER
            });
        if !dup {
            kept.push(a);
        }
    }
    *arrivals = kept;

    if !flags.return_back_branches {
        let mut seen: Vec<String> = Vec::new();
        arrivals.retain(|a| {
            if seen.iter().any(|s| s == &a.phase_code) {
                false
            } else {
                seen.push(a.phase_code.clone());
                true
            }
        });
    }

    // Half-cosine observability taper behind a close predecessor.
    for i in 1..arrivals.len() {
        let dt = arrivals[i].tt - arrivals[i - 1].tt;
        if dt < DT_OBSERV {
            let taper = 0.5 * (1.0 - (PI * dt / DT_OBSERV).cos());
            arrivals[i].observ *= taper;
        }
    }

    if !flags.return_all_phases {
        arrivals.retain(|a| a.can_use && !aux.groups.is_chaff(&a.phase_code));
    }
}

/// Pb and Sb become their g counterparts in tectonic settings; core phases
/// whose code continues with K are left alone.
fn tectonic_rename(code: &str) -> String {
    let mut out = code.to_string();
    for (from, to) in [("Pb", "Pg"), ("Sb", "Sg")] {
        if let Some(pos) = out.find(from) {
            let after = &out[pos + from.len()..];
            if !after.starts_with('K') {
                out.replace_range(pos..pos + from.len(), to);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(code: &str, tt: f64) -> TTime {
        TTime {
            phase_code: code.to_string(),
            tt,
            d_tdd: 0.0,
            d_tdz: 0.0,
            spread: 1.0,
            observ: 100.0,
            window: 5.0,
            phase_group: String::new(),
            aux_group: String::new(),
            regional: false,
            depth_sensitive: false,
            can_use: true,
            dis_respect: false,
        }
    }

    fn aux() -> AuxData {
        use crate::fixtures::{TOY_ELLIP, TOY_GROUPS, TOY_STATS};
        AuxData::from_strs(TOY_GROUPS, TOY_STATS, TOY_ELLIP).unwrap()
    }

    fn flags_all() -> SessionFlags {
        SessionFlags {
            return_all_phases: true,
            return_back_branches: true,
            tectonic: false,
            use_rstt: false,
            plot_mode: false,
        }
    }

    #[test]
    fn test_unwrap_edges() {
        let c0 = unwrap_distance(0.0);
        assert!(c0[0] >= DTOL);
        let c180 = unwrap_distance(180.0);
        // The complement collapses onto the folded distance at 180.
        assert_eq!(c180.len(), 2);
        let c90 = unwrap_distance(90.0);
        assert_eq!(c90.len(), 3);
    }

    #[test]
    fn test_chatter_filter() {
        let a = aux();
        let mut arrivals = vec![stub("P", 100.0), stub("P", 100.003), stub("P", 100.5)];
        apply_filters(&mut arrivals, &a, &flags_all());
        assert_eq!(arrivals.len(), 2);
        for w in arrivals.windows(2) {
            assert!(
                w[0].phase_code != w[1].phase_code || w[1].tt - w[0].tt > DT_CHATTER
            );
        }
    }

    #[test]
    fn test_back_branch_filter() {
        let a = aux();
        let mut flags = flags_all();
        flags.return_back_branches = false;
        let mut arrivals = vec![stub("PKPdf", 1200.0), stub("PKPab", 1205.0), stub("PKPdf", 1210.0)];
        apply_filters(&mut arrivals, &a, &flags);
        let codes: Vec<&str> = arrivals.iter().map(|t| t.phase_code.as_str()).collect();
        assert_eq!(codes, vec!["PKPdf", "PKPab"]);
    }

    #[test]
    fn test_tectonic_rename() {
        assert_eq!(tectonic_rename("Pb"), "Pg");
        assert_eq!(tectonic_rename("sSb"), "sSg");
        assert_eq!(tectonic_rename("PKP"), "PKP");
    }

    #[test]
    fn test_observability_taper() {
        let a = aux();
        let mut arrivals = vec![stub("P", 100.0), stub("S", 101.5)];
        apply_filters(&mut arrivals, &a, &flags_all());
        assert!((arrivals[0].observ - 100.0).abs() < 1e-12);
        assert!(arrivals[1].observ < 100.0);
        assert!((arrivals[1].observ - 50.0).abs() < 1e-9); // half-cosine midpoint
    }

    #[test]
    fn test_ordering_invariant() {
        let a = aux();
        let mut arrivals = vec![stub("S", 300.0), stub("P", 100.0), stub("PP", 200.0)];
        apply_filters(&mut arrivals, &a, &flags_all());
        for w in arrivals.windows(2) {
            assert!(w[0].tt <= w[1].tt);
        }
    }

    #[test]
    fn test_phase_list_matching() {
        let flags = flags_all();
        let list = vec!["PKP".to_string(), "SKP".to_string()];
        assert!(matches_phase_list("PKPdf", &list, &flags));
        assert!(matches_phase_list("SKPab", &list, &flags));
        // Surface-reflected prefixes allowed when all phases are returned.
        assert!(matches_phase_list("pPKPdf", &list, &flags));
        assert!(!matches_phase_list("P", &list, &flags));
    }
}
