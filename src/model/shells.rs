// Shell table construction
// Partitions the radial model into named continuous shells and zero-thickness
// discontinuities, matched against the boundary radii from the model header

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{ModelHeader, ModelSample};
use crate::errors::ModelResult;

/// Closed set of shell names. Continuous shells carry the region names,
/// discontinuities the four dedicated boundary names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShellName {
    InnerCore,
    OuterCore,
    LowerMantle,
    UpperMantle,
    LowerCrust,
    UpperCrust,
    InnerCoreBoundary,
    CoreMantleBoundary,
    Moho,
    Conrad,
}

impl ShellName {
    /// Target distance spacing in km for slowness sampling inside this shell.
    pub fn delta_x_target(&self) -> f64 {
        match self {
            ShellName::InnerCore | ShellName::InnerCoreBoundary => 300.0,
            ShellName::OuterCore | ShellName::CoreMantleBoundary => 300.0,
            ShellName::LowerMantle => 150.0,
            ShellName::UpperMantle | ShellName::Moho => 150.0,
            ShellName::LowerCrust | ShellName::Conrad => 100.0,
            ShellName::UpperCrust => 100.0,
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            ShellName::InnerCoreBoundary
                | ShellName::CoreMantleBoundary
                | ShellName::Moho
                | ShellName::Conrad
        )
    }
}

impl std::fmt::Display for ShellName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShellName::InnerCore => "INNER_CORE",
            ShellName::OuterCore => "OUTER_CORE",
            ShellName::LowerMantle => "LOWER_MANTLE",
            ShellName::UpperMantle => "UPPER_MANTLE",
            ShellName::LowerCrust => "LOWER_CRUST",
            ShellName::UpperCrust => "UPPER_CRUST",
            ShellName::InnerCoreBoundary => "INNER_CORE_BOUNDARY",
            ShellName::CoreMantleBoundary => "CORE_MANTLE_BOUNDARY",
            ShellName::Moho => "MOHO",
            ShellName::Conrad => "CONRAD",
        };
        write!(f, "{}", s)
    }
}

/// One shell: a continuous radial interval or a zero-thickness discontinuity.
/// Indices are into the bottom-up sample array, inclusive at both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shell {
    pub i_bot: usize,
    pub i_top: usize,
    pub r_bot: f64,
    pub r_top: f64,
    pub is_disc: bool,
    pub name: ShellName,
    pub delta_x_target: f64,
}

impl Shell {
    pub fn contains_r(&self, r: f64) -> bool {
        r >= self.r_bot - 1e-9 && r <= self.r_top + 1e-9
    }
}

const RADIUS_EQ_TOL: f64 = 1e-9;
// Boundary targets farther than this from any discontinuity fall back to the
// nearest sample.
const BOUNDARY_MATCH_TOL_KM: f64 = 200.0;

/// Region boundary radii resolved against the actual sample grid.
struct RegionBoundaries {
    icb: Option<f64>,
    cmb: Option<f64>,
    upper_mantle: Option<f64>,
    moho: Option<f64>,
    conrad: Option<f64>,
}

/// Match the header's boundary radii to the model grid, name the shells and
/// tag every continuous shell with the region it belongs to.
pub fn refine_boundaries(samples: &[ModelSample], header: &ModelHeader) -> ModelResult<Vec<Shell>> {
    let disc_indices: Vec<usize> = (0..samples.len() - 1)
        .filter(|&i| (samples[i + 1].r - samples[i].r).abs() < RADIUS_EQ_TOL)
        .collect();
    let disc_radii: Vec<f64> = disc_indices.iter().map(|&i| samples[i].r).collect();

    let bounds = resolve_regions(samples, header, &disc_radii);

    // Region floors from the centre up; a shell belongs to the deepest region
    // whose floor lies at or below it.
    let mut floors: Vec<(f64, ShellName)> = vec![(0.0, ShellName::InnerCore)];
    if let Some(r) = bounds.icb {
        floors.push((r, ShellName::OuterCore));
    }
    if let Some(r) = bounds.cmb {
        floors.push((r, ShellName::LowerMantle));
    } else {
        // No fluid core in this model: everything below the mantle targets is
        // treated as lower mantle.
        floors[0].1 = ShellName::LowerMantle;
    }
    if let Some(r) = bounds.upper_mantle {
        floors.push((r, ShellName::UpperMantle));
    }
    if let Some(r) = bounds.moho {
        floors.push((r, ShellName::LowerCrust));
    }
    if let Some(r) = bounds.conrad {
        floors.push((r, ShellName::UpperCrust));
    } else if bounds.moho.is_some() {
        // Without a Conrad the whole crust is sampled at the upper-crust target.
        let n = floors.len();
        floors[n - 1].1 = ShellName::UpperCrust;
    }

    let region_of = |r: f64| -> ShellName {
        let mut name = floors[0].1;
        for &(floor, n) in &floors {
            if r >= floor - RADIUS_EQ_TOL {
                name = n;
            }
        }
        name
    };

    let boundary_name_of = |r: f64| -> Option<ShellName> {
        let near = |b: Option<f64>| b.map_or(false, |br| (br - r).abs() < RADIUS_EQ_TOL);
        if near(bounds.icb) {
            Some(ShellName::InnerCoreBoundary)
        } else if near(bounds.cmb) {
            Some(ShellName::CoreMantleBoundary)
        } else if near(bounds.moho) {
            Some(ShellName::Moho)
        } else if near(bounds.conrad) {
            Some(ShellName::Conrad)
        } else {
            None
        }
    };

    // Shells split at every discontinuity and at every region floor; adjacent
    // continuous shells share the boundary sample.
    let mut shells = Vec::new();
    let mut i_bot = 0usize;
    let mut cur_region: Option<ShellName> = None;
    let push_continuous = |shells: &mut Vec<Shell>, i_bot: usize, i_top: usize| {
        let mid = 0.5 * (samples[i_bot].r + samples[i_top].r);
        let name = region_of(mid);
        shells.push(Shell {
            i_bot,
            i_top,
            r_bot: samples[i_bot].r,
            r_top: samples[i_top].r,
            is_disc: false,
            name,
            delta_x_target: name.delta_x_target(),
        });
    };
    for i in 0..samples.len() - 1 {
        let is_disc = (samples[i + 1].r - samples[i].r).abs() < RADIUS_EQ_TOL;
        if is_disc {
            if i > i_bot {
                push_continuous(&mut shells, i_bot, i);
            }
            let name = boundary_name_of(samples[i].r)
                .unwrap_or_else(|| region_of(samples[i].r - RADIUS_EQ_TOL));
            shells.push(Shell {
                i_bot: i,
                i_top: i + 1,
                r_bot: samples[i].r,
                r_top: samples[i + 1].r,
                is_disc: true,
                name,
                delta_x_target: name.delta_x_target(),
            });
            i_bot = i + 1;
            cur_region = None;
        } else {
            let layer_region = region_of(0.5 * (samples[i].r + samples[i + 1].r));
            if let Some(region) = cur_region {
                if region != layer_region {
                    push_continuous(&mut shells, i_bot, i);
                    i_bot = i;
                }
            }
            cur_region = Some(layer_region);
        }
    }
    if i_bot < samples.len() - 1 {
        push_continuous(&mut shells, i_bot, samples.len() - 1);
    }

    for shell in &shells {
        debug!(
            "shell {:>20} [{:9.2}, {:9.2}] km disc={} dX={} km",
            shell.name.to_string(),
            shell.r_bot,
            shell.r_top,
            shell.is_disc,
            shell.delta_x_target
        );
    }
    Ok(shells)
}

fn resolve_regions(
    samples: &[ModelSample],
    header: &ModelHeader,
    disc_radii: &[f64],
) -> RegionBoundaries {
    // Fluid region (vs == 0 on input) delimits the outer core exactly.
    let fluid_lo = samples.iter().position(|s| s.fluid);
    let fluid_hi = samples.iter().rposition(|s| s.fluid);
    let (icb, cmb) = match (fluid_lo, fluid_hi) {
        (Some(lo), Some(hi)) => (Some(samples[lo].r), Some(samples[hi].r)),
        _ => {
            warn!("model has no fluid outer core; core phases will be absent");
            (None, None)
        }
    };

    let match_target = |target: f64, what: &str| -> Option<f64> {
        let best_disc = disc_radii
            .iter()
            .cloned()
            .min_by(|a, b| (a - target).abs().partial_cmp(&(b - target).abs()).unwrap());
        match best_disc {
            Some(r) if (r - target).abs() <= BOUNDARY_MATCH_TOL_KM => Some(r),
            _ => {
                let nearest = samples
                    .iter()
                    .map(|s| s.r)
                    .min_by(|a, b| (a - target).abs().partial_cmp(&(b - target).abs()).unwrap());
                warn!(
                    "no discontinuity near {} target {} km; using nearest sample {:?}",
                    what, target, nearest
                );
                nearest
            }
        }
    };

    RegionBoundaries {
        icb,
        cmb,
        upper_mantle: match_target(header.r_upper_mantle, "upper-mantle"),
        moho: match_target(header.r_moho, "Moho"),
        conrad: match_target(header.r_conrad, "Conrad"),
    }
}
