// Radial Earth Model
// Owns the spherically symmetric model, its flattened slowness samples, the
// named shell table and the dimensionalisation constants

pub mod convert;
pub mod interp;
pub mod shells;

pub use convert::ModelConversions;
pub use interp::ShellSpline;
pub use shells::{refine_boundaries, Shell, ShellName};

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, ModelResult};

/// Relative velocity tolerance under which a shell-boundary step is bridged.
pub const VELOCITY_BRIDGE_TOL: f64 = 2.0e-5;
/// A model row at exactly r = 0 is floored here so the flattening stays finite.
pub const CENTER_RADIUS_FLOOR_KM: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveType {
    P,
    S,
}

impl WaveType {
    pub fn index(&self) -> usize {
        match self {
            WaveType::P => 0,
            WaveType::S => 1,
        }
    }

    pub fn other(&self) -> WaveType {
        match self {
            WaveType::P => WaveType::S,
            WaveType::S => WaveType::P,
        }
    }
}

impl std::fmt::Display for WaveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaveType::P => write!(f, "P"),
            WaveType::S => write!(f, "S"),
        }
    }
}

/// One radial sample of the model, bottom-up ordered. Two successive samples
/// with identical r encode a first-order discontinuity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelSample {
    pub r: f64,
    pub vp: f64,
    pub vs: f64,
    /// Flattened depth, ln(r * x_norm)
    pub z: f64,
    pub slow_p: f64,
    pub slow_s: f64,
    /// vs was zero on input; slow_s has been set equal to slow_p
    pub fluid: bool,
}

impl ModelSample {
    pub fn slow(&self, wave: WaveType) -> f64 {
        match wave {
            WaveType::P => self.slow_p,
            WaveType::S => self.slow_s,
        }
    }
}

/// Header line of the model file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHeader {
    pub name: String,
    pub n_samples: usize,
    pub r_surface: f64,
    pub r_upper_mantle: f64,
    pub r_moho: f64,
    pub r_conrad: f64,
}

/// The parsed, flattened, shell-partitioned radial model.
#[derive(Debug, Clone)]
pub struct RadialModel {
    pub header: ModelHeader,
    pub samples: Vec<ModelSample>,
    pub shells: Vec<Shell>,
    splines: Vec<Option<ShellSpline>>,
    pub conv: ModelConversions,
}

impl RadialModel {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ModelResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    pub fn from_str(text: &str) -> ModelResult<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = parse_header(
            lines
                .next()
                .ok_or_else(|| ModelError::Malformed("empty model file".into()))?,
        )?;

        let mut raw: Vec<(f64, f64, f64)> = Vec::with_capacity(header.n_samples);
        for (row, line) in lines.take(header.n_samples).enumerate() {
            let cols: Vec<f64> = line
                .split_whitespace()
                .skip(1) // row index
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|e| ModelError::Malformed(format!("row {}: {}", row + 1, e)))?;
            if cols.len() < 9 {
                return Err(ModelError::Malformed(format!(
                    "row {}: expected 9 values after the index, got {}",
                    row + 1,
                    cols.len()
                )));
            }
            let r = cols[0];
            // rho, eta and the Q columns are read and discarded; the
            // anisotropic velocities collapse to their isotropic mean.
            let vp = 0.5 * (cols[2] + cols[3]);
            let vs = 0.5 * (cols[4] + cols[5]);
            if let Some(&(r_prev, _, _)) = raw.last() {
                if r < r_prev - 1e-9 {
                    return Err(ModelError::NotMonotonic { row, r_prev, r });
                }
            }
            raw.push((r, vp, vs));
        }
        if raw.len() < header.n_samples {
            return Err(ModelError::Malformed(format!(
                "expected {} rows, found {}",
                header.n_samples,
                raw.len()
            )));
        }

        // Flatten degeneracies before any slowness is formed.
        if raw[0].0 <= 0.0 {
            raw[0].0 = CENTER_RADIUS_FLOOR_KM.min(raw[1].0);
        }
        bridge_boundaries(&mut raw);

        let (_, vp_surf, vs_surf) = *raw.last().unwrap();
        if vs_surf <= 0.0 || vp_surf <= 0.0 {
            return Err(ModelError::Malformed(
                "surface velocities must be positive".into(),
            ));
        }
        let conv = ModelConversions::new(header.r_surface, vs_surf);

        let samples: Vec<ModelSample> = raw
            .iter()
            .map(|&(r, vp, vs)| {
                let fluid = vs == 0.0;
                let vs_eff = if fluid { vp } else { vs };
                ModelSample {
                    r,
                    vp,
                    vs: vs_eff,
                    z: conv.flat_z(r),
                    slow_p: conv.flat_p(vp, r),
                    slow_s: conv.flat_p(vs_eff, r),
                    fluid,
                }
            })
            .collect();

        let shells = refine_boundaries(&samples, &header)?;
        let splines = shells
            .iter()
            .map(|sh| {
                if sh.is_disc {
                    None
                } else {
                    Some(ShellSpline::fit(&samples, sh))
                }
            })
            .collect();

        info!(
            "model {}: {} samples, {} shells, surface vp {:.3} vs {:.3}",
            header.name,
            samples.len(),
            shells.len(),
            vp_surf,
            vs_surf
        );

        Ok(Self {
            header,
            samples,
            shells,
            splines,
            conv,
        })
    }

    /// Interpolated (vp, vs) inside one shell; cubic when the shell has at
    /// least 3 samples, linear otherwise.
    pub fn interpolate(&self, shell_idx: usize, r: f64) -> ModelResult<(f64, f64)> {
        let shell = &self.shells[shell_idx];
        if !shell.contains_r(r) {
            return Err(ModelError::RadiusOutOfShell {
                r,
                shell: shell.name.to_string(),
                r_bot: shell.r_bot,
                r_top: shell.r_top,
            });
        }
        match &self.splines[shell_idx] {
            Some(sp) => Ok(sp.eval(r)),
            None => {
                // Discontinuity shell: the two samples share a radius.
                let s = &self.samples[shell.i_bot];
                Ok((s.vp, s.vs))
            }
        }
    }

    pub fn velocity(&self, shell_idx: usize, wave: WaveType, r: f64) -> ModelResult<f64> {
        let (vp, vs) = self.interpolate(shell_idx, r)?;
        Ok(match wave {
            WaveType::P => vp,
            WaveType::S => vs,
        })
    }

    /// Continuous shell containing radius r (the deepest match on a shared
    /// boundary sample).
    pub fn shell_of_radius(&self, r: f64) -> Option<usize> {
        self.shells
            .iter()
            .position(|sh| !sh.is_disc && sh.contains_r(r))
    }

    pub fn surface_slowness(&self, wave: WaveType) -> f64 {
        self.samples.last().unwrap().slow(wave)
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }
}

fn parse_header(line: &str) -> ModelResult<ModelHeader> {
    let mut it = line.split_whitespace();
    let name = it
        .next()
        .ok_or_else(|| ModelError::Malformed("missing model name".into()))?
        .to_string();
    let mut num = |what: &str| -> ModelResult<f64> {
        it.next()
            .ok_or_else(|| ModelError::Malformed(format!("missing header field {}", what)))?
            .parse()
            .map_err(|e| ModelError::Malformed(format!("header field {}: {}", what, e)))
    };
    let n_samples = num("N")? as usize;
    Ok(ModelHeader {
        name,
        n_samples,
        r_surface: num("rSurface")?,
        r_upper_mantle: num("rUpperMantle")?,
        r_moho: num("rMoho")?,
        r_conrad: num("rConrad")?,
    })
}

/// Force velocities bit-exactly equal across boundaries whose relative step is
/// below the bridge tolerance.
fn bridge_boundaries(raw: &mut [(f64, f64, f64)]) {
    for i in 0..raw.len() - 1 {
        if (raw[i + 1].0 - raw[i].0).abs() < 1e-9 {
            let (_, vp_lo, vs_lo) = raw[i];
            let (_, vp_hi, vs_hi) = raw[i + 1];
            if vp_lo > 0.0 && ((vp_hi - vp_lo) / vp_lo).abs() < VELOCITY_BRIDGE_TOL {
                raw[i + 1].1 = vp_lo;
            }
            if vs_lo > 0.0 && ((vs_hi - vs_lo) / vs_lo).abs() < VELOCITY_BRIDGE_TOL {
                raw[i + 1].2 = vs_lo;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fixtures::TOY_MODEL;

    #[test]
    fn test_parse_toy_model() {
        let model = RadialModel::from_str(TOY_MODEL).unwrap();
        assert_eq!(model.samples.len(), 12);
        assert_eq!(model.name(), "toy");
        // Centre row floored away from r = 0
        assert!(model.samples[0].r > 0.0);
        // Fluid outer core: slow_s == slow_p
        assert!(model.samples[2].fluid);
        assert_eq!(model.samples[2].slow_p, model.samples[2].slow_s);
        // Surface S slowness normalises to 1
        assert!((model.surface_slowness(WaveType::S) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shell_names_present() {
        let model = RadialModel::from_str(TOY_MODEL).unwrap();
        let names: Vec<ShellName> = model.shells.iter().map(|s| s.name).collect();
        assert!(names.contains(&ShellName::InnerCore));
        assert!(names.contains(&ShellName::OuterCore));
        assert!(names.contains(&ShellName::CoreMantleBoundary));
        assert!(names.contains(&ShellName::InnerCoreBoundary));
        assert!(names.contains(&ShellName::Moho));
        assert!(names.contains(&ShellName::UpperCrust));
    }

    #[test]
    fn test_bridge_small_step() {
        // 0.0001 km/s across the Conrad is below the relative tolerance and
        // must come out bit-exactly equal.
        let text = "\
bridged 4 6371.0 6000.0 6336.0 6351.0
0 6351.0 2.9 6.5000 6.5000 3.85 3.85 1.0 100.0 400.0
1 6351.0 2.7 6.4999 6.4999 3.85 3.85 1.0 100.0 400.0
2 6351.0 2.7 6.4999 6.4999 3.85 3.85 1.0 100.0 400.0
3 6371.0 2.7 5.8 5.8 3.46 3.46 1.0 100.0 400.0
";
        let model = RadialModel::from_str(text).unwrap();
        assert_eq!(model.samples[0].vp, model.samples[1].vp);
        assert_eq!(model.samples[0].vs, model.samples[1].vs);
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let text = "\
bad 3 6371.0 6000.0 6336.0 6351.0
0 6351.0 2.9 6.5 6.5 3.85 3.85 1.0 100.0 400.0
1 6300.0 2.7 5.8 5.8 3.46 3.46 1.0 100.0 400.0
2 6371.0 2.7 5.8 5.8 3.46 3.46 1.0 100.0 400.0
";
        assert!(matches!(
            RadialModel::from_str(text),
            Err(ModelError::NotMonotonic { .. })
        ));
    }

    #[test]
    fn test_interpolate_out_of_shell() {
        let model = RadialModel::from_str(TOY_MODEL).unwrap();
        let mantle = model
            .shells
            .iter()
            .position(|s| !s.is_disc && s.name == ShellName::LowerMantle)
            .unwrap();
        assert!(matches!(
            model.interpolate(mantle, 100.0),
            Err(ModelError::RadiusOutOfShell { .. })
        ));
    }
}
