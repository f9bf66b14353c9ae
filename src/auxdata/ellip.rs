// Ellipticity Tables
// Per-phase bilinear tables of the three Dziewonski-Gilbert coefficients
// over distance and a fixed depth grid

use crate::errors::{AuxDataError, AuxDataResult};

/// Fixed depth grid of the coefficient profiles, km.
pub const ELLIP_DEPTHS: [f64; 3] = [0.0, 350.0, 700.0];

#[derive(Debug, Clone)]
pub struct EllipTable {
    pub phase: String,
    pub d_min: f64,
    pub d_max: f64,
    pub delta: Vec<f64>,
    /// Coefficient triples per distance row, one entry per fixed depth
    pub t0: Vec<[f64; 3]>,
    pub t1: Vec<[f64; 3]>,
    pub t2: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Default)]
pub struct EllipTables {
    pub tables: Vec<EllipTable>,
}

impl EllipTables {
    pub fn parse(text: &str) -> AuxDataResult<Self> {
        let mut tables = Vec::new();
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        while let Some(header) = lines.next() {
            let head: Vec<&str> = header.split_whitespace().collect();
            if head.len() != 4 {
                return Err(AuxDataError::Malformed {
                    file: "ellip".into(),
                    reason: format!("bad header '{}'", header),
                });
            }
            let phase = head[0].to_string();
            let n: usize = head[1].parse().map_err(|_| AuxDataError::Malformed {
                file: "ellip".into(),
                reason: format!("bad count in '{}'", header),
            })?;
            let d_min: f64 = num(head[2])?;
            let d_max: f64 = num(head[3])?;

            let mut delta = Vec::with_capacity(n);
            let mut t0 = Vec::with_capacity(n);
            let mut t1 = Vec::with_capacity(n);
            let mut t2 = Vec::with_capacity(n);
            for _ in 0..n {
                let line = lines.next().ok_or_else(|| AuxDataError::Malformed {
                    file: "ellip".into(),
                    reason: format!("truncated table for {}", phase),
                })?;
                let cols: Vec<f64> = line
                    .split_whitespace()
                    .map(num)
                    .collect::<AuxDataResult<_>>()?;
                if cols.len() != 10 {
                    return Err(AuxDataError::Malformed {
                        file: "ellip".into(),
                        reason: format!("expected 10 columns, got {}", cols.len()),
                    });
                }
                delta.push(cols[0]);
                // Three depth-profile triples (t0, t1, t2) per row.
                t0.push([cols[1], cols[4], cols[7]]);
                t1.push([cols[2], cols[5], cols[8]]);
                t2.push([cols[3], cols[6], cols[9]]);
            }
            tables.push(EllipTable {
                phase,
                d_min,
                d_max,
                delta,
                t0,
                t1,
                t2,
            });
        }
        Ok(Self { tables })
    }

    pub fn find(&self, code: &str) -> Option<&EllipTable> {
        self.tables
            .iter()
            .find(|t| t.phase == code)
            .or_else(|| {
                super::stats::candidate_codes(code)
                    .into_iter()
                    .find_map(|c| self.tables.iter().find(|t| t.phase == c))
            })
    }

    /// Bilinearly interpolated (t0, t1, t2) at (distance, depth), or None
    /// outside the table's distance range.
    pub fn coefficients(&self, code: &str, delta: f64, depth_km: f64) -> Option<(f64, f64, f64)> {
        let table = self.find(code)?;
        if delta < table.d_min - 1e-9 || delta > table.d_max + 1e-9 || table.delta.len() < 2 {
            return None;
        }
        let d = delta.clamp(table.delta[0], *table.delta.last().unwrap());
        let j = table
            .delta
            .windows(2)
            .position(|w| d <= w[1])
            .unwrap_or(table.delta.len() - 2);
        let f = ((d - table.delta[j]) / (table.delta[j + 1] - table.delta[j])).clamp(0.0, 1.0);

        let h = depth_km.clamp(ELLIP_DEPTHS[0], ELLIP_DEPTHS[2]);
        let k = if h <= ELLIP_DEPTHS[1] { 0 } else { 1 };
        let g = ((h - ELLIP_DEPTHS[k]) / (ELLIP_DEPTHS[k + 1] - ELLIP_DEPTHS[k])).clamp(0.0, 1.0);

        let lerp2 = |v: &Vec<[f64; 3]>| -> f64 {
            let lo = v[j][k] * (1.0 - f) + v[j + 1][k] * f;
            let hi = v[j][k + 1] * (1.0 - f) + v[j + 1][k + 1] * f;
            lo * (1.0 - g) + hi * g
        };
        Some((lerp2(&table.t0), lerp2(&table.t1), lerp2(&table.t2)))
    }
}

fn num(tok: &str) -> AuxDataResult<f64> {
    tok.parse().map_err(|e| AuxDataError::Malformed {
        file: "ellip".into(),
        reason: format!("'{}': {}", tok, e),
    })
}
