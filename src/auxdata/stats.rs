// Travel-Time Statistics
// Raw per-phase (distance, bias, spread, observability) points fitted into
// piecewise linear segments at load time

use statistical::mean;

use crate::errors::{AuxDataError, AuxDataResult};

/// One fitted linear piece over [x_min, x_max].
#[derive(Debug, Clone, Copy)]
pub struct StatSegment {
    pub x_min: f64,
    pub x_max: f64,
    pub slope: f64,
    pub offset: f64,
}

impl StatSegment {
    fn at(&self, x: f64) -> f64 {
        self.slope * x + self.offset
    }
}

#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub d_min: f64,
    pub d_max: f64,
    pub bias: Vec<StatSegment>,
    pub spread: Vec<StatSegment>,
    pub observ: Vec<StatSegment>,
}

/// All fitted statistics, in file order.
#[derive(Debug, Clone, Default)]
pub struct TtStats {
    pub phases: Vec<PhaseStats>,
}

#[derive(Debug, Clone, Copy)]
struct RawPoint {
    x: f64,
    v: f64,
    brk: bool,
}

impl TtStats {
    pub fn parse(text: &str) -> AuxDataResult<Self> {
        let mut phases = Vec::new();
        let mut lines = text.lines().filter(|l| !l.trim().is_empty()).peekable();
        while let Some(header) = lines.next() {
            let head: Vec<&str> = header.split_whitespace().collect();
            if head.len() != 3 {
                return Err(AuxDataError::Malformed {
                    file: "ttstats".into(),
                    reason: format!("bad header '{}'", header),
                });
            }
            let phase = head[0].to_string();
            let d_min: f64 = parse_num(head[1], "ttstats")?;
            let d_max: f64 = parse_num(head[2], "ttstats")?;

            let mut bias = Vec::new();
            let mut spread = Vec::new();
            let mut observ = Vec::new();
            while let Some(&line) = lines.peek() {
                let toks: Vec<&str> = line.split_whitespace().collect();
                // Headers start with a phase code, data rows with a distance.
                if toks.first().map_or(true, |t| t.parse::<f64>().is_err()) {
                    break;
                }
                lines.next();
                let (x, rest) = (parse_num(toks[0], "ttstats")?, &toks[1..]);
                let mut vals = [0.0f64; 3];
                let mut brks = [false; 3];
                let mut vi = 0usize;
                for &t in rest {
                    if t == "*" {
                        if vi > 0 {
                            brks[vi - 1] = true;
                        }
                    } else {
                        if vi >= 3 {
                            return Err(AuxDataError::Malformed {
                                file: "ttstats".into(),
                                reason: format!("too many values in row '{}'", line),
                            });
                        }
                        vals[vi] = parse_num(t, "ttstats")?;
                        vi += 1;
                    }
                }
                if vi != 3 {
                    return Err(AuxDataError::Malformed {
                        file: "ttstats".into(),
                        reason: format!("expected 3 values in row '{}'", line),
                    });
                }
                bias.push(RawPoint { x, v: vals[0], brk: brks[0] });
                spread.push(RawPoint { x, v: vals[1], brk: brks[1] });
                observ.push(RawPoint { x, v: vals[2], brk: brks[2] });
            }

            phases.push(PhaseStats {
                phase,
                d_min,
                d_max,
                bias: fit_segments(&bias),
                spread: fit_segments(&spread),
                observ: fit_segments(&observ),
            });
        }
        Ok(Self { phases })
    }

    pub fn find(&self, code: &str) -> Option<&PhaseStats> {
        self.phases.iter().find(|p| p.phase == code)
    }

    /// Statistics lookup with the conventional fallbacks: exact code, code
    /// without its depth-phase prefix, code without its branch suffix.
    pub fn lookup(&self, code: &str) -> Option<&PhaseStats> {
        if let Some(p) = self.find(code) {
            return Some(p);
        }
        for stripped in candidate_codes(code) {
            if let Some(p) = self.find(&stripped) {
                return Some(p);
            }
        }
        None
    }

    pub fn bias(&self, stats: &PhaseStats, delta: f64) -> f64 {
        eval_segments(&stats.bias, delta)
    }

    pub fn spread(&self, stats: &PhaseStats, delta: f64) -> f64 {
        eval_segments(&stats.spread, delta)
    }

    pub fn observability(&self, stats: &PhaseStats, delta: f64) -> f64 {
        eval_segments(&stats.observ, delta)
    }
}

pub fn candidate_codes(code: &str) -> Vec<String> {
    let mut out = Vec::new();
    for suffix in ["ab", "bc", "df", "ac"] {
        if let Some(stem) = code.strip_suffix(suffix) {
            out.push(stem.to_string());
            break;
        }
    }
    if let Some(stem) = code.strip_prefix('p').or_else(|| code.strip_prefix('s')) {
        out.push(stem.to_string());
        for suffix in ["ab", "bc", "df", "ac"] {
            if let Some(s2) = stem.strip_suffix(suffix) {
                out.push(s2.to_string());
            }
        }
    }
    out
}

/// Mean-centred least squares per break-delimited stretch. Break rows close
/// their stretch and open the next one.
fn fit_segments(points: &[RawPoint]) -> Vec<StatSegment> {
    let mut segments = Vec::new();
    let mut start = 0usize;
    for i in 0..points.len() {
        let close = points[i].brk || i + 1 == points.len();
        if !close {
            continue;
        }
        let chunk = &points[start..=i];
        if let Some(seg) = fit_line(chunk) {
            segments.push(seg);
        }
        start = i;
    }
    segments
}

fn fit_line(chunk: &[RawPoint]) -> Option<StatSegment> {
    if chunk.is_empty() {
        return None;
    }
    let xs: Vec<f64> = chunk.iter().map(|p| p.x).collect();
    let vs: Vec<f64> = chunk.iter().map(|p| p.v).collect();
    let x_min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
    let x_max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if chunk.len() == 1 || (x_max - x_min).abs() < 1e-12 {
        return Some(StatSegment {
            x_min,
            x_max,
            slope: 0.0,
            offset: vs[0],
        });
    }
    let mx = mean(&xs);
    let mv = mean(&vs);
    let mut num = 0.0;
    let mut den = 0.0;
    for (x, v) in xs.iter().zip(&vs) {
        num += (x - mx) * (v - mv);
        den += (x - mx) * (x - mx);
    }
    let slope = num / den;
    Some(StatSegment {
        x_min,
        x_max,
        slope,
        offset: mv - slope * mx,
    })
}

/// Clamped evaluation: below the first segment the minimum-distance value,
/// above the last segment the maximum-distance value.
fn eval_segments(segments: &[StatSegment], x: f64) -> f64 {
    if segments.is_empty() {
        return 0.0;
    }
    let first = &segments[0];
    if x <= first.x_min {
        return first.at(first.x_min);
    }
    let last = &segments[segments.len() - 1];
    if x >= last.x_max {
        return last.at(last.x_max);
    }
    for seg in segments {
        if x <= seg.x_max {
            return seg.at(x);
        }
    }
    last.at(last.x_max)
}

fn parse_num(tok: &str, file: &str) -> AuxDataResult<f64> {
    tok.parse().map_err(|e| AuxDataError::Malformed {
        file: file.into(),
        reason: format!("'{}': {}", tok, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TOY_STATS;

    #[test]
    fn test_parse_and_lookup() {
        let stats = TtStats::parse(TOY_STATS).unwrap();
        assert!(stats.find("P").is_some());
        assert!(stats.find("Pg").is_some());
        assert!(stats.find("nonesuch").is_none());
        // Depth-phase and branch-suffix fallbacks.
        assert!(stats.lookup("pP").is_some());
        assert_eq!(stats.lookup("PKPdf").unwrap().phase, "PKPdf");
    }

    #[test]
    fn test_interpolation_and_clamping() {
        let stats = TtStats::parse(TOY_STATS).unwrap();
        let p = stats.find("P").unwrap();
        // Below range clamps to the minimum-distance value.
        let below = stats.spread(p, 0.1);
        let at_min = stats.spread(p, 1.0);
        assert!((below - at_min).abs() < 1e-9);
        // Interior values are finite and positive for spread.
        for d in [5.0, 20.0, 60.0, 95.0] {
            assert!(stats.spread(p, d) > 0.0);
            assert!(stats.observability(p, d) > 0.0);
        }
    }

    #[test]
    fn test_segment_fit_two_points_exact() {
        let pts = [
            RawPoint { x: 0.0, v: 1.0, brk: false },
            RawPoint { x: 10.0, v: 2.0, brk: true },
        ];
        let segs = fit_segments(&pts);
        assert_eq!(segs.len(), 1);
        assert!((segs[0].at(0.0) - 1.0).abs() < 1e-12);
        assert!((segs[0].at(10.0) - 2.0).abs() < 1e-12);
    }
}
