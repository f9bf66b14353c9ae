// Ray-Parameter Grid Decimation
// Thins branch sampling while preserving the target distance spacing

/// Fraction of the target spacing under which the one-pass sweep drops
/// samples.
const FAST_KEEP_FRACTION: f64 = 0.75;
/// Up-going proxies always keep their deep samples.
const FAST_P_LIMIT_FRACTION: f64 = 0.7;

/// Balanced decimation: iteratively remove the interior sample whose removal
/// most reduces sum((|dx| - target)^2), until no removal helps. First and
/// last samples are always retained. Returns a keep-mask.
pub fn balanced(x: &[f64], dx_target: f64) -> Vec<bool> {
    let n = x.len();
    let mut keep = vec![true; n];
    if n <= 2 {
        return keep;
    }

    let cost = |a: f64, b: f64| {
        let d = (b - a).abs() - dx_target;
        d * d
    };

    loop {
        // Kept indices in order.
        let kept: Vec<usize> = (0..n).filter(|&i| keep[i]).collect();
        if kept.len() <= 2 {
            break;
        }
        let mut best: Option<(usize, f64)> = None;
        for w in kept.windows(3) {
            let (a, i, b) = (w[0], w[1], w[2]);
            let before = cost(x[a], x[i]) + cost(x[i], x[b]);
            let after = cost(x[a], x[b]);
            let gain = before - after;
            if gain > 0.0 && best.map_or(true, |(_, g)| gain > g) {
                best = Some((i, gain));
            }
        }
        match best {
            Some((i, _)) => keep[i] = false,
            None => break,
        }
    }
    keep
}

/// Fast one-pass decimation for up-going proxies: sweep from the end toward
/// the start, dropping samples while the running distance step stays under
/// 0.75 of the target. Samples with p at or below 0.7 * p_max are always
/// kept.
pub fn fast(p: &[f64], x: &[f64], dx_target: f64) -> Vec<bool> {
    let n = p.len();
    let mut keep = vec![true; n];
    if n <= 2 {
        return keep;
    }
    let p_max = p.iter().cloned().fold(f64::MIN, f64::max);
    let p_lim = FAST_P_LIMIT_FRACTION * p_max;

    let mut run = 0.0;
    for i in (1..n - 1).rev() {
        run += (x[i + 1] - x[i]).abs();
        if p[i] <= p_lim {
            run = 0.0;
            continue;
        }
        if run < FAST_KEEP_FRACTION * dx_target {
            keep[i] = false;
        } else {
            run = 0.0;
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_keeps_endpoints() {
        let x: Vec<f64> = (0..50).map(|i| i as f64 * 0.001).collect();
        let keep = balanced(&x, 0.01);
        assert!(keep[0] && keep[49]);
        let kept = keep.iter().filter(|&&k| k).count();
        assert!(kept < 50, "oversampled grid must thin");
    }

    #[test]
    fn test_balanced_respects_target() {
        let x: Vec<f64> = (0..100).map(|i| i as f64 * 0.002).collect();
        let keep = balanced(&x, 0.01);
        let kept: Vec<f64> = x
            .iter()
            .zip(&keep)
            .filter(|&(_, &k)| k)
            .map(|(&v, _)| v)
            .collect();
        for w in kept.windows(2) {
            // Nothing wildly over target: the objective penalises both sides.
            assert!((w[1] - w[0]).abs() < 0.03);
        }
    }

    #[test]
    fn test_balanced_short_input_untouched() {
        assert_eq!(balanced(&[0.0, 1.0], 0.5), vec![true, true]);
        assert_eq!(balanced(&[0.0], 0.5), vec![true]);
    }

    #[test]
    fn test_fast_keeps_low_p() {
        let n = 40;
        let p: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let x: Vec<f64> = (0..n).map(|i| i as f64 * 0.0005).collect();
        let keep = fast(&p, &x, 0.01);
        assert!(keep[0] && keep[n - 1]);
        for i in 0..n {
            if p[i] <= 0.7 {
                assert!(keep[i], "sample below p limit dropped at {}", i);
            }
        }
        assert!(keep.iter().filter(|&&k| !k).count() > 0);
    }
}
