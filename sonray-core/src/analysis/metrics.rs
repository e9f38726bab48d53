// Acoustic metrics from an energy impulse response.
//
// Both estimators are pure functions of (energy bins, bin size) and report
// "no result" as `None`; nothing here returns an error.

use super::impulse_response::ImpulseResponse;

/// Direct-sound exclusion window at the start of the IR.
pub const DIRECT_SOUND_WINDOW_MS: f64 = 5.0;

/// Minimum run length for a first-reflection detection.
pub const FIRST_REFLECTION_CONSECUTIVE_BINS: usize = 4;

/// Detection threshold relative to the peak energy after the direct-sound window.
const FIRST_REFLECTION_RELATIVE_THRESHOLD: f64 = 0.01;
const FIRST_REFLECTION_ABSOLUTE_FLOOR: f64 = 1e-6;

/// Regression window on the Schroeder curve, in dB.
pub const RT60_FIT_UPPER_DB: f64 = -5.0;
pub const RT60_FIT_LOWER_DB: f64 = -35.0;

const SCHROEDER_FLOOR_RATIO: f64 = 1e-20;
const DEGENERATE_FIT_EPSILON: f64 = 1e-12;

/// Time of the first significant arrival after the direct sound, in milliseconds.
///
/// Bins inside the first `ceil(5 ms / bin_size_ms)` are ignored. The threshold is
/// 1% of the peak energy after that window (floored at `1e-6`), and a detection
/// needs `consecutive_bins` bins in a row at or above it. The reported time is
/// the start of that run.
pub fn first_reflection_ms(energy: &[f64], bin_size_ms: f64, consecutive_bins: usize) -> Option<f64> {
    if bin_size_ms <= 0.0 {
        return None;
    }
    let ignore = (DIRECT_SOUND_WINDOW_MS / bin_size_ms).ceil() as usize;
    if ignore >= energy.len() {
        return None;
    }

    let late = &energy[ignore..];
    let peak = late.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if peak <= 0.0 {
        return None;
    }
    let threshold = (peak * FIRST_REFLECTION_RELATIVE_THRESHOLD).max(FIRST_REFLECTION_ABSOLUTE_FLOOR);

    let needed = consecutive_bins.max(1);
    let mut run = 0usize;
    for (offset, &e) in late.iter().enumerate() {
        if e >= threshold {
            run += 1;
            if run >= needed {
                let index = ignore + offset;
                return Some((index + 1 - needed) as f64 * bin_size_ms);
            }
        } else {
            run = 0;
        }
    }
    None
}

/// Schroeder backward-integrated decay curve in dB relative to total energy,
/// clamped to be monotonically non-increasing. `None` when there is no energy.
pub fn schroeder_curve_db(energy: &[f64]) -> Option<Vec<f64>> {
    let mut cumulative = vec![0.0; energy.len()];
    let mut acc = 0.0;
    for (c, &e) in cumulative.iter_mut().zip(energy).rev() {
        acc += e;
        *c = acc;
    }

    let total = *cumulative.first()?;
    if total <= 0.0 {
        return None;
    }

    let mut curve: Vec<f64> = cumulative
        .iter()
        .map(|&c| 10.0 * (c / total).max(SCHROEDER_FLOOR_RATIO).log10())
        .collect();
    for i in 1..curve.len() {
        curve[i] = curve[i].min(curve[i - 1]);
    }
    Some(curve)
}

/// RT60 in seconds by the Schroeder method.
///
/// Fits a least-squares line to the decay curve between -5 dB and -35 dB and
/// extrapolates it to -60 dB. `None` when the IR carries no energy, does not
/// decay, has fewer than two points in the fit window, or the fit is degenerate.
pub fn rt60_seconds(energy: &[f64], bin_size_ms: f64) -> Option<f64> {
    if bin_size_ms <= 0.0 || !is_decaying(energy) {
        return None;
    }
    let curve = schroeder_curve_db(energy)?;

    let bin_size_s = bin_size_ms / 1000.0;
    let points: Vec<(f64, f64)> = curve
        .iter()
        .enumerate()
        .filter(|&(_, &db)| (RT60_FIT_LOWER_DB..=RT60_FIT_UPPER_DB).contains(&db))
        .map(|(i, &db)| (i as f64 * bin_size_s, db))
        .collect();
    if points.len() < 2 {
        return None;
    }

    let slope = least_squares_slope(&points)?;
    if slope >= 0.0 {
        return None;
    }
    Some(-60.0 / slope)
}

/// The envelope must fall away from its peak.
///
/// Only the span from the first maximum onwards is considered, so leading
/// silence before the onset does not count against the decay. The backward
/// integral is non-increasing for any non-negative input, so the regression
/// slope alone cannot reject a flat or rising envelope.
fn is_decaying(energy: &[f64]) -> bool {
    let mut peak = 0;
    for (i, &e) in energy.iter().enumerate() {
        if e > energy[peak] {
            peak = i;
        }
    }
    let tail = &energy[peak..];
    if tail.len() < 2 {
        return false;
    }
    let half = tail.len() / 2;
    let early: f64 = tail[..half].iter().sum();
    let late: f64 = tail[half..].iter().sum();
    early > late
}

fn least_squares_slope(points: &[(f64, f64)]) -> Option<f64> {
    let n = points.len() as f64;
    let (mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0);
    for &(x, y) in points {
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
    }
    let denom = n * sxx - sx * sx;
    if denom.abs() < DEGENERATE_FIT_EPSILON {
        return None;
    }
    Some((n * sxy - sx * sy) / denom)
}

/// First-reflection time and RT60 of one impulse response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcousticMetrics {
    pub first_reflection_ms: Option<f64>,
    pub rt60_s: Option<f64>,
}

impl AcousticMetrics {
    pub fn analyze(ir: &ImpulseResponse) -> Self {
        Self {
            first_reflection_ms: first_reflection_ms(
                ir.energy(),
                ir.bin_size_ms(),
                FIRST_REFLECTION_CONSECUTIVE_BINS,
            ),
            rt60_s: rt60_seconds(ir.energy(), ir.bin_size_ms()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ir(len: usize, start: usize, run: usize, level: f64) -> Vec<f64> {
        let mut ir = vec![0.0; len];
        for e in &mut ir[start..start + run] {
            *e = level;
        }
        ir
    }

    #[test]
    fn test_first_reflection_run_right_after_window() {
        for &bin in &[1.0, 0.5, 2.0] {
            let ignore = (5.0f64 / bin).ceil() as usize;
            for k in 4..8 {
                let ir = run_ir(200, ignore, k, 3.0);
                let t = first_reflection_ms(&ir, bin, 4).unwrap();
                assert_eq!(t, ignore as f64 * bin);
            }
        }
    }

    #[test]
    fn test_first_reflection_short_run_is_none() {
        for k in 1..4 {
            let ir = run_ir(100, 5, k, 1.0);
            assert_eq!(first_reflection_ms(&ir, 1.0, 4), None);
        }
    }

    #[test]
    fn test_first_reflection_ignores_direct_sound() {
        // Strong direct sound inside the window, weak reflection later.
        let mut ir = run_ir(100, 0, 5, 1000.0);
        for e in &mut ir[20..26] {
            *e = 0.5;
        }
        assert_eq!(first_reflection_ms(&ir, 1.0, 4), Some(20.0));
    }

    #[test]
    fn test_first_reflection_below_threshold_breaks_run() {
        let mut ir = vec![0.0; 100];
        ir[10] = 1.0;
        ir[11] = 1.0;
        ir[12] = 0.005; // under 1% of peak
        ir[13] = 1.0;
        ir[30..34].copy_from_slice(&[1.0; 4]);
        assert_eq!(first_reflection_ms(&ir, 1.0, 4), Some(30.0));
    }

    #[test]
    fn test_first_reflection_window_covers_ir() {
        assert_eq!(first_reflection_ms(&[1.0; 5], 1.0, 4), None);
        assert_eq!(first_reflection_ms(&[0.0; 50], 1.0, 4), None);
    }

    #[test]
    fn test_rt60_ideal_exponential_decay() {
        // Amplitude envelope exp(-t/tau), so energy decays as exp(-2t/tau) and
        // the 60 dB point is at tau * ln(1000).
        for &tau in &[0.05f64, 0.1, 0.25] {
            let bin_ms = 1.0;
            let bins = 4000;
            let energy: Vec<f64> = (0..bins)
                .map(|i| {
                    let t = i as f64 * bin_ms / 1000.0;
                    (-t / tau).exp().powi(2)
                })
                .collect();
            let rt60 = rt60_seconds(&energy, bin_ms).unwrap();
            let expected = tau * 1000f64.ln();
            assert!(
                (rt60 - expected).abs() / expected < 1e-3,
                "tau {}: rt60 {} expected {}",
                tau,
                rt60,
                expected
            );
        }
    }

    #[test]
    fn test_rt60_delayed_onset_decay() {
        // 60 dB of energy decay over 0.3 s, starting after 600 ms of silence.
        let decay = |i: usize| 10f64.powf(-6.0 * (i as f64 / 1000.0) / 0.3);
        let onset = 600;
        let delayed: Vec<f64> = (0..1000)
            .map(|i| if i < onset { 0.0 } else { decay(i - onset) })
            .collect();
        let immediate: Vec<f64> = (0..400).map(decay).collect();

        let late = rt60_seconds(&delayed, 1.0).unwrap();
        let early = rt60_seconds(&immediate, 1.0).unwrap();
        assert!((late - 0.3).abs() / 0.3 < 1e-3, "rt60 {}", late);
        assert!((late - early).abs() < 1e-9, "{} vs {}", late, early);
    }

    #[test]
    fn test_rt60_late_peak_is_some() {
        let energy: Vec<f64> = (0..1000)
            .map(|i| {
                if i < 700 {
                    i as f64 / 700.0
                } else {
                    10f64.powf(-6.0 * ((i - 700) as f64 / 1000.0) / 0.3)
                }
            })
            .collect();
        assert!(rt60_seconds(&energy, 1.0).is_some());
    }

    #[test]
    fn test_rt60_flat_and_rising_are_none() {
        assert_eq!(rt60_seconds(&[1.0; 500], 1.0), None);
        assert_eq!(rt60_seconds(&[1.0; 501], 1.0), None);
        let rising: Vec<f64> = (0..500).map(|i| i as f64).collect();
        assert_eq!(rt60_seconds(&rising, 1.0), None);
    }

    #[test]
    fn test_rt60_empty_and_silent_are_none() {
        assert_eq!(rt60_seconds(&[], 1.0), None);
        assert_eq!(rt60_seconds(&[0.0; 100], 1.0), None);
    }

    #[test]
    fn test_rt60_single_impulse_has_too_few_points() {
        let mut ir = vec![0.0; 100];
        ir[3] = 1.0;
        // Curve jumps from 0 dB straight to the floor; nothing lands in [-35, -5].
        assert_eq!(rt60_seconds(&ir, 1.0), None);
    }

    #[test]
    fn test_schroeder_curve_is_monotone() {
        let energy = [5.0, 0.0, 3.0, 0.0, 0.0, 2.0, 1.0, 0.0];
        let curve = schroeder_curve_db(&energy).unwrap();
        assert_eq!(curve[0], 0.0);
        assert!(curve.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(schroeder_curve_db(&[0.0, 0.0]), None);
    }

    #[test]
    fn test_analyze_bundles_both_metrics() {
        let energy: Vec<f64> = (0..2000)
            .map(|i| if i < 10 { 0.0 } else { (-(i as f64) / 80.0).exp() })
            .collect();
        let metrics = AcousticMetrics::analyze(&ImpulseResponse::new(energy, 1.0));
        assert_eq!(metrics.first_reflection_ms, Some(10.0));
        assert!(metrics.rt60_s.unwrap() > 0.0);
    }
}
