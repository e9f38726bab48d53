use crate::error::{Result, SonrayError};

/// Fixed-point scale of the kernel's energy counters: `energy = raw / ENERGY_SCALE`.
pub const ENERGY_SCALE: f64 = 1e6;

/// Per-bin energy histogram with a uniform bin duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    energy: Vec<f64>,
    bin_size_ms: f64,
}

impl ImpulseResponse {
    pub fn new(energy: Vec<f64>, bin_size_ms: f64) -> Self {
        Self {
            energy,
            bin_size_ms,
        }
    }

    pub fn zeros(bin_count: usize, bin_size_ms: f64) -> Self {
        Self::new(vec![0.0; bin_count], bin_size_ms)
    }

    /// Decodes raw fixed-point counters from the kernel.
    pub fn from_raw(raw: &[u32], bin_size_ms: f64) -> Self {
        let mut ir = Self::zeros(raw.len(), bin_size_ms);
        ir.decode_from(raw);
        ir
    }

    /// Decodes `raw` in place, reusing this IR's storage. Resizes if the length differs.
    pub fn decode_from(&mut self, raw: &[u32]) {
        self.energy.clear();
        self.energy
            .extend(raw.iter().map(|&r| r as f64 / ENERGY_SCALE));
    }

    pub fn energy(&self) -> &[f64] {
        &self.energy
    }

    pub fn bin_size_ms(&self) -> f64 {
        self.bin_size_ms
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    pub fn total_energy(&self) -> f64 {
        self.energy.iter().sum()
    }

    pub fn duration_ms(&self) -> f64 {
        self.energy.len() as f64 * self.bin_size_ms
    }
}

/// Running sum of IR snapshots, exposed as a running mean.
///
/// After every [`RunningMeanIr::accumulate`] the mean is renormalized by the
/// snapshot count, so [`RunningMeanIr::mean`] is always the arithmetic mean of
/// everything accumulated so far.
#[derive(Debug, Clone)]
pub struct RunningMeanIr {
    sum: Vec<f64>,
    mean: ImpulseResponse,
    count: u32,
}

impl RunningMeanIr {
    pub fn new(bin_count: usize, bin_size_ms: f64) -> Self {
        Self {
            sum: vec![0.0; bin_count],
            mean: ImpulseResponse::zeros(bin_count, bin_size_ms),
            count: 0,
        }
    }

    pub fn accumulate(&mut self, snapshot: &ImpulseResponse) -> Result<()> {
        if snapshot.len() != self.sum.len() {
            return Err(SonrayError::Configuration(format!(
                "IR snapshot has {} bins, accumulator expects {}",
                snapshot.len(),
                self.sum.len()
            )));
        }

        for (acc, &e) in self.sum.iter_mut().zip(snapshot.energy()) {
            *acc += e;
        }
        self.count += 1;

        let n = self.count as f64;
        for (m, &s) in self.mean.energy.iter_mut().zip(&self.sum) {
            *m = s / n;
        }
        Ok(())
    }

    pub fn mean(&self) -> &ImpulseResponse {
        &self.mean
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.sum.iter_mut().for_each(|s| *s = 0.0);
        self.mean.energy.iter_mut().for_each(|m| *m = 0.0);
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scales_raw_counters() {
        let ir = ImpulseResponse::from_raw(&[0, 1_000_000, 2_500_000, 1], 2.0);
        assert_eq!(ir.energy(), &[0.0, 1.0, 2.5, 1e-6]);
        assert_eq!(ir.bin_size_ms(), 2.0);
        assert_eq!(ir.duration_ms(), 8.0);
    }

    #[test]
    fn test_decode_from_reuses_storage() {
        let mut ir = ImpulseResponse::zeros(3, 1.0);
        ir.decode_from(&[3_000_000, 0, 0]);
        assert_eq!(ir.energy(), &[3.0, 0.0, 0.0]);
        ir.decode_from(&[0, 0, 1_000_000]);
        assert_eq!(ir.energy(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_running_mean_matches_arithmetic_mean_every_iteration() {
        let bins = 32;
        let snapshot = |k: usize| {
            let energy = (0..bins)
                .map(|i| ((i * 7 + k * 13) % 11) as f64 * 0.25 + k as f64)
                .collect();
            ImpulseResponse::new(energy, 1.0)
        };

        let mut running = RunningMeanIr::new(bins, 1.0);
        let mut history: Vec<ImpulseResponse> = Vec::new();
        for k in 0..10 {
            let snap = snapshot(k);
            running.accumulate(&snap).unwrap();
            history.push(snap);

            for i in 0..bins {
                let expected: f64 =
                    history.iter().map(|h| h.energy()[i]).sum::<f64>() / history.len() as f64;
                assert!((running.mean().energy()[i] - expected).abs() < 1e-12);
            }
        }
        assert_eq!(running.count(), 10);
    }

    #[test]
    fn test_running_mean_rejects_length_mismatch() {
        let mut running = RunningMeanIr::new(4, 1.0);
        let err = running.accumulate(&ImpulseResponse::zeros(5, 1.0));
        assert!(matches!(err, Err(SonrayError::Configuration(_))));
        assert_eq!(running.count(), 0);
    }

    #[test]
    fn test_running_mean_reset() {
        let mut running = RunningMeanIr::new(2, 1.0);
        running
            .accumulate(&ImpulseResponse::new(vec![4.0, 2.0], 1.0))
            .unwrap();
        running.reset();
        assert_eq!(running.count(), 0);
        assert_eq!(running.mean().energy(), &[0.0, 0.0]);
    }
}
