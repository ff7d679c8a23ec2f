use crate::defaults::*;
use serde::{Deserialize, Serialize};

/// Accuracy parameters of a single sweep.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct SweepParams {
    /// Largest discarded weight accepted at a bond.
    pub cutoff: f64,
    /// Smallest number of kept states.
    pub min_rank: usize,
    /// Largest number of kept states.
    pub max_rank: usize,
    /// Amplitude of the density matrix perturbation.
    pub noise: f64,
    /// Number of Davidson iterations per bond.
    pub max_iter: usize,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            cutoff: CUTOFF,
            min_rank: MIN_RANK,
            max_rank: MAX_RANK,
            noise: NOISE,
            max_iter: MAX_ITER,
        }
    }
}

/// Sweep schedule: one set of [SweepParams] per sweep.
///
/// The setters take a list of values that is applied to the sweeps in order; sweeps
/// beyond the end of the list reuse its last value, so that
/// `sweeps.set_max_rank(&[10, 20, 100])` ramps the rank up over the first three
/// sweeps and keeps it at 100 afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Sweeps {
    params: Vec<SweepParams>,
}

impl Sweeps {
    /// Schedule of `nsweep` sweeps with default parameters.
    pub fn new(nsweep: usize) -> Self {
        Sweeps {
            params: vec![SweepParams::default(); nsweep],
        }
    }

    pub fn from_params(params: Vec<SweepParams>) -> Self {
        Sweeps { params }
    }

    pub fn nsweep(&self) -> usize {
        self.params.len()
    }

    /// Parameters of sweep `sw` (counted from zero).
    pub fn get(&self, sw: usize) -> Option<&SweepParams> {
        self.params.get(sw)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SweepParams> {
        self.params.iter()
    }

    pub fn cutoff(&self, sw: usize) -> Option<f64> {
        self.get(sw).map(|p| p.cutoff)
    }

    pub fn min_rank(&self, sw: usize) -> Option<usize> {
        self.get(sw).map(|p| p.min_rank)
    }

    pub fn max_rank(&self, sw: usize) -> Option<usize> {
        self.get(sw).map(|p| p.max_rank)
    }

    pub fn noise(&self, sw: usize) -> Option<f64> {
        self.get(sw).map(|p| p.noise)
    }

    pub fn max_iter(&self, sw: usize) -> Option<usize> {
        self.get(sw).map(|p| p.max_iter)
    }

    pub fn set_cutoff(&mut self, values: &[f64]) -> &mut Self {
        self.apply(values, |p, v| p.cutoff = v)
    }

    pub fn set_min_rank(&mut self, values: &[usize]) -> &mut Self {
        self.apply(values, |p, v| p.min_rank = v)
    }

    pub fn set_max_rank(&mut self, values: &[usize]) -> &mut Self {
        self.apply(values, |p, v| p.max_rank = v)
    }

    pub fn set_noise(&mut self, values: &[f64]) -> &mut Self {
        self.apply(values, |p, v| p.noise = v)
    }

    pub fn set_max_iter(&mut self, values: &[usize]) -> &mut Self {
        self.apply(values, |p, v| p.max_iter = v)
    }

    fn apply<T: Copy, F: Fn(&mut SweepParams, T)>(&mut self, values: &[T], set: F) -> &mut Self {
        if let Some(&last) = values.last() {
            for (sw, p) in self.params.iter_mut().enumerate() {
                set(p, values.get(sw).copied().unwrap_or(last));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_repeats_last_value() {
        let mut sweeps: Sweeps = Sweeps::new(5);
        sweeps
            .set_max_rank(&[10, 20, 100])
            .set_noise(&[1e-6, 1e-8, 0.0])
            .set_max_iter(&[4]);
        let ranks: Vec<usize> = sweeps.iter().map(|p| p.max_rank).collect();
        assert_eq!(ranks, vec![10, 20, 100, 100, 100]);
        assert_eq!(sweeps.noise(4), Some(0.0));
        assert_eq!(sweeps.noise(0), Some(1e-6));
        assert_eq!(sweeps.max_iter(3), Some(4));
        assert_eq!(sweeps.cutoff(2), Some(CUTOFF));
        assert_eq!(sweeps.max_rank(5), None);
    }

    #[test]
    fn empty_values_leave_schedule_untouched() {
        let mut sweeps: Sweeps = Sweeps::new(2);
        sweeps.set_min_rank(&[]);
        assert_eq!(sweeps.min_rank(1), Some(MIN_RANK));
        assert_eq!(sweeps.nsweep(), 2);
    }
}
