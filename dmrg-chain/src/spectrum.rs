use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

/// Result of the truncation at a single bond.
///
/// The kept weights are the eigenvalues of the reduced density matrix (the squared and
/// normalized singular values) in descending order, the truncation error is the sum of
/// the discarded weights.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Spectrum {
    eigs_kept: Array1<f64>,
    truncerr: f64,
}

impl Spectrum {
    pub fn new(eigs_kept: Array1<f64>, truncerr: f64) -> Self {
        Spectrum {
            eigs_kept,
            truncerr,
        }
    }

    pub fn eigs_kept(&self) -> ArrayView1<f64> {
        self.eigs_kept.view()
    }

    pub fn kept_rank(&self) -> usize {
        self.eigs_kept.len()
    }

    pub fn truncerr(&self) -> f64 {
        self.truncerr
    }

    /// Von Neumann entanglement entropy of the kept weights.
    pub fn entropy(&self) -> f64 {
        self.eigs_kept
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum()
    }
}
