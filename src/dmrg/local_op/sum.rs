use crate::dmrg::local_op::{EffectiveOperator, LocalHamiltonian};
use crate::dmrg::{Direction, DmrgError};
use dmrg_chain::{Mpo, Mps};
use ndarray::prelude::*;
use rayon::prelude::*;
use std::path::Path;

/// Effective Hamiltonian of a sum of operators `H = H_1 + H_2 + ...` that is never
/// formed explicitly. Each term keeps its own environments.
pub struct LocalHamiltonianSum<'a> {
    terms: Vec<LocalHamiltonian<'a>>,
}

impl<'a> LocalHamiltonianSum<'a> {
    pub fn new(mpos: &'a [Mpo]) -> Result<Self, DmrgError> {
        let first: &Mpo = mpos.first().ok_or_else(|| {
            DmrgError::Configuration(String::from("the set of operators is empty"))
        })?;
        if let Some(other) = mpos.iter().find(|mpo| mpo.len() != first.len()) {
            return Err(DmrgError::Configuration(format!(
                "operators of {} and {} sites cannot be summed",
                first.len(),
                other.len()
            )));
        }
        Ok(LocalHamiltonianSum {
            terms: mpos.iter().map(LocalHamiltonian::new).collect(),
        })
    }

    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }
}

/// Sum the results of all terms; `None` entries are skipped.
fn sum_terms<D: Dimension>(
    parts: Vec<Option<Array<f64, D>>>,
) -> Option<Array<f64, D>> {
    parts.into_iter().flatten().reduce(|acc, x| acc + x)
}

impl EffectiveOperator for LocalHamiltonianSum<'_> {
    fn position(&mut self, b: usize, psi: &Mps) -> Result<(), DmrgError> {
        self.terms
            .iter_mut()
            .try_for_each(|term| term.position(b, psi))
    }

    fn product(&self, phi: &Array4<f64>) -> Result<Array4<f64>, DmrgError> {
        let parts: Vec<Option<Array4<f64>>> = self
            .terms
            .par_iter()
            .map(|term| term.product(phi).map(Some))
            .collect::<Result<_, _>>()?;
        sum_terms(parts).ok_or_else(|| DmrgError::Configuration(String::from("empty sum")))
    }

    fn diag(&self) -> Result<Array4<f64>, DmrgError> {
        let parts: Vec<Option<Array4<f64>>> = self
            .terms
            .par_iter()
            .map(|term| term.diag().map(Some))
            .collect::<Result<_, _>>()?;
        sum_terms(parts).ok_or_else(|| DmrgError::Configuration(String::from("empty sum")))
    }

    fn noise_term(
        &self,
        phi: &Array4<f64>,
        direction: Direction,
    ) -> Result<Option<Array2<f64>>, DmrgError> {
        let parts: Vec<Option<Array2<f64>>> = self
            .terms
            .par_iter()
            .map(|term| term.noise_term(phi, direction))
            .collect::<Result<_, _>>()?;
        Ok(sum_terms(parts))
    }

    fn length(&self) -> usize {
        self.terms[0].length()
    }

    fn do_write(&self) -> bool {
        self.terms.iter().any(|term| term.do_write())
    }

    fn set_do_write(&mut self, on: bool, dir: &Path) -> Result<(), DmrgError> {
        self.terms
            .iter_mut()
            .try_for_each(|term| term.set_do_write(on, dir))
    }
}
