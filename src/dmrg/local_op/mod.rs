use crate::dmrg::davidson::DavidsonEngine;
use crate::dmrg::{Direction, DmrgError};
use crate::defaults::PRECONDITIONER_SHIFT;
use dmrg_chain::{flatten, reshape, tensordot, Mps};
use ndarray::prelude::*;
use std::path::Path;

pub use environment::{
    contract_left, contract_right, edge_environment, EnvironmentCache, Transfer,
};
pub use penalty::PenalizedHamiltonian;
pub use single::{LocalHamiltonian, MpoTransfer};
pub use sum::LocalHamiltonianSum;

mod environment;
mod penalty;
mod single;
mod sum;

/// Operator acting on the two-site tensor `(l, s1, s2, r)` of the current bond.
///
/// The implementations keep the environments of the rest of the chain and update them
/// incrementally when the window moves by one bond.
pub trait EffectiveOperator {
    /// Move the two-site window to bond `b`, bringing the environments up to date with
    /// the sites of `psi` outside of the window.
    fn position(&mut self, b: usize, psi: &Mps) -> Result<(), DmrgError>;

    /// Apply the operator to a two-site tensor.
    fn product(&self, phi: &Array4<f64>) -> Result<Array4<f64>, DmrgError>;

    /// Diagonal of the operator in the shape of the two-site tensor.
    fn diag(&self) -> Result<Array4<f64>, DmrgError>;

    /// Perturbation of the reduced density matrix of the site that is left behind when
    /// the center moves in `direction`, or `None` if the operator has none.
    fn noise_term(
        &self,
        phi: &Array4<f64>,
        direction: Direction,
    ) -> Result<Option<Array2<f64>>, DmrgError>;

    /// Number of sites of the chain.
    fn length(&self) -> usize;

    fn do_write(&self) -> bool;

    /// Switch disk paging of the environments on or off.
    fn set_do_write(&mut self, on: bool, dir: &Path) -> Result<(), DmrgError>;
}

/// Two-site tensor of bond `b`.
pub fn two_site_tensor(psi: &Mps, b: usize) -> Result<Array4<f64>, DmrgError> {
    let phi = tensordot(&*psi.site(b)?, &*psi.site(b + 1)?, &[2], &[0])?;
    Ok(phi.into_dimensionality::<Ix4>()?)
}

/// Eigenvalue problem of an effective operator on flattened two-site tensors.
pub struct LocalProblem<'a, O: EffectiveOperator + ?Sized> {
    op: &'a O,
    shape: (usize, usize, usize, usize),
    diag: Array1<f64>,
}

impl<'a, O: EffectiveOperator + ?Sized> LocalProblem<'a, O> {
    pub fn new(op: &'a O, shape: (usize, usize, usize, usize)) -> Result<Self, DmrgError> {
        let diag: Array1<f64> = flatten(&op.diag()?);
        Ok(LocalProblem { op, shape, diag })
    }
}

impl<O: EffectiveOperator + ?Sized> DavidsonEngine for LocalProblem<'_, O> {
    fn compute_products(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>, DmrgError> {
        let mut ax: Array2<f64> = Array2::zeros(x.raw_dim());
        for (mut out, col) in ax.axis_iter_mut(Axis(1)).zip(x.axis_iter(Axis(1))) {
            let phi: Array4<f64> = reshape(&col, self.shape)?;
            out.assign(&flatten(&self.op.product(&phi)?));
        }
        Ok(ax)
    }

    fn precondition(&self, r_k: ArrayView1<f64>, w_k: f64) -> Array1<f64> {
        let mut denom: Array1<f64> = w_k - &self.diag;
        denom.mapv_inplace(|x| if x.abs() < PRECONDITIONER_SHIFT { 1.0 } else { x });
        &r_k / &denom
    }

    fn get_size(&self) -> usize {
        self.diag.len()
    }
}
