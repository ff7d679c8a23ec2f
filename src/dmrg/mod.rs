/*!

# Two-site DMRG

The ground state of an operator given as a matrix product operator is optimized
bond by bond. A sweep moves a two-site window from the left end of the chain to the
right end and back again; at every bond the local eigenvalue problem of the
effective Hamiltonian is solved with the Davidson method and the optimized two-site
tensor is split again by a truncated decomposition.

The entry points differ only in the effective operator that is set up:

* [dmrg], [dmrg_with_observer] and [dmrg_with_boundaries] use a single operator,
* [dmrg_sum] uses a sum of operators that is never formed explicitly,
* [dmrg_excited] adds energy penalties for the overlap with reference states.

Custom operators can be driven with [dmrg_worker].

 */

use crate::defaults::{DAVIDSON_CONVERGENCE, DAVIDSON_MAX_SUBSPACE, WRITE_DIR};
use derive_builder::Builder;
use dmrg_chain::{Mpo, Mps, Sweeps};
use ndarray::prelude::*;
use std::fmt;
use std::path::PathBuf;

pub use error::DmrgError;
pub use observer::{DmrgObserver, DmrgObserverBuilder, Observer};
pub use worker::dmrg_worker;

use local_op::{LocalHamiltonian, LocalHamiltonianSum, PenalizedHamiltonian};

mod davidson;
mod error;
pub mod local_op;
mod logging;
mod observer;
mod truncation;
mod worker;

/// Direction in which the two-site window moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Run-level settings of a DMRG calculation. The accuracy parameters of the single
/// sweeps are given by the schedule.
#[derive(Builder, Clone, Debug)]
pub struct DmrgArgs {
    /// Suppress the progress reports of the sweeps.
    #[builder(default = "false")]
    pub quiet: bool,
    /// Verbosity of the eigensolver; defaults to 0 if quiet and 1 otherwise.
    #[builder(default = "None", setter(strip_option))]
    pub debug_level: Option<i32>,
    #[builder(default = "DAVIDSON_CONVERGENCE")]
    pub tolerance: f64,
    #[builder(default = "DAVIDSON_MAX_SUBSPACE")]
    pub max_subspace: usize,
    /// Tensors are paged to disk from the first sweep whose maximal rank reaches this
    /// value on.
    #[builder(default = "None", setter(strip_option))]
    pub write_rank: Option<usize>,
    #[builder(default = "PathBuf::from(WRITE_DIR)")]
    pub write_dir: PathBuf,
    /// Energy penalty of the overlap with reference states.
    #[builder(default = "None", setter(strip_option))]
    pub weight: Option<f64>,
}

impl Default for DmrgArgs {
    fn default() -> Self {
        DmrgArgs {
            quiet: false,
            debug_level: None,
            tolerance: DAVIDSON_CONVERGENCE,
            max_subspace: DAVIDSON_MAX_SUBSPACE,
            write_rank: None,
            write_dir: PathBuf::from(WRITE_DIR),
            weight: None,
        }
    }
}

impl DmrgArgs {
    pub fn debug_level(&self) -> i32 {
        self.debug_level.unwrap_or(if self.quiet { 0 } else { 1 })
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The observer stopped the run.
    Converged,
    /// All sweeps of the schedule were performed.
    Exhausted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "converged"),
            Termination::Exhausted => write!(f, "finished"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DmrgOutcome {
    /// Energy of the last bond optimization.
    pub energy: f64,
    /// Number of completed sweeps.
    pub sweeps: usize,
    pub termination: Termination,
}

/// Bonds of one sweep: `0..N-1` moving forward, then `N-2..=0` moving backward.
/// Items are `(bond, direction, half_sweep)`.
#[derive(Clone, Debug)]
pub struct SweepPath {
    n_bonds: usize,
    step: usize,
}

impl SweepPath {
    pub fn new(n_sites: usize) -> Self {
        SweepPath {
            n_bonds: n_sites.saturating_sub(1),
            step: 0,
        }
    }
}

impl Iterator for SweepPath {
    type Item = (usize, Direction, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let step: usize = self.step;
        if step >= 2 * self.n_bonds {
            return None;
        }
        self.step += 1;
        if step < self.n_bonds {
            Some((step, Direction::Forward, 0))
        } else {
            Some((2 * self.n_bonds - 1 - step, Direction::Backward, 1))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left: usize = (2 * self.n_bonds).saturating_sub(self.step);
        (left, Some(left))
    }
}

impl ExactSizeIterator for SweepPath {}

/// The physical dimensions of the state have to match the operator.
fn check_site_dims(psi: &Mps, mpo: &Mpo) -> Result<(), DmrgError> {
    if psi.len() != mpo.len() {
        return Err(DmrgError::Configuration(format!(
            "the state has {} sites but the operator acts on {}",
            psi.len(),
            mpo.len()
        )));
    }
    for i in 0..psi.len() {
        if psi.site_dim(i)? != mpo.phys_dim(i) {
            return Err(DmrgError::Configuration(format!(
                "site {} of the state has dimension {} but the operator expects {}",
                i,
                psi.site_dim(i)?,
                mpo.phys_dim(i)
            )));
        }
    }
    Ok(())
}

/// Ground state of `mpo` with the default observer.
pub fn dmrg(
    psi: &mut Mps,
    mpo: &Mpo,
    sweeps: &Sweeps,
    args: &DmrgArgs,
) -> Result<DmrgOutcome, DmrgError> {
    let mut observer: DmrgObserver = DmrgObserver::quiet(args.quiet);
    dmrg_with_observer(psi, mpo, sweeps, &mut observer, args)
}

pub fn dmrg_with_observer<O: Observer + ?Sized>(
    psi: &mut Mps,
    mpo: &Mpo,
    sweeps: &Sweeps,
    observer: &mut O,
    args: &DmrgArgs,
) -> Result<DmrgOutcome, DmrgError> {
    dmrg_with_boundaries(psi, mpo, None, None, sweeps, observer, args)
}

/// Ground state of `mpo` embedded between fixed boundary environments of the shape
/// `(chi, w, chi)`.
pub fn dmrg_with_boundaries<O: Observer + ?Sized>(
    psi: &mut Mps,
    mpo: &Mpo,
    left: Option<Array3<f64>>,
    right: Option<Array3<f64>>,
    sweeps: &Sweeps,
    observer: &mut O,
    args: &DmrgArgs,
) -> Result<DmrgOutcome, DmrgError> {
    check_site_dims(psi, mpo)?;
    let mut op: LocalHamiltonian = LocalHamiltonian::with_boundaries(mpo, left, right);
    dmrg_worker(psi, &mut op, sweeps, observer, args)
}

/// Ground state of the sum of all operators in `mpos`.
pub fn dmrg_sum<O: Observer + ?Sized>(
    psi: &mut Mps,
    mpos: &[Mpo],
    sweeps: &Sweeps,
    observer: &mut O,
    args: &DmrgArgs,
) -> Result<DmrgOutcome, DmrgError> {
    let mut op: LocalHamiltonianSum = LocalHamiltonianSum::new(mpos)?;
    for mpo in mpos.iter() {
        check_site_dims(psi, mpo)?;
    }
    dmrg_worker(psi, &mut op, sweeps, observer, args)
}

/// Lowest state of `mpo` orthogonal to the `references`, found by penalizing the
/// overlap with them by `args.weight`.
pub fn dmrg_excited<O: Observer + ?Sized>(
    psi: &mut Mps,
    mpo: &Mpo,
    references: &[Mps],
    sweeps: &Sweeps,
    observer: &mut O,
    args: &DmrgArgs,
) -> Result<DmrgOutcome, DmrgError> {
    check_site_dims(psi, mpo)?;
    let weight: f64 = match (args.weight, references.is_empty()) {
        (Some(weight), _) => weight,
        (None, true) => 1.0,
        (None, false) => {
            return Err(DmrgError::Configuration(String::from(
                "a penalty weight is required when reference states are given",
            )))
        }
    };
    let mut op: PenalizedHamiltonian = PenalizedHamiltonian::new(mpo, references, weight)?;
    dmrg_worker(psi, &mut op, sweeps, observer, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serpentine_path() {
        let path: Vec<(usize, Direction, usize)> = SweepPath::new(4).collect();
        assert_eq!(
            path,
            vec![
                (0, Direction::Forward, 0),
                (1, Direction::Forward, 0),
                (2, Direction::Forward, 0),
                (2, Direction::Backward, 1),
                (1, Direction::Backward, 1),
                (0, Direction::Backward, 1),
            ]
        );
        assert_eq!(SweepPath::new(2).len(), 2);
        assert_eq!(SweepPath::new(1).count(), 0);
    }

    #[test]
    fn debug_level_follows_quiet() {
        assert_eq!(DmrgArgs::default().debug_level(), 1);
        let quiet: DmrgArgs = DmrgArgsBuilder::default().quiet(true).build().unwrap();
        assert_eq!(quiet.debug_level(), 0);
        let loud: DmrgArgs = DmrgArgsBuilder::default()
            .quiet(true)
            .debug_level(3)
            .build()
            .unwrap();
        assert_eq!(loud.debug_level(), 3);
    }
}
