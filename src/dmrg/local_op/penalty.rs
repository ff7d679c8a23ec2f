use crate::dmrg::local_op::environment::{EnvironmentCache, Transfer};
use crate::dmrg::local_op::{EffectiveOperator, LocalHamiltonian};
use crate::dmrg::{Direction, DmrgError};
use dmrg_chain::{tensordot, Mpo, Mps};
use ndarray::prelude::*;
use std::path::Path;

/// Contraction of the chain with a fixed reference state into `(chi_ref, chi)`
/// overlap environments.
pub struct OverlapTransfer<'a> {
    reference: &'a Mps,
}

impl Transfer for OverlapTransfer<'_> {
    type Dim = Ix2;

    fn left_edge(&self, psi: &Mps) -> Result<Array2<f64>, DmrgError> {
        let x: usize = self.reference.site(0)?.shape()[0];
        let l: usize = psi.site(0)?.shape()[0];
        Ok(Array2::eye(x.max(l)).slice_move(s![..x, ..l]))
    }

    fn right_edge(&self, psi: &Mps) -> Result<Array2<f64>, DmrgError> {
        let n: usize = psi.len();
        let x: usize = self.reference.site(n - 1)?.shape()[2];
        let r: usize = psi.site(n - 1)?.shape()[2];
        Ok(Array2::eye(x.max(r)).slice_move(s![..x, ..r]))
    }

    fn grow_left(&self, env: &Array2<f64>, psi: &Mps, site: usize) -> Result<Array2<f64>, DmrgError> {
        // (x, l) x (x, s, x') -> (l, s, x')
        let t = tensordot(env, &*self.reference.site(site)?, &[0], &[0])?;
        // (l, s, x') x (l, s, l') -> (x', l')
        let t = tensordot(&t, &*psi.site(site)?, &[0, 1], &[0, 1])?;
        Ok(t.into_dimensionality::<Ix2>()?)
    }

    fn grow_right(
        &self,
        env: &Array2<f64>,
        psi: &Mps,
        site: usize,
    ) -> Result<Array2<f64>, DmrgError> {
        // (x', s, x) x (x, r) -> (x', s, r)
        let t = tensordot(&*self.reference.site(site)?, env, &[2], &[0])?;
        // (x', s, r) x (l', s, r) -> (x', l')
        let t = tensordot(&t, &*psi.site(site)?, &[1, 2], &[1, 2])?;
        Ok(t.into_dimensionality::<Ix2>()?)
    }
}

/// Reference state together with its overlap environments.
struct Penalty<'a> {
    transfer: OverlapTransfer<'a>,
    envs: EnvironmentCache<Ix2>,
    /// Reference state projected onto the two-site space of the current window.
    projected: Option<Array4<f64>>,
}

impl Penalty<'_> {
    fn project(&self, b: usize) -> Result<Array4<f64>, DmrgError> {
        let reference: &Mps = self.transfer.reference;
        // (x, l) x (x, s1, y) -> (l, s1, y)
        let t = tensordot(&*self.envs.left()?, &*reference.site(b)?, &[0], &[0])?;
        // x (y, s2, z) -> (l, s1, s2, z)
        let t = tensordot(&t, &*reference.site(b + 1)?, &[2], &[0])?;
        // x (z, r) -> (l, s1, s2, r)
        let t = tensordot(&t, &*self.envs.right()?, &[3], &[0])?;
        Ok(t.into_dimensionality::<Ix4>()?)
    }
}

/// Effective Hamiltonian `H + w sum_i |psi_i><psi_i|` that penalizes the overlap with a
/// set of reference states. Its ground state is the lowest state orthogonal to the
/// references, provided `w` exceeds the energy gap to them.
pub struct PenalizedHamiltonian<'a> {
    hamiltonian: LocalHamiltonian<'a>,
    penalties: Vec<Penalty<'a>>,
    weight: f64,
}

impl<'a> PenalizedHamiltonian<'a> {
    pub fn new(mpo: &'a Mpo, references: &'a [Mps], weight: f64) -> Result<Self, DmrgError> {
        if !references.is_empty() && !(weight > 0.0 && weight.is_finite()) {
            return Err(DmrgError::Configuration(format!(
                "the penalty weight has to be positive, found {}",
                weight
            )));
        }
        for (k, reference) in references.iter().enumerate() {
            if reference.len() != mpo.len() {
                return Err(DmrgError::Configuration(format!(
                    "reference state {} has {} sites but the operator acts on {}",
                    k,
                    reference.len(),
                    mpo.len()
                )));
            }
            for i in 0..mpo.len() {
                if reference.site_dim(i)? != mpo.phys_dim(i) {
                    return Err(DmrgError::Configuration(format!(
                        "site {} of reference state {} has dimension {} instead of {}",
                        i,
                        k,
                        reference.site_dim(i)?,
                        mpo.phys_dim(i)
                    )));
                }
            }
        }
        let penalties: Vec<Penalty> = references
            .iter()
            .map(|reference| Penalty {
                transfer: OverlapTransfer { reference },
                envs: EnvironmentCache::new("overlap", mpo.len()),
                projected: None,
            })
            .collect();
        Ok(PenalizedHamiltonian {
            hamiltonian: LocalHamiltonian::new(mpo),
            penalties,
            weight,
        })
    }

    fn projected(&self) -> Result<Vec<&Array4<f64>>, DmrgError> {
        self.penalties
            .iter()
            .map(|penalty| {
                penalty.projected.as_ref().ok_or_else(|| {
                    DmrgError::Configuration(String::from(
                        "the penalized Hamiltonian has not been positioned on a bond",
                    ))
                })
            })
            .collect()
    }
}

impl EffectiveOperator for PenalizedHamiltonian<'_> {
    fn position(&mut self, b: usize, psi: &Mps) -> Result<(), DmrgError> {
        self.hamiltonian.position(b, psi)?;
        for penalty in self.penalties.iter_mut() {
            penalty.envs.position(b, psi, &penalty.transfer)?;
            penalty.projected = Some(penalty.project(b)?);
        }
        Ok(())
    }

    fn product(&self, phi: &Array4<f64>) -> Result<Array4<f64>, DmrgError> {
        let mut h_phi: Array4<f64> = self.hamiltonian.product(phi)?;
        for v in self.projected()? {
            let overlap: f64 = (v * phi).sum();
            h_phi.scaled_add(self.weight * overlap, v);
        }
        Ok(h_phi)
    }

    fn diag(&self) -> Result<Array4<f64>, DmrgError> {
        let mut diag: Array4<f64> = self.hamiltonian.diag()?;
        for v in self.projected()? {
            diag.scaled_add(self.weight, &v.mapv(|x| x * x));
        }
        Ok(diag)
    }

    fn noise_term(
        &self,
        phi: &Array4<f64>,
        direction: Direction,
    ) -> Result<Option<Array2<f64>>, DmrgError> {
        self.hamiltonian.noise_term(phi, direction)
    }

    fn length(&self) -> usize {
        self.hamiltonian.length()
    }

    fn do_write(&self) -> bool {
        self.hamiltonian.do_write()
    }

    fn set_do_write(&mut self, on: bool, dir: &Path) -> Result<(), DmrgError> {
        self.hamiltonian.set_do_write(on, dir)?;
        for penalty in self.penalties.iter_mut() {
            penalty.envs.set_paging(on, dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmrg::local_op::two_site_tensor;
    use crate::models::heisenberg;
    use dmrg_chain::flatten;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn projected_reference_gives_the_overlap() {
        let n: usize = 5;
        let mut rng: StdRng = StdRng::seed_from_u64(8);
        let mut psi: Mps = Mps::random(n, 2, 4, &mut rng).unwrap();
        let references: Vec<Mps> = vec![Mps::random(n, 2, 3, &mut rng).unwrap()];
        let overlap: f64 = references[0].overlap(&psi).unwrap();
        let mpo: Mpo = heisenberg(n, 1.0, 1.0, 0.0).unwrap();
        let mut op: PenalizedHamiltonian =
            PenalizedHamiltonian::new(&mpo, &references, 2.0).unwrap();
        let mut plain: LocalHamiltonian = LocalHamiltonian::new(&mpo);

        for b in 0..n - 1 {
            psi.position(b).unwrap();
            op.position(b, &psi).unwrap();
            plain.position(b, &psi).unwrap();
            let phi: Array4<f64> = two_site_tensor(&psi, b).unwrap();
            // <v|phi> is the overlap of the reference with the full state.
            let v: &Array4<f64> = op.projected().unwrap()[0];
            assert!(((v * &phi).sum() - overlap).abs() < 1e-12);

            let expected: Array4<f64> =
                plain.product(&phi).unwrap() + 2.0 * overlap * v;
            assert!(op.product(&phi).unwrap().abs_diff_eq(&expected, 1e-12));
            let expected_diag: Array1<f64> =
                flatten(&plain.diag().unwrap()) + 2.0 * flatten(v).mapv(|x| x * x);
            assert!(flatten(&op.diag().unwrap()).abs_diff_eq(&expected_diag, 1e-12));
        }
    }

    #[test]
    fn invalid_penalties_are_rejected() {
        let mut rng: StdRng = StdRng::seed_from_u64(1);
        let mpo: Mpo = heisenberg(4, 1.0, 1.0, 0.0).unwrap();
        let references: Vec<Mps> = vec![Mps::random(4, 2, 2, &mut rng).unwrap()];
        assert!(PenalizedHamiltonian::new(&mpo, &references, 0.0).is_err());
        assert!(PenalizedHamiltonian::new(&mpo, &references, -1.0).is_err());
        let short: Vec<Mps> = vec![Mps::random(3, 2, 2, &mut rng).unwrap()];
        assert!(matches!(
            PenalizedHamiltonian::new(&mpo, &short, 1.0),
            Err(DmrgError::Configuration(_))
        ));
        let wide: Vec<Mps> = vec![Mps::random(4, 3, 2, &mut rng).unwrap()];
        assert!(PenalizedHamiltonian::new(&mpo, &wide, 1.0).is_err());
    }

    #[test]
    fn weight_is_ignored_without_references() {
        let mpo: Mpo = heisenberg(4, 1.0, 1.0, 0.0).unwrap();
        assert!(PenalizedHamiltonian::new(&mpo, &[], 0.0).is_ok());
        assert!(PenalizedHamiltonian::new(&mpo, &[], -1.0).is_ok());
    }
}
