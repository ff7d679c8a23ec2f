use crate::dmrg::local_op::environment::{
    contract_left, contract_right, edge_environment, EnvironmentCache, Transfer,
};
use crate::dmrg::local_op::EffectiveOperator;
use crate::dmrg::{Direction, DmrgError};
use dmrg_chain::{matricize, tensordot, Mpo, Mps};
use ndarray::prelude::*;
use std::borrow::Cow;
use std::path::Path;

/// Contraction of the chain with a single operator into `(chi, w, chi)` environments.
pub struct MpoTransfer<'a> {
    mpo: &'a Mpo,
    left_boundary: Option<Array3<f64>>,
    right_boundary: Option<Array3<f64>>,
}

impl<'a> MpoTransfer<'a> {
    pub fn new(
        mpo: &'a Mpo,
        left_boundary: Option<Array3<f64>>,
        right_boundary: Option<Array3<f64>>,
    ) -> Self {
        MpoTransfer {
            mpo,
            left_boundary,
            right_boundary,
        }
    }

    fn check_boundary(
        boundary: &Array3<f64>,
        expected: (usize, usize, usize),
        side: &str,
    ) -> Result<(), DmrgError> {
        if boundary.dim() != expected {
            return Err(DmrgError::Configuration(format!(
                "the {} boundary has the shape {:?} but {:?} is required",
                side,
                boundary.shape(),
                expected
            )));
        }
        Ok(())
    }
}

impl Transfer for MpoTransfer<'_> {
    type Dim = Ix3;

    fn left_edge(&self, psi: &Mps) -> Result<Array3<f64>, DmrgError> {
        let chi: usize = psi.site(0)?.shape()[0];
        let w: usize = self.mpo.left_dim();
        match &self.left_boundary {
            Some(boundary) => {
                Self::check_boundary(boundary, (chi, w, chi), "left")?;
                Ok(boundary.clone())
            }
            None => Ok(edge_environment(chi, w, 0)),
        }
    }

    fn right_edge(&self, psi: &Mps) -> Result<Array3<f64>, DmrgError> {
        let chi: usize = psi.site(psi.len() - 1)?.shape()[2];
        let w: usize = self.mpo.right_dim();
        match &self.right_boundary {
            Some(boundary) => {
                Self::check_boundary(boundary, (chi, w, chi), "right")?;
                Ok(boundary.clone())
            }
            None => Ok(edge_environment(chi, w, w - 1)),
        }
    }

    fn grow_left(&self, env: &Array3<f64>, psi: &Mps, site: usize) -> Result<Array3<f64>, DmrgError> {
        contract_left(env, &*psi.site(site)?, self.mpo.site(site))
    }

    fn grow_right(
        &self,
        env: &Array3<f64>,
        psi: &Mps,
        site: usize,
    ) -> Result<Array3<f64>, DmrgError> {
        contract_right(env, &*psi.site(site)?, self.mpo.site(site))
    }
}

/// Two-site effective Hamiltonian of a single matrix product operator.
pub struct LocalHamiltonian<'a> {
    transfer: MpoTransfer<'a>,
    envs: EnvironmentCache<Ix3>,
}

impl<'a> LocalHamiltonian<'a> {
    pub fn new(mpo: &'a Mpo) -> Self {
        Self::with_boundaries(mpo, None, None)
    }

    /// Effective Hamiltonian of a chain embedded between fixed boundary environments
    /// of the shape `(chi, w, chi)`. A missing boundary is replaced by the identity on
    /// the outer bond of the state, selecting the first (left) or last (right) virtual
    /// index of the operator.
    pub fn with_boundaries(
        mpo: &'a Mpo,
        left: Option<Array3<f64>>,
        right: Option<Array3<f64>>,
    ) -> Self {
        LocalHamiltonian {
            transfer: MpoTransfer::new(mpo, left, right),
            envs: EnvironmentCache::new("env", mpo.len()),
        }
    }

    fn window(&self) -> Result<usize, DmrgError> {
        self.envs.window().ok_or_else(|| {
            DmrgError::Configuration(String::from(
                "the effective Hamiltonian has not been positioned on a bond",
            ))
        })
    }

    /// Left environment, operators of the window and right environment.
    fn parts(
        &self,
    ) -> Result<(Cow<'_, Array3<f64>>, &Array4<f64>, &Array4<f64>, Cow<'_, Array3<f64>>), DmrgError>
    {
        let b: usize = self.window()?;
        Ok((
            self.envs.left()?,
            self.transfer.mpo.site(b),
            self.transfer.mpo.site(b + 1),
            self.envs.right()?,
        ))
    }
}

impl EffectiveOperator for LocalHamiltonian<'_> {
    fn position(&mut self, b: usize, psi: &Mps) -> Result<(), DmrgError> {
        self.envs.position(b, psi, &self.transfer)
    }

    fn product(&self, phi: &Array4<f64>) -> Result<Array4<f64>, DmrgError> {
        let (left, w1, w2, right) = self.parts()?;
        // (l', a, l) x (l, s1, s2, r) -> (l', a, s1, s2, r)
        let t = tensordot(&*left, phi, &[2], &[0])?;
        // x (a, s1', s1, b) -> (l', s2, r, s1', b)
        let t = tensordot(&t, w1, &[1, 2], &[0, 2])?;
        // x (b, s2', s2, c) -> (l', r, s1', s2', c)
        let t = tensordot(&t, w2, &[4, 1], &[0, 2])?;
        // x (r', c, r) -> (l', s1', s2', r')
        let t = tensordot(&t, &*right, &[4, 1], &[1, 2])?;
        Ok(t.into_dimensionality::<Ix4>()?)
    }

    fn diag(&self) -> Result<Array4<f64>, DmrgError> {
        let (left, w1, w2, right) = self.parts()?;
        let left_d: Array2<f64> =
            Array2::from_shape_fn((left.shape()[0], left.shape()[1]), |(l, a)| left[[l, a, l]]);
        let right_d: Array2<f64> =
            Array2::from_shape_fn((right.shape()[0], right.shape()[1]), |(r, c)| right[[r, c, r]]);
        let w1_d: Array3<f64> = Array3::from_shape_fn(
            (w1.shape()[0], w1.shape()[1], w1.shape()[3]),
            |(a, s, b)| w1[[a, s, s, b]],
        );
        let w2_d: Array3<f64> = Array3::from_shape_fn(
            (w2.shape()[0], w2.shape()[1], w2.shape()[3]),
            |(b, s, c)| w2[[b, s, s, c]],
        );
        // (l, a) x (a, s1, b) x (b, s2, c) x (r, c) -> (l, s1, s2, r)
        let t = tensordot(&left_d, &w1_d, &[1], &[0])?;
        let t = tensordot(&t, &w2_d, &[2], &[0])?;
        let t = tensordot(&t, &right_d, &[3], &[1])?;
        Ok(t.into_dimensionality::<Ix4>()?)
    }

    fn noise_term(
        &self,
        phi: &Array4<f64>,
        direction: Direction,
    ) -> Result<Option<Array2<f64>>, DmrgError> {
        let (left, w1, w2, right) = self.parts()?;
        let x: Array2<f64> = match direction {
            Direction::Forward => {
                // (l', s2, r, s1', b) -> (l', s1' | s2, r, b)
                let t = tensordot(&tensordot(&*left, phi, &[2], &[0])?, w1, &[1, 2], &[0, 2])?;
                matricize(&t.permuted_axes(IxDyn(&[0, 3, 1, 2, 4])), 2)?
            }
            Direction::Backward => {
                // (l, s1, r', b, s2') -> (s2', r' | l, s1, b)
                let t = tensordot(&tensordot(phi, &*right, &[3], &[2])?, w2, &[2, 4], &[2, 3])?;
                matricize(&t.permuted_axes(IxDyn(&[4, 2, 0, 1, 3])), 2)?
            }
        };
        Ok(Some(x.dot(&x.t())))
    }

    fn length(&self) -> usize {
        self.transfer.mpo.len()
    }

    fn do_write(&self) -> bool {
        self.envs.is_paged()
    }

    fn set_do_write(&mut self, on: bool, dir: &Path) -> Result<(), DmrgError> {
        self.envs.set_paging(on, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmrg::local_op::two_site_tensor;
    use crate::models::{heisenberg, heisenberg_tensor};
    use dmrg_chain::{flatten, reshape};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Dense matrix of the effective Hamiltonian built column by column.
    fn dense_local(op: &LocalHamiltonian, shape: (usize, usize, usize, usize)) -> Array2<f64> {
        let dim: usize = shape.0 * shape.1 * shape.2 * shape.3;
        let mut h: Array2<f64> = Array2::zeros((dim, dim));
        for k in 0..dim {
            let mut e: Array1<f64> = Array1::zeros(dim);
            e[k] = 1.0;
            let col = op.product(&reshape(&e, shape).unwrap()).unwrap();
            h.column_mut(k).assign(&flatten(&col));
        }
        h
    }

    #[test]
    fn product_reproduces_the_energy_of_the_chain() {
        let n: usize = 5;
        let mut rng: StdRng = StdRng::seed_from_u64(17);
        let mut psi: Mps = Mps::random(n, 2, 4, &mut rng).unwrap();
        let mpo: Mpo = heisenberg(n, 1.0, 1.0, 0.3).unwrap();
        let v: Array1<f64> = psi.to_dense().unwrap();
        let reference: f64 = v.dot(&mpo.to_dense().unwrap().dot(&v));

        let mut op: LocalHamiltonian = LocalHamiltonian::new(&mpo);
        for b in 0..n - 1 {
            psi.position(b).unwrap();
            op.position(b, &psi).unwrap();
            let phi: Array4<f64> = two_site_tensor(&psi, b).unwrap();
            let h_phi: Array4<f64> = op.product(&phi).unwrap();
            let energy: f64 = flatten(&phi).dot(&flatten(&h_phi));
            assert!((energy - reference).abs() < 1e-12);
        }
    }

    #[test]
    fn diagonal_and_symmetry_of_the_local_matrix() {
        let n: usize = 4;
        let mut rng: StdRng = StdRng::seed_from_u64(2);
        let psi: Mps = Mps::random(n, 2, 3, &mut rng).unwrap();
        let mpo: Mpo = heisenberg(n, 1.0, 0.4, 0.2).unwrap();
        let mut op: LocalHamiltonian = LocalHamiltonian::new(&mpo);
        op.position(1, &psi).unwrap();
        let shape = two_site_tensor(&psi, 1).unwrap().dim();
        let h: Array2<f64> = dense_local(&op, shape);
        assert!(h.abs_diff_eq(&h.t(), 1e-12));
        assert!(flatten(&op.diag().unwrap()).abs_diff_eq(&h.diag().to_owned(), 1e-12));
    }

    #[test]
    fn explicit_boundaries_reproduce_the_open_chain() {
        // Every site carries the bulk tensor; the default boundaries select the first
        // row of the leftmost and the last column of the rightmost operator.
        let n: usize = 4;
        let bulk: Array4<f64> = heisenberg_tensor(1.0, 1.0, 0.0);
        let periodic_like: Mpo = Mpo::new(vec![bulk; n]).unwrap();
        let open: Mpo = heisenberg(n, 1.0, 1.0, 0.0).unwrap();
        let mut rng: StdRng = StdRng::seed_from_u64(9);
        let psi: Mps = Mps::random(n, 2, 4, &mut rng).unwrap();
        let phi: Array4<f64> = two_site_tensor(&psi, 0).unwrap();

        let mut reference: LocalHamiltonian = LocalHamiltonian::new(&open);
        reference.position(0, &psi).unwrap();
        let expected: Array4<f64> = reference.product(&phi).unwrap();

        let mut implicit: LocalHamiltonian = LocalHamiltonian::new(&periodic_like);
        implicit.position(0, &psi).unwrap();
        assert!(implicit.product(&phi).unwrap().abs_diff_eq(&expected, 1e-12));

        let left: Array3<f64> = edge_environment(1, 5, 0);
        let right: Array3<f64> = edge_environment(1, 5, 4);
        let mut explicit: LocalHamiltonian =
            LocalHamiltonian::with_boundaries(&periodic_like, Some(left), Some(right));
        explicit.position(0, &psi).unwrap();
        assert!(explicit.product(&phi).unwrap().abs_diff_eq(&expected, 1e-12));

        let mut wrong: LocalHamiltonian =
            LocalHamiltonian::with_boundaries(&periodic_like, Some(edge_environment(2, 5, 0)), None);
        assert!(matches!(
            wrong.position(0, &psi),
            Err(DmrgError::Configuration(_))
        ));
    }

    #[test]
    fn noise_term_is_a_positive_density_matrix() {
        let n: usize = 4;
        let mut rng: StdRng = StdRng::seed_from_u64(4);
        let psi: Mps = Mps::random(n, 2, 3, &mut rng).unwrap();
        let mpo: Mpo = heisenberg(n, 1.0, 1.0, 0.0).unwrap();
        let mut op: LocalHamiltonian = LocalHamiltonian::new(&mpo);
        op.position(1, &psi).unwrap();
        let phi: Array4<f64> = two_site_tensor(&psi, 1).unwrap();
        let (l, d1, d2, r) = phi.dim();
        let forward: Array2<f64> = op.noise_term(&phi, Direction::Forward).unwrap().unwrap();
        let backward: Array2<f64> = op.noise_term(&phi, Direction::Backward).unwrap().unwrap();
        assert_eq!(forward.dim(), (l * d1, l * d1));
        assert_eq!(backward.dim(), (d2 * r, d2 * r));
        assert!(forward.abs_diff_eq(&forward.t(), 1e-12));
        assert!(forward.diag().iter().all(|&x| x >= 0.0));
        assert!(backward.diag().iter().all(|&x| x >= 0.0));
    }
}
