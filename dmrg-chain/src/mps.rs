use crate::defaults::ZERO_NORM;
use crate::storage::PagedStore;
use crate::tensor::{matricize, reshape, tensordot};
use crate::{ChainError, Spectrum};
use log::debug;
use ndarray::prelude::*;
use ndarray_linalg::QR;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use std::borrow::Cow;
use std::path::Path;

/// Matrix product state.
///
/// Site `i` holds a tensor of shape `(chi_left, d, chi_right)`; bond `b` links the
/// right index of site `b` with the left index of site `b + 1`. The position of the
/// orthogonality center is tracked in `center`: all sites left of it are
/// left-orthonormal and all sites right of it are right-orthonormal. `None` means that
/// nothing is known about the gauge.
#[derive(Debug)]
pub struct Mps {
    sites: PagedStore<Ix3>,
    center: Option<usize>,
    spectra: Vec<Option<Spectrum>>,
}

impl Mps {
    pub fn new(sites: Vec<Array3<f64>>) -> Result<Self, ChainError> {
        if sites.is_empty() {
            return Err(ChainError::Invalid(String::from(
                "a matrix product state needs at least one site",
            )));
        }
        for (i, pair) in sites.windows(2).enumerate() {
            if pair[0].shape()[2] != pair[1].shape()[0] {
                return Err(ChainError::Invalid(format!(
                    "bond {} connects dimension {} with dimension {}",
                    i,
                    pair[0].shape()[2],
                    pair[1].shape()[0]
                )));
            }
        }
        let n_bonds: usize = sites.len() - 1;
        Ok(Mps {
            sites: PagedStore::from_tensors("mps", sites),
            center: None,
            spectra: vec![None; n_bonds],
        })
    }

    /// Product state with local state `states[i]` at site `i`.
    pub fn product_state(d: usize, states: &[usize]) -> Result<Self, ChainError> {
        let mut sites: Vec<Array3<f64>> = Vec::with_capacity(states.len());
        for (i, &s) in states.iter().enumerate() {
            if s >= d {
                return Err(ChainError::Invalid(format!(
                    "local state {} at site {} exceeds the local dimension {}",
                    s, i, d
                )));
            }
            let mut a: Array3<f64> = Array3::zeros((1, d, 1));
            a[[0, s, 0]] = 1.0;
            sites.push(a);
        }
        let mut psi: Self = Self::new(sites)?;
        // Every site of a product state is both left- and right-orthonormal.
        psi.center = Some(0);
        Ok(psi)
    }

    /// Random state of `n` sites with local dimension `d` and bond dimension at most
    /// `bond_dim`. The state is normalized and its center is at site 0.
    pub fn random<R: Rng + ?Sized>(
        n: usize,
        d: usize,
        bond_dim: usize,
        rng: &mut R,
    ) -> Result<Self, ChainError> {
        if n == 0 || d == 0 || bond_dim == 0 {
            return Err(ChainError::Invalid(format!(
                "cannot build a random state with n = {}, d = {}, bond dimension = {}",
                n, d, bond_dim
            )));
        }
        // The bond dimension is also limited by the size of the Hilbert space on
        // either side of the bond.
        let limit = |sites: usize| -> usize {
            (0..sites).try_fold(1_usize, |acc, _| acc.checked_mul(d)).map_or(bond_dim, |dim| dim.min(bond_dim))
        };
        let chi: Vec<usize> = (0..=n).map(|i| limit(i.min(n - i))).collect();
        let sites: Vec<Array3<f64>> = (0..n)
            .map(|i| Array3::random_using((chi[i], d, chi[i + 1]), Uniform::new(-1.0, 1.0), rng))
            .collect();
        let mut psi: Self = Self::new(sites)?;
        psi.position(0)?;
        psi.normalize()?;
        Ok(psi)
    }

    /// Copy of the state with all tensors held in memory.
    pub fn try_clone(&self) -> Result<Self, ChainError> {
        let sites: Vec<Array3<f64>> = (0..self.len())
            .map(|i| self.site(i).map(Cow::into_owned))
            .collect::<Result<_, _>>()?;
        let mut psi: Self = Self::new(sites)?;
        psi.center = self.center;
        psi.spectra = self.spectra.clone();
        Ok(psi)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn site(&self, i: usize) -> Result<Cow<'_, Array3<f64>>, ChainError> {
        self.sites.get(i)
    }

    /// Replace the tensor at site `i`. The gauge bookkeeping is left to the caller.
    pub fn set_site(&mut self, i: usize, a: Array3<f64>) -> Result<(), ChainError> {
        self.sites.set(i, a)
    }

    /// Local (physical) dimension of site `i`.
    pub fn site_dim(&self, i: usize) -> Result<usize, ChainError> {
        Ok(self.site(i)?.shape()[1])
    }

    /// Dimension of bond `b`, i.e. the right dimension of site `b`.
    pub fn bond_dim(&self, b: usize) -> Result<usize, ChainError> {
        Ok(self.site(b)?.shape()[2])
    }

    /// Verify that the bond dimensions of neighbouring sites agree.
    pub fn check_bond_dims(&self) -> Result<(), ChainError> {
        for b in 0..self.len().saturating_sub(1) {
            let right: usize = self.site(b)?.shape()[2];
            let left: usize = self.site(b + 1)?.shape()[0];
            if right != left {
                return Err(ChainError::Invalid(format!(
                    "bond {} connects dimension {} with dimension {}",
                    b, right, left
                )));
            }
        }
        Ok(())
    }

    pub fn center(&self) -> Option<usize> {
        self.center
    }

    pub fn set_center(&mut self, center: Option<usize>) {
        self.center = center;
    }

    /// Spectrum of the last truncation at bond `b`.
    pub fn spectrum(&self, b: usize) -> Option<&Spectrum> {
        self.spectra.get(b).and_then(Option::as_ref)
    }

    pub fn set_spectrum(&mut self, b: usize, spectrum: Spectrum) {
        if let Some(slot) = self.spectra.get_mut(b) {
            *slot = Some(spectrum);
        }
    }

    pub fn do_write(&self) -> bool {
        self.sites.is_paged()
    }

    /// Switch disk paging of the site tensors on or off.
    pub fn set_do_write(&mut self, on: bool, dir: &Path) -> Result<(), ChainError> {
        self.sites.set_paging(on, dir)
    }

    /// Move the orthogonality center to site `target` by QR decompositions.
    pub fn position(&mut self, target: usize) -> Result<(), ChainError> {
        let n: usize = self.len();
        if target >= n {
            return Err(ChainError::Invalid(format!(
                "cannot move the center to site {} of a chain with {} sites",
                target, n
            )));
        }
        let (lo, hi): (usize, usize) = match self.center {
            Some(c) => (c, c),
            None => (0, n - 1),
        };
        for i in lo..target {
            self.shift_center_right(i)?;
        }
        for i in ((target + 1)..=hi).rev() {
            self.shift_center_left(i)?;
        }
        self.center = Some(target);
        Ok(())
    }

    /// Left-orthonormalize site `i` and absorb the remainder into site `i + 1`.
    fn shift_center_right(&mut self, i: usize) -> Result<(), ChainError> {
        let a: Array3<f64> = self.site(i)?.into_owned();
        let (l, d, _): (usize, usize, usize) = a.dim();
        let (q, r): (Array2<f64>, Array2<f64>) = matricize(&a, 2)?.qr()?;
        let k: usize = q.ncols();
        let next: Array3<f64> = {
            let b = self.site(i + 1)?;
            tensordot(&r, &*b, &[1], &[0])?.into_dimensionality::<Ix3>()?
        };
        self.set_site(i, reshape(&q, (l, d, k))?)?;
        self.set_site(i + 1, next)
    }

    /// Right-orthonormalize site `i` and absorb the remainder into site `i - 1`.
    fn shift_center_left(&mut self, i: usize) -> Result<(), ChainError> {
        let b: Array3<f64> = self.site(i)?.into_owned();
        let (_, d, r): (usize, usize, usize) = b.dim();
        // LQ decomposition from the QR decomposition of the transpose.
        let (q, rt): (Array2<f64>, Array2<f64>) = matricize(&b, 1)?.t().qr()?;
        let k: usize = q.ncols();
        let prev: Array3<f64> = {
            let a = self.site(i - 1)?;
            tensordot(&*a, &rt.t(), &[2], &[0])?.into_dimensionality::<Ix3>()?
        };
        self.set_site(i, reshape(&q.t(), (k, d, r))?)?;
        self.set_site(i - 1, prev)
    }

    /// Overlap <self|other> by successive contraction of the transfer matrices.
    pub fn overlap(&self, other: &Mps) -> Result<f64, ChainError> {
        if self.len() != other.len() {
            return Err(ChainError::Invalid(format!(
                "overlap of chains with {} and {} sites",
                self.len(),
                other.len()
            )));
        }
        let bra0 = self.site(0)?;
        let ket0 = other.site(0)?;
        let mut env: Array2<f64> =
            Array2::from_shape_fn((bra0.shape()[0], ket0.shape()[0]), |(i, j)| {
                if i == j {
                    1.0
                } else {
                    0.0
                }
            });
        for i in 0..self.len() {
            let bra = self.site(i)?;
            let ket = other.site(i)?;
            // env[l', l] A[l, s, r] -> t[l', s, r]
            let t = tensordot(&env, &*ket, &[1], &[0])?;
            // B[l', s, r'] t[l', s, r] -> env[r', r]
            env = tensordot(&*bra, &t, &[0, 1], &[0, 1])?.into_dimensionality::<Ix2>()?;
        }
        Ok(env.diag().sum())
    }

    pub fn norm(&self) -> Result<f64, ChainError> {
        Ok(self.overlap(self)?.max(0.0).sqrt())
    }

    /// Scale the state to unit norm and return the previous norm.
    pub fn normalize(&mut self) -> Result<f64, ChainError> {
        let nrm: f64 = self.norm()?;
        if nrm < ZERO_NORM {
            return Err(ChainError::ZeroNorm);
        }
        let c: usize = self.center.unwrap_or(0);
        let scaled: Array3<f64> = &*self.site(c)? / nrm;
        self.set_site(c, scaled)?;
        debug!("state normalized at site {} (previous norm {:.12})", c, nrm);
        Ok(nrm)
    }

    /// Full state vector. Only sensible for small chains; site 0 is the most
    /// significant index.
    pub fn to_dense(&self) -> Result<Array1<f64>, ChainError> {
        let mut t: Array2<f64> = matricize(&*self.site(0)?, 2)?;
        for i in 1..self.len() {
            let a = self.site(i)?;
            let (_, d, r): (usize, usize, usize) = a.dim();
            let rows: usize = t.nrows();
            t = reshape(&tensordot(&t, &*a, &[1], &[0])?, (rows * d, r))?;
        }
        Ok(reshape(&t, t.len())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn random_state(n: usize, chi: usize) -> Mps {
        let mut rng: StdRng = StdRng::seed_from_u64(7);
        Mps::random(n, 2, chi, &mut rng).unwrap()
    }

    #[test]
    fn random_state_is_normalized_and_consistent() {
        let psi: Mps = random_state(6, 5);
        assert_abs_diff_eq!(psi.norm().unwrap(), 1.0, epsilon = 1e-12);
        assert!(psi.check_bond_dims().is_ok());
        assert_eq!(psi.center(), Some(0));
        // Bond dimensions are limited by the Hilbert space on both sides.
        let dims: Vec<usize> = (0..5).map(|b| psi.bond_dim(b).unwrap()).collect();
        assert_eq!(dims, vec![2, 4, 5, 4, 2]);
    }

    #[test]
    fn moving_the_center_keeps_the_state() {
        let mut psi: Mps = random_state(5, 4);
        let before: Array1<f64> = psi.to_dense().unwrap();
        psi.position(3).unwrap();
        assert_eq!(psi.center(), Some(3));
        let after: Array1<f64> = psi.to_dense().unwrap();
        assert!(before.abs_diff_eq(&after, 1e-12));

        // All sites left of the center are left-orthonormal.
        for i in 0..3 {
            let a: Array2<f64> = matricize(&*psi.site(i).unwrap(), 2).unwrap();
            let eye: Array2<f64> = Array2::eye(a.ncols());
            assert!(a.t().dot(&a).abs_diff_eq(&eye, 1e-12));
        }
        // All sites right of the center are right-orthonormal.
        let b: Array2<f64> = matricize(&*psi.site(4).unwrap(), 1).unwrap();
        let eye: Array2<f64> = Array2::eye(b.nrows());
        assert!(b.dot(&b.t()).abs_diff_eq(&eye, 1e-12));
    }

    #[test]
    fn product_state_vector() {
        let psi: Mps = Mps::product_state(2, &[1, 0, 1]).unwrap();
        let v: Array1<f64> = psi.to_dense().unwrap();
        let mut expected: Array1<f64> = Array1::zeros(8);
        expected[0b101] = 1.0;
        assert!(v.abs_diff_eq(&expected, 0.0));
        assert!(Mps::product_state(2, &[2]).is_err());
    }

    #[test]
    fn overlap_matches_dense_vectors() {
        let psi: Mps = random_state(4, 3);
        let mut rng: StdRng = StdRng::seed_from_u64(11);
        let phi: Mps = Mps::random(4, 2, 3, &mut rng).unwrap();
        let reference: f64 = psi.to_dense().unwrap().dot(&phi.to_dense().unwrap());
        assert_abs_diff_eq!(psi.overlap(&phi).unwrap(), reference, epsilon = 1e-12);
    }

    #[test]
    fn normalize_rescales_the_center() {
        let mut psi: Mps = random_state(4, 2);
        let scaled: Array3<f64> = &*psi.site(0).unwrap() * 3.0;
        psi.set_site(0, scaled).unwrap();
        assert_abs_diff_eq!(psi.normalize().unwrap(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(psi.norm().unwrap(), 1.0, epsilon = 1e-12);

        let mut zero: Mps = Mps::new(vec![Array3::zeros((1, 2, 1)); 2]).unwrap();
        assert!(matches!(zero.normalize(), Err(ChainError::ZeroNorm)));
    }
}
