/*!

## Incrementally updated environments

The environment left of bond `b` is the contraction of all sites `< b`, the one right
of the bond the contraction of all sites `> b + 1`. The cache stores `left[i]` (sites
`< i`) and `right[i]` (sites `>= i`) for `i = 0..=N`, together with the limits
`lhlim` and `rhlim` up to which they are known to be valid. Moving the two-site window
by one bond extends exactly one of them by one site; only the first positioning builds
everything from the edges of the chain.

 */

use crate::dmrg::DmrgError;
use dmrg_chain::{tensordot, Mps, PagedStore};
use ndarray::prelude::*;
use std::borrow::Cow;
use std::path::Path;

/// A rule to contract one more site of the chain into an environment.
pub trait Transfer {
    type Dim: Dimension;

    /// Environment of the empty set of sites left of site 0.
    fn left_edge(&self, psi: &Mps) -> Result<Array<f64, Self::Dim>, DmrgError>;

    /// Environment of the empty set of sites right of the last site.
    fn right_edge(&self, psi: &Mps) -> Result<Array<f64, Self::Dim>, DmrgError>;

    /// Contract `site` into the environment of the sites left of it.
    fn grow_left(
        &self,
        env: &Array<f64, Self::Dim>,
        psi: &Mps,
        site: usize,
    ) -> Result<Array<f64, Self::Dim>, DmrgError>;

    /// Contract `site` into the environment of the sites right of it.
    fn grow_right(
        &self,
        env: &Array<f64, Self::Dim>,
        psi: &Mps,
        site: usize,
    ) -> Result<Array<f64, Self::Dim>, DmrgError>;
}

#[derive(Debug)]
pub struct EnvironmentCache<D: Dimension> {
    left: PagedStore<D>,
    right: PagedStore<D>,
    lhlim: usize,
    rhlim: usize,
    window: Option<usize>,
}

impl<D: Dimension> EnvironmentCache<D> {
    /// Empty cache for a chain of `n_sites` sites.
    pub fn new(name: &str, n_sites: usize) -> Self {
        EnvironmentCache {
            left: PagedStore::new(&format!("{}_left", name), n_sites + 1),
            right: PagedStore::new(&format!("{}_right", name), n_sites + 1),
            lhlim: 0,
            rhlim: n_sites,
            window: None,
        }
    }

    pub fn n_sites(&self) -> usize {
        self.left.len() - 1
    }

    /// Bond of the current two-site window.
    pub fn window(&self) -> Option<usize> {
        self.window
    }

    /// Bring the environments of the window at bond `b` up to date with `psi`.
    ///
    /// Between two calls only the sites of the previous window may have changed, and
    /// consecutive windows have to be neighbours (or identical).
    pub fn position<T: Transfer<Dim = D>>(
        &mut self,
        b: usize,
        psi: &Mps,
        transfer: &T,
    ) -> Result<(), DmrgError> {
        let n: usize = self.n_sites();
        if psi.len() != n {
            return Err(DmrgError::Configuration(format!(
                "the state has {} sites but the operator acts on {}",
                psi.len(),
                n
            )));
        }
        if b + 1 >= n {
            return Err(DmrgError::Configuration(format!(
                "bond {} does not exist in a chain of {} sites",
                b, n
            )));
        }
        match self.window {
            None => {
                self.left.set(0, transfer.left_edge(psi)?)?;
                self.right.set(n, transfer.right_edge(psi)?)?;
                self.lhlim = 0;
                self.rhlim = n;
            }
            Some(old) => {
                debug_assert!(
                    old.abs_diff(b) <= 1,
                    "window moved from bond {} to bond {}",
                    old,
                    b
                );
            }
        }

        if self.lhlim > b {
            self.lhlim = b;
        }
        while self.lhlim < b {
            let env = transfer.grow_left(&*self.left.get(self.lhlim)?, psi, self.lhlim)?;
            self.left.set(self.lhlim + 1, env)?;
            self.lhlim += 1;
        }
        if self.rhlim < b + 2 {
            self.rhlim = b + 2;
        }
        while self.rhlim > b + 2 {
            let env = transfer.grow_right(&*self.right.get(self.rhlim)?, psi, self.rhlim - 1)?;
            self.right.set(self.rhlim - 1, env)?;
            self.rhlim -= 1;
        }
        self.window = Some(b);
        Ok(())
    }

    /// Environment of the sites left of the window.
    pub fn left(&self) -> Result<Cow<'_, Array<f64, D>>, DmrgError> {
        Ok(self.left.get(self.lhlim)?)
    }

    /// Environment of the sites right of the window.
    pub fn right(&self) -> Result<Cow<'_, Array<f64, D>>, DmrgError> {
        Ok(self.right.get(self.rhlim)?)
    }

    pub fn is_paged(&self) -> bool {
        self.left.is_paged()
    }

    pub fn set_paging(&mut self, on: bool, dir: &Path) -> Result<(), DmrgError> {
        self.left.set_paging(on, dir)?;
        self.right.set_paging(on, dir)?;
        Ok(())
    }
}

/// Identity-like boundary `delta(l', l) delta(w, w_edge)` of an operator environment.
pub fn edge_environment(chi: usize, w: usize, w_edge: usize) -> Array3<f64> {
    let mut env: Array3<f64> = Array3::zeros((chi, w, chi));
    for i in 0..chi {
        env[[i, w_edge, i]] = 1.0;
    }
    env
}

/// Contract site `a` with operator `w` into the left environment `env`.
///
/// `env` has the shape `(l', w_l, l)`, the result `(r', w_r, r)`.
pub fn contract_left(
    env: &Array3<f64>,
    a: &Array3<f64>,
    w: &Array4<f64>,
) -> Result<Array3<f64>, DmrgError> {
    // (l', a, l) x (l, s, r) -> (l', a, s, r)
    let t = tensordot(env, a, &[2], &[0])?;
    // (l', a, s, r) x (a, s', s, b) -> (l', r, s', b)
    let t = tensordot(&t, w, &[1, 2], &[0, 2])?;
    // (l', s', r') x (l', r, s', b) -> (r', r, b)
    let t = tensordot(a, &t, &[0, 1], &[0, 2])?;
    Ok(t.permuted_axes(IxDyn(&[0, 2, 1]))
        .as_standard_layout()
        .into_owned()
        .into_dimensionality::<Ix3>()?)
}

/// Contract site `a` with operator `w` into the right environment `env`.
///
/// `env` has the shape `(r', w_r, r)`, the result `(l', w_l, l)`.
pub fn contract_right(
    env: &Array3<f64>,
    a: &Array3<f64>,
    w: &Array4<f64>,
) -> Result<Array3<f64>, DmrgError> {
    // (l, s, r) x (r', c, r) -> (l, s, r', c)
    let t = tensordot(a, env, &[2], &[2])?;
    // (b, s', s, c) x (l, s, r', c) -> (b, s', l, r')
    let t = tensordot(w, &t, &[2, 3], &[1, 3])?;
    // (l', s', r') x (b, s', l, r') -> (l', b, l)
    let t = tensordot(a, &t, &[1, 2], &[1, 3])?;
    Ok(t.into_dimensionality::<Ix3>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmrg::local_op::single::MpoTransfer;
    use crate::models::heisenberg;
    use dmrg_chain::Mpo;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn perturb_window(psi: &mut Mps, b: usize, rng: &mut StdRng) {
        for i in [b, b + 1] {
            let shape = psi.site(i).unwrap().raw_dim();
            psi.set_site(i, Array3::random_using(shape, Uniform::new(-1.0, 1.0), rng))
                .unwrap();
        }
    }

    fn assert_fresh(cache: &EnvironmentCache<Ix3>, b: usize, psi: &Mps, transfer: &MpoTransfer) {
        let mut fresh: EnvironmentCache<Ix3> = EnvironmentCache::new("fresh", psi.len());
        fresh.position(b, psi, transfer).unwrap();
        assert!(cache.left().unwrap().abs_diff_eq(&*fresh.left().unwrap(), 1e-12));
        assert!(cache.right().unwrap().abs_diff_eq(&*fresh.right().unwrap(), 1e-12));
    }

    #[test]
    fn incremental_environments_equal_a_fresh_build() {
        let n: usize = 6;
        let mut rng: StdRng = StdRng::seed_from_u64(3);
        let mut psi: Mps = Mps::random(n, 2, 4, &mut rng).unwrap();
        let mpo: Mpo = heisenberg(n, 1.0, 0.5, 0.1).unwrap();
        let transfer: MpoTransfer = MpoTransfer::new(&mpo, None, None);
        let mut cache: EnvironmentCache<Ix3> = EnvironmentCache::new("incremental", n);

        let path: Vec<usize> = (0..n - 1).chain((0..n - 1).rev()).collect();
        for &b in path.iter() {
            cache.position(b, &psi, &transfer).unwrap();
            assert_eq!(cache.window(), Some(b));
            assert_fresh(&cache, b, &psi, &transfer);
            // Only the sites of the window change between two positions.
            perturb_window(&mut psi, b, &mut rng);
        }
    }

    #[test]
    fn edge_environments_of_the_full_chain_give_the_expectation_value() {
        let n: usize = 4;
        let mut rng: StdRng = StdRng::seed_from_u64(5);
        let psi: Mps = Mps::random(n, 2, 3, &mut rng).unwrap();
        let mpo: Mpo = heisenberg(n, 1.0, 1.0, 0.0).unwrap();
        let mut env: Array3<f64> = edge_environment(1, 1, 0);
        for i in 0..n {
            env = contract_left(&env, &*psi.site(i).unwrap(), mpo.site(i)).unwrap();
        }
        let v: Array1<f64> = psi.to_dense().unwrap();
        let reference: f64 = v.dot(&mpo.to_dense().unwrap().dot(&v));
        assert!((env[[0, 0, 0]] - reference).abs() < 1e-12);

        let mut env: Array3<f64> = edge_environment(1, 1, 0);
        for i in (0..n).rev() {
            env = contract_right(&env, &*psi.site(i).unwrap(), mpo.site(i)).unwrap();
        }
        assert!((env[[0, 0, 0]] - reference).abs() < 1e-12);
    }

    #[test]
    fn positions_outside_the_chain_are_rejected() {
        let mut rng: StdRng = StdRng::seed_from_u64(1);
        let psi: Mps = Mps::random(3, 2, 2, &mut rng).unwrap();
        let mpo: Mpo = heisenberg(3, 1.0, 1.0, 0.0).unwrap();
        let transfer: MpoTransfer = MpoTransfer::new(&mpo, None, None);
        let mut cache: EnvironmentCache<Ix3> = EnvironmentCache::new("outside", 3);
        assert!(matches!(
            cache.position(2, &psi, &transfer),
            Err(DmrgError::Configuration(_))
        ));
        let mut short: EnvironmentCache<Ix3> = EnvironmentCache::new("short", 2);
        assert!(short.position(0, &psi, &transfer).is_err());
    }
}
