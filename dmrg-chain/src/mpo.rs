use crate::tensor::{reshape, tensordot};
use crate::ChainError;
use ndarray::prelude::*;

/// Matrix product operator.
///
/// Site `i` holds a tensor of shape `(w_left, s_out, s_in, w_right)`. The outer virtual
/// dimensions of a finite chain are usually 1, but larger boundary dimensions are
/// allowed as long as the effective operator is given matching boundary tensors.
#[derive(Clone, Debug)]
pub struct Mpo {
    sites: Vec<Array4<f64>>,
}

impl Mpo {
    pub fn new(sites: Vec<Array4<f64>>) -> Result<Self, ChainError> {
        if sites.is_empty() {
            return Err(ChainError::Invalid(String::from(
                "a matrix product operator needs at least one site",
            )));
        }
        for (i, w) in sites.iter().enumerate() {
            if w.shape()[1] != w.shape()[2] {
                return Err(ChainError::Invalid(format!(
                    "site {} maps a space of dimension {} onto one of dimension {}",
                    i,
                    w.shape()[2],
                    w.shape()[1]
                )));
            }
        }
        for (i, pair) in sites.windows(2).enumerate() {
            if pair[0].shape()[3] != pair[1].shape()[0] {
                return Err(ChainError::Invalid(format!(
                    "operator bond {} connects dimension {} with dimension {}",
                    i,
                    pair[0].shape()[3],
                    pair[1].shape()[0]
                )));
            }
        }
        Ok(Mpo { sites })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn site(&self, i: usize) -> &Array4<f64> {
        &self.sites[i]
    }

    /// Local dimension of site `i`.
    pub fn phys_dim(&self, i: usize) -> usize {
        self.sites[i].shape()[1]
    }

    /// Virtual dimension at the left edge of the chain.
    pub fn left_dim(&self) -> usize {
        self.sites[0].shape()[0]
    }

    /// Virtual dimension at the right edge of the chain.
    pub fn right_dim(&self) -> usize {
        self.sites[self.sites.len() - 1].shape()[3]
    }

    /// Full operator matrix. Only sensible for small chains and requires outer virtual
    /// dimensions of 1. Site 0 is the most significant index.
    pub fn to_dense(&self) -> Result<Array2<f64>, ChainError> {
        if self.left_dim() != 1 || self.right_dim() != 1 {
            return Err(ChainError::Invalid(format!(
                "dense matrix needs boundary dimensions 1, found {} and {}",
                self.left_dim(),
                self.right_dim()
            )));
        }
        // t[out, in, w] with the left boundary index dropped
        let w0: &Array4<f64> = &self.sites[0];
        let (_, d0, _, wr0): (usize, usize, usize, usize) = w0.dim();
        let mut t: Array3<f64> = reshape(w0, (d0, d0, wr0))?;
        for w in self.sites.iter().skip(1) {
            let (_, d, _, wr): (usize, usize, usize, usize) = w.dim();
            let (dout, din, _): (usize, usize, usize) = t.dim();
            // t[o, i, a] W[a, s', s, b] -> [o, i, s', s, b] -> [o, s', i, s, b]
            let next = tensordot(&t, w, &[2], &[0])?.permuted_axes(IxDyn(&[0, 2, 1, 3, 4]));
            t = reshape(&next, (dout * d, din * d, wr))?;
        }
        let dim: usize = t.shape()[0];
        Ok(reshape(&t, (dim, dim))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sz() -> Array2<f64> {
        array![[0.5, 0.0], [0.0, -0.5]]
    }

    /// Operator sum of `op` on every site as a bond dimension 2 chain.
    fn local_sum(n: usize, op: &Array2<f64>) -> Mpo {
        let eye: Array2<f64> = Array2::eye(2);
        let bulk = |s: usize, t: usize, a: usize, b: usize| -> f64 {
            match (a, b) {
                (0, 0) | (1, 1) => eye[[s, t]],
                (1, 0) => op[[s, t]],
                _ => 0.0,
            }
        };
        let sites: Vec<Array4<f64>> = (0..n)
            .map(|i| {
                let wl: usize = if i == 0 { 1 } else { 2 };
                let wr: usize = if i == n - 1 { 1 } else { 2 };
                Array4::from_shape_fn((wl, 2, 2, wr), |(a, s, t, b)| {
                    let a: usize = if i == 0 { 1 } else { a };
                    bulk(s, t, a, b)
                })
            })
            .collect();
        Mpo::new(sites).unwrap()
    }

    #[test]
    fn dense_matrix_of_a_local_sum() {
        let mpo: Mpo = local_sum(3, &sz());
        let h: Array2<f64> = mpo.to_dense().unwrap();
        assert_eq!(h.dim(), (8, 8));
        // Total magnetization: diagonal entries count up spins minus down spins.
        for k in 0..8_usize {
            let ups: f64 = (0..3).filter(|bit| (k >> bit) & 1 == 0).count() as f64;
            let expected: f64 = ups - 1.5;
            assert!((h[[k, k]] - expected).abs() < 1e-14);
        }
        let off_diagonal: Array2<f64> = &h - &Array2::from_diag(&h.diag());
        assert!(off_diagonal.abs_diff_eq(&Array2::<f64>::zeros((8, 8)), 0.0));
    }

    #[test]
    fn inconsistent_operators_are_rejected() {
        let a: Array4<f64> = Array4::zeros((1, 2, 2, 3));
        let b: Array4<f64> = Array4::zeros((2, 2, 2, 1));
        assert!(Mpo::new(vec![a.clone(), b]).is_err());
        assert!(Mpo::new(vec![Array4::zeros((1, 2, 3, 1))]).is_err());
        let c: Array4<f64> = Array4::zeros((3, 2, 2, 1));
        assert_eq!(Mpo::new(vec![a, c]).unwrap().len(), 2);
    }
}
