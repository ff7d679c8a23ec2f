/*!

## Spin chain Hamiltonians as matrix product operators

All operators are upper triangular in the virtual index: row 0 starts a term and the
last column finishes it. The tensors have the shape `(w_left, s_out, s_in, w_right)`;
an open chain keeps row 0 of the first site and the last column of the last site.

 */

use dmrg_chain::{ChainError, Mpo};
use ndarray::prelude::*;

/// Spin-1/2 operators in the basis (up, down).
pub struct SpinHalf {
    pub id: Array2<f64>,
    pub sz: Array2<f64>,
    pub sp: Array2<f64>,
    pub sm: Array2<f64>,
    pub sx: Array2<f64>,
}

impl SpinHalf {
    pub fn new() -> Self {
        SpinHalf {
            id: Array2::eye(2),
            sz: array![[0.5, 0.0], [0.0, -0.5]],
            sp: array![[0.0, 1.0], [0.0, 0.0]],
            sm: array![[0.0, 0.0], [1.0, 0.0]],
            sx: array![[0.0, 0.5], [0.5, 0.0]],
        }
    }
}

impl SpinHalf {
    /// Operator by name: `Id`, `Sz`, `Sp`, `Sm` or `Sx`.
    pub fn op(&self, name: &str) -> Option<&Array2<f64>> {
        match name {
            "Id" => Some(&self.id),
            "Sz" => Some(&self.sz),
            "Sp" => Some(&self.sp),
            "Sm" => Some(&self.sm),
            "Sx" => Some(&self.sx),
            _ => None,
        }
    }
}

impl Default for SpinHalf {
    fn default() -> Self {
        Self::new()
    }
}

/// Bulk tensor of the XXZ chain
/// `H = sum_i J/2 (S+_i S-_(i+1) + S-_i S+_(i+1)) + Jz Sz_i Sz_(i+1) - h sum_i Sz_i`.
pub fn heisenberg_tensor(j: f64, jz: f64, h: f64) -> Array4<f64> {
    let ops: SpinHalf = SpinHalf::new();
    let mut w: Array4<f64> = Array4::zeros((5, 2, 2, 5));
    set_block(&mut w, 0, 0, &ops.id);
    set_block(&mut w, 0, 1, &ops.sp);
    set_block(&mut w, 0, 2, &ops.sm);
    set_block(&mut w, 0, 3, &ops.sz);
    set_block(&mut w, 0, 4, &(-h * &ops.sz));
    set_block(&mut w, 1, 4, &(0.5 * j * &ops.sm));
    set_block(&mut w, 2, 4, &(0.5 * j * &ops.sp));
    set_block(&mut w, 3, 4, &(jz * &ops.sz));
    set_block(&mut w, 4, 4, &ops.id);
    w
}

/// Bulk tensor of the transverse field Ising chain
/// `H = -J sum_i Z_i Z_(i+1) - g sum_i X_i` with Pauli matrices `X` and `Z`.
pub fn ising_tensor(j: f64, g: f64) -> Array4<f64> {
    let ops: SpinHalf = SpinHalf::new();
    let z: Array2<f64> = 2.0 * &ops.sz;
    let x: Array2<f64> = 2.0 * &ops.sx;
    let mut w: Array4<f64> = Array4::zeros((3, 2, 2, 3));
    set_block(&mut w, 0, 0, &ops.id);
    set_block(&mut w, 0, 1, &z);
    set_block(&mut w, 0, 2, &(-g * &x));
    set_block(&mut w, 1, 2, &(-j * &z));
    set_block(&mut w, 2, 2, &ops.id);
    w
}

/// Bulk tensor of the sum of a single-site operator over all sites.
pub fn local_sum_tensor(op: &Array2<f64>) -> Array4<f64> {
    let d: usize = op.nrows();
    let mut w: Array4<f64> = Array4::zeros((2, d, d, 2));
    set_block(&mut w, 0, 0, &Array2::eye(d));
    set_block(&mut w, 0, 1, op);
    set_block(&mut w, 1, 1, &Array2::eye(d));
    w
}

pub fn heisenberg(n: usize, j: f64, jz: f64, h: f64) -> Result<Mpo, ChainError> {
    open_chain(n, &heisenberg_tensor(j, jz, h))
}

pub fn ising(n: usize, j: f64, g: f64) -> Result<Mpo, ChainError> {
    open_chain(n, &ising_tensor(j, g))
}

pub fn local_sum(n: usize, op: &Array2<f64>) -> Result<Mpo, ChainError> {
    open_chain(n, &local_sum_tensor(op))
}

/// Open chain of `n` copies of an upper triangular bulk tensor.
pub fn open_chain(n: usize, bulk: &Array4<f64>) -> Result<Mpo, ChainError> {
    let last: usize = bulk.shape()[3] - 1;
    let sites: Vec<Array4<f64>> = (0..n)
        .map(|i| {
            let rows = if i == 0 { s![0..1, .., .., ..] } else { s![.., .., .., ..] };
            let w = bulk.slice(rows);
            if i == n - 1 {
                w.slice(s![.., .., .., last..]).to_owned()
            } else {
                w.to_owned()
            }
        })
        .collect();
    Mpo::new(sites)
}

fn set_block(w: &mut Array4<f64>, a: usize, b: usize, op: &Array2<f64>) {
    w.slice_mut(s![a, .., .., b]).assign(op);
}
