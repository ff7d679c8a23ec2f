/*!

## Dense tensor contractions

Pairwise contractions are mapped onto a single matrix product: the free axes of
both operands are moved to the outside, the contracted axes to the inside, both
arrays are brought into standard layout, reshaped into matrices and multiplied.

 */

use crate::ChainError;
use ndarray::prelude::*;
use ndarray::{Data, IntoDimension, IxDyn};

/// Contract the axes `axes_a` of `a` with the axes `axes_b` of `b`.
///
/// The axes of the result are the free axes of `a` followed by the free axes of `b`,
/// both in their original order (the convention of `numpy.tensordot`).
pub fn tensordot<S1, S2, D1, D2>(
    a: &ArrayBase<S1, D1>,
    b: &ArrayBase<S2, D2>,
    axes_a: &[usize],
    axes_b: &[usize],
) -> Result<ArrayD<f64>, ChainError>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D1: Dimension,
    D2: Dimension,
{
    let a: ArrayViewD<f64> = a.view().into_dyn();
    let b: ArrayViewD<f64> = b.view().into_dyn();

    if axes_a.len() != axes_b.len() {
        return Err(ChainError::Contraction(format!(
            "{} axes of the first tensor cannot be paired with {} axes of the second",
            axes_a.len(),
            axes_b.len()
        )));
    }
    for (&i, &j) in axes_a.iter().zip(axes_b.iter()) {
        if i >= a.ndim() || j >= b.ndim() {
            return Err(ChainError::Contraction(format!(
                "axis pair ({}, {}) out of range for tensors of order {} and {}",
                i,
                j,
                a.ndim(),
                b.ndim()
            )));
        }
        if a.shape()[i] != b.shape()[j] {
            return Err(ChainError::Contraction(format!(
                "axis {} of shape {:?} does not match axis {} of shape {:?}",
                i,
                a.shape(),
                j,
                b.shape()
            )));
        }
    }

    let free_a: Vec<usize> = (0..a.ndim()).filter(|i| !axes_a.contains(i)).collect();
    let free_b: Vec<usize> = (0..b.ndim()).filter(|i| !axes_b.contains(i)).collect();

    let rows: usize = free_a.iter().map(|&i| a.shape()[i]).product();
    let inner: usize = axes_a.iter().map(|&i| a.shape()[i]).product();
    let cols: usize = free_b.iter().map(|&i| b.shape()[i]).product();

    let out_shape: Vec<usize> = free_a
        .iter()
        .map(|&i| a.shape()[i])
        .chain(free_b.iter().map(|&i| b.shape()[i]))
        .collect();

    // Free axes of `a` in front, contracted axes at the back.
    let perm_a: Vec<usize> = free_a.iter().chain(axes_a.iter()).copied().collect();
    let a_mat: Array2<f64> = a
        .permuted_axes(perm_a)
        .as_standard_layout()
        .into_owned()
        .into_shape((rows, inner))?;

    // Contracted axes of `b` in front, free axes at the back.
    let perm_b: Vec<usize> = axes_b.iter().chain(free_b.iter()).copied().collect();
    let b_mat: Array2<f64> = b
        .permuted_axes(perm_b)
        .as_standard_layout()
        .into_owned()
        .into_shape((inner, cols))?;

    Ok(a_mat.dot(&b_mat).into_shape(IxDyn(&out_shape))?)
}

/// Reshape a tensor in row-major order, independent of its memory layout.
///
/// LAPACK results come back in column-major layout, which `into_shape` would otherwise
/// read in the wrong order.
pub fn reshape<S, D, E>(a: &ArrayBase<S, D>, shape: E) -> Result<Array<f64, E::Dim>, ChainError>
where
    S: Data<Elem = f64>,
    D: Dimension,
    E: IntoDimension,
{
    Ok(a.as_standard_layout().into_owned().into_shape(shape)?)
}

/// Reshape a tensor into a matrix whose rows are the first `n_row_axes` axes.
pub fn matricize<S, D>(a: &ArrayBase<S, D>, n_row_axes: usize) -> Result<Array2<f64>, ChainError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let rows: usize = a.shape()[..n_row_axes].iter().product();
    let cols: usize = a.shape()[n_row_axes..].iter().product();
    reshape(a, (rows, cols))
}

/// All elements of a tensor in logical (row-major) order.
pub fn flatten<S, D>(a: &ArrayBase<S, D>) -> Array1<f64>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    a.iter().copied().collect()
}
