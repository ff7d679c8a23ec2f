/*!

# Davidson Diagonalization

The lowest eigenpair of a large symmetric operator is found in a small subspace that
is grown by one preconditioned residual per iteration. Only products of the operator
with vectors are needed, so the two-site Hamiltonian of a bond is never formed as a
matrix.

The subspace basis is kept orthonormal by orthogonalizing every correction twice
against it. Once the basis reaches its maximal size it is collapsed to the current
Ritz vector.

*/

use crate::defaults::{ORTHOGONALIZATION_THRESHOLD, PRECONDITIONER_SHIFT};
use crate::dmrg::logging;
use crate::dmrg::DmrgError;
use derive_builder::Builder;
use dmrg_chain::defaults::ZERO_NORM;
use ndarray::prelude::*;
use ndarray::Data;
use ndarray_linalg::{Eigh, Norm, UPLO};
use std::time::Instant;

/// Interface of the operators that the Davidson solver can diagonalize.
pub trait DavidsonEngine {
    /// Compute the products `A x_i` for all columns `x_i` of `x`, in that order.
    fn compute_products(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>, DmrgError>;

    /// Apply the preconditioner `(w_k - D)^-1` to the residual vector `r_k`, where `D`
    /// is the diagonal of the operator.
    fn precondition(&self, r_k: ArrayView1<f64>, w_k: f64) -> Array1<f64>;

    /// Dimension of the vector space.
    fn get_size(&self) -> usize;
}

impl<S> DavidsonEngine for ArrayBase<S, Ix2>
where
    S: Data<Elem = f64>,
{
    fn compute_products(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>, DmrgError> {
        Ok(self.dot(&x))
    }

    fn precondition(&self, r_k: ArrayView1<f64>, w_k: f64) -> Array1<f64> {
        let mut denom: Array1<f64> = w_k - &self.diag();
        denom.mapv_inplace(|x| if x.abs() < PRECONDITIONER_SHIFT { 1.0 } else { x });
        &r_k / &denom
    }

    fn get_size(&self) -> usize {
        self.nrows()
    }
}

/// Settings of the solver.
#[derive(Builder, Clone, Debug)]
pub struct Davidson {
    /// Largest number of iterations.
    #[builder(default = "crate::defaults::SWEEP_MAX_ITER")]
    max_iter: usize,
    /// The eigenpair is converged once the norm of the residual is below this value.
    #[builder(default = "crate::defaults::DAVIDSON_CONVERGENCE")]
    tolerance: f64,
    /// Size of the subspace at which it is collapsed to the Ritz vector.
    #[builder(default = "crate::defaults::DAVIDSON_MAX_SUBSPACE")]
    max_subspace: usize,
    /// Iteration tables are printed for levels of 2 and above.
    #[builder(default = "1")]
    debug_level: i32,
}

/// Lowest eigenpair found by the solver.
#[derive(Clone, Debug)]
pub struct DavidsonResult {
    pub eigenvalue: f64,
    pub eigenvector: Array1<f64>,
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

impl Davidson {
    /// Compute the lowest eigenpair of the operator `engine` starting from `guess`.
    ///
    /// The solver stops after `max_iter` iterations even if the residual is
    /// still above the tolerance; the best estimate is returned in that case.
    pub fn solve<E: DavidsonEngine + ?Sized>(
        &self,
        engine: &mut E,
        guess: ArrayView1<f64>,
    ) -> Result<DavidsonResult, DmrgError> {
        let timer: Instant = Instant::now();
        let dim: usize = engine.get_size();
        if guess.len() != dim {
            return Err(DmrgError::Configuration(format!(
                "the start vector has length {} but the operator has dimension {}",
                guess.len(),
                dim
            )));
        }
        let norm: f64 = guess.norm_l2();
        if !norm.is_finite() || norm < ZERO_NORM {
            return Err(DmrgError::NumericalDegeneracy(format!(
                "the start vector of the eigensolver has norm {:e}",
                norm
            )));
        }
        let max_space: usize = self.max_subspace.max(2).min(dim);
        let max_iter: usize = self.max_iter.max(1);
        let verbose: bool = self.debug_level >= 2;
        if verbose {
            logging::print_davidson_init(max_iter, self.tolerance, dim);
        }

        // Orthonormal basis of the subspace and the products of the operator with it.
        let mut basis: Array2<f64> = (&guess / norm).insert_axis(Axis(1));
        let mut products: Array2<f64> = engine.compute_products(basis.view())?;

        let mut result: DavidsonResult = DavidsonResult {
            eigenvalue: f64::NAN,
            eigenvector: basis.column(0).to_owned(),
            iterations: 0,
            residual: f64::INFINITY,
            converged: false,
        };

        for iter in 0..max_iter {
            // 1. Rayleigh-Ritz step in the current subspace.
            let a_proj: Array2<f64> = basis.t().dot(&products);
            let a_proj: Array2<f64> = 0.5 * (&a_proj + &a_proj.t());
            let (u, v): (Array1<f64>, Array2<f64>) = a_proj.eigh(UPLO::Upper)?;
            let theta: f64 = u[0];
            let ritz: Array1<f64> = basis.dot(&v.column(0));
            let a_ritz: Array1<f64> = products.dot(&v.column(0));

            // 2. Residual of the Ritz pair.
            let residual: Array1<f64> = &a_ritz - &(theta * &ritz);
            let r_norm: f64 = residual.norm_l2();

            result = DavidsonResult {
                eigenvalue: theta,
                eigenvector: ritz,
                iterations: iter + 1,
                residual: r_norm,
                converged: r_norm < self.tolerance,
            };
            if verbose {
                logging::print_davidson_iteration(iter, theta, r_norm, basis.ncols());
            }
            if result.converged || iter + 1 == max_iter {
                break;
            }

            // 3. Collapse the subspace to the Ritz vector once it is full.
            if basis.ncols() >= max_space {
                basis = result.eigenvector.clone().insert_axis(Axis(1));
                products = a_ritz.insert_axis(Axis(1));
            }

            // 4. New direction from the preconditioned residual. If the preconditioner
            //    maps the residual into the subspace, the residual itself is used.
            let mut correction: Array1<f64> = engine.precondition(residual.view(), theta);
            let mut c_norm: f64 = orthogonalize(&mut correction, &basis);
            if !c_norm.is_finite() || c_norm < ORTHOGONALIZATION_THRESHOLD {
                correction = residual;
                c_norm = orthogonalize(&mut correction, &basis);
                if !c_norm.is_finite() || c_norm < ORTHOGONALIZATION_THRESHOLD {
                    break;
                }
            }
            correction /= c_norm;

            let new_product: Array2<f64> =
                engine.compute_products(correction.view().insert_axis(Axis(1)))?;
            basis.push_column(correction.view())?;
            products.push_column(new_product.column(0))?;
        }

        if verbose {
            logging::print_davidson_end(result.converged, timer);
        }
        Ok(result)
    }
}

/// Remove the components of `x` along the orthonormal columns of `basis` (twice, to
/// keep the basis orthonormal to working precision) and return the remaining norm.
fn orthogonalize(x: &mut Array1<f64>, basis: &Array2<f64>) -> f64 {
    for _ in 0..2 {
        let overlaps: Array1<f64> = basis.t().dot(&*x);
        *x -= &basis.dot(&overlaps);
    }
    x.norm_l2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Symmetric matrix with a dominant, well separated diagonal.
    fn diagonal_dominant(dim: usize, sparsity: f64) -> Array2<f64> {
        let mut rng: StdRng = StdRng::seed_from_u64(12);
        let off: Array2<f64> = Array2::random_using((dim, dim), Uniform::new(-1.0, 1.0), &mut rng);
        let mut a: Array2<f64> = sparsity * (&off + &off.t());
        a.diag_mut()
            .assign(&Array1::from_shape_fn(dim, |i| i as f64));
        a
    }

    fn reference_pair(a: &Array2<f64>) -> (f64, Array1<f64>) {
        let (u, v) = a.eigh(UPLO::Upper).unwrap();
        (u[0], v.column(0).to_owned())
    }

    #[test]
    fn lowest_eigenpair_of_a_dense_matrix() {
        let mut a: Array2<f64> = diagonal_dominant(40, 0.01);
        let (e0, x0) = reference_pair(&a);
        let davidson: Davidson = DavidsonBuilder::default()
            .max_iter(100)
            .tolerance(1e-10)
            .build()
            .unwrap();
        let guess: Array1<f64> = Array1::ones(40);
        let result: DavidsonResult = davidson.solve(&mut a, guess.view()).unwrap();
        assert!(result.converged);
        assert_relative_eq!(result.eigenvalue, e0, epsilon = 1e-10);
        assert_relative_eq!(result.eigenvector.dot(&x0).abs(), 1.0, epsilon = 1e-8);
        assert_relative_eq!(result.eigenvector.norm_l2(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn collapsed_subspace_still_converges() {
        let mut a: Array2<f64> = diagonal_dominant(30, 0.05);
        let (e0, _) = reference_pair(&a);
        let davidson: Davidson = DavidsonBuilder::default()
            .max_iter(200)
            .max_subspace(3)
            .tolerance(1e-9)
            .build()
            .unwrap();
        let guess: Array1<f64> = Array1::from_shape_fn(30, |i| 1.0 / (1.0 + i as f64));
        let result: DavidsonResult = davidson.solve(&mut a, guess.view()).unwrap();
        assert!(result.converged);
        assert_relative_eq!(result.eigenvalue, e0, epsilon = 1e-9);
    }

    #[test]
    fn exhausted_iterations_return_the_best_estimate() {
        let mut a: Array2<f64> = diagonal_dominant(20, 0.1);
        let (e0, _) = reference_pair(&a);
        let davidson: Davidson = DavidsonBuilder::default()
            .max_iter(2)
            .tolerance(1e-14)
            .build()
            .unwrap();
        let guess: Array1<f64> = Array1::ones(20);
        let result: DavidsonResult = davidson.solve(&mut a, guess.view()).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
        // Variational upper bound.
        assert!(result.eigenvalue >= e0 - 1e-12);
    }

    #[test]
    fn zero_start_vector_is_degenerate() {
        let mut a: Array2<f64> = Array2::eye(4);
        let davidson: Davidson = DavidsonBuilder::default().build().unwrap();
        let zero: Array1<f64> = Array1::zeros(4);
        assert!(matches!(
            davidson.solve(&mut a, zero.view()),
            Err(DmrgError::NumericalDegeneracy(_))
        ));
        let short: Array1<f64> = Array1::ones(3);
        assert!(matches!(
            davidson.solve(&mut a, short.view()),
            Err(DmrgError::Configuration(_))
        ));
    }

    #[test]
    fn one_dimensional_problem() {
        let mut a: Array2<f64> = array![[-2.5]];
        let davidson: Davidson = DavidsonBuilder::default().build().unwrap();
        let guess: Array1<f64> = array![3.0];
        let result: DavidsonResult = davidson.solve(&mut a, guess.view()).unwrap();
        assert!(result.converged);
        assert_relative_eq!(result.eigenvalue, -2.5, epsilon = 1e-14);
    }
}
