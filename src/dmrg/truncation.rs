/*!

## Truncated factorization of the two-site tensor

After the eigensolver the optimized two-site tensor `phi` of bond `b` is split into two
site tensors again. The kept number of states follows from the weights of the
reduced density matrix of the half chain:

* without noise the weights are the squared singular values of `phi`;
* with noise the density matrix of the site that is left behind is perturbed by the
  noise term of the effective operator before it is diagonalized.

 */

use crate::dmrg::local_op::EffectiveOperator;
use crate::dmrg::{Direction, DmrgError};
use dmrg_chain::defaults::ZERO_NORM;
use dmrg_chain::{matricize, reshape, Mps, Spectrum, SweepParams};
use log::trace;
use ndarray::prelude::*;
use ndarray_linalg::{Eigh, Norm, SVD, UPLO};

/// Number of weights to keep and the discarded weight.
///
/// `weights` are sorted in descending order and sum to one. The tail is discarded as
/// long as more than `max_rank` weights remain, then as long as the discarded weight
/// stays below `cutoff` and more than `min_rank` weights remain. At least one weight is
/// always kept, and never more than there are.
pub fn truncate(
    weights: ArrayView1<f64>,
    min_rank: usize,
    max_rank: usize,
    cutoff: f64,
) -> (usize, f64) {
    let mut m: usize = weights.len();
    let mut truncerr: f64 = 0.0;
    while m > max_rank.max(1) {
        truncerr += weights[m - 1];
        m -= 1;
    }
    while m > min_rank.max(1) && truncerr + weights[m - 1] < cutoff {
        truncerr += weights[m - 1];
        m -= 1;
    }
    (m, truncerr.max(0.0))
}

/// Split `phi` at bond `b`, write the kept factors to the sites `b` and `b + 1` of
/// `psi`, and move the center of `psi` in `direction`.
///
/// Moving forward, site `b` becomes left-orthonormal and site `b + 1` the center;
/// moving backward, site `b + 1` becomes right-orthonormal and site `b` the center.
/// With `normalize` the center is scaled to unit norm, otherwise the product of the
/// kept factors reproduces `phi` up to the truncation.
pub fn commit_bond<O: EffectiveOperator + ?Sized>(
    psi: &mut Mps,
    b: usize,
    phi: &Array4<f64>,
    direction: Direction,
    op: &O,
    params: &SweepParams,
    normalize: bool,
) -> Result<Spectrum, DmrgError> {
    let (l, d1, d2, r): (usize, usize, usize, usize) = phi.dim();
    let m_mat: Array2<f64> = matricize(phi, 2)?;
    let norm: f64 = m_mat.norm_l2();
    if !norm.is_finite() || norm < ZERO_NORM {
        return Err(DmrgError::NumericalDegeneracy(format!(
            "the two-site tensor of bond {} has norm {:e}",
            b, norm
        )));
    }
    let m_mat: Array2<f64> = if normalize { m_mat / norm } else { m_mat };

    let delta: Option<Array2<f64>> = if params.noise > 0.0 {
        op.noise_term(phi, direction)?
    } else {
        None
    };

    let (left, right, spectrum): (Array2<f64>, Array2<f64>, Spectrum) = match delta {
        None => split_svd(&m_mat, direction, params, normalize)?,
        Some(delta) => split_density_matrix(&m_mat, &delta, direction, params, normalize)?,
    };
    let keep: usize = spectrum.kept_rank();
    trace!(
        "bond {}: kept {} states, discarded weight {:e}",
        b,
        keep,
        spectrum.truncerr()
    );

    psi.set_site(b, reshape(&left, (l, d1, keep))?)?;
    psi.set_site(b + 1, reshape(&right, (keep, d2, r))?)?;
    psi.set_center(Some(match direction {
        Direction::Forward => b + 1,
        Direction::Backward => b,
    }));
    psi.set_spectrum(b, spectrum.clone());
    Ok(spectrum)
}

/// Weights of the normalized spectrum kept after truncation.
fn kept_weights(weights: ArrayView1<f64>, keep: usize) -> Array1<f64> {
    let kept: Array1<f64> = weights.slice(s![..keep]).to_owned();
    let total: f64 = kept.sum();
    if total > 0.0 {
        kept / total
    } else {
        kept
    }
}

fn split_svd(
    m_mat: &Array2<f64>,
    direction: Direction,
    params: &SweepParams,
    normalize: bool,
) -> Result<(Array2<f64>, Array2<f64>, Spectrum), DmrgError> {
    let (u, s, vt) = m_mat.svd(true, true)?;
    let missing = || {
        DmrgError::NumericalDegeneracy(String::from(
            "the singular value decomposition returned no singular vectors",
        ))
    };
    let u: Array2<f64> = u.ok_or_else(missing)?;
    let vt: Array2<f64> = vt.ok_or_else(missing)?;

    let weights: Array1<f64> = s.mapv(|x| x * x);
    let weights: Array1<f64> = &weights / weights.sum();
    let (keep, truncerr) = truncate(weights.view(), params.min_rank, params.max_rank, params.cutoff);

    let s_kept: Array1<f64> = s.slice(s![..keep]).to_owned();
    let s_kept: Array1<f64> = if normalize {
        &s_kept / s_kept.norm_l2().max(ZERO_NORM)
    } else {
        s_kept
    };
    let u_kept: ArrayView2<f64> = u.slice(s![.., ..keep]);
    let vt_kept: ArrayView2<f64> = vt.slice(s![..keep, ..]);

    let (left, right): (Array2<f64>, Array2<f64>) = match direction {
        Direction::Forward => (
            u_kept.to_owned(),
            &s_kept.view().insert_axis(Axis(1)) * &vt_kept,
        ),
        Direction::Backward => (&u_kept * &s_kept, vt_kept.to_owned()),
    };
    let spectrum: Spectrum = Spectrum::new(kept_weights(weights.view(), keep), truncerr);
    Ok((left, right, spectrum))
}

fn split_density_matrix(
    m_mat: &Array2<f64>,
    delta: &Array2<f64>,
    direction: Direction,
    params: &SweepParams,
    normalize: bool,
) -> Result<(Array2<f64>, Array2<f64>, Spectrum), DmrgError> {
    let mut rho: Array2<f64> = match direction {
        Direction::Forward => m_mat.dot(&m_mat.t()),
        Direction::Backward => m_mat.t().dot(m_mat),
    };
    let delta_trace: f64 = delta.diag().sum();
    if delta_trace > ZERO_NORM {
        rho.scaled_add(params.noise / delta_trace, delta);
    }
    let trace: f64 = rho.diag().sum();
    rho /= trace;
    let rho: Array2<f64> = 0.5 * (&rho + &rho.t());

    // eigh returns the eigenvalues in ascending order.
    let (eigs, vecs): (Array1<f64>, Array2<f64>) = rho.eigh(UPLO::Upper)?;
    let eigs: Array1<f64> = eigs.slice(s![..;-1]).mapv(|x| x.max(0.0));
    let vecs: ArrayView2<f64> = vecs.slice(s![.., ..;-1]);
    let weights: Array1<f64> = &eigs / eigs.sum();
    let (keep, truncerr) = truncate(weights.view(), params.min_rank, params.max_rank, params.cutoff);
    let basis: ArrayView2<f64> = vecs.slice(s![.., ..keep]);
    let scale = |center: Array2<f64>| -> Array2<f64> {
        if normalize {
            let norm: f64 = center.norm_l2().max(ZERO_NORM);
            center / norm
        } else {
            center
        }
    };

    let (left, right): (Array2<f64>, Array2<f64>) = match direction {
        Direction::Forward => (basis.to_owned(), scale(basis.t().dot(m_mat))),
        Direction::Backward => (scale(m_mat.dot(&basis)), basis.t().to_owned()),
    };
    let spectrum: Spectrum = Spectrum::new(kept_weights(weights.view(), keep), truncerr);
    Ok((left, right, spectrum))
}
