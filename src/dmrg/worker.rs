use crate::dmrg::davidson::{Davidson, DavidsonBuilder, DavidsonResult};
use crate::dmrg::local_op::{two_site_tensor, EffectiveOperator, LocalProblem};
use crate::dmrg::logging;
use crate::dmrg::observer::{CheckDoneArgs, MeasureArgs, Observer};
use crate::dmrg::truncation::commit_bond;
use crate::dmrg::{Direction, DmrgArgs, DmrgError, DmrgOutcome, SweepPath, Termination};
use dmrg_chain::{flatten, reshape, Mps, Spectrum, SweepParams, Sweeps};
use log::debug;
use ndarray::prelude::*;
use std::time::Instant;

/// The schedule and the chain have to allow at least one bond optimization.
fn validate(n_sites: usize, op_length: usize, sweeps: &Sweeps) -> Result<(), DmrgError> {
    if sweeps.nsweep() == 0 {
        return Err(DmrgError::Configuration(String::from(
            "the sweep schedule is empty",
        )));
    }
    for (sw, params) in sweeps.iter().enumerate() {
        if params.max_rank == 0 {
            return Err(DmrgError::Configuration(format!(
                "the maximal rank of sweep {} is zero",
                sw + 1
            )));
        }
        if params.min_rank > params.max_rank {
            return Err(DmrgError::Configuration(format!(
                "the minimal rank {} of sweep {} exceeds the maximal rank {}",
                params.min_rank,
                sw + 1,
                params.max_rank
            )));
        }
    }
    if n_sites < 2 {
        return Err(DmrgError::Configuration(format!(
            "two-site sweeps need at least two sites, found {}",
            n_sites
        )));
    }
    if op_length != n_sites {
        return Err(DmrgError::Configuration(format!(
            "the operator acts on {} sites but the state has {}",
            op_length, n_sites
        )));
    }
    Ok(())
}

/// Optimize `psi` towards the ground state of the effective operator `op` following
/// the schedule `sweeps`.
///
/// Every sweep visits the bonds `0..N-1` moving forward and then `N-2..=0` moving
/// backward. At every bond the two-site tensor is improved by the Davidson method,
/// truncated and written back, and the result is passed to `observer`, which can end
/// the run after each sweep. The state is normalized on return.
pub fn dmrg_worker<Op, Obs>(
    psi: &mut Mps,
    op: &mut Op,
    sweeps: &Sweeps,
    observer: &mut Obs,
    args: &DmrgArgs,
) -> Result<DmrgOutcome, DmrgError>
where
    Op: EffectiveOperator + ?Sized,
    Obs: Observer + ?Sized,
{
    let timer: Instant = Instant::now();
    let n_sites: usize = psi.len();
    validate(n_sites, op.length(), sweeps)?;
    let quiet: bool = args.quiet;
    let debug_level: i32 = args.debug_level();

    if !quiet {
        logging::print_dmrg_init(n_sites, sweeps.nsweep());
    }
    psi.position(0)?;

    let mut energy: f64 = f64::NAN;
    let mut completed: usize = 0;
    let mut termination: Termination = Termination::Exhausted;

    for (sw, params) in sweeps.iter().enumerate() {
        if let Some(write_rank) = args.write_rank {
            if !op.do_write() && params.max_rank >= write_rank {
                if !quiet {
                    logging::print_paging_enabled(sw, params.max_rank, &args.write_dir);
                }
                psi.set_do_write(true, &args.write_dir)?;
                op.set_do_write(true, &args.write_dir)?;
            }
        }

        let davidson: Davidson = DavidsonBuilder::default()
            .max_iter(params.max_iter)
            .tolerance(args.tolerance)
            .max_subspace(args.max_subspace)
            .debug_level(debug_level)
            .build()
            .map_err(|err| DmrgError::Configuration(err.to_string()))?;

        for (b, direction, half_sweep) in SweepPath::new(n_sites) {
            if !quiet {
                logging::print_bond(sw, half_sweep, b);
            }
            match psi.center() {
                Some(c) if c == b || c == b + 1 => {}
                _ => psi.position(b)?,
            }
            op.position(b, psi)?;

            let (local_energy, spectrum): (f64, Spectrum) =
                optimize_bond(psi, &*op, &davidson, b, direction, params)?;
            energy = local_energy;
            if !quiet {
                logging::print_truncation(params, &spectrum, energy);
            }
            observer.measure(&MeasureArgs {
                psi: &*psi,
                n_sites,
                sweep: sw,
                half_sweep,
                bond: b,
                direction,
                spectrum: &spectrum,
                energy,
            });
        }

        completed = sw + 1;
        if observer.check_done(&CheckDoneArgs { sweep: sw, energy }) {
            termination = Termination::Converged;
            break;
        }
    }

    psi.normalize()?;
    let outcome: DmrgOutcome = DmrgOutcome {
        energy,
        sweeps: completed,
        termination,
    };
    if !quiet {
        logging::print_dmrg_end(&outcome, timer);
    }
    Ok(outcome)
}

/// Solve the local eigenvalue problem of bond `b` and commit the truncated result to
/// `psi`. Returns the local energy and the spectrum of the bond.
fn optimize_bond<Op: EffectiveOperator + ?Sized>(
    psi: &mut Mps,
    op: &Op,
    davidson: &Davidson,
    b: usize,
    direction: Direction,
    params: &SweepParams,
) -> Result<(f64, Spectrum), DmrgError> {
    let phi: Array4<f64> = two_site_tensor(psi, b)?;
    let shape: (usize, usize, usize, usize) = phi.dim();
    let mut problem: LocalProblem<Op> = LocalProblem::new(op, shape)?;
    let result: DavidsonResult = davidson.solve(&mut problem, flatten(&phi).view())?;
    if !result.converged {
        debug!(
            "bond {}: eigensolver stopped after {} iterations with residual {:.3e}",
            b, result.iterations, result.residual
        );
    }
    let phi: Array4<f64> = reshape(&result.eigenvector, shape)?;
    let spectrum: Spectrum = commit_bond(psi, b, &phi, direction, op, params, true)?;
    Ok((result.eigenvalue, spectrum))
}
