use crate::dmrg::DmrgOutcome;
use dmrg_chain::{Spectrum, SweepParams};
use log::{debug, info};
use std::path::Path;
use std::time::Instant;

pub fn print_davidson_init(max_iter: usize, tolerance: f64, dim: usize) {
    debug!("{:^80}", "");
    debug!("{: ^80}", "Iterative Davidson Routine");
    debug!("{:-^80}", "");
    debug!(
        "{: <25} {:4.2e}",
        "Energy is converged when residual is below:", tolerance
    );
    debug!("{: <25} {}", "Maximum number of iterations:", max_iter);
    debug!("{: <25} {}", "Dimension of the local problem:", dim);
    debug!("{:-^57} ", "");
    debug!(
        "{: <5}{: >24}{: >14}{: >14}",
        "Iter.", "Eigenvalue", "Residual", "#subsp. Vec."
    );
    debug!("{:-^57} ", "");
}

pub fn print_davidson_iteration(iter: usize, theta: f64, r_norm: f64, nvec: usize) {
    debug!(
        "{: >5}{:>24.14}{:>14.4e}{:>14}",
        iter + 1,
        theta,
        r_norm,
        nvec
    );
}

pub fn print_davidson_end(converged: bool, time: Instant) {
    debug!("{:-^57} ", "");
    if converged {
        debug!("Davidson routine converged")
    } else {
        debug!("Davidson routine did not converge!")
    }
    debug!(
        "{:>68} {:>8.2} s",
        "elapsed time:",
        time.elapsed().as_secs_f32()
    );
    debug!("{:-^80}", "");
}

pub fn print_dmrg_init(n_sites: usize, nsweep: usize) {
    info!("{:^80}", "");
    info!("{: ^80}", "Two-Site DMRG Sweeps");
    info!("{:-^80}", "");
    info!("{: <30} {}", "Number of sites:", n_sites);
    info!("{: <30} {}", "Number of sweeps:", nsweep);
    info!("{:-^80}", "");
}

pub fn print_bond(sweep: usize, half_sweep: usize, bond: usize) {
    info!(
        "Sweep={}, HS={}, Bond=({},{})",
        sweep + 1,
        half_sweep + 1,
        bond,
        bond + 1
    );
}

pub fn print_truncation(params: &SweepParams, spectrum: &Spectrum, energy: f64) {
    info!(
        "    Truncated to Cutoff={:.1e}, Min_m={}, Max_m={}",
        params.cutoff, params.min_rank, params.max_rank
    );
    info!(
        "    Trunc. err={:.1e}, States kept: {}, Energy: {:.14}",
        spectrum.truncerr(),
        spectrum.kept_rank(),
        energy
    );
}

pub fn print_paging_enabled(sweep: usize, max_rank: usize, dir: &Path) {
    info!(
        "Sweep {}: max rank {} reached the paging threshold, writing tensors to {}",
        sweep + 1,
        max_rank,
        dir.display()
    );
}

pub fn print_entanglement(bond: usize, spectrum: &Spectrum, n_eigs: usize, threshold: f64) {
    info!(
        "    vN Entropy at center bond ({},{}) = {:.12}",
        bond,
        bond + 1,
        spectrum.entropy()
    );
    let eigs: Vec<String> = spectrum
        .eigs_kept()
        .iter()
        .take(n_eigs)
        .filter(|&&p| p >= threshold)
        .map(|p| format!("{:.5}", p))
        .collect();
    info!("    Eigs at center bond: {}", eigs.join(" "));
}

pub fn print_site_expectation(name: &str, site: usize, value: f64) {
    info!("    <{}>({}) = {:.10e}", name, site, value);
}

pub fn print_sweep_end(sweep: usize, max_rank: usize, max_truncerr: f64, energy: f64) {
    info!("{:-^80}", "");
    info!("    Largest m during sweep {} was {}", sweep + 1, max_rank);
    info!("    Largest truncation error: {:.5e}", max_truncerr);
    info!("    Energy after sweep {} is {:.12}", sweep + 1, energy);
    info!("{:-^80}", "");
}

pub fn print_dmrg_end(outcome: &DmrgOutcome, time: Instant) {
    info!("{:-^80}", "");
    info!(
        "{: ^80}",
        format!("DMRG {} after {} sweeps", outcome.termination, outcome.sweeps)
    );
    info!("Ground state energy: {:18.14}", outcome.energy);
    info!(
        "{:>68} {:>8.2} s",
        "elapsed time:",
        time.elapsed().as_secs_f32()
    );
    info!("{:-^80}", "");
}
