use crate::defaults::{N_PRINTED_EIGS, PRINTED_EIGS_THRESHOLD, PRINT_EIGS, STOP_FILE_NAME};
use crate::dmrg::local_op::two_site_tensor;
use crate::dmrg::logging;
use crate::dmrg::{Direction, DmrgError};
use derive_builder::Builder;
use dmrg_chain::{tensordot, Mps, Spectrum};
use log::{info, warn};
use ndarray::prelude::*;
use std::fs;
use std::path::PathBuf;

/// State of the run after the optimization of a single bond. The center of `psi` is
/// at one of the two sites of the bond.
#[derive(Clone, Copy, Debug)]
pub struct MeasureArgs<'a> {
    pub psi: &'a Mps,
    pub n_sites: usize,
    pub sweep: usize,
    pub half_sweep: usize,
    pub bond: usize,
    pub direction: Direction,
    pub spectrum: &'a Spectrum,
    pub energy: f64,
}

/// State of the run after a complete sweep.
#[derive(Clone, Copy, Debug)]
pub struct CheckDoneArgs {
    pub sweep: usize,
    pub energy: f64,
}

/// Receives the results of the sweeps and decides when a run stops.
pub trait Observer {
    /// Called after every bond optimization.
    fn measure(&mut self, args: &MeasureArgs);

    /// Called after every sweep; returning `true` ends the run.
    fn check_done(&mut self, args: &CheckDoneArgs) -> bool;
}

/// Observer that reports the entanglement at the center of the chain, the truncation
/// of every sweep and the expectation values of `site_ops` at the left site of every
/// bond. The run stops once the energy changes by less than `energy_errgoal` between
/// two sweeps or when the stop file is found.
#[derive(Builder, Clone, Debug)]
pub struct DmrgObserver {
    #[builder(default = "None", setter(strip_option))]
    energy_errgoal: Option<f64>,
    #[builder(default = "PRINT_EIGS")]
    print_eigs: bool,
    #[builder(default = "false")]
    quiet: bool,
    /// Named single-site operators that are measured after every bond.
    #[builder(default = "Vec::new()")]
    site_ops: Vec<(String, Array2<f64>)>,
    #[builder(default = "false")]
    no_measure: bool,
    #[builder(default = "PathBuf::from(STOP_FILE_NAME)", setter(into))]
    stop_file: PathBuf,
    #[builder(setter(skip))]
    max_rank: usize,
    #[builder(setter(skip))]
    max_truncerr: f64,
    #[builder(setter(skip))]
    energies: Vec<f64>,
}

impl Default for DmrgObserver {
    fn default() -> Self {
        Self::quiet(false)
    }
}

impl DmrgObserver {
    pub fn quiet(quiet: bool) -> Self {
        DmrgObserver {
            energy_errgoal: None,
            print_eigs: PRINT_EIGS,
            quiet,
            site_ops: Vec::new(),
            no_measure: false,
            stop_file: PathBuf::from(STOP_FILE_NAME),
            max_rank: 0,
            max_truncerr: 0.0,
            energies: Vec::new(),
        }
    }

    /// Energies at the end of all sweeps so far.
    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// Expectation values of the site operators at site `site`. The center of `psi`
    /// has to be at `site` or `site + 1`.
    pub fn site_expectations(&self, psi: &Mps, site: usize) -> Result<Vec<f64>, DmrgError> {
        let phi: Array4<f64> = two_site_tensor(psi, site)?;
        let norm2: f64 = phi.mapv(|x| x * x).sum();
        self.site_ops
            .iter()
            .map(|(_, op)| -> Result<f64, DmrgError> {
                // phi[l, s', t, r] op[s', s] phi[l, s, t, r]
                let t = tensordot(&phi, op, &[1], &[0])?;
                let value = tensordot(&t, &phi, &[0, 1, 2, 3], &[0, 2, 3, 1])?;
                Ok(value.sum() / norm2)
            })
            .collect()
    }

    fn print_site_expectations(&self, psi: &Mps, site: usize) {
        match self.site_expectations(psi, site) {
            Ok(values) => {
                for ((name, _), value) in self.site_ops.iter().zip(values) {
                    logging::print_site_expectation(name, site, value);
                }
            }
            Err(err) => warn!("could not measure at site {}: {}", site, err),
        }
    }

    fn stop_file_found(&self) -> bool {
        if !self.stop_file.exists() {
            return false;
        }
        info!(
            "File {} found, stopping DMRG at the end of this sweep",
            self.stop_file.display()
        );
        if let Err(err) = fs::remove_file(&self.stop_file) {
            warn!(
                "could not remove {}: {}",
                self.stop_file.display(),
                err
            );
        }
        true
    }
}

impl Observer for DmrgObserver {
    fn measure(&mut self, args: &MeasureArgs) {
        self.max_rank = self.max_rank.max(args.spectrum.kept_rank());
        self.max_truncerr = self.max_truncerr.max(args.spectrum.truncerr());

        if self.quiet {
            return;
        }
        if !self.no_measure && !self.site_ops.is_empty() {
            self.print_site_expectations(args.psi, args.bond);
        }
        if args.direction != Direction::Backward {
            return;
        }
        let center: usize = (args.n_sites / 2).saturating_sub(1);
        if self.print_eigs && args.bond == center {
            logging::print_entanglement(
                args.bond,
                args.spectrum,
                N_PRINTED_EIGS,
                PRINTED_EIGS_THRESHOLD,
            );
        }
        if args.bond == 0 {
            logging::print_sweep_end(args.sweep, self.max_rank, self.max_truncerr, args.energy);
        }
    }

    fn check_done(&mut self, args: &CheckDoneArgs) -> bool {
        self.max_rank = 0;
        self.max_truncerr = 0.0;
        let previous: Option<f64> = self.energies.last().copied();
        self.energies.push(args.energy);

        if let (Some(goal), Some(previous)) = (self.energy_errgoal, previous) {
            if (args.energy - previous).abs() < goal {
                if !self.quiet {
                    info!(
                        "Energy error goal met (dE = {:.3e}), stopping DMRG after sweep {}",
                        (args.energy - previous).abs(),
                        args.sweep + 1
                    );
                }
                return true;
            }
        }
        self.stop_file_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpinHalf;
    use ndarray::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn done(observer: &mut DmrgObserver, sweep: usize, energy: f64) -> bool {
        observer.check_done(&CheckDoneArgs { sweep, energy })
    }

    #[test]
    fn energy_goal_needs_two_sweeps() {
        let mut observer: DmrgObserver = DmrgObserverBuilder::default()
            .energy_errgoal(1e-6)
            .quiet(true)
            .stop_file("no_stop_file_here")
            .build()
            .unwrap();
        assert!(!done(&mut observer, 0, -1.0));
        assert!(!done(&mut observer, 1, -1.1));
        assert!(done(&mut observer, 2, -1.1 + 1e-8));
        assert_eq!(observer.energies().len(), 3);
    }

    #[test]
    fn without_goal_the_run_continues() {
        let mut observer: DmrgObserver = DmrgObserverBuilder::default()
            .quiet(true)
            .stop_file("no_stop_file_here")
            .build()
            .unwrap();
        for sweep in 0..4 {
            assert!(!done(&mut observer, sweep, -2.0));
        }
    }

    #[test]
    fn stop_file_ends_the_run_once() {
        let path: PathBuf =
            std::env::temp_dir().join(format!("STOP_DMRG_{}", std::process::id()));
        fs::write(&path, "").unwrap();
        let mut observer: DmrgObserver = DmrgObserverBuilder::default()
            .quiet(true)
            .stop_file(path.clone())
            .build()
            .unwrap();
        assert!(done(&mut observer, 0, -1.0));
        assert!(!path.exists());
        assert!(!done(&mut observer, 1, -1.0));
    }

    #[test]
    fn truncation_statistics_are_reset_every_sweep() {
        let mut observer: DmrgObserver = DmrgObserverBuilder::default()
            .stop_file("no_stop_file_here")
            .build()
            .unwrap();
        let large: Spectrum = Spectrum::new(array![0.6, 0.3, 0.1], 1e-5);
        let small: Spectrum = Spectrum::new(array![1.0], 1e-9);
        let psi: Mps = Mps::product_state(2, &[0, 1, 0, 1]).unwrap();
        for (bond, spectrum) in [(0, &large), (1, &small)] {
            observer.measure(&MeasureArgs {
                psi: &psi,
                n_sites: 4,
                sweep: 0,
                half_sweep: 0,
                bond,
                direction: Direction::Forward,
                spectrum,
                energy: -1.0,
            });
        }
        assert_eq!(observer.max_rank, 3);
        assert_eq!(observer.max_truncerr, 1e-5);
        done(&mut observer, 0, -1.0);
        assert_eq!(observer.max_rank, 0);
        assert_eq!(observer.max_truncerr, 0.0);
    }

    fn spin_observer(names: &[&str]) -> DmrgObserver {
        let ops: SpinHalf = SpinHalf::new();
        DmrgObserverBuilder::default()
            .site_ops(
                names
                    .iter()
                    .map(|&name| (String::from(name), ops.op(name).unwrap().clone()))
                    .collect(),
            )
            .stop_file("no_stop_file_here")
            .build()
            .unwrap()
    }

    #[test]
    fn magnetization_of_the_all_down_state() {
        let observer: DmrgObserver = spin_observer(&["Sz", "Sx"]);
        let psi: Mps = Mps::product_state(2, &[1, 1, 1, 1]).unwrap();
        for site in 0..3 {
            let values: Vec<f64> = observer.site_expectations(&psi, site).unwrap();
            assert!((values[0] + 0.5).abs() < 1e-14);
            assert!(values[1].abs() < 1e-14);
        }

        let spectrum: Spectrum = Spectrum::new(array![1.0], 0.0);
        let mut observer: DmrgObserver = observer;
        observer.measure(&MeasureArgs {
            psi: &psi,
            n_sites: 4,
            sweep: 0,
            half_sweep: 0,
            bond: 1,
            direction: Direction::Forward,
            spectrum: &spectrum,
            energy: -1.0,
        });
        assert_eq!(observer.max_rank, 1);
    }

    #[test]
    fn site_expectation_matches_the_state_vector() {
        let n: usize = 5;
        let site: usize = 2;
        let mut rng: StdRng = StdRng::seed_from_u64(11);
        let mut psi: Mps = Mps::random(n, 2, 4, &mut rng).unwrap();
        psi.position(site + 1).unwrap();
        let observer: DmrgObserver = spin_observer(&["Sz"]);
        let value: f64 = observer.site_expectations(&psi, site).unwrap()[0];

        // Site 0 is the most significant index of the state vector.
        let v: Array1<f64> = psi.to_dense().unwrap();
        let v: Array3<f64> = v
            .into_shape((1 << site, 2, 1 << (n - site - 1)))
            .unwrap();
        let sz: Array2<f64> = SpinHalf::new().sz;
        let mut expected: f64 = 0.0;
        for ((_, s, _), &x) in v.indexed_iter() {
            expected += x * sz[[s, s]] * x;
        }
        assert!((value - expected / v.mapv(|x| x * x).sum()).abs() < 1e-12);
    }
}
