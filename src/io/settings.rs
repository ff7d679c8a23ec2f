use crate::defaults::*;
use crate::dmrg::{DmrgArgs, DmrgArgsBuilder, DmrgObserver, DmrgObserverBuilder};
use crate::models::{heisenberg, ising, SpinHalf};
use anyhow::{bail, Context, Result};
use dmrg_chain::{Mpo, Mps, Sweeps};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_verbose() -> i8 {
    0
}
fn default_quiet() -> bool {
    false
}
fn default_model_kind() -> String {
    String::from(MODEL_KIND)
}
fn default_n_sites() -> usize {
    N_SITES
}
fn default_exchange_j() -> f64 {
    EXCHANGE_J
}
fn default_exchange_jz() -> f64 {
    EXCHANGE_JZ
}
fn default_field_h() -> f64 {
    FIELD_H
}
fn default_field_g() -> f64 {
    FIELD_G
}
fn default_bond_dim() -> usize {
    INITIAL_BOND_DIM
}
fn default_seed() -> u64 {
    SEED
}
fn default_nsweeps() -> usize {
    NSWEEPS
}
fn default_max_rank() -> Vec<usize> {
    SWEEP_MAX_RANK.to_vec()
}
fn default_min_rank() -> Vec<usize> {
    vec![SWEEP_MIN_RANK]
}
fn default_cutoff() -> Vec<f64> {
    vec![SWEEP_CUTOFF]
}
fn default_noise() -> Vec<f64> {
    vec![SWEEP_NOISE]
}
fn default_max_iter() -> Vec<usize> {
    vec![SWEEP_MAX_ITER]
}
fn default_davidson_convergence() -> f64 {
    DAVIDSON_CONVERGENCE
}
fn default_max_subspace() -> usize {
    DAVIDSON_MAX_SUBSPACE
}
fn default_print_eigs() -> bool {
    PRINT_EIGS
}
fn default_site_ops() -> Vec<String> {
    MEASURED_OPS.iter().map(|&name| String::from(name)).collect()
}
fn default_no_measure() -> bool {
    false
}
fn default_write_dir() -> String {
    String::from(WRITE_DIR)
}
fn default_n_states() -> usize {
    N_STATES
}
fn default_number_of_cores() -> usize {
    1
}
fn default_model_config() -> ModelConfig {
    let config: ModelConfig = toml::from_str("").unwrap();
    config
}
fn default_initial_state_config() -> InitialStateConfig {
    let config: InitialStateConfig = toml::from_str("").unwrap();
    config
}
fn default_sweep_config() -> SweepConfig {
    let config: SweepConfig = toml::from_str("").unwrap();
    config
}
fn default_davidson_config() -> DavidsonConfig {
    let config: DavidsonConfig = toml::from_str("").unwrap();
    config
}
fn default_observer_config() -> ObserverConfig {
    let config: ObserverConfig = toml::from_str("").unwrap();
    config
}
fn default_paging_config() -> PagingConfig {
    let config: PagingConfig = toml::from_str("").unwrap();
    config
}
fn default_excited_config() -> ExcitedConfig {
    let config: ExcitedConfig = toml::from_str("").unwrap();
    config
}
fn default_parallelization_config() -> ParallelizationConfig {
    let config: ParallelizationConfig = toml::from_str("").unwrap();
    config
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Configuration {
    #[serde(default = "default_verbose")]
    pub verbose: i8,
    #[serde(default = "default_quiet")]
    pub quiet: bool,
    pub debug_level: Option<i32>,
    #[serde(default = "default_model_config")]
    pub model: ModelConfig,
    #[serde(default = "default_initial_state_config")]
    pub initial_state: InitialStateConfig,
    #[serde(default = "default_sweep_config")]
    pub sweeps: SweepConfig,
    #[serde(default = "default_davidson_config")]
    pub davidson: DavidsonConfig,
    #[serde(default = "default_observer_config")]
    pub observer: ObserverConfig,
    #[serde(default = "default_paging_config")]
    pub paging: PagingConfig,
    #[serde(default = "default_excited_config")]
    pub excited: ExcitedConfig,
    #[serde(default = "default_parallelization_config")]
    pub parallelization: ParallelizationConfig,
}

impl Configuration {
    /// Run-level settings of the sweeps.
    pub fn dmrg_args(&self) -> Result<DmrgArgs> {
        let mut builder: DmrgArgsBuilder = DmrgArgsBuilder::default();
        builder
            .quiet(self.quiet)
            .tolerance(self.davidson.davidson_convergence)
            .max_subspace(self.davidson.max_subspace)
            .write_dir(PathBuf::from(&self.paging.write_dir));
        if let Some(level) = self.debug_level {
            builder.debug_level(level);
        }
        if let Some(rank) = self.paging.write_rank {
            builder.write_rank(rank);
        }
        if let Some(weight) = self.excited.weight {
            builder.weight(weight);
        }
        builder
            .build()
            .context("Could not initialize the DMRG settings")
    }

    pub fn build_observer(&self) -> Result<DmrgObserver> {
        let ops: SpinHalf = SpinHalf::new();
        let mut site_ops: Vec<(String, Array2<f64>)> =
            Vec::with_capacity(self.observer.site_ops.len());
        for name in self.observer.site_ops.iter() {
            match ops.op(name) {
                Some(op) => site_ops.push((name.clone(), op.clone())),
                None => bail!(
                    "Site operator: {} is not available. Choose from: Id, Sz, Sp, Sm, Sx",
                    name
                ),
            }
        }
        let mut builder: DmrgObserverBuilder = DmrgObserverBuilder::default();
        builder
            .print_eigs(self.observer.print_eigs)
            .quiet(self.quiet)
            .site_ops(site_ops)
            .no_measure(self.observer.no_measure);
        if let Some(goal) = self.observer.energy_errgoal {
            builder.energy_errgoal(goal);
        }
        builder
            .build()
            .context("Could not initialize the DMRG observer")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelConfig {
    #[serde(default = "default_model_kind")]
    pub kind: String,
    #[serde(default = "default_n_sites")]
    pub n_sites: usize,
    #[serde(default = "default_exchange_j")]
    pub j: f64,
    #[serde(default = "default_exchange_jz")]
    pub jz: f64,
    #[serde(default = "default_field_h")]
    pub h: f64,
    #[serde(default = "default_field_g")]
    pub g: f64,
}

impl ModelConfig {
    pub fn build_mpo(&self) -> Result<Mpo> {
        match self.kind.as_str() {
            "heisenberg" => heisenberg(self.n_sites, self.j, self.jz, self.h)
                .context("Could not build the Heisenberg chain"),
            "ising" => ising(self.n_sites, self.j, self.g)
                .context("Could not build the transverse field Ising chain"),
            kind => bail!(
                "Model: {} is not available. Choose one of: heisenberg, ising",
                kind
            ),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct InitialStateConfig {
    #[serde(default = "default_bond_dim")]
    pub bond_dim: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl InitialStateConfig {
    /// Random start state of the chain; states of later runs use consecutive seeds.
    pub fn build_state(&self, mpo: &Mpo, run: u64) -> Result<Mps> {
        let mut rng: StdRng = StdRng::seed_from_u64(self.seed.wrapping_add(run));
        Mps::random(mpo.len(), mpo.phys_dim(0), self.bond_dim, &mut rng)
            .context("Could not build the initial state")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SweepConfig {
    #[serde(default = "default_nsweeps")]
    pub nsweeps: usize,
    #[serde(default = "default_max_rank")]
    pub max_rank: Vec<usize>,
    #[serde(default = "default_min_rank")]
    pub min_rank: Vec<usize>,
    #[serde(default = "default_cutoff")]
    pub cutoff: Vec<f64>,
    #[serde(default = "default_noise")]
    pub noise: Vec<f64>,
    #[serde(default = "default_max_iter")]
    pub max_iter: Vec<usize>,
}

impl SweepConfig {
    /// Schedule of the sweeps. Every list gives the values of the first sweeps, its
    /// last entry is used for all following ones.
    pub fn build_sweeps(&self) -> Sweeps {
        let mut sweeps: Sweeps = Sweeps::new(self.nsweeps);
        sweeps
            .set_max_rank(&self.max_rank)
            .set_min_rank(&self.min_rank)
            .set_cutoff(&self.cutoff)
            .set_noise(&self.noise)
            .set_max_iter(&self.max_iter);
        sweeps
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct DavidsonConfig {
    #[serde(default = "default_davidson_convergence")]
    pub davidson_convergence: f64,
    #[serde(default = "default_max_subspace")]
    pub max_subspace: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ObserverConfig {
    pub energy_errgoal: Option<f64>,
    #[serde(default = "default_print_eigs")]
    pub print_eigs: bool,
    #[serde(default = "default_site_ops")]
    pub site_ops: Vec<String>,
    #[serde(default = "default_no_measure")]
    pub no_measure: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PagingConfig {
    pub write_rank: Option<usize>,
    #[serde(default = "default_write_dir")]
    pub write_dir: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct ExcitedConfig {
    /// Number of states, the ground state included.
    #[serde(default = "default_n_states")]
    pub n_states: usize,
    pub weight: Option<f64>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct ParallelizationConfig {
    #[serde(default = "default_number_of_cores")]
    pub number_of_cores: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_the_defaults() {
        let config: Configuration = toml::from_str("").unwrap();
        assert_eq!(config.verbose, 0);
        assert!(!config.quiet);
        assert_eq!(config.model.kind, MODEL_KIND);
        assert_eq!(config.model.n_sites, N_SITES);
        assert_eq!(config.sweeps.max_rank, SWEEP_MAX_RANK.to_vec());
        assert_eq!(config.excited.n_states, 1);
        assert!(config.observer.energy_errgoal.is_none());
        assert_eq!(config.dmrg_args().unwrap().debug_level(), 1);
    }

    #[test]
    fn written_defaults_can_be_read_back() {
        let config: Configuration = toml::from_str("").unwrap();
        let text: String = toml::to_string(&config).unwrap();
        let again: Configuration = toml::from_str(&text).unwrap();
        assert_eq!(again.sweeps.build_sweeps(), config.sweeps.build_sweeps());
        assert_eq!(again.model.n_sites, config.model.n_sites);
    }

    #[test]
    fn sections_override_the_defaults() {
        let text: &str = r#"
            quiet = true

            [model]
            kind = "ising"
            n_sites = 6
            g = 0.5

            [sweeps]
            nsweeps = 3
            max_rank = [8, 16]
            noise = [1e-6, 0.0]

            [observer]
            energy_errgoal = 1e-9

            [paging]
            write_rank = 50

            [excited]
            n_states = 2
            weight = 10.0
        "#;
        let config: Configuration = toml::from_str(text).unwrap();
        let sweeps: Sweeps = config.sweeps.build_sweeps();
        assert_eq!(sweeps.nsweep(), 3);
        assert_eq!(sweeps.max_rank(2), Some(16));
        assert_eq!(sweeps.noise(0), Some(1e-6));
        assert_eq!(sweeps.noise(2), Some(0.0));

        let args: DmrgArgs = config.dmrg_args().unwrap();
        assert_eq!(args.debug_level(), 0);
        assert_eq!(args.write_rank, Some(50));
        assert_eq!(args.weight, Some(10.0));

        let mpo: Mpo = config.model.build_mpo().unwrap();
        assert_eq!(mpo.len(), 6);
        let psi: Mps = config.initial_state.build_state(&mpo, 0).unwrap();
        assert_eq!(psi.len(), 6);
    }

    #[test]
    fn unknown_model_is_an_error() {
        let config: Configuration = toml::from_str("[model]\nkind = \"hubbard\"").unwrap();
        assert!(config.model.build_mpo().is_err());
    }

    #[test]
    fn site_operators_are_looked_up_by_name() {
        let config: Configuration = toml::from_str("").unwrap();
        assert_eq!(config.observer.site_ops, vec![String::from("Sz")]);
        assert!(config.build_observer().is_ok());

        let text: &str = r#"
            [observer]
            site_ops = ["Sz", "Sx"]
            no_measure = true
        "#;
        let config: Configuration = toml::from_str(text).unwrap();
        assert!(config.observer.no_measure);
        assert!(config.build_observer().is_ok());

        let config: Configuration = toml::from_str("[observer]\nsite_ops = [\"Sy\"]").unwrap();
        assert!(config.build_observer().is_err());
    }
}
