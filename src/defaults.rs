// CONFIGURATION
// config file
pub const CONFIG_FILE_NAME: &str = "dmrg.toml";
// a file with this name in the working directory stops a run after the current sweep
pub const STOP_FILE_NAME: &str = "STOP_DMRG";

// MODEL
pub const MODEL_KIND: &str = "heisenberg";
pub const N_SITES: usize = 10;
// exchange couplings of the spin chain
pub const EXCHANGE_J: f64 = 1.0;
pub const EXCHANGE_JZ: f64 = 1.0;
// longitudinal field of the Heisenberg chain
pub const FIELD_H: f64 = 0.0;
// transverse field of the Ising chain
pub const FIELD_G: f64 = 1.0;

// INITIAL STATE
pub const INITIAL_BOND_DIM: usize = 4;
pub const SEED: u64 = 42;

// SWEEPS
pub const NSWEEPS: usize = 5;
pub const SWEEP_MAX_RANK: [usize; 5] = [10, 20, 100, 100, 200];
pub const SWEEP_MIN_RANK: usize = 1;
pub const SWEEP_CUTOFF: f64 = 1.0e-10;
pub const SWEEP_NOISE: f64 = 0.0;
pub const SWEEP_MAX_ITER: usize = 2;

// DAVIDSON
// the eigenpair is converged when the norm of the residual is below this value
pub const DAVIDSON_CONVERGENCE: f64 = 1.0e-10;
// the basis is collapsed to the Ritz vector once it reaches this size
pub const DAVIDSON_MAX_SUBSPACE: usize = 30;
// denominators of the preconditioner below this value are replaced by 1
pub const PRECONDITIONER_SHIFT: f64 = 1.0e-4;
// correction vectors with a smaller norm are not added to the basis
pub const ORTHOGONALIZATION_THRESHOLD: f64 = 1.0e-12;

// OBSERVER
pub const PRINT_EIGS: bool = true;
// number of leading density matrix weights printed at the center bond
pub const N_PRINTED_EIGS: usize = 10;
// weights below this value are not printed
pub const PRINTED_EIGS_THRESHOLD: f64 = 1.0e-3;
// site operators whose expectation values are printed at every bond
pub const MEASURED_OPS: [&str; 1] = ["Sz"];

// PAGING
pub const WRITE_DIR: &str = "./";

// EXCITED STATES
pub const N_STATES: usize = 1;
