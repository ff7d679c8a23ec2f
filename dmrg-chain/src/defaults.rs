// Default sweep schedule. The values are used for every sweep whose parameter was
// not set explicitly.
// discarded weight that may be truncated at each bond
pub const CUTOFF: f64 = 1.0e-8;
// smallest and largest number of kept states per bond
pub const MIN_RANK: usize = 1;
pub const MAX_RANK: usize = 500;
// amplitude of the density matrix perturbation
pub const NOISE: f64 = 0.0;
// number of Davidson iterations per bond
pub const MAX_ITER: usize = 2;

// Singular value decompositions and norms below this value are treated as zero.
pub const ZERO_NORM: f64 = 1.0e-14;
