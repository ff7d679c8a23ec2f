//! Containers for one-dimensional tensor networks: matrix product states and
//! operators, the sweep schedule and the bond spectra, together with the dense
//! tensor algebra and disk paging they are built on.

pub use error::ChainError;
pub use mpo::Mpo;
pub use mps::Mps;
pub use spectrum::Spectrum;
pub use storage::{PagedStore, TensorSlot};
pub use sweeps::{SweepParams, Sweeps};
pub use tensor::{flatten, matricize, reshape, tensordot};

pub mod defaults;
mod error;
mod mpo;
mod mps;
mod spectrum;
mod storage;
mod sweeps;
mod tensor;
