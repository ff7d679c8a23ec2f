/*!

## Disk paging of tensors

Large calculations may hold more site and environment tensors than fit into memory.
A [PagedStore] keeps a fixed number of tensor slots that either live in memory or
in a `.npy` file inside a write directory. Switching a store into paging mode flushes
every resident tensor to disk; afterwards each `set` writes through and each `get`
reads the file back. All I/O is synchronous.

 */

use crate::ChainError;
use log::debug;
use ndarray::prelude::*;
use ndarray_npy::{read_npy, write_npy};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counter that gives every store a unique file prefix inside a shared directory.
static STORE_ID: AtomicUsize = AtomicUsize::new(0);

/// Storage location of a single tensor.
#[derive(Clone, Debug)]
pub enum TensorSlot<D: Dimension> {
    Empty,
    Memory(Array<f64, D>),
    Disk(PathBuf),
}

impl<D: Dimension> TensorSlot<D> {
    pub fn is_empty(&self) -> bool {
        matches!(self, TensorSlot::Empty)
    }
}

/// A fixed-size collection of tensors that can be paged to disk.
#[derive(Debug)]
pub struct PagedStore<D: Dimension> {
    slots: Vec<TensorSlot<D>>,
    prefix: String,
    write_dir: Option<PathBuf>,
}

impl<D: Dimension> PagedStore<D> {
    /// Create a store with `len` empty slots. The `name` becomes part of the file names.
    pub fn new(name: &str, len: usize) -> Self {
        let id: usize = STORE_ID.fetch_add(1, Ordering::Relaxed);
        PagedStore {
            slots: (0..len).map(|_| TensorSlot::Empty).collect(),
            prefix: format!("{}_{}_{}", name, std::process::id(), id),
            write_dir: None,
        }
    }

    /// Create a store that holds the given tensors in memory.
    pub fn from_tensors(name: &str, tensors: Vec<Array<f64, D>>) -> Self {
        let mut store: Self = Self::new(name, 0);
        store.slots = tensors.into_iter().map(TensorSlot::Memory).collect();
        store
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_paged(&self) -> bool {
        self.write_dir.is_some()
    }

    pub fn is_set(&self, i: usize) -> bool {
        self.slots.get(i).map_or(false, |slot| !slot.is_empty())
    }

    /// Access the tensor in slot `i`. Paged tensors are read from disk.
    pub fn get(&self, i: usize) -> Result<Cow<'_, Array<f64, D>>, ChainError> {
        match self.slots.get(i) {
            Some(TensorSlot::Memory(tensor)) => Ok(Cow::Borrowed(tensor)),
            Some(TensorSlot::Disk(path)) => {
                let tensor: Array<f64, D> = read_npy(path)?;
                Ok(Cow::Owned(tensor))
            }
            Some(TensorSlot::Empty) => Err(ChainError::Invalid(format!(
                "slot {} of store {} was never set",
                i, self.prefix
            ))),
            None => Err(ChainError::Invalid(format!(
                "slot {} is out of range for store {} of length {}",
                i,
                self.prefix,
                self.slots.len()
            ))),
        }
    }

    /// Store a tensor in slot `i`; in paging mode the tensor is written to disk.
    pub fn set(&mut self, i: usize, tensor: Array<f64, D>) -> Result<(), ChainError> {
        if i >= self.slots.len() {
            return Err(ChainError::Invalid(format!(
                "slot {} is out of range for store {} of length {}",
                i,
                self.prefix,
                self.slots.len()
            )));
        }
        self.slots[i] = match &self.write_dir {
            Some(dir) => {
                let path: PathBuf = self.file_name(dir, i);
                write_npy(&path, &tensor)?;
                TensorSlot::Disk(path)
            }
            None => TensorSlot::Memory(tensor),
        };
        Ok(())
    }

    /// Switch paging on (flushing all resident tensors into `dir`) or off (reading
    /// all paged tensors back into memory).
    pub fn set_paging(&mut self, on: bool, dir: &Path) -> Result<(), ChainError> {
        if on == self.is_paged() {
            return Ok(());
        }
        if on {
            fs::create_dir_all(dir)?;
            for i in 0..self.slots.len() {
                if let TensorSlot::Memory(tensor) = &self.slots[i] {
                    let path: PathBuf = self.file_name(dir, i);
                    write_npy(&path, tensor)?;
                    self.slots[i] = TensorSlot::Disk(path);
                }
            }
            debug!("store {} paged to {}", self.prefix, dir.display());
            self.write_dir = Some(dir.to_path_buf());
        } else {
            for slot in self.slots.iter_mut() {
                if let TensorSlot::Disk(path) = slot {
                    let tensor: Array<f64, D> = read_npy(&*path)?;
                    fs::remove_file(&*path)?;
                    *slot = TensorSlot::Memory(tensor);
                }
            }
            self.write_dir = None;
        }
        Ok(())
    }

    fn file_name(&self, dir: &Path, i: usize) -> PathBuf {
        dir.join(format!("{}_{}.npy", self.prefix, i))
    }
}

impl<D: Dimension> Drop for PagedStore<D> {
    fn drop(&mut self) {
        for slot in self.slots.iter() {
            if let TensorSlot::Disk(path) = slot {
                // Nothing sensible can be done about a file that is already gone.
                let _ = fs::remove_file(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dmrg_chain_{}_{}", name, std::process::id()))
    }

    #[test]
    fn paged_tensors_round_trip_through_disk() {
        let dir: PathBuf = scratch_dir("round_trip");
        let mut store: PagedStore<Ix2> = PagedStore::new("test", 3);
        let a: Array2<f64> = array![[1.0, 2.0], [3.0, 4.0]];
        let b: Array2<f64> = array![[0.5], [-0.5]];
        store.set(0, a.clone()).unwrap();
        store.set_paging(true, &dir).unwrap();
        store.set(2, b.clone()).unwrap();

        assert!(store.is_paged());
        assert!(store.is_set(0) && !store.is_set(1) && store.is_set(2));
        assert!(matches!(store.get(0).unwrap(), Cow::Owned(_)));
        assert!(store.get(0).unwrap().abs_diff_eq(&a, 0.0));
        assert!(store.get(2).unwrap().abs_diff_eq(&b, 0.0));
        assert!(store.get(1).is_err());

        store.set_paging(false, &dir).unwrap();
        assert!(matches!(store.get(2).unwrap(), Cow::Borrowed(_)));
        assert!(store.get(2).unwrap().abs_diff_eq(&b, 0.0));
    }

    #[test]
    fn files_are_removed_with_the_store() {
        let dir: PathBuf = scratch_dir("drop");
        let path: PathBuf = {
            let mut store: PagedStore<Ix1> = PagedStore::new("drop", 1);
            store.set_paging(true, &dir).unwrap();
            store.set(0, array![1.0, 2.0, 3.0]).unwrap();
            match &store.slots[0] {
                TensorSlot::Disk(path) => path.clone(),
                _ => panic!("tensor should be on disk"),
            }
        };
        assert!(!path.exists());
    }
}
