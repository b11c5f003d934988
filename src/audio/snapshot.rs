use parking_lot::Mutex;

use crate::error::{Result, SweepError};

/// The single handoff point between the analyzer and its readers.
///
/// Writes overwrite the whole spectrum and reads copy the whole spectrum out; the lock is
/// held for nothing but the copy, and nobody outside ever sees the storage by reference.
#[derive(Debug)]
pub struct SnapshotBuffer {
    magnitudes: Mutex<Vec<f32>>,
    bin_count: usize,
}

impl SnapshotBuffer {
    /// An all-zero snapshot of `bin_count` bins.
    pub fn new(bin_count: usize) -> Self {
        Self {
            magnitudes: Mutex::new(vec![0.0; bin_count]),
            bin_count,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Replace the published spectrum with `magnitudes`.
    pub fn publish(&self, magnitudes: &[f32]) -> Result<()> {
        self.check_len("published spectrum", magnitudes.len())?;
        self.magnitudes.lock().copy_from_slice(magnitudes);
        Ok(())
    }

    /// Copy the most recently published spectrum into `dest`.
    ///
    /// `dest` is left untouched when its length is wrong.
    pub fn read_into(&self, dest: &mut [f32]) -> Result<()> {
        self.check_len("snapshot destination", dest.len())?;
        dest.copy_from_slice(&self.magnitudes.lock());
        Ok(())
    }

    fn check_len(&self, what: &'static str, actual: usize) -> Result<()> {
        if actual != self.bin_count {
            return Err(SweepError::SizeMismatch {
                what,
                expected: self.bin_count,
                actual,
            });
        }
        Ok(())
    }
}
