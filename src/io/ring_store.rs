//! Fixed-capacity circular block store for filtered audio
//!
//! Holds the most recent `num_blocks * block_size` filtered samples so that a
//! cardiac window can be cut out retrospectively once both of its bounding S1
//! events are known. This is the only place that does wraparound address
//! math; everything downstream works on copied-out windows.
//!
//! Writes are block granular and must follow the write-then-advance order:
//! fill [`RingWindowStore::get_write_block`] completely, then call
//! [`RingWindowStore::advance_write`] exactly once.

use std::sync::RwLock;

use crate::error::DspError;

/// Circular store of fixed-size `f32` blocks
#[derive(Debug, Clone)]
pub struct RingWindowStore {
    storage: Vec<f32>,
    num_blocks: usize,
    block_size: usize,
    write_index: usize,
    absolute_sample_index: u64,
}

impl RingWindowStore {
    /// Create a zeroed store of `num_blocks` blocks of `block_size` samples
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidConfig` if either dimension is zero
    pub fn new(num_blocks: usize, block_size: usize) -> Result<Self, DspError> {
        if num_blocks == 0 || block_size == 0 {
            return Err(DspError::InvalidConfig(format!(
                "Ring store needs non-zero geometry, got {} blocks of {} samples",
                num_blocks, block_size
            )));
        }
        Ok(Self {
            storage: vec![0.0; num_blocks * block_size],
            num_blocks,
            block_size,
            write_index: 0,
            absolute_sample_index: 0,
        })
    }

    /// Zero all storage and reset both indices
    pub fn reset(&mut self) {
        self.storage.iter_mut().for_each(|s| *s = 0.0);
        self.write_index = 0;
        self.absolute_sample_index = 0;
    }

    /// Block at the write position, to be filled in place
    pub fn get_write_block(&mut self) -> &mut [f32] {
        let start = self.write_index * self.block_size;
        &mut self.storage[start..start + self.block_size]
    }

    /// Publish the block filled through [`Self::get_write_block`]
    pub fn advance_write(&mut self) {
        self.write_index = (self.write_index + 1) % self.num_blocks;
        self.absolute_sample_index += self.block_size as u64;
    }

    /// Copy a full block in and publish it
    ///
    /// # Errors
    ///
    /// Returns `DspError::InvalidInput` if `block` is not exactly one block long
    pub fn push_block(&mut self, block: &[f32]) -> Result<(), DspError> {
        if block.len() != self.block_size {
            return Err(DspError::InvalidInput(format!(
                "Block has {} samples, ring store expects {}",
                block.len(),
                self.block_size
            )));
        }
        self.get_write_block().copy_from_slice(block);
        self.advance_write();
        Ok(())
    }

    /// Count of samples ever written (absolute index of the next sample)
    pub fn absolute_sample_index(&self) -> u64 {
        self.absolute_sample_index
    }

    /// Samples per block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// History length in samples
    pub fn capacity(&self) -> usize {
        self.num_blocks * self.block_size
    }

    /// Index of the block the next write lands in
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Copy out absolute samples `[start_idx - pre, end_idx + post)`
    ///
    /// # Errors
    ///
    /// - `InvalidRange` if either bound is negative, the range is empty, or
    ///   the end lies beyond the newest written sample
    /// - `CapacityExceeded` if part of the range has already been overwritten
    pub fn extract_window(
        &self,
        start_idx: i64,
        end_idx: i64,
        pre: i64,
        post: i64,
    ) -> Result<Vec<f32>, DspError> {
        let mut out = Vec::new();
        self.extract_window_into(start_idx, end_idx, pre, post, &mut out)?;
        Ok(out)
    }

    /// Same as [`Self::extract_window`] but reuses `out` as the destination
    ///
    /// `out` is cleared and resized to the window length on success; on
    /// failure its contents are unspecified.
    pub fn extract_window_into(
        &self,
        start_idx: i64,
        end_idx: i64,
        pre: i64,
        post: i64,
        out: &mut Vec<f32>,
    ) -> Result<(), DspError> {
        let start = start_idx - pre;
        let end = end_idx + post;
        if start < 0 || end < 0 || end <= start {
            log::debug!("Rejecting window range [{}, {})", start, end);
            return Err(DspError::InvalidRange { start, end });
        }

        let capacity = self.capacity() as u64;
        let latest = self.absolute_sample_index;
        if end as u64 > latest {
            // not written yet
            return Err(DspError::InvalidRange { start, end });
        }
        if latest - start as u64 > capacity || latest - end as u64 > capacity {
            log::debug!(
                "Window [{}, {}) aged out: latest={}, capacity={}",
                start,
                end,
                latest,
                capacity
            );
            return Err(DspError::CapacityExceeded {
                latest,
                start,
                end,
                capacity,
            });
        }

        let window_len = (end - start) as usize;
        out.clear();
        out.resize(window_len, 0.0);

        let capacity = capacity as usize;
        let mut i = 0;
        while i < window_len {
            let rel_idx = (start as usize + i) % capacity;
            let block_idx = rel_idx / self.block_size;
            let sample_idx = rel_idx % self.block_size;

            let left_in_block = self.block_size - sample_idx;
            let left_in_window = window_len - i;
            let n = left_in_block.min(left_in_window);

            let src = block_idx * self.block_size + sample_idx;
            out[i..i + n].copy_from_slice(&self.storage[src..src + n]);
            i += n;
        }

        Ok(())
    }
}

/// Anything a cardiac window can be copied out of
///
/// Implemented for the store itself (single-threaded pipelines) and for
/// `RwLock<RingWindowStore>`, where the read lock is held only for the copy.
pub trait WindowSource {
    /// Copy `[start_idx - pre, end_idx + post)` into `out`
    fn copy_window(
        &self,
        start_idx: i64,
        end_idx: i64,
        pre: i64,
        post: i64,
        out: &mut Vec<f32>,
    ) -> Result<(), DspError>;
}

impl WindowSource for RingWindowStore {
    fn copy_window(
        &self,
        start_idx: i64,
        end_idx: i64,
        pre: i64,
        post: i64,
        out: &mut Vec<f32>,
    ) -> Result<(), DspError> {
        self.extract_window_into(start_idx, end_idx, pre, post, out)
    }
}

impl WindowSource for RwLock<RingWindowStore> {
    fn copy_window(
        &self,
        start_idx: i64,
        end_idx: i64,
        pre: i64,
        post: i64,
        out: &mut Vec<f32>,
    ) -> Result<(), DspError> {
        // A panicked writer leaves whole blocks behind, never torn indices.
        let store = self.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        store.extract_window_into(start_idx, end_idx, pre, post, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fill `n_blocks` blocks with the absolute sample index as value
    fn fill_ramp(store: &mut RingWindowStore, n_blocks: usize) {
        for _ in 0..n_blocks {
            let base = store.absolute_sample_index();
            for (i, s) in store.get_write_block().iter_mut().enumerate() {
                *s = (base + i as u64) as f32;
            }
            store.advance_write();
        }
    }

    #[test]
    fn test_new_rejects_zero_geometry() {
        assert!(RingWindowStore::new(0, 16).is_err());
        assert!(RingWindowStore::new(4, 0).is_err());
    }

    #[test]
    fn test_advance_tracks_indices() {
        let mut store = RingWindowStore::new(3, 10).unwrap();
        fill_ramp(&mut store, 4);
        assert_eq!(store.absolute_sample_index(), 40);
        assert_eq!(store.write_index(), 1);
    }

    #[test]
    fn test_extract_across_block_boundaries() {
        let mut store = RingWindowStore::new(4, 8).unwrap();
        fill_ramp(&mut store, 4);

        // spans all four blocks
        let window = store.extract_window(3, 29, 0, 0).unwrap();
        assert_eq!(window.len(), 26);
        for (i, &v) in window.iter().enumerate() {
            assert_eq!(v, (3 + i) as f32, "mismatch at offset {}", i);
        }
    }

    #[test]
    fn test_extract_after_wraparound() {
        let mut store = RingWindowStore::new(4, 8).unwrap();
        fill_ramp(&mut store, 7); // latest = 56, oldest retained = 24

        let window = store.extract_window(26, 50, 2, 3).unwrap();
        assert_eq!(window.len(), 29);
        for (i, &v) in window.iter().enumerate() {
            assert_eq!(v, (24 + i) as f32, "mismatch at offset {}", i);
        }
    }

    #[test]
    fn test_extract_every_alignment_matches_written_data() {
        let mut store = RingWindowStore::new(5, 7).unwrap();
        fill_ramp(&mut store, 12);
        let latest = store.absolute_sample_index() as i64;
        let oldest = latest - store.capacity() as i64;

        for start in oldest..latest {
            for end in (start + 1)..=latest {
                let window = store.extract_window(start, end, 0, 0).unwrap();
                assert_eq!(window.len(), (end - start) as usize);
                assert_eq!(window[0], start as f32);
                assert_eq!(*window.last().unwrap(), (end - 1) as f32);
            }
        }
    }

    #[test]
    fn test_extract_fails_when_aged_out() {
        let mut store = RingWindowStore::new(4, 8).unwrap();
        fill_ramp(&mut store, 8); // latest = 64, capacity = 32

        let result = store.extract_window(20, 40, 0, 0);
        assert!(
            matches!(result, Err(DspError::CapacityExceeded { capacity: 32, .. })),
            "expected CapacityExceeded, got {:?}",
            result
        );
        // exactly at the capacity edge is still readable
        assert!(store.extract_window(32, 40, 0, 0).is_ok());
    }

    #[test]
    fn test_extract_rejects_invalid_ranges() {
        let mut store = RingWindowStore::new(4, 8).unwrap();
        fill_ramp(&mut store, 2);

        assert!(matches!(
            store.extract_window(5, 10, 6, 0),
            Err(DspError::InvalidRange { start: -1, .. })
        ));
        assert!(matches!(
            store.extract_window(10, 10, 0, 0),
            Err(DspError::InvalidRange { .. })
        ));
        assert!(matches!(
            store.extract_window(10, 12, 0, -4),
            Err(DspError::InvalidRange { .. })
        ));
        // beyond what has been written
        assert!(matches!(
            store.extract_window(10, 17, 0, 0),
            Err(DspError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_push_block_length_checked() {
        let mut store = RingWindowStore::new(2, 4).unwrap();
        assert!(store.push_block(&[1.0, 2.0, 3.0]).is_err());
        assert!(store.push_block(&[1.0, 2.0, 3.0, 4.0]).is_ok());
        assert_eq!(store.absolute_sample_index(), 4);
    }

    #[test]
    fn test_rwlock_source_copies_window() {
        let mut store = RingWindowStore::new(4, 8).unwrap();
        fill_ramp(&mut store, 3);
        let shared = RwLock::new(store);

        let mut out = Vec::new();
        shared.copy_window(4, 20, 0, 0, &mut out).unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(out[0], 4.0);
    }
}
