use super::spill::SpillStore;
use crate::core::error::DynamicsError;
use std::io;
use tracing::debug;

const BYTES_PER_COORD: usize = size_of::<f64>();

/// Internal row layout of a block.
///
/// Frame-major keeps one row per frame; atom-major (transposed) keeps one row
/// per coordinate, holding that coordinate's value across all frames in the
/// block. A block is read-only while atom-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLayout {
    FrameMajor,
    AtomMajor,
}

/// A bounded group of consecutive trajectory frames that can be moved out of
/// memory and back as required.
#[derive(Debug)]
pub struct FrameBlock {
    id: usize,
    frame_len: usize,
    rows: Vec<Vec<f64>>,
    num_frames: usize,
    layout: BlockLayout,
    resident: bool,
    spilled_once: bool,
    restore_transposed: bool,
}

impl FrameBlock {
    pub fn new(id: usize, frame_len: usize) -> Self {
        Self {
            id,
            frame_len,
            rows: Vec::new(),
            num_frames: 0,
            layout: BlockLayout::FrameMajor,
            resident: true,
            spilled_once: false,
            restore_transposed: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.num_frames
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames == 0
    }

    pub fn is_resident(&self) -> bool {
        self.resident
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn has_artifact(&self) -> bool {
        self.spilled_once
    }

    /// Marks the block so that its next restore lands directly in atom-major
    /// layout instead of doing a restore pass followed by a transpose pass.
    pub fn set_restore_transposed(&mut self) {
        self.restore_transposed = true;
    }

    pub fn push(&mut self, frame: Vec<f64>) -> Result<(), DynamicsError> {
        if self.layout == BlockLayout::AtomMajor {
            return Err(DynamicsError::Internal(format!(
                "block {} is read-only in atom-major layout",
                self.id
            )));
        }
        debug_assert!(self.resident, "appending to a non-resident block");
        debug_assert_eq!(frame.len(), self.frame_len);

        self.rows.push(frame);
        self.num_frames += 1;
        Ok(())
    }

    /// Frame at `local` index within this block. The block must be resident
    /// and frame-major.
    pub fn frame(&self, local: usize) -> &[f64] {
        debug_assert!(self.resident && self.layout == BlockLayout::FrameMajor);
        &self.rows[local]
    }

    /// One coordinate's values across every frame of the block. The block
    /// must be resident and atom-major.
    pub fn series(&self, coord: usize) -> &[f64] {
        debug_assert!(self.resident && self.layout == BlockLayout::AtomMajor);
        &self.rows[coord]
    }

    /// Writes the block to secondary storage and drops the in-memory rows.
    pub fn spill(&mut self, spill: &dyn SpillStore) -> Result<(), DynamicsError> {
        debug_assert_eq!(
            self.layout,
            BlockLayout::FrameMajor,
            "only frame-major blocks are spilled"
        );
        debug!(block = self.id, frames = self.num_frames, "spilling block");

        spill.write(&self.key(), &self.encode())?;
        self.rows = Vec::new();
        self.resident = false;
        self.spilled_once = true;
        Ok(())
    }

    /// Restores the block from secondary storage, honoring a pending
    /// transpose request.
    pub fn restore(&mut self, spill: &dyn SpillStore) -> Result<(), DynamicsError> {
        debug!(
            block = self.id,
            transposed = self.restore_transposed,
            "restoring block"
        );
        let payload = spill.read(&self.key())?;
        let expected = self.num_frames * self.frame_len * BYTES_PER_COORD;
        if payload.len() != expected {
            return Err(DynamicsError::StorageIo {
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "spill artifact for block {} holds {} bytes, expected {expected}",
                        self.id,
                        payload.len()
                    ),
                ),
            });
        }

        if self.restore_transposed {
            let mut rows = vec![vec![0.0; self.num_frames]; self.frame_len];
            for (index, chunk) in payload.chunks_exact(BYTES_PER_COORD).enumerate() {
                let frame = index / self.frame_len;
                let coord = index % self.frame_len;
                rows[coord][frame] = f64::from_le_bytes(chunk.try_into().expect("8-byte chunk"));
            }
            self.rows = rows;
            self.layout = BlockLayout::AtomMajor;
            self.restore_transposed = false;
        } else {
            self.rows = payload
                .chunks_exact(self.frame_len * BYTES_PER_COORD)
                .map(|row| {
                    row.chunks_exact(BYTES_PER_COORD)
                        .map(|chunk| f64::from_le_bytes(chunk.try_into().expect("8-byte chunk")))
                        .collect()
                })
                .collect();
            self.layout = BlockLayout::FrameMajor;
        }

        self.resident = true;
        Ok(())
    }

    /// Reorganizes a resident frame-major block into atom-major layout.
    pub fn transpose_in_place(&mut self) {
        debug_assert!(self.resident && self.layout == BlockLayout::FrameMajor);

        let mut rows = vec![vec![0.0; self.num_frames]; self.frame_len];
        for (frame, row) in self.rows.iter().enumerate() {
            for (coord, value) in row.iter().enumerate() {
                rows[coord][frame] = *value;
            }
        }
        self.rows = rows;
        self.layout = BlockLayout::AtomMajor;
    }

    /// Subtracts `vector` elementwise from every frame held by this block.
    /// The block must be resident and frame-major.
    pub fn subtract(&mut self, vector: &[f64]) {
        debug_assert!(self.resident && self.layout == BlockLayout::FrameMajor);
        for row in &mut self.rows {
            for (value, delta) in row.iter_mut().zip(vector) {
                *value -= delta;
            }
        }
    }

    /// Drops the in-memory rows without writing them back.
    pub fn discard(&mut self) {
        self.rows = Vec::new();
        self.resident = false;
    }

    /// Deletes the spill artifact, if one was ever written.
    pub fn delete_artifact(&mut self, spill: &dyn SpillStore) -> Result<(), DynamicsError> {
        if self.spilled_once {
            spill.delete(&self.key())?;
            self.spilled_once = false;
        }
        Ok(())
    }

    fn key(&self) -> String {
        format!("block-{}", self.id)
    }

    fn encode(&self) -> Vec<u8> {
        let mut payload =
            Vec::with_capacity(self.num_frames * self.frame_len * BYTES_PER_COORD);
        for row in &self.rows {
            for value in row {
                payload.extend_from_slice(&value.to_le_bytes());
            }
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::spill::MemorySpillStore;

    fn block_with_frames(frames: &[&[f64]]) -> FrameBlock {
        let mut block = FrameBlock::new(0, frames[0].len());
        for frame in frames {
            block.push(frame.to_vec()).unwrap();
        }
        block
    }

    #[test]
    fn spill_and_restore_are_lossless() {
        let spill = MemorySpillStore::new();
        let mut block = block_with_frames(&[&[1.0, 2.0, 3.0], &[-4.0, 5.5, 6.25]]);

        block.spill(&spill).unwrap();
        assert!(!block.is_resident());
        assert!(block.has_artifact());

        block.restore(&spill).unwrap();
        assert_eq!(block.frame(0), &[1.0, 2.0, 3.0]);
        assert_eq!(block.frame(1), &[-4.0, 5.5, 6.25]);
    }

    #[test]
    fn restore_transposed_lands_atom_major_in_one_pass() {
        let spill = MemorySpillStore::new();
        let mut block = block_with_frames(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);

        block.spill(&spill).unwrap();
        block.set_restore_transposed();
        block.restore(&spill).unwrap();

        assert_eq!(block.layout(), BlockLayout::AtomMajor);
        assert_eq!(block.series(0), &[1.0, 4.0]);
        assert_eq!(block.series(1), &[2.0, 5.0]);
        assert_eq!(block.series(2), &[3.0, 6.0]);
    }

    #[test]
    fn transpose_in_place_matches_restore_transposed() {
        let mut block = block_with_frames(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]);
        block.transpose_in_place();

        assert_eq!(block.series(0), &[1.0, 3.0, 5.0]);
        assert_eq!(block.series(1), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn transposed_block_rejects_appends() {
        let mut block = block_with_frames(&[&[1.0, 2.0]]);
        block.transpose_in_place();
        assert!(matches!(
            block.push(vec![7.0, 8.0]),
            Err(DynamicsError::Internal(_))
        ));
    }

    #[test]
    fn subtract_shifts_every_frame() {
        let mut block = block_with_frames(&[&[1.0, 2.0], &[3.0, 4.0]]);
        block.subtract(&[1.0, 1.0]);
        assert_eq!(block.frame(0), &[0.0, 1.0]);
        assert_eq!(block.frame(1), &[2.0, 3.0]);
    }

    #[test]
    fn truncated_artifact_is_a_storage_failure() {
        let spill = MemorySpillStore::new();
        let mut block = block_with_frames(&[&[1.0, 2.0]]);
        block.spill(&spill).unwrap();

        spill.write("block-0", &[0_u8; 4]).unwrap();
        assert!(matches!(
            block.restore(&spill),
            Err(DynamicsError::StorageIo { .. })
        ));
    }

    #[test]
    fn delete_artifact_is_idempotent_per_spill() {
        let spill = MemorySpillStore::new();
        let mut block = block_with_frames(&[&[1.0]]);
        block.spill(&spill).unwrap();

        block.delete_artifact(&spill).unwrap();
        assert!(spill.is_empty());
        // Second call is a no-op rather than a missing-key error.
        block.delete_artifact(&spill).unwrap();
    }
}
