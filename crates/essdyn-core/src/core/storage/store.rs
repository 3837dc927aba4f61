use super::block::{BlockLayout, FrameBlock};
use super::spill::SpillStore;
use crate::core::error::DynamicsError;
use crate::core::sources::Frame;
use tracing::warn;

/// Out-of-core buffer for one trajectory pass.
///
/// Frames are appended into fixed-size blocks; a block that fills up is
/// spilled to the injected [`SpillStore`] and a new write block is opened.
/// Random reads keep a single restored block resident, so an arbitrarily long
/// trajectory is served with at most two blocks in memory (the unfinished
/// write block and the current read block).
///
/// The store owns its blocks and any spill artifacts; [`teardown`] must be
/// called exactly once when the pass is finished, after which every access
/// fails with [`DynamicsError::UseAfterFree`]. Active read and write blocks
/// are tracked by block id, since blocks are read in access order, not
/// creation order.
///
/// [`teardown`]: FrameStore::teardown
pub struct FrameStore {
    spill: Box<dyn SpillStore>,
    blocks: Vec<FrameBlock>,
    block_size: usize,
    frame_len: Option<usize>,
    total_frames: usize,
    active_read: usize,
    torn_down: bool,
}

impl FrameStore {
    pub fn new(block_size: usize, spill: Box<dyn SpillStore>) -> Result<Self, DynamicsError> {
        if block_size == 0 {
            return Err(DynamicsError::Internal(
                "frame store block size must be at least 1".into(),
            ));
        }
        Ok(Self {
            spill,
            blocks: Vec::new(),
            block_size,
            frame_len: None,
            total_frames: 0,
            active_read: 0,
            torn_down: false,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.total_frames
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_len(&self, index: usize) -> usize {
        self.blocks[index].len()
    }

    /// Length of every frame held by this store.
    pub fn frame_len(&self) -> Result<usize, DynamicsError> {
        self.frame_len.ok_or(DynamicsError::EmptyInput("frame store"))
    }

    pub fn append(&mut self, frame: Frame) -> Result<(), DynamicsError> {
        self.ensure_live()?;

        match self.frame_len {
            None => {
                self.frame_len = Some(frame.len());
                self.blocks.push(FrameBlock::new(0, frame.len()));
            }
            Some(expected) if frame.len() != expected => {
                return Err(DynamicsError::DimensionMismatch {
                    expected,
                    actual: frame.len(),
                });
            }
            Some(_) => {}
        }

        let write = self.blocks.len() - 1;
        self.blocks[write].push(frame)?;
        self.total_frames += 1;

        if self.blocks[write].len() == self.block_size {
            self.blocks[write].spill(&*self.spill)?;
            self.blocks
                .push(FrameBlock::new(write + 1, self.frame_len.expect("set above")));
        }
        Ok(())
    }

    /// Frame appended at `index`. Crossing a block boundary spills the
    /// previously read block (never the unfinished write block) and restores
    /// the owning one.
    pub fn get(&mut self, index: usize) -> Result<&[f64], DynamicsError> {
        self.ensure_live()?;
        if index >= self.total_frames {
            return Err(DynamicsError::IndexOutOfRange {
                index,
                len: self.total_frames,
            });
        }

        let group = index / self.block_size;
        if group != self.active_read {
            let write = self.blocks.len() - 1;
            let old = self.active_read;
            if old != write
                && self.blocks[old].is_resident()
                && self.blocks[old].layout() == BlockLayout::FrameMajor
            {
                self.blocks[old].spill(&*self.spill)?;
            }
            self.active_read = group;
        }

        if !self.blocks[group].is_resident() {
            self.blocks[group].restore(&*self.spill)?;
        }
        if self.blocks[group].layout() != BlockLayout::FrameMajor {
            return Err(DynamicsError::Internal(
                "frames are no longer addressable in a transposed store".into(),
            ));
        }
        Ok(self.blocks[group].frame(index - group * self.block_size))
    }

    /// Subtracts `vector` elementwise from every stored frame, transiently
    /// restoring and re-spilling blocks that are not resident.
    pub fn subtract_broadcast(&mut self, vector: &[f64]) -> Result<(), DynamicsError> {
        self.ensure_live()?;
        if self.total_frames == 0 {
            return Err(DynamicsError::EmptyInput("broadcast subtraction"));
        }
        let expected = self.frame_len()?;
        if vector.len() != expected {
            return Err(DynamicsError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        for block in &mut self.blocks {
            if block.is_empty() {
                continue;
            }
            if block.is_resident() {
                block.subtract(vector);
            } else {
                block.restore(&*self.spill)?;
                block.subtract(vector);
                block.spill(&*self.spill)?;
            }
        }
        Ok(())
    }

    /// Switches the store to atom-major layout for covariance accumulation.
    /// Resident blocks transpose in place; spilled blocks are flagged to
    /// restore straight into the transposed layout, so memory stays bounded.
    /// Transposed blocks are read-only.
    pub fn transpose_all(&mut self) -> Result<(), DynamicsError> {
        self.ensure_live()?;
        for block in &mut self.blocks {
            if block.is_empty() {
                continue;
            }
            if block.is_resident() {
                if block.layout() == BlockLayout::FrameMajor {
                    block.transpose_in_place();
                }
            } else {
                block.set_restore_transposed();
            }
        }
        Ok(())
    }

    /// Restores the block at `index` if it is not already in memory.
    pub fn ensure_block_resident(&mut self, index: usize) -> Result<(), DynamicsError> {
        self.ensure_live()?;
        if !self.blocks[index].is_resident() {
            self.blocks[index].restore(&*self.spill)?;
        }
        Ok(())
    }

    pub fn block(&self, index: usize) -> &FrameBlock {
        &self.blocks[index]
    }

    /// Drops the block's in-memory data and deletes its spill artifact; used
    /// once a consumer is done with the block for good.
    pub fn discard_block(&mut self, index: usize) -> Result<(), DynamicsError> {
        self.ensure_live()?;
        let block = &mut self.blocks[index];
        block.discard();
        block.delete_artifact(&*self.spill)
    }

    /// Discards all in-memory data and deletes every spill artifact. Any
    /// access after teardown fails with [`DynamicsError::UseAfterFree`].
    pub fn teardown(&mut self) -> Result<(), DynamicsError> {
        self.ensure_live()?;
        for block in &mut self.blocks {
            block.discard();
            block.delete_artifact(&*self.spill)?;
        }
        self.blocks = Vec::new();
        self.torn_down = true;
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DynamicsError> {
        if self.torn_down {
            return Err(DynamicsError::UseAfterFree {
                resource: "frame store",
            });
        }
        Ok(())
    }
}

impl Drop for FrameStore {
    fn drop(&mut self) {
        if !self.torn_down {
            if let Err(error) = self.teardown() {
                warn!(%error, "frame store dropped before teardown; spill cleanup failed");
            }
        }
    }
}
