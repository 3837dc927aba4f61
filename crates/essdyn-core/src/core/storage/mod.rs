//! Out-of-core trajectory storage.
//!
//! A [`FrameStore`](store::FrameStore) presents an unbounded append/random-read
//! sequence of frames while keeping only a bounded number of fixed-size
//! [`FrameBlock`](block::FrameBlock)s resident; cold blocks are spilled to and
//! restored from an injected [`SpillStore`](spill::SpillStore).

pub mod block;
pub mod spill;
pub mod store;

pub use spill::{FileSpillStore, MemorySpillStore, SpillStore};
pub use store::FrameStore;
