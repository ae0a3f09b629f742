//! The device surface the write pipeline drives.
//!
//! Two implementations exist: `nvme::NvmeDevice` (SPDK user-space driver,
//! behind the `spdk` feature) and [`SimDevice`](crate::sim::SimDevice), an
//! in-memory device used by tests and `--simulate` runs.
//!
//! All methods run on the benchmark thread. Completions are never delivered
//! from inside [`submit_write()`](Device::submit_write); they are only
//! delivered while [`poll_completions()`](Device::poll_completions) runs.

use crate::complete::CompletionSender;
use crate::error::{DriverError, Result};
use crate::status::CompletionRecord;

/// Namespace facts the write plan is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes per logical block.
    pub block_size: u32,
    /// Number of logical blocks in the namespace.
    pub num_blocks: u64,
}

impl Geometry {
    /// Namespace size in bytes.
    pub fn size(&self) -> u64 {
        self.num_blocks.saturating_mul(u64::from(self.block_size))
    }
}

/// A block device with independently polled I/O queue pairs.
pub trait Device {
    /// One submission/completion queue pair.
    type QueuePair;
    /// A DMA-capable data buffer.
    type Buffer;

    /// Attach to the controller and namespace.
    ///
    /// Fails with [`Error::DeviceUnavailable`](crate::Error::DeviceUnavailable)
    /// when nothing matches or the namespace is inactive.
    fn attach(&mut self) -> Result<Geometry>;

    /// Allocate an I/O queue pair. `index` is the queue pair's ordinal and is
    /// only used for diagnostics.
    fn open_queue_pair(&self, index: usize) -> Result<Self::QueuePair>;

    /// Allocate a zeroed DMA-capable buffer of `size` bytes aligned to `align`.
    fn allocate_dma_buffer(&self, size: usize, align: usize) -> Result<Self::Buffer>;

    /// Hand a write to the driver. On success `done` fires from a later
    /// [`poll_completions()`](Self::poll_completions) on the same queue pair.
    fn submit_write(
        &self,
        qpair: &Self::QueuePair,
        buf: &Self::Buffer,
        lba: u64,
        num_blocks: u32,
        done: CompletionSender<CompletionRecord>,
    ) -> std::result::Result<(), DriverError>;

    /// Process completions that arrived on `qpair`, firing their senders.
    /// Never blocks. Returns the number of completions processed.
    fn poll_completions(&self, qpair: &Self::QueuePair) -> std::result::Result<u32, DriverError>;

    /// Print a failed completion in the driver's own format.
    fn print_completion(&self, _qpair: &Self::QueuePair, _record: &CompletionRecord) {}
}
