//! Write plan: what the benchmark writes and over how many queue pairs.

use crate::device::Geometry;
use crate::error::{Error, Result};

/// Block count written when none is requested: 2^30 logical blocks, capped
/// to the namespace capacity.
pub const DEFAULT_BLOCK_COUNT: u64 = 1024 * 1024 * 1024;

/// Immutable description of one benchmark run.
///
/// `total_blocks` is always a non-zero multiple of `blocks_per_write`, so the
/// last write ends exactly at `total_blocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePlan {
    block_size: u32,
    total_blocks: u64,
    blocks_per_write: u32,
    queue_count: usize,
}

impl WritePlan {
    pub fn builder() -> WritePlanBuilder {
        WritePlanBuilder::new()
    }

    /// Bytes per logical block.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    pub fn blocks_per_write(&self) -> u32 {
        self.blocks_per_write
    }

    pub fn queue_count(&self) -> usize {
        self.queue_count
    }

    /// Size of the shared data buffer.
    pub fn bytes_per_write(&self) -> usize {
        self.block_size as usize * self.blocks_per_write as usize
    }

    pub fn total_bytes(&self) -> u128 {
        u128::from(self.block_size) * u128::from(self.total_blocks)
    }

    /// Number of write commands the run issues.
    pub fn write_count(&self) -> u64 {
        self.total_blocks / u64::from(self.blocks_per_write)
    }

    /// Cursor value expected right after one write was primed on every
    /// queue pair. Queue pairs beyond the plan's write count stay idle.
    pub fn priming_target(&self) -> u64 {
        let wave = (self.queue_count as u64).saturating_mul(u64::from(self.blocks_per_write));
        wave.min(self.total_blocks)
    }
}

/// Builder for [`WritePlan`].
///
/// Block size and capacity normally come from the attached namespace via
/// [`build_for()`](Self::build_for).
#[derive(Debug, Clone)]
pub struct WritePlanBuilder {
    block_size: Option<u32>,
    total_blocks: Option<u64>,
    blocks_per_write: u32,
    queue_count: usize,
}

impl WritePlanBuilder {
    /// One queue pair, one block per write, size taken from the namespace.
    pub fn new() -> Self {
        Self {
            block_size: None,
            total_blocks: None,
            blocks_per_write: 1,
            queue_count: 1,
        }
    }

    /// Bytes per logical block. Must match the namespace when built with
    /// [`build_for()`](Self::build_for).
    pub fn block_size(mut self, block_size: u32) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Total number of logical blocks to write.
    pub fn total_blocks(mut self, total_blocks: u64) -> Self {
        self.total_blocks = Some(total_blocks);
        self
    }

    /// Blocks written by each command.
    pub fn blocks_per_write(mut self, blocks_per_write: u32) -> Self {
        self.blocks_per_write = blocks_per_write;
        self
    }

    /// Number of I/O queue pairs, each with one write in flight.
    pub fn queue_count(mut self, queue_count: usize) -> Self {
        self.queue_count = queue_count;
        self
    }

    /// Build a plan without a device. Block size and total are required.
    pub fn build(self) -> Result<WritePlan> {
        let block_size = self
            .block_size
            .ok_or_else(|| Error::InvalidPlan("block size not set".to_string()))?;
        let total_blocks = self
            .total_blocks
            .ok_or_else(|| Error::InvalidPlan("total block count not set".to_string()))?;
        self.validate(block_size, total_blocks)
    }

    /// Build a plan for an attached namespace.
    ///
    /// Without an explicit total the plan writes [`DEFAULT_BLOCK_COUNT`]
    /// blocks, capped to the namespace capacity and rounded down to a whole
    /// number of writes. An explicit total larger than the namespace is an
    /// error.
    pub fn build_for(self, geometry: &Geometry) -> Result<WritePlan> {
        let block_size = match self.block_size {
            Some(size) if size != geometry.block_size => {
                return Err(Error::InvalidPlan(format!(
                    "block size {} does not match namespace block size {}",
                    size, geometry.block_size
                )));
            }
            _ => geometry.block_size,
        };

        let total_blocks = match self.total_blocks {
            Some(total) if total > geometry.num_blocks => {
                return Err(Error::InvalidPlan(format!(
                    "{} blocks requested but namespace holds {}",
                    total, geometry.num_blocks
                )));
            }
            Some(total) => total,
            None => {
                let per_write = u64::from(self.blocks_per_write.max(1));
                let capped = DEFAULT_BLOCK_COUNT.min(geometry.num_blocks);
                capped - capped % per_write
            }
        };

        self.validate(block_size, total_blocks)
    }

    fn validate(&self, block_size: u32, total_blocks: u64) -> Result<WritePlan> {
        if block_size == 0 {
            return Err(Error::InvalidPlan("block size must be > 0".to_string()));
        }
        if self.blocks_per_write == 0 {
            return Err(Error::InvalidPlan(
                "blocks per write must be > 0".to_string(),
            ));
        }
        if self.queue_count == 0 {
            return Err(Error::InvalidPlan("queue count must be > 0".to_string()));
        }
        if total_blocks == 0 {
            return Err(Error::InvalidPlan(
                "total block count must be > 0".to_string(),
            ));
        }
        if total_blocks % u64::from(self.blocks_per_write) != 0 {
            return Err(Error::InvalidPlan(format!(
                "total block count {} is not a multiple of {} blocks per write",
                total_blocks, self.blocks_per_write
            )));
        }
        if (block_size as usize).checked_mul(self.blocks_per_write as usize).is_none() {
            return Err(Error::InvalidPlan("write size overflows".to_string()));
        }

        Ok(WritePlan {
            block_size,
            total_blocks,
            blocks_per_write: self.blocks_per_write,
            queue_count: self.queue_count,
        })
    }
}

impl Default for WritePlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(block_size: u32, num_blocks: u64) -> Geometry {
        Geometry {
            block_size,
            num_blocks,
        }
    }

    #[test]
    fn test_build_plan() {
        let plan = WritePlan::builder()
            .block_size(512)
            .total_blocks(2048)
            .blocks_per_write(8)
            .queue_count(4)
            .build()
            .unwrap();
        assert_eq!(plan.bytes_per_write(), 4096);
        assert_eq!(plan.total_bytes(), 512 * 2048);
        assert_eq!(plan.write_count(), 256);
        assert_eq!(plan.priming_target(), 32);
    }

    #[test]
    fn test_uneven_total_rejected() {
        let err = WritePlan::builder()
            .block_size(512)
            .total_blocks(10)
            .blocks_per_write(4)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(_)));
    }

    #[test]
    fn test_zero_values_rejected() {
        let base = || WritePlan::builder().block_size(512).total_blocks(8);
        assert!(base().queue_count(0).build().is_err());
        assert!(base().blocks_per_write(0).build().is_err());
        assert!(WritePlan::builder().block_size(512).total_blocks(0).build().is_err());
        assert!(WritePlan::builder().block_size(0).total_blocks(8).build().is_err());
    }

    #[test]
    fn test_priming_target_clamped_to_total() {
        let plan = WritePlan::builder()
            .block_size(512)
            .total_blocks(2)
            .queue_count(4)
            .build()
            .unwrap();
        assert_eq!(plan.priming_target(), 2);
    }

    #[test]
    fn test_build_for_defaults_to_capacity() {
        let plan = WritePlan::builder()
            .blocks_per_write(8)
            .build_for(&geometry(4096, 1003))
            .unwrap();
        assert_eq!(plan.block_size(), 4096);
        assert_eq!(plan.total_blocks(), 1000);
    }

    #[test]
    fn test_build_for_caps_default_count() {
        let plan = WritePlan::builder()
            .build_for(&geometry(512, u64::MAX))
            .unwrap();
        assert_eq!(plan.total_blocks(), DEFAULT_BLOCK_COUNT);
    }

    #[test]
    fn test_build_for_rejects_oversized_total() {
        let err = WritePlan::builder()
            .total_blocks(2048)
            .build_for(&geometry(512, 1024))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(_)));
    }

    #[test]
    fn test_build_for_rejects_block_size_mismatch() {
        let err = WritePlan::builder()
            .block_size(512)
            .build_for(&geometry(4096, 1024))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(_)));
    }
}
