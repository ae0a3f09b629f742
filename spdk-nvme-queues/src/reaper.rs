//! Completion reaper: the busy-poll loop that drives the pipeline forward.
//!
//! Every iteration visits each queue pair, lets the driver process what
//! arrived and hands each completion to [`WritePipeline::on_complete()`],
//! which re-arms the queue pair. There is no sleep or backoff; an iteration
//! that finds nothing just spins again.
//!
//! The loop ends when the cursor reached the end of the plan *and* every
//! queue pair is idle, so the last write on each queue pair has completed
//! before the caller stops the clock.

use tracing::debug;

use crate::device::Device;
use crate::error::Result;
use crate::pipeline::WritePipeline;

/// Counters collected while draining.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapStats {
    /// Passes over the full queue pair set.
    pub iterations: u64,
    /// Completions handed to the pipeline.
    pub completions: u64,
}

/// Polls queue pairs until the pipeline is drained.
#[derive(Debug, Default)]
pub struct CompletionReaper {
    stats: ReapStats,
}

impl CompletionReaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// One pass over every queue pair. Returns the completions handled.
    pub fn poll_once<D: Device>(&mut self, pipeline: &mut WritePipeline<D>) -> Result<u32> {
        let mut handled = 0;
        for queue in 0..pipeline.queue_count() {
            if let Some(completion) = pipeline.reap(queue)? {
                handled += 1;
                pipeline.on_complete(completion)?;
            }
        }
        self.stats.iterations += 1;
        self.stats.completions += u64::from(handled);
        Ok(handled)
    }

    /// Spin until every write of the plan has completed.
    ///
    /// Returns on the first failure; no further writes are issued on any
    /// queue pair after that.
    pub fn drain<D: Device>(&mut self, pipeline: &mut WritePipeline<D>) -> Result<ReapStats> {
        while !pipeline.is_drained() {
            self.poll_once(pipeline)?;
        }
        debug!(
            iterations = self.stats.iterations,
            completions = self.stats.completions,
            "all queue pairs drained"
        );
        Ok(self.stats)
    }

    pub fn stats(&self) -> ReapStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::WritePlan;
    use crate::sim::{SimConfig, SimDevice};

    fn primed(config: SimConfig, total: u64, queues: usize) -> WritePipeline<SimDevice> {
        let device = SimDevice::new(config);
        let plan = WritePlan::builder()
            .block_size(512)
            .total_blocks(total)
            .queue_count(queues)
            .build()
            .unwrap();
        let qpairs = (0..queues).map(|i| device.open_queue_pair(i).unwrap()).collect();
        let buffer = device.allocate_dma_buffer(512, 512).unwrap();
        let mut pipeline = WritePipeline::new(device, plan, buffer, qpairs).unwrap();
        for queue in 0..queues {
            pipeline.submit(queue).unwrap();
        }
        pipeline
    }

    #[test]
    fn test_drain_counts_every_completion() {
        let mut pipeline = primed(SimConfig::default(), 10, 3);
        let stats = CompletionReaper::new().drain(&mut pipeline).unwrap();
        assert_eq!(stats.completions, 10);
        assert!(pipeline.is_drained());
        assert_eq!(pipeline.cursor(), 10);
    }

    #[test]
    fn test_not_drained_while_last_write_in_flight() {
        // Cursor hits the total after the first pass but the final writes
        // still need their completions.
        let mut pipeline = primed(SimConfig::default().latency_polls(4), 2, 2);
        assert_eq!(pipeline.cursor(), 2);
        assert!(!pipeline.is_drained());

        let mut reaper = CompletionReaper::new();
        for _ in 0..3 {
            assert_eq!(reaper.poll_once(&mut pipeline).unwrap(), 0);
            assert!(!pipeline.is_drained());
        }
        assert_eq!(reaper.poll_once(&mut pipeline).unwrap(), 2);
        assert!(pipeline.is_drained());
    }

    #[test]
    fn test_idle_pass_is_nonblocking() {
        let mut pipeline = primed(SimConfig::default().latency_polls(2), 4, 1);
        let mut reaper = CompletionReaper::new();
        assert_eq!(reaper.poll_once(&mut pipeline).unwrap(), 0);
        assert_eq!(reaper.stats().iterations, 1);
    }
}
