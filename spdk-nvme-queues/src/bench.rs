//! Benchmark driver: setup, priming, draining and reporting of one run.
//!
//! ```text
//! Uninitialized ──setup──▶ Ready ──prime──▶ Running ──drain──▶ Drained ──▶ Reported
//! ```
//!
//! Any error along the way ends the run; there is no retry and no partial
//! result.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::pipeline::WritePipeline;
use crate::plan::{WritePlan, WritePlanBuilder};
use crate::reaper::{CompletionReaper, ReapStats};

/// Lifecycle of a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    /// Device attached, queue pairs open, buffer allocated.
    Ready,
    /// Writes submitted, reaper polling.
    Running,
    /// Plan exhausted and every queue pair idle.
    Drained,
    Reported,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Ready => "ready",
            Phase::Running => "running",
            Phase::Drained => "drained",
            Phase::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// Timing and bandwidth of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkResult {
    /// Timestamp taken before the priming wave.
    pub start: Duration,
    /// Timestamp taken after the last completion.
    pub end: Duration,
    pub elapsed: Duration,
    /// Bytes per second.
    pub bandwidth: u64,
}

impl BenchmarkResult {
    /// Derive elapsed time and bandwidth from two monotonic timestamps.
    pub fn from_timestamps(plan: &WritePlan, start: Duration, end: Duration) -> Result<Self> {
        let elapsed = end.checked_sub(start).ok_or_else(|| {
            Error::Timing(format!("end time {:?} before start time {:?}", end, start))
        })?;
        let nanos = elapsed.as_nanos();
        if nanos == 0 {
            return Err(Error::Timing("zero elapsed time".to_string()));
        }

        let bandwidth = plan.total_bytes().saturating_mul(1_000_000_000) / nanos;

        Ok(Self {
            start,
            end,
            elapsed,
            bandwidth: u64::try_from(bandwidth).unwrap_or(u64::MAX),
        })
    }
}

/// Outcome of the priming wave.
///
/// After one write per queue pair the cursor should sit at
/// [`WritePlan::priming_target()`]. A mismatch is reported, not fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimingCheck {
    pub expected: u64,
    pub observed: u64,
}

impl PrimingCheck {
    pub fn is_consistent(&self) -> bool {
        self.expected == self.observed
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub plan: WritePlan,
    pub result: BenchmarkResult,
    pub stats: ReapStats,
    pub priming: PrimingCheck,
    /// Phases the run went through, in order.
    pub phases: Vec<Phase>,
}

/// One end-to-end run against a device.
pub struct Benchmark<D: Device> {
    pipeline: WritePipeline<D>,
    phases: Vec<Phase>,
}

impl<D: Device> Benchmark<D> {
    /// Attach the device, open the queue pairs and allocate the write buffer.
    ///
    /// Block size and capacity come from the namespace; see
    /// [`WritePlanBuilder::build_for()`].
    pub fn setup(mut device: D, plan: WritePlanBuilder) -> Result<Self> {
        let geometry = device.attach()?;
        let plan = plan.build_for(&geometry)?;
        info!(
            block_size = plan.block_size(),
            total_blocks = plan.total_blocks(),
            blocks_per_write = plan.blocks_per_write(),
            queues = plan.queue_count(),
            "write plan"
        );

        let mut qpairs = Vec::with_capacity(plan.queue_count());
        for index in 0..plan.queue_count() {
            qpairs.push(device.open_queue_pair(index)?);
        }

        let buffer = device.allocate_dma_buffer(plan.bytes_per_write(), plan.block_size() as usize)?;
        let pipeline = WritePipeline::new(device, plan, buffer, qpairs)?;

        let mut bench = Self {
            pipeline,
            phases: vec![Phase::Uninitialized],
        };
        bench.enter(Phase::Ready);
        Ok(bench)
    }

    pub fn phase(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Uninitialized)
    }

    pub fn pipeline(&self) -> &WritePipeline<D> {
        &self.pipeline
    }

    pub fn plan(&self) -> &WritePlan {
        self.pipeline.plan()
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase(), to = %phase, "benchmark phase");
        self.phases.push(phase);
    }

    fn expect_phase(&self, phase: Phase) -> Result<()> {
        if self.phase() != phase {
            return Err(Error::InvalidArgument(format!(
                "benchmark is {}, expected {}",
                self.phase(),
                phase
            )));
        }
        Ok(())
    }

    /// Submit one write per queue pair and check where the cursor landed.
    pub fn prime(&mut self) -> Result<PrimingCheck> {
        self.expect_phase(Phase::Ready)?;
        self.enter(Phase::Running);

        for queue in 0..self.pipeline.queue_count() {
            self.pipeline.submit(queue)?;
        }

        let check = PrimingCheck {
            expected: self.plan().priming_target(),
            observed: self.pipeline.cursor(),
        };
        if !check.is_consistent() {
            warn!(
                expected = check.expected,
                observed = check.observed,
                "cursor mismatch after priming wave, continuing"
            );
        }
        Ok(check)
    }

    /// Run the whole benchmark and compute bandwidth.
    ///
    /// The start timestamp is taken before priming, the end timestamp after
    /// the last queue pair drained.
    pub fn run<C: Clock>(mut self, clock: &C) -> Result<BenchmarkReport> {
        self.expect_phase(Phase::Ready)?;

        let start = clock.now()?;
        let priming = self.prime()?;
        let stats = CompletionReaper::new().drain(&mut self.pipeline)?;
        self.enter(Phase::Drained);
        let end = clock.now()?;

        let plan = *self.plan();
        let result = BenchmarkResult::from_timestamps(&plan, start, end)?;
        self.enter(Phase::Reported);
        info!(
            elapsed_ms = result.elapsed.as_millis() as u64,
            writes = stats.completions,
            polls = stats.iterations,
            "bandwidth: {} B/s",
            result.bandwidth
        );

        Ok(BenchmarkReport {
            plan,
            result,
            stats,
            priming,
            phases: self.phases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(block_size: u32, total: u64) -> WritePlan {
        WritePlan::builder()
            .block_size(block_size)
            .total_blocks(total)
            .build()
            .unwrap()
    }

    #[test]
    fn test_bandwidth_one_second() {
        let result = BenchmarkResult::from_timestamps(
            &plan(512, 2048),
            Duration::from_secs(10),
            Duration::from_secs(11),
        )
        .unwrap();
        assert_eq!(result.elapsed, Duration::from_secs(1));
        assert_eq!(result.bandwidth, 1_048_576);
    }

    #[test]
    fn test_bandwidth_sub_second() {
        let result = BenchmarkResult::from_timestamps(
            &plan(4096, 1000),
            Duration::ZERO,
            Duration::from_millis(250),
        )
        .unwrap();
        assert_eq!(result.bandwidth, 4096 * 1000 * 4);
    }

    #[test]
    fn test_zero_elapsed_is_timing_error() {
        let t = Duration::from_secs(3);
        let err = BenchmarkResult::from_timestamps(&plan(512, 8), t, t).unwrap_err();
        assert!(matches!(err, Error::Timing(_)));
    }

    #[test]
    fn test_clock_going_back_is_timing_error() {
        let err = BenchmarkResult::from_timestamps(
            &plan(512, 8),
            Duration::from_secs(5),
            Duration::from_secs(4),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Timing(_)));
    }

    #[test]
    fn test_priming_check() {
        assert!(PrimingCheck { expected: 4, observed: 4 }.is_consistent());
        assert!(!PrimingCheck { expected: 4, observed: 3 }.is_consistent());
    }
}
