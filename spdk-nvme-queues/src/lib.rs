//! Sequential NVMe write-bandwidth benchmark.
//!
//! Writes a contiguous range of logical blocks through one or more NVMe I/O
//! queue pairs, each with exactly one write in flight, and reports the
//! sustained write bandwidth in bytes per second.
//!
//! # Quick Start
//!
//! ```no_run
//! use spdk_nvme_queues::{Benchmark, MonotonicClock, Result, WritePlan};
//! use spdk_nvme_queues::sim::{SimConfig, SimDevice};
//!
//! fn main() -> Result<()> {
//!     let device = SimDevice::new(SimConfig::default());
//!     let plan = WritePlan::builder().total_blocks(4096).queue_count(4);
//!
//!     let report = Benchmark::setup(device, plan)?.run(&MonotonicClock)?;
//!     println!("bandwidth: {} B/s", report.result.bandwidth);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`plan`] - What to write: block size, range, write size, queue count
//! - [`pipeline`] - LBA allocation and per-queue-pair submission
//! - [`reaper`] - Busy-poll completion loop
//! - [`bench`] - Setup, priming, draining and bandwidth reporting
//! - [`device`] - Device abstraction the pipeline drives
//! - [`complete`] - Callback-to-slot completion plumbing
//! - [`status`] - NVMe completion status decoding
//! - [`clock`] - Monotonic time source
//! - [`sim`] - In-memory device
//! - [`error`] - Error types
//! - `nvme`, `env`, `dma` - SPDK user-space driver backend (feature `spdk`)

pub mod bench;
pub mod clock;
pub mod complete;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod reaper;
pub mod sim;
pub mod status;

#[cfg(feature = "spdk")]
pub mod dma;
#[cfg(feature = "spdk")]
pub mod env;
#[cfg(feature = "spdk")]
pub mod nvme;

// Re-exports
pub use bench::{Benchmark, BenchmarkReport, BenchmarkResult, Phase, PrimingCheck};
pub use clock::{Clock, MonotonicClock};
pub use complete::{CompletionReceiver, CompletionSender, Delivery, completion, write_completion};
pub use device::{Device, Geometry};
pub use error::{DriverError, Error, Result};
pub use pipeline::{WriteCompletion, WritePipeline};
pub use plan::{DEFAULT_BLOCK_COUNT, WritePlan, WritePlanBuilder};
pub use reaper::{CompletionReaper, ReapStats};
pub use status::{CompletionRecord, CompletionStatus};

#[cfg(feature = "spdk")]
pub use dma::DmaBuf;
#[cfg(feature = "spdk")]
pub use env::{LogLevel, SpdkEnv, SpdkEnvBuilder};
