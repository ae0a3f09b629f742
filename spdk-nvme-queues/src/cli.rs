//! Command line interface for spdk-nvme-queues

use clap::Parser;
use spdk_nvme_queues::sim::{SimConfig, SimDevice};
use spdk_nvme_queues::{Benchmark, BenchmarkReport, MonotonicClock, Result, WritePlan, WritePlanBuilder};

/// Sequential NVMe write-bandwidth benchmark
#[derive(Parser, Debug)]
#[command(name = "spdk-nvme-queues")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// SPDK transport ID, e.g. "trtype:PCIe traddr:0000:00:04.0"
    /// (default: every local PCIe controller, first one wins)
    #[arg(long)]
    pub transport: Option<String>,

    /// Namespace ID to write to
    #[arg(long, default_value_t = 1)]
    pub namespace: u32,

    /// Number of I/O queue pairs, each with one write in flight
    #[arg(short, long, default_value_t = 1)]
    pub queues: usize,

    /// Logical blocks per write command
    #[arg(short, long, default_value_t = 1)]
    pub blocks_per_write: u32,

    /// Total logical blocks to write (default: 2^30, capped to the namespace)
    #[arg(short = 'n', long)]
    pub block_count: Option<u64>,

    /// Run against the in-memory device instead of real hardware
    #[arg(long)]
    pub simulate: bool,

    /// Polls before a simulated write completes [default: 1]
    #[arg(long, requires = "simulate")]
    pub sim_latency: Option<u32>,

    /// Hugepage memory to reserve in MB
    #[arg(long)]
    pub mem_size: Option<i32>,

    /// Use regular memory instead of hugepages
    #[arg(long)]
    pub no_huge: bool,
}

impl Cli {
    pub fn plan(&self) -> WritePlanBuilder {
        let plan = WritePlan::builder()
            .queue_count(self.queues)
            .blocks_per_write(self.blocks_per_write);
        match self.block_count {
            Some(total) => plan.total_blocks(total),
            None => plan,
        }
    }
}

/// Run one benchmark as configured.
pub fn run(cli: &Cli) -> Result<BenchmarkReport> {
    if cli.simulate {
        let config = SimConfig::default().latency_polls(cli.sim_latency.unwrap_or(1));
        let device = SimDevice::new(config);
        return Benchmark::setup(device, cli.plan())?.run(&MonotonicClock);
    }
    run_nvme(cli)
}

#[cfg(feature = "spdk")]
fn run_nvme(cli: &Cli) -> Result<BenchmarkReport> {
    use spdk_nvme_queues::SpdkEnv;
    use spdk_nvme_queues::nvme::{NvmeDevice, TransportId};

    let mut env = SpdkEnv::builder()
        .name("spdk-nvme-queues")
        .no_huge(cli.no_huge);
    if let Some(mb) = cli.mem_size {
        env = env.mem_size_mb(mb);
    }
    let _env = env.build()?;

    let trid = match &cli.transport {
        Some(s) => TransportId::parse(s)?,
        None => TransportId::pcie_discovery()?,
    };
    let device = NvmeDevice::new(trid, cli.namespace);

    Benchmark::setup(device, cli.plan())?.run(&MonotonicClock)
}

#[cfg(not(feature = "spdk"))]
fn run_nvme(_cli: &Cli) -> Result<BenchmarkReport> {
    Err(spdk_nvme_queues::Error::DeviceUnavailable(
        "built without the `spdk` feature, use --simulate".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["spdk-nvme-queues"]).unwrap();
        assert_eq!(cli.namespace, 1);
        assert_eq!(cli.queues, 1);
        assert_eq!(cli.blocks_per_write, 1);
        assert_eq!(cli.block_count, None);
        assert!(!cli.simulate);
    }

    #[test]
    fn test_sim_latency_requires_simulate() {
        assert!(Cli::try_parse_from(["spdk-nvme-queues", "--sim-latency", "3"]).is_err());
    }

    #[test]
    fn test_simulated_run() {
        let cli = Cli::try_parse_from([
            "spdk-nvme-queues",
            "--simulate",
            "-q",
            "3",
            "-b",
            "2",
            "-n",
            "600",
        ])
        .unwrap();
        let report = run(&cli).unwrap();
        assert_eq!(report.plan.total_blocks(), 600);
        assert_eq!(report.stats.completions, 300);
    }

    #[cfg(not(feature = "spdk"))]
    #[test]
    fn test_hardware_run_needs_feature() {
        let cli = Cli::try_parse_from(["spdk-nvme-queues"]).unwrap();
        assert!(matches!(
            run(&cli),
            Err(spdk_nvme_queues::Error::DeviceUnavailable(_))
        ));
    }
}
