//! spdk-nvme-queues - sequential NVMe write-bandwidth benchmark
//!
//! # Usage
//!
//! ```bash
//! # First local PCIe controller, namespace 1, one queue pair
//! sudo spdk-nvme-queues
//!
//! # Four queue pairs, 8 blocks per write, 1M blocks
//! sudo spdk-nvme-queues -q 4 -b 8 -n 1048576
//!
//! # No hardware
//! spdk-nvme-queues --simulate -q 4
//! ```

mod cli;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();

    match cli::run(&cli) {
        Ok(report) => {
            println!("bandwidth: {} B/s", report.result.bandwidth);
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Not routed through the log filter: always reported.
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
