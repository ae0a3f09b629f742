//! Tests against the SPDK NVMe backend.
//!
//! Transport ID tests only need the SPDK libraries. The benchmark test needs
//! root, hugepages and an NVMe device bound to a userspace driver, and is
//! ignored by default:
//!
//! ```bash
//! sudo -E cargo test -p spdk-nvme-queues --features spdk -- --ignored
//! ```

#![cfg(feature = "spdk")]

use spdk_nvme_queues::nvme::{NvmeDevice, TransportId};
use spdk_nvme_queues::{Benchmark, MonotonicClock, Result, SpdkEnv, WritePlan};

#[test]
fn test_transport_id_pcie() {
    let trid = TransportId::pcie("0000:00:04.0").unwrap();
    assert!(trid.is_pcie());
    assert_eq!(trid.address(), "0000:00:04.0");
}

#[test]
fn test_transport_id_discovery() {
    let trid = TransportId::pcie_discovery().unwrap();
    assert!(trid.is_pcie());
    assert!(trid.address().is_empty());
    assert_eq!(trid.subnqn(), "nqn.2014-08.org.nvmexpress.discovery");
}

#[test]
fn test_transport_id_parse() {
    let trid = TransportId::parse("trtype:PCIe traddr:0000:81:00.0").unwrap();
    assert!(trid.is_pcie());
    assert_eq!(trid.address(), "0000:81:00.0");
}

#[test]
fn test_transport_id_address_too_long() {
    let addr = "0".repeat(512);
    assert!(TransportId::pcie(&addr).is_err());
}

#[test]
#[ignore = "needs an NVMe device bound to vfio-pci/uio and hugepages"]
fn test_benchmark_on_hardware() -> Result<()> {
    let _env = SpdkEnv::builder().name("test_nvme_bench").build()?;

    let device = NvmeDevice::new(TransportId::pcie_discovery()?, 1);
    let plan = WritePlan::builder()
        .total_blocks(64 * 1024)
        .blocks_per_write(8)
        .queue_count(4);

    let report = Benchmark::setup(device, plan)?.run(&MonotonicClock)?;
    eprintln!("bandwidth: {} B/s", report.result.bandwidth);

    assert!(report.result.bandwidth > 0);
    assert_eq!(report.stats.completions, 8 * 1024);
    Ok(())
}
