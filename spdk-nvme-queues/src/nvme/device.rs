//! [`Device`] over the SPDK NVMe driver.

use std::ptr::NonNull;

use nix::errno::Errno;
use spdk_io_sys::spdk_nvme_ns;
use tracing::info;

use crate::complete::CompletionSender;
use crate::device::{Device, Geometry};
use crate::dma::DmaBuf;
use crate::error::{DriverError, Error, Result};
use crate::status::CompletionRecord;

use super::controller::NvmeController;
use super::namespace::NvmeNamespace;
use super::qpair::NvmeQpair;
use super::transport::TransportId;

/// One namespace on a PCIe NVMe controller.
///
/// Nothing is touched until [`attach()`](Device::attach). The SPDK
/// environment must already be up, see [`SpdkEnv`](crate::env::SpdkEnv).
pub struct NvmeDevice {
    trid: TransportId,
    ns_id: u32,
    attached: Option<Attached>,
}

struct Attached {
    ctrlr: NvmeController,
    ns: NonNull<spdk_nvme_ns>,
}

impl NvmeDevice {
    pub fn new(trid: TransportId, ns_id: u32) -> Self {
        Self {
            trid,
            ns_id,
            attached: None,
        }
    }

    fn controller(&self) -> Result<&NvmeController> {
        self.attached
            .as_ref()
            .map(|a| &a.ctrlr)
            .ok_or_else(|| Error::DeviceUnavailable("controller not attached".to_string()))
    }

    fn namespace(&self) -> Option<NvmeNamespace<'_>> {
        // The pointer stays valid while the controller is attached.
        self.attached
            .as_ref()
            .map(|a| NvmeNamespace::from_ptr(a.ns))
    }
}

impl Device for NvmeDevice {
    type QueuePair = NvmeQpair;
    type Buffer = DmaBuf;

    fn attach(&mut self) -> Result<Geometry> {
        if self.attached.is_none() {
            let ctrlr = NvmeController::probe(&self.trid)?;
            let ns = ctrlr
                .namespace(self.ns_id)
                .ok_or_else(|| {
                    Error::DeviceUnavailable(format!(
                        "namespace {} missing or inactive",
                        self.ns_id
                    ))
                })?
                .as_ptr();
            let ns = NonNull::new(ns).ok_or_else(|| {
                Error::DeviceUnavailable(format!("namespace {} missing", self.ns_id))
            })?;
            self.attached = Some(Attached { ctrlr, ns });
        }

        let ns = self
            .namespace()
            .ok_or_else(|| Error::DeviceUnavailable("controller not attached".to_string()))?;
        info!(
            "  Namespace ID: {} size: {}GB",
            ns.id(),
            ns.size() / 1_000_000_000
        );

        Ok(Geometry {
            block_size: ns.sector_size(),
            num_blocks: ns.num_sectors(),
        })
    }

    fn open_queue_pair(&self, index: usize) -> Result<NvmeQpair> {
        self.controller()?
            .alloc_io_qpair()
            .ok_or(Error::QueueAllocationFailed { queue: index })
    }

    fn allocate_dma_buffer(&self, size: usize, align: usize) -> Result<DmaBuf> {
        DmaBuf::alloc_zeroed(size, align)
    }

    fn submit_write(
        &self,
        qpair: &NvmeQpair,
        buf: &DmaBuf,
        lba: u64,
        num_blocks: u32,
        done: CompletionSender<CompletionRecord>,
    ) -> std::result::Result<(), DriverError> {
        let ns = self
            .namespace()
            .ok_or(DriverError(Errno::ENODEV as i32))?;
        ns.write(qpair, buf, lba, num_blocks, done)
    }

    fn poll_completions(&self, qpair: &NvmeQpair) -> std::result::Result<u32, DriverError> {
        qpair.process_completions(0)
    }

    fn print_completion(&self, qpair: &NvmeQpair, record: &CompletionRecord) {
        qpair.print_completion(record);
    }
}
