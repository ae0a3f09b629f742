//! NVMe namespace and write submission.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

use spdk_io_sys::*;

use crate::complete::CompletionSender;
use crate::dma::DmaBuf;
use crate::error::DriverError;
use crate::status::{CompletionRecord, CompletionStatus};

use super::controller::NvmeController;
use super::qpair::NvmeQpair;

/// NVMe namespace handle.
///
/// Borrowed from the controller and invalid once the controller is dropped.
pub struct NvmeNamespace<'a> {
    ptr: NonNull<spdk_nvme_ns>,
    _ctrlr: PhantomData<&'a NvmeController>,
}

impl<'a> NvmeNamespace<'a> {
    pub(crate) fn from_ptr(ptr: NonNull<spdk_nvme_ns>) -> Self {
        Self {
            ptr,
            _ctrlr: PhantomData,
        }
    }

    pub fn id(&self) -> u32 {
        unsafe { spdk_nvme_ns_get_id(self.ptr.as_ptr()) }
    }

    /// Get sector size in bytes.
    pub fn sector_size(&self) -> u32 {
        unsafe { spdk_nvme_ns_get_sector_size(self.ptr.as_ptr()) }
    }

    /// Get total number of sectors.
    pub fn num_sectors(&self) -> u64 {
        unsafe { spdk_nvme_ns_get_num_sectors(self.ptr.as_ptr()) }
    }

    /// Get total size in bytes.
    pub fn size(&self) -> u64 {
        unsafe { spdk_nvme_ns_get_size(self.ptr.as_ptr()) }
    }

    pub fn is_active(&self) -> bool {
        unsafe { spdk_nvme_ns_is_active(self.ptr.as_ptr()) }
    }

    /// Submit a write command without waiting for it.
    ///
    /// `done` fires with the completion entry from a later
    /// [`NvmeQpair::process_completions()`] on `qpair`. If the driver
    /// rejects the command, `done` is dropped and the negative return code
    /// comes back as a [`DriverError`].
    ///
    /// # Arguments
    ///
    /// * `qpair` - Queue pair for submission
    /// * `buf` - DMA buffer with data to write
    /// * `lba` - Starting logical block address
    /// * `num_blocks` - Number of blocks to write
    pub fn write(
        &self,
        qpair: &NvmeQpair,
        buf: &DmaBuf,
        lba: u64,
        num_blocks: u32,
        done: CompletionSender<CompletionRecord>,
    ) -> Result<(), DriverError> {
        let ctx = done.into_raw();

        let rc = unsafe {
            spdk_nvme_ns_cmd_write(
                self.ptr.as_ptr(),
                qpair.as_ptr(),
                buf.as_ptr() as *mut c_void,
                lba,
                num_blocks,
                Some(write_complete),
                ctx,
                0, // io_flags
            )
        };

        if rc != 0 {
            // The callback will never run; reclaim the sender.
            drop(unsafe { CompletionSender::<CompletionRecord>::from_raw(ctx) });
            return Err(DriverError::from_rc(rc));
        }

        Ok(())
    }

    pub(crate) fn as_ptr(&self) -> *mut spdk_nvme_ns {
        self.ptr.as_ptr()
    }
}

/// C callback for write completion.
unsafe extern "C" fn write_complete(ctx: *mut c_void, cpl: *const spdk_nvme_cpl) {
    let tx = unsafe { CompletionSender::<CompletionRecord>::from_raw(ctx) };

    let cpl = unsafe { &*cpl };
    let status_raw = unsafe { cpl.__bindgen_anon_1.status_raw };

    tx.complete(CompletionRecord {
        cdw0: cpl.cdw0,
        sqhd: cpl.sqhd,
        sqid: cpl.sqid,
        cid: cpl.cid,
        status: CompletionStatus::from_raw(status_raw),
    });
}
