//! NVMe I/O queue pair.

use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use spdk_io_sys::*;

use crate::error::DriverError;
use crate::status::CompletionRecord;

/// NVMe I/O queue pair.
///
/// Carries at most one benchmark write at a time. Completions are only
/// delivered from inside [`process_completions()`](Self::process_completions).
///
/// # Thread Safety
///
/// `!Send + !Sync` - qpair must stay on the allocating thread.
pub struct NvmeQpair {
    ptr: NonNull<spdk_nvme_qpair>,
    _marker: PhantomData<*mut ()>, // !Send + !Sync
}

impl NvmeQpair {
    pub(crate) fn from_ptr(ptr: NonNull<spdk_nvme_qpair>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Process I/O completions, firing their callbacks.
    ///
    /// # Arguments
    ///
    /// * `max_completions` - Max completions to process (0 = unlimited)
    ///
    /// # Returns
    ///
    /// Number of completions processed. A negative return (e.g. the qpair
    /// failed or was disconnected) becomes a [`DriverError`].
    pub fn process_completions(&self, max_completions: u32) -> Result<u32, DriverError> {
        let rc =
            unsafe { spdk_nvme_qpair_process_completions(self.ptr.as_ptr(), max_completions) };
        u32::try_from(rc).map_err(|_| DriverError::from_rc(rc))
    }

    /// Print a completion through SPDK's own formatter.
    pub fn print_completion(&self, record: &CompletionRecord) {
        let mut cpl: spdk_nvme_cpl = unsafe { MaybeUninit::zeroed().assume_init() };
        cpl.cdw0 = record.cdw0;
        cpl.sqhd = record.sqhd;
        cpl.sqid = record.sqid;
        cpl.cid = record.cid;
        cpl.__bindgen_anon_1.status_raw = record.status.raw();

        unsafe { spdk_nvme_qpair_print_completion(self.ptr.as_ptr(), &mut cpl) };
    }

    pub(crate) fn as_ptr(&self) -> *mut spdk_nvme_qpair {
        self.ptr.as_ptr()
    }
}

impl Drop for NvmeQpair {
    fn drop(&mut self) {
        unsafe {
            spdk_nvme_ctrlr_free_io_qpair(self.ptr.as_ptr());
        }
    }
}
